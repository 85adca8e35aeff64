use crate::constants::regexes::*;
use indexmap::{IndexMap, IndexSet};
use regex::{Captures, Regex};
use strum_macros::Display;

/// Category of engine control syntax, that must survive translation untouched.
///
/// Categories are applied in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Category {
    /// `\I[n]`, `\K[n]`, `\W[n]` icon references.
    Icon,
    /// `\C[n]` text colors.
    Color,
    /// `\N[n]` actor names.
    Name,
    /// `\V[n]` variable values.
    Variable,
    /// `\CL`, `\!`, `\>`, `\<`, `\.`, `\|`, `\{`, `\}`, `\^` and similar formatting directives.
    Format,
}

impl Category {
    pub const ALL: [Self; 5] = [
        Self::Icon,
        Self::Color,
        Self::Name,
        Self::Variable,
        Self::Format,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            Self::Icon => &ICON_RE,
            Self::Color => &COLOR_RE,
            Self::Name => &NAME_RE,
            Self::Variable => &VARIABLE_RE,
            Self::Format => &FORMAT_RE,
        }
    }
}

/// Placeholder to original substring mapping of a single translation call.
///
/// Placeholders look like `<COLOR_0>`. Ordinals are assigned per category, in order of first appearance, and every
/// distinct match gets exactly one placeholder. Ordinals of placeholder-shaped text already present in the source are
/// skipped, so such text is never mistaken for a placeholder on restoration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProtectedTokens(IndexMap<String, String>);

impl ProtectedTokens {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the original substring behind `placeholder`.
    #[must_use]
    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.0.get(placeholder).map(String::as_str)
    }

    /// Iterates over `(placeholder, original)` pairs in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Replaces engine control syntax with placeholders.
///
/// Returns the sanitized text and the table needed to [`restore`] it.
///
/// # Example
/// ```
/// use rpgm_translate_lib::{protect, restore};
///
/// let (sanitized, tokens) = protect(r"\c[1]こんにちは\c[0]");
/// assert_eq!(sanitized, "<COLOR_0>こんにちは<COLOR_1>");
/// assert_eq!(tokens.len(), 2);
/// assert_eq!(restore(&sanitized, &tokens), r"\c[1]こんにちは\c[0]");
/// ```
pub fn protect(text: &str) -> (String, ProtectedTokens) {
    let reserved: IndexSet<String> = LOOSE_PLACEHOLDER_RE
        .captures_iter(text)
        .map(|captures| make_placeholder(&captures[1], &captures[2]))
        .collect();

    let mut sanitized: String = text.to_owned();
    let mut tokens: ProtectedTokens = ProtectedTokens::default();

    for category in Category::ALL {
        let mut assigned: IndexMap<String, String> = IndexMap::new();
        let mut ordinal: usize = 0;

        sanitized = category
            .regex()
            .replace_all(&sanitized, |captures: &Captures| {
                if let Some(placeholder) = assigned.get(&captures[0]) {
                    return placeholder.clone();
                }

                let placeholder: String = loop {
                    let candidate: String = make_placeholder(
                        &category.to_string(),
                        &ordinal.to_string(),
                    );
                    ordinal += 1;

                    if !reserved.contains(&candidate) {
                        break candidate;
                    }
                };

                assigned.insert(captures[0].to_owned(), placeholder.clone());
                placeholder
            })
            .into_owned();

        for (original, placeholder) in assigned {
            tokens.0.insert(placeholder, original);
        }
    }

    (sanitized, tokens)
}

fn make_placeholder(category: &str, ordinal: &str) -> String {
    format!("<{}_{ordinal}>", category.to_uppercase())
}

/// Puts the original control syntax back in place of placeholders.
///
/// Spaces and lowercase letters translators like to put inside placeholders (`< color_0 >`) are tolerated. A
/// placeholder the translator dropped entirely can't be restored, and its original substring is lost. That's not
/// treated as an error.
pub fn restore(translated: &str, tokens: &ProtectedTokens) -> String {
    if tokens.is_empty() {
        return translated.to_owned();
    }

    let normalized =
        LOOSE_PLACEHOLDER_RE.replace_all(translated, |captures: &Captures| {
            let placeholder: String =
                make_placeholder(&captures[1], &captures[2]);

            if tokens.0.contains_key(&placeholder) {
                placeholder
            } else {
                captures[0].to_owned()
            }
        });

    PLACEHOLDER_RE
        .replace_all(&normalized, |captures: &Captures| {
            tokens
                .get(&captures[0])
                .unwrap_or(&captures[0])
                .to_owned()
        })
        .into_owned()
}
