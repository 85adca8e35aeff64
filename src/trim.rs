use crate::constants::BOUNDARY_KEEP;

/// Returns `true` if `char` is kana or a CJK ideograph.
#[inline]
pub const fn is_source_char(char: char) -> bool {
    matches!(char, '\u{3040}'..='\u{30FF}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}')
}

#[inline]
fn is_core_char(char: char) -> bool {
    is_source_char(char)
        || matches!(char, '\u{FF00}'..='\u{FFEF}' | '、' | '。' | '…')
        || BOUNDARY_KEEP.contains(&char)
}

/// Returns `true` if `text` contains anything worth translating.
///
/// # Example
/// ```
/// use rpgm_translate_lib::has_source_script;
///
/// assert!(has_source_script("「はい」"));
/// assert!(!has_source_script(r"\C[2]OK!"));
/// ```
#[must_use]
pub fn has_source_script(text: &str) -> bool {
    text.chars().any(is_source_char)
}

/// Text split into its translatable core and the control noise around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary<'a> {
    pub prefix: &'a str,
    pub core: &'a str,
    pub suffix: &'a str,
}

impl Boundary<'_> {
    /// Surrounds `translated` with the original prefix and suffix.
    #[must_use]
    pub fn rejoin(&self, translated: &str) -> String {
        let mut result: String = String::with_capacity(
            self.prefix.len() + translated.len() + self.suffix.len(),
        );

        result.push_str(self.prefix);
        result.push_str(translated);
        result.push_str(self.suffix);
        result
    }
}

/// Carves the longest leading and trailing runs of non-source characters off `text`.
///
/// Structural brackets `<>` and `【】` stay in the core, unless a backslash precedes them. `\>` and `\<` are escape
/// codes, and always end up in the prefix or suffix whole. If `text` has no core at all, it ends up in the prefix
/// entirely, and both core and suffix are empty.
///
/// `prefix + core + suffix` is always exactly `text`.
///
/// # Example
/// ```
/// use rpgm_translate_lib::trim;
///
/// let boundary = trim(r#"this.BLogAdd("敵を倒した！")"#);
/// assert_eq!(boundary.prefix, r#"this.BLogAdd(""#);
/// assert_eq!(boundary.core, "敵を倒した！");
/// assert_eq!(boundary.suffix, r#"")"#);
///
/// let boundary = trim(r"\>こんにちは\<");
/// assert_eq!(boundary.prefix, r"\>");
/// assert_eq!(boundary.core, "こんにちは");
/// assert_eq!(boundary.suffix, r"\<");
/// ```
#[must_use]
pub fn trim(text: &str) -> Boundary<'_> {
    let mut start: Option<usize> = None;
    let mut end: usize = 0;
    let mut previous: Option<char> = None;

    for (index, char) in text.char_indices() {
        let escaped: bool =
            previous == Some('\\') && BOUNDARY_KEEP.contains(&char);

        if is_core_char(char) && !escaped {
            start.get_or_insert(index);
            end = index + char.len_utf8();
        }

        previous = Some(char);
    }

    let Some(start) = start else {
        return Boundary {
            prefix: text,
            core: "",
            suffix: "",
        };
    };

    Boundary {
        prefix: &text[..start],
        core: &text[start..end],
        suffix: &text[end..],
    }
}
