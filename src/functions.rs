use crate::constants::regexes::FURIGANA_RE;
use std::borrow::Cow;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

#[inline]
const fn is_wide(char: char) -> bool {
    matches!(char, '\u{3000}'..='\u{FFEF}')
}

/// Collapses runs of three or more identical wide characters to two.
///
/// Games stretch exclamations and stutters like `ああああ`, which translators turn into garbage.
pub fn collapse_repeats(string: &str) -> Cow<'_, str> {
    let mut previous: Option<char> = None;
    let mut repeats: usize = 0;
    let mut result: Option<String> = None;

    for (index, char) in string.char_indices() {
        if previous == Some(char) && is_wide(char) {
            repeats += 1;
        } else {
            repeats = 1;
        }

        previous = Some(char);

        if repeats > 2 {
            result.get_or_insert_with(|| string[..index].to_owned());
            continue;
        }

        if let Some(result) = &mut result {
            result.push(char);
        }
    }

    result.map_or(Cow::Borrowed(string), Cow::Owned)
}

/// Removes engine word wrap, so the translator sees one continuous sentence.
pub fn strip_wrap(string: &str) -> String {
    string
        .replace("<br>", " ")
        .replace('\n', " ")
        .replace('\u{3000}', " ")
}

/// Replaces `\r[漢字,かんじ]` furigana with bare kanji.
pub fn strip_furigana(string: &str) -> Cow<'_, str> {
    FURIGANA_RE.replace_all(string, "$1")
}

/// Normalization applied to every text before it's split and protected.
pub fn normalize(string: &str) -> String {
    let collapsed = collapse_repeats(string);
    let stripped = strip_furigana(&collapsed);
    strip_wrap(&stripped)
}

/// Greedily fills words into lines that are at most `width` columns wide.
///
/// Width is measured in terminal columns, so fullwidth characters count twice. Words that don't fit into a single
/// line are broken at the column limit. `width == 0` disables wrapping.
///
/// # Example
/// ```
/// use rpgm_translate_lib::wrap;
///
/// assert_eq!(wrap("the quick brown fox", 10, "\n"), "the quick\nbrown fox");
/// ```
pub fn wrap(string: &str, width: usize, line_break: &str) -> String {
    if width == 0 || string.width() <= width {
        return string.to_owned();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut line: String = String::new();
    let mut line_width: usize = 0;

    for word in string.split_whitespace() {
        let word_width: usize = word.width();

        if line_width != 0 && line_width + 1 + word_width <= width {
            line.push(' ');
            line.push_str(word);
            line_width += 1 + word_width;
            continue;
        }

        if line_width != 0 {
            lines.push(std::mem::take(&mut line));
            line_width = 0;
        }

        if word_width <= width {
            line.push_str(word);
            line_width = word_width;
            continue;
        }

        for char in word.chars() {
            let char_width: usize = char.width().unwrap_or(0);

            if line_width + char_width > width && line_width != 0 {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }

            line.push(char);
            line_width += char_width;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }

    lines.join(line_break)
}
