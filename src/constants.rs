use const_format::formatcp;
use phf::phf_set;
use std::time::Duration;

pub(crate) mod localization {
    pub const TRANSLATED_FILE_MSG: &str = "Translated file";
    pub const ESTIMATED_FILE_MSG: &str = "Estimated file";
    pub const FAILED_FILE_MSG: &str = "Failed to translate file";
    pub const RETRYING_MSG: &str = "Translation request failed, retrying";
    pub const UNIT_FAILED_MSG: &str = "Unit failed";
    pub const KEEPING_ORIGINAL_MSG: &str =
        "Keeping source text after backend failure";
    pub const SANITY_FALLBACK_MSG: &str =
        "Response failed the sanity check, keeping source text";
    pub const NO_BACKEND_MSG: &str = "no translation backend configured";

    pub const MISSING_CODE_MSG: &str = "record has no numeric code";
    pub const MISSING_PARAMETERS_MSG: &str = "record has no parameters array";
    pub const MISSING_TEXT_MSG: &str =
        "text-bearing record has no string parameter";
    pub const NOT_AN_OBJECT_MSG: &str = "record is not an object";
    pub const NOT_A_LIST_MSG: &str = "command list is not an array";
}

/// Characters that stay inside the translatable core even though they don't belong to the source script.
///
/// Engine-specific brackets that wrap in-sentence tags are kept, so that the tag travels with the sentence.
pub(crate) const BOUNDARY_KEEP: phf::Set<char> = phf_set! {
    '<', '>', '【', '】'
};

/// Speaker tags start with an escape, so separator between the speaker and the dialogue is a colon.
pub const SPEAKER_SEPARATOR: &str = ": ";

pub const DEFAULT_HISTORY_DEPTH: usize = 10;
pub const DEFAULT_THREADS: usize = 10;
pub const DEFAULT_FILE_THREADS: usize = 1;

pub const DEFAULT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Responses longer than this multiple of the request are treated as garbage.
pub const DEFAULT_LENGTH_RATIO: usize = 15;

/// Price in dollars per 1000 tokens.
pub const DEFAULT_PRICE_PER_1K: f64 = 0.002;

/// Estimates double the payload to account for the response.
pub const ESTIMATE_ROUND_TRIP_FACTOR: usize = 2;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const USER_TEXT_PREFIX: &str = "Line to Translate = ";
pub const CONTEXT_PREFIX: &str = "Past Translated Text: ";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert Japanese visual novel translator, editor and localizer. \
Translate the line to natural English while keeping every placeholder in angle brackets (like <COLOR_0>) exactly as \
it is. Output ONLY the english translation in the following format: `Translation: <ENGLISH_TRANSLATION>`";

const REPLY_WITH_ONLY: &str = "Reply with only the english translation of the";

pub const NAME_INSTRUCTION: &str = formatcp!("{REPLY_WITH_ONLY} NPC name");
pub const CHOICE_INSTRUCTION: &str =
    formatcp!("{REPLY_WITH_ONLY} answer. The previous line is the question.");
pub const MENU_INSTRUCTION: &str = formatcp!("{REPLY_WITH_ONLY} menu item");
pub const LOCATION_INSTRUCTION: &str =
    formatcp!("{REPLY_WITH_ONLY} RPG location name");
pub const NOTE_INSTRUCTION: &str = "Reply with the english translation of the note.";
pub const DESCRIPTION_INSTRUCTION: &str =
    formatcp!("{REPLY_WITH_ONLY} description");
pub const ACTION_INSTRUCTION: &str = "Reply with the english translated action being performed and no subject.";
pub const MESSAGE_INSTRUCTION: &str = formatcp!("{REPLY_WITH_ONLY} message");

/// Phrases, that mean the backend refused to do its job.
pub(crate) const REFUSAL_PHRASES: [&str; 3] = [
    "I'm sorry, but I'm unable to assist with that translation",
    "I'm sorry, but I can't assist with that",
    "As an AI language model",
];

/// Boilerplate the backend tends to prepend. Longer prefixes go first.
pub(crate) const BOILERPLATE_PREFIXES: [&str; 10] = [
    "English Translation: ",
    "Translation: ",
    "Line to Translate = ",
    "Translation = ",
    "Translate = ",
    "English Translation:",
    "Translation:",
    "Line to Translate =",
    "Translation =",
    "Translate =",
];

pub(crate) mod regexes {
    use once_cell::sync::Lazy;
    use regex::Regex;

    pub static ICON_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"[\\]+[iIkKwW]+\[[0-9]+\]").expect("icon regex")
    });
    pub static COLOR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[\\]+[cC]\[[0-9]+\]").expect("color regex"));
    pub static NAME_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[\\]+[nN]\[.+?\]+").expect("name regex"));
    pub static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"[\\]+[vV]\[[0-9]+\]").expect("variable regex")
    });
    pub static FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"[\\]+(?:CL|[!><.|#^{}])").expect("format regex")
    });

    /// Anything that looks like a placeholder, including the spaces translators like to put inside.
    pub static LOOSE_PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"<\s*([A-Za-z]+)\s*_\s*([0-9]+)\s*>")
            .expect("loose placeholder regex")
    });
    pub static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"<[A-Z]+_[0-9]+>").expect("placeholder regex")
    });

    /// `\n<Name>`, `\nc<Name>` and `\nw[Name]` speaker tags.
    pub static SPEAKER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"[\\]+(?:[nN]<(?P<box>[^>]+)>|nc<(?P<plain>[^>]*)>|[nN][wW]\[(?P<window>[^\]]+)\])",
        )
        .expect("speaker regex")
    });

    /// `\r[漢字,かんじ]` and `\rb[漢字,かんじ]` furigana.
    pub static FURIGANA_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"[\\]+rb?\[([^,\]]+),[^\]]*\]").expect("furigana regex")
    });

    /// `<tag:body>` note tags of database records. Bodies may span lines.
    pub static NOTE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"<(?P<tag>[^:<>\n]+):(?P<body>[^>]*)>")
            .expect("note tag regex")
    });

    pub static NOTE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"Note:.*").expect("note regex"));
    pub static ECHOED_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?s)\n\nPast Translated Text:.*")
            .expect("echoed context regex")
    });
}
