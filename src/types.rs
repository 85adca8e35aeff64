use crate::constants::*;
use bitflags::bitflags;
use num_enum::FromPrimitive;
use serde::{Serialize, Serializer};
use std::{
    convert::Infallible,
    fmt,
    str::FromStr,
    time::Duration,
};
use strum_macros::{Display, EnumIs};
use thiserror::Error;

/// 0 - Empty command. Used as the no-op sentinel for neutralized records.
///
/// 101 - Show text window. Holds the speaker name in MZ.
///
/// 102 - Show choices array.
///
/// 122 - Control variables. May hold a string literal.
///
/// 320, 324 - Change actor name/nickname.
///
/// 355 - Script. 655 - Continuation of the script.
///
/// 356 - Plugin command. 357 - Plugin command with arguments object (**MZ ONLY!**).
///
/// 401 - Dialogue line.
///
/// 405 - Scrolling text line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIs, FromPrimitive)]
#[repr(u16)]
pub enum Code {
    Empty = 0,
    SpeakerWindow = 101,
    ChoiceArray = 102,
    ControlVariable = 122,
    ChangeName = 320,
    ChangeNickname = 324,
    Script = 355,
    PluginCommand = 356,
    PluginText = 357,
    Dialogue = 401,
    ScrollingText = 405,
    ScriptContinuation = 655,
    #[num_enum(default)]
    Other = u16::MAX,
}

impl Code {
    /// Converts a raw JSON code. Negative or oversized codes are [`Code::Other`].
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        u16::try_from(raw).map_or(Self::Other, Self::from)
    }

    /// Returns the flag that enables processing of this code.
    #[must_use]
    pub const fn flag(self) -> CodeFlags {
        match self {
            Self::Dialogue => CodeFlags::Dialogue,
            Self::ScrollingText => CodeFlags::ScrollingText,
            Self::ChoiceArray => CodeFlags::Choice,
            Self::SpeakerWindow => CodeFlags::Speaker,
            Self::ControlVariable => CodeFlags::ControlVariable,
            Self::Script | Self::ScriptContinuation => CodeFlags::Script,
            Self::PluginCommand => CodeFlags::PluginCommand,
            Self::PluginText => CodeFlags::PluginText,
            Self::ChangeName | Self::ChangeNickname => CodeFlags::ActorName,
            Self::Empty | Self::Other => CodeFlags::empty(),
        }
    }
}

bitflags! {
    /// Selects which event codes are processed.
    ///
    /// [`CodeFlags::Dialogue`] and [`CodeFlags::ScrollingText`] codes are text-bearing: consecutive records with them
    /// are merged into a single run. Everything else is translated record by record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CodeFlags: u16 {
        /// 401 dialogue lines.
        const Dialogue = 1 << 0;

        /// 405 scrolling text lines.
        const ScrollingText = 1 << 1;

        /// 102 choices.
        const Choice = 1 << 2;

        /// 101 speaker name.
        const Speaker = 1 << 3;

        /// 122 string literals.
        const ControlVariable = 1 << 4;

        /// 355/655 scripts. Only `this.BLogAdd` scripts and `655` lines without `this.` are touched.
        const Script = 1 << 5;

        /// 356 plugin commands. Only `D_TEXT` commands are touched.
        const PluginCommand = 1 << 6;

        /// 357 plugin commands with a `text` argument.
        const PluginText = 1 << 7;

        /// 320/324 actor name and nickname changes.
        const ActorName = 1 << 8;
    }
}

impl CodeFlags {
    /// Text-bearing codes, that are merged into runs.
    #[must_use]
    pub fn mergeable() -> Self {
        Self::Dialogue | Self::ScrollingText
    }
}

impl Default for CodeFlags {
    fn default() -> Self {
        Self::Dialogue | Self::Choice
    }
}

bitflags! {
    /// Characters to scrub from the raw backend reply, before placeholders are restored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Scrub: u8 {
        const Periods = 1 << 0;
        const Quotes = 1 << 1;
        const Newlines = 1 << 2;
    }
}

impl Scrub {
    #[must_use]
    pub fn apply(self, string: &str) -> String {
        string
            .chars()
            .filter(|&char| {
                !((self.contains(Self::Periods) && char == '.')
                    || (self.contains(Self::Quotes) && char == '"')
                    || (self.contains(Self::Newlines) && char == '\n'))
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
/// Game data layout.
///
/// - [`GameFormat::MvMz`] - MV/MZ JSON data.
/// - [`GameFormat::Ace`] - VX Ace data dumped to YAML/JSON with short keys.
pub enum GameFormat {
    #[default]
    MvMz,
    Ace,
}

/// Per-format configuration consumed by the page scanner.
///
/// Selected once with [`FormatConfig::new`], then passed down. Every field can be overridden.
#[derive(Debug, Clone)]
pub struct FormatConfig {
    pub list: &'static str,
    pub code: &'static str,
    pub parameters: &'static str,
    pub events: &'static str,
    pub pages: &'static str,
    /// Map location name, shown when the player enters the map.
    pub display_name: &'static str,

    /// Inserted between merged fragments of a run.
    pub join_separator: &'static str,
    /// Inserted between wrapped lines.
    pub line_break: &'static str,
    /// Dialogue wrap width. `0` disables wrapping.
    pub width: usize,
    /// Wrap width for descriptions and other long list text.
    pub list_width: usize,
    /// Wrap width for text inside note tags.
    pub note_width: usize,
    /// Code written into neutralized records.
    pub neutral_code: u16,
    /// Put the speaker tag into the anchor record and the dialogue into the next slot of the run, if it has one.
    pub name_on_own_line: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            list: "list",
            code: "code",
            parameters: "parameters",
            events: "events",
            pages: "pages",
            display_name: "displayName",

            join_separator: "",
            line_break: "\n",
            width: 50,
            list_width: 90,
            note_width: 50,
            neutral_code: Code::Empty as u16,
            name_on_own_line: false,
        }
    }
}

impl FormatConfig {
    #[must_use]
    pub fn new(format: GameFormat) -> Self {
        match format {
            GameFormat::MvMz => Self::default(),
            GameFormat::Ace => Self {
                code: "c",
                parameters: "p",
                display_name: "display_name",
                join_separator: " ",
                width: 30,
                list_width: 70,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
/// - [`Mode::Translate`] - performs real backend calls.
/// - [`Mode::Estimate`] - never touches the network and returns a token estimate instead.
pub enum Mode {
    #[default]
    Translate,
    Estimate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
/// What to do with a response that fails the sanity check (refusal, or output far longer than input).
///
/// - [`ResponsePolicy::Strict`] - treat it as a failed call and retry.
/// - [`ResponsePolicy::Lenient`] - keep the source text.
pub enum ResponsePolicy {
    #[default]
    Strict,
    Lenient,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
/// What to do when a run exhausts the retry budget.
///
/// - [`FailurePolicy::Abort`] - stop the page and report the error. Runs flushed earlier stay translated.
/// - [`FailurePolicy::KeepOriginal`] - leave the run untouched and continue with the rest of the page.
pub enum FailurePolicy {
    #[default]
    Abort,
    KeepOriginal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    /// Delay multiplier between attempts. `1.0` keeps the delay fixed.
    pub backoff: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            backoff: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt that follows `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent: i32 =
            i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor: f32 = self.backoff.max(0.0).powi(exponent);

        Duration::try_from_secs_f32(self.delay.as_secs_f32() * factor)
            .unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
/// Kind of RPG Maker data file. Resolved from the file name once, and selects how units are collected from it.
pub enum FileKind {
    Map,
    CommonEvents,
    Troops,
    Actors,
    Armors,
    Classes,
    Enemies,
    Items,
    Weapons,
    MapInfos,
    Skills,
    States,
    System,
    Invalid,
}

impl FileKind {
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        match Self::from_str(filename) {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl FromStr for FileKind {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let stem: &str = value.rsplit_once('.').map_or(value, |(stem, _)| stem);
        let stem: String = stem.to_lowercase();

        Ok(match stem.as_str() {
            "mapinfos" => Self::MapInfos,
            "commonevents" => Self::CommonEvents,
            "troops" => Self::Troops,
            "actors" => Self::Actors,
            "armors" => Self::Armors,
            "classes" => Self::Classes,
            "enemies" => Self::Enemies,
            "items" => Self::Items,
            "weapons" => Self::Weapons,
            "skills" => Self::Skills,
            "states" => Self::States,
            "system" => Self::System,
            _ if stem
                .strip_prefix("map")
                .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())) =>
            {
                Self::Map
            }
            _ => Self::Invalid,
        })
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request timed out.")]
    Timeout,
    #[error("Backend responded with HTTP {0}: {1}")]
    Http(u16, String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Backend refused to translate.")]
    Refusal,
    #[error("Response is {output} characters long for {input} characters of input.")]
    LengthExceeded { input: usize, output: usize },
    #[error("Gave up after {attempts} attempts. Last error: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<BackendError>,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Translation backend failed: {0}")]
    Backend(#[from] BackendError),
    #[error("{file}: page {page}, record {index}: {reason}. Source text: {text:?}")]
    Structural {
        file: String,
        page: usize,
        index: usize,
        text: String,
        reason: &'static str,
    },
    #[error("Parsing JSON data failed with: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("{0}: file is not supported.")]
    UnsupportedFile(String),
    #[error("Building worker pool failed with: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Mode is translate, but no backend was supplied.")]
    NoBackend,
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

/// Where a unit lives, for error reports.
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    pub file: &'a str,
    pub page: usize,
}

impl Location<'_> {
    pub(crate) fn structural(
        &self,
        index: usize,
        text: &str,
        reason: &'static str,
    ) -> Error {
        Error::Structural {
            file: self.file.to_owned(),
            page: self.page,
            index,
            text: text.to_owned(),
            reason,
        }
    }
}

/// Result of translating one unit (a page or a flat record).
#[derive(Debug, Default)]
pub struct UnitResult {
    pub tokens: u64,
    pub error: Option<Error>,
}

impl UnitResult {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one translated file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub name: String,
    pub tokens: u64,
    pub cost: f64,
    pub elapsed: Duration,
    pub units: usize,
    pub failed_units: usize,
    /// First error encountered, if any unit failed.
    pub error: Option<Error>,
}

impl FileReport {
    /// A file is only complete when every unit succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{name}: [{tokens} Tokens/${cost:.4}][{secs:.1}s]",
            name = self.name,
            tokens = self.tokens,
            cost = self.cost,
            secs = self.elapsed.as_secs_f64()
        )?;

        match &self.error {
            None => write!(f, " ✓"),
            Some(err) => write!(
                f,
                " ✗ {err} ({failed}/{units} units failed)",
                failed = self.failed_units,
                units = self.units
            ),
        }
    }
}

/// Summary of a whole run over several files.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub tokens: u64,
    pub cost: f64,
    pub elapsed: Duration,
    /// Every speaker name translated during the run, in first-seen order.
    pub names: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.files.iter().all(FileReport::is_success)
    }
}
