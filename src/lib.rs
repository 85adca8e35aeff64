//! Library that translates narrative text of RPG Maker event data with a text-completion backend, without breaking
//! the control syntax around it.

mod constants;
mod functions;
mod processors;
mod records;

pub mod adapter;
pub mod aggregate;
pub mod backend;
pub mod codec;
pub mod context;
pub mod scanner;
pub mod trim;
pub mod types;

pub use adapter::{Adapter, Instruction, Request};
pub use aggregate::{NoProgress, ProgressSink};
pub use backend::{
    Backend, BackendConfig, Completion, HeuristicTokenizer, OpenAiBackend,
    Tokenizer,
};
pub use codec::{protect, restore, Category, ProtectedTokens};
pub use context::ContextWindow;
pub use functions::{collapse_repeats, normalize, strip_furigana, strip_wrap, wrap};
pub use processors::{Translator, TranslatorBuilder};
pub use scanner::{NameRegistry, PageScanner, Run};
pub use trim::{has_source_script, trim, Boundary};
pub use types::*;
