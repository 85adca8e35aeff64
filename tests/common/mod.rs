#![allow(dead_code)]

use rpgm_translate_lib::{
    Backend, BackendError, Completion, FailurePolicy, RetryPolicy,
    TranslatorBuilder,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub const TOKENS_PER_CALL: u64 = 10;

const DICTIONARY: [(&str, &str); 6] = [
    ("こんにちは", "Hello"),
    ("さようなら", "Goodbye"),
    ("いいえ", "No"),
    ("アリス", "Alice"),
    ("あい", "Hi"),
    ("はい", "Yes"),
];

/// Replaces every known word of `text`, leaving everything else, placeholders included, as is.
pub fn fake_translate(text: &str) -> String {
    DICTIONARY
        .iter()
        .fold(text.to_owned(), |text, (source, target)| {
            text.replace(source, target)
        })
}

#[derive(Debug, Clone)]
pub struct Call {
    pub system: String,
    pub context: Vec<String>,
    pub text: String,
}

impl Call {
    /// User text without the request prefix.
    pub fn line(&self) -> &str {
        self.text
            .strip_prefix("Line to Translate = ")
            .unwrap_or(&self.text)
    }
}

type Reply = dyn Fn(&Call) -> Result<String, BackendError> + Send + Sync;

pub struct MockBackend {
    reply: Box<Reply>,
    calls: Mutex<Vec<Call>>,
}

impl MockBackend {
    pub fn new(
        reply: impl Fn(&Call) -> Result<String, BackendError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Translates known words of the line, and drops the speaker prefix if there's one.
    pub fn dictionary() -> Arc<Self> {
        Self::new(|call| {
            let line: &str = call.line();
            let line: &str = line.split_once(": ").map_or(line, |(_, text)| text);
            Ok(fake_translate(line))
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Backend for MockBackend {
    fn submit(
        &self,
        system: &str,
        context: &[String],
        text: &str,
    ) -> Result<Completion, BackendError> {
        let call = Call {
            system: system.to_owned(),
            context: context.to_vec(),
            text: text.to_owned(),
        };

        self.calls.lock().unwrap().push(call.clone());

        (self.reply)(&call).map(|text| Completion {
            text,
            tokens: TOKENS_PER_CALL,
        })
    }
}

pub fn instant_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 5,
        delay: Duration::ZERO,
        backoff: 1.0,
    }
}

pub fn builder(backend: &Arc<MockBackend>) -> TranslatorBuilder {
    TranslatorBuilder::new()
        .with_backend(backend.clone())
        .retry(instant_retry())
        .failure_policy(FailurePolicy::Abort)
}
