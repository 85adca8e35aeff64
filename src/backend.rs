use crate::{constants::*, types::BackendError};
use reqwest::{
    blocking::{Client, Response},
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Translated text and the tokens spent to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens: u64,
}

/// Text-completion service that performs the actual translation.
///
/// Calls are blocking, and may be issued from many worker threads at once.
pub trait Backend: Send + Sync {
    /// Submits a single translation request.
    ///
    /// # Parameters
    /// - `system` - system instruction.
    /// - `context` - context messages, oldest first.
    /// - `text` - text to translate.
    ///
    /// # Errors
    /// Any [`BackendError`]. The caller decides whether to retry.
    fn submit(
        &self,
        system: &str,
        context: &[String],
        text: &str,
    ) -> Result<Completion, BackendError>;
}

/// Counts tokens the same way the backend would, without calling it.
pub trait Tokenizer: Send + Sync {
    /// Returns the number of tokens `text` takes in the vocabulary of `model`.
    fn count(&self, model: &str, text: &str) -> usize;
}

/// Tokenizer that approximates BPE token counts by script.
///
/// Kana and CJK ideographs take roughly two characters per token, everything else roughly four. Models with the
/// larger `o200k` vocabulary (`gpt-4o`, `gpt-4.1`, `o*`) pack roughly three CJK characters into a token.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicTokenizer;

impl HeuristicTokenizer {
    const fn cjk_per_token(model: &str) -> usize {
        let bytes: &[u8] = model.as_bytes();

        match bytes {
            [b'g', b'p', b't', b'-', b'4', b'o', ..]
            | [b'g', b'p', b't', b'-', b'4', b'.', ..]
            | [b'o', b'0'..=b'9', ..] => 3,
            _ => 2,
        }
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, model: &str, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        if text.is_ascii() {
            return text.len().div_ceil(4);
        }

        let (cjk, other): (usize, usize) =
            text.chars().fold((0, 0), |(cjk, other), char| {
                if is_cjk_char(char) {
                    (cjk + 1, other)
                } else {
                    (cjk, other + 1)
                }
            });

        cjk.div_ceil(Self::cjk_per_token(model)) + other.div_ceil(4)
    }
}

#[inline]
const fn is_cjk_char(char: char) -> bool {
    matches!(char, '\u{3040}'..='\u{30FF}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{AC00}'..='\u{D7AF}')
}

/// Connection and sampling settings of an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_base: String,
    pub api_key: String,
    pub organization: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            api_key: String::new(),
            organization: None,
            model: DEFAULT_MODEL.to_owned(),
            temperature: 0.0,
            frequency_penalty: 0.2,
            presence_penalty: 0.2,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

/// [`Backend`] that talks to an OpenAI-compatible `/chat/completions` endpoint over blocking HTTP.
pub struct OpenAiBackend {
    client: Client,
    url: String,
    config: BackendConfig,
}

impl OpenAiBackend {
    /// Creates the HTTP client.
    ///
    /// # Errors
    /// - [`BackendError::Transport`] if the key or organization aren't valid header values, or the client can't be
    ///   built.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let mut headers: HeaderMap = HeaderMap::new();

        let mut authorization: HeaderValue =
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|err| BackendError::Transport(err.to_string()))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        if let Some(organization) = &config.organization {
            headers.insert(
                "OpenAI-Organization",
                HeaderValue::from_str(organization)
                    .map_err(|err| BackendError::Transport(err.to_string()))?,
            );
        }

        let client: Client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let url: String = format!(
            "{}/chat/completions",
            config.api_base.trim_end_matches('/')
        );

        Ok(Self {
            client,
            url,
            config,
        })
    }
}

impl Backend for OpenAiBackend {
    fn submit(
        &self,
        system: &str,
        context: &[String],
        text: &str,
    ) -> Result<Completion, BackendError> {
        let mut messages: Vec<ChatMessage> =
            Vec::with_capacity(context.len() + 2);

        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
        messages.extend(context.iter().map(|entry| ChatMessage {
            role: "assistant",
            content: entry,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: text,
        });

        let request: ChatRequest = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            frequency_penalty: self.config.frequency_penalty,
            presence_penalty: self.config.presence_penalty,
        };

        let response: Response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Transport(err.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body: String = response.text().unwrap_or_default();
            return Err(BackendError::Http(status.as_u16(), body));
        }

        let response: ChatResponse = response.json().map_err(|err| {
            if err.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Malformed(err.to_string())
            }
        })?;

        let text: String = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                BackendError::Malformed("response has no choices".to_owned())
            })?;

        Ok(Completion {
            text,
            tokens: response.usage.map_or(0, |usage| usage.total_tokens),
        })
    }
}
