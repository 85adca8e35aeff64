use crate::{
    backend::{Backend, Completion, HeuristicTokenizer, Tokenizer},
    codec::{protect, restore, ProtectedTokens},
    constants::{localization::*, regexes::*, *},
    functions::normalize,
    trim::{has_source_script, trim, Boundary},
    types::*,
};
use log::warn;
use std::{sync::Arc, thread::sleep};

/// System instruction of a request.
#[derive(Debug, Clone, Copy, Default)]
pub enum Instruction<'a> {
    /// The configured system prompt.
    #[default]
    Full,
    /// A short task-specific instruction, like the one used for names.
    Short(&'a str),
}

/// Everything that accompanies the text of a single translation call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Request<'a> {
    /// Previous translations, oldest first.
    pub context: &'a [String],
    pub instruction: Instruction<'a>,
    /// Speaker of the text. Prefixed to the text, and stripped from the reply.
    pub speaker: Option<&'a str>,
    /// Characters to remove from the reply.
    pub scrub: Scrub,
}

impl<'a> Request<'a> {
    #[must_use]
    pub fn new(instruction: Instruction<'a>) -> Self {
        Self {
            instruction,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: &'a [String]) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_speaker(mut self, speaker: Option<&'a str>) -> Self {
        self.speaker = speaker;
        self
    }

    #[must_use]
    pub fn with_scrub(mut self, scrub: Scrub) -> Self {
        self.scrub = scrub;
        self
    }
}

/// Result of a single backend round.
enum Outcome {
    Translated(Completion),
    /// Reply failed the sanity check under [`ResponsePolicy::Lenient`]. The source text must be kept.
    Rejected { tokens: u64 },
}

/// Wraps a [`Backend`] with retry, sanity checking, reply cleanup and estimate mode.
///
/// In [`Mode::Estimate`], no backend is ever called, and results carry a token estimate, while the text is returned
/// as is. Callers don't need to know which mode is active.
#[derive(Clone)]
pub struct Adapter {
    backend: Option<Arc<dyn Backend>>,
    tokenizer: Arc<dyn Tokenizer>,
    model: String,
    mode: Mode,
    retry: RetryPolicy,
    response_policy: ResponsePolicy,
    system_prompt: String,
    glossary: Option<String>,
    length_ratio: usize,
}

impl Adapter {
    /// Creates a new adapter with default settings.
    ///
    /// # Parameters
    /// - `backend` - backend to call. May be `None` only in [`Mode::Estimate`].
    /// - `mode` - whether to translate or estimate.
    #[must_use]
    pub fn new(backend: Option<Arc<dyn Backend>>, mode: Mode) -> Self {
        Self {
            backend,
            tokenizer: Arc::new(HeuristicTokenizer),
            model: DEFAULT_MODEL.to_owned(),
            mode,
            retry: RetryPolicy::default(),
            response_policy: ResponsePolicy::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            glossary: None,
            length_ratio: DEFAULT_LENGTH_RATIO,
        }
    }

    pub fn set_tokenizer(&mut self, tokenizer: Arc<dyn Tokenizer>) {
        self.tokenizer = tokenizer;
    }

    /// Sets the model identifier estimates are counted for.
    pub fn set_model(&mut self, model: String) {
        self.model = model;
    }

    pub fn set_retry(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    pub fn set_response_policy(&mut self, policy: ResponsePolicy) {
        self.response_policy = policy;
    }

    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = prompt;
    }

    pub fn set_glossary(&mut self, glossary: Option<String>) {
        self.glossary = glossary;
    }

    pub fn set_length_ratio(&mut self, ratio: usize) {
        self.length_ratio = ratio;
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    fn compose_context(&self, context: &[String]) -> Vec<String> {
        let mut messages: Vec<String> = Vec::with_capacity(2);

        if let Some(glossary) = &self.glossary {
            messages.push(glossary.clone());
        }

        if !context.is_empty() {
            messages.push(format!("{CONTEXT_PREFIX}{}", context.join("\n\n")));
        }

        messages
    }

    /// Translates `text` as is.
    ///
    /// `text` is expected to be already trimmed and protected. Text without source script is returned unchanged,
    /// with zero tokens.
    ///
    /// With [`ResponsePolicy::Lenient`], a reply that fails the sanity check is replaced with `text`.
    ///
    /// # Errors
    /// - [`BackendError::Exhausted`] if every attempt failed. Wraps the error of the last attempt.
    pub fn translate(
        &self,
        text: &str,
        request: &Request,
    ) -> Result<Completion, BackendError> {
        if !has_source_script(text) {
            return Ok(Completion {
                text: text.to_owned(),
                tokens: 0,
            });
        }

        Ok(match self.call(text, request)? {
            Outcome::Translated(completion) => completion,
            Outcome::Rejected { tokens } => Completion {
                text: text.to_owned(),
                tokens,
            },
        })
    }

    fn call(
        &self,
        text: &str,
        request: &Request,
    ) -> Result<Outcome, BackendError> {
        let system: &str = match request.instruction {
            Instruction::Full => &self.system_prompt,
            Instruction::Short(instruction) => instruction,
        };

        let context: Vec<String> = self.compose_context(request.context);

        let user_text: String = match request.speaker {
            Some(speaker) => {
                format!("{USER_TEXT_PREFIX}{speaker}{SPEAKER_SEPARATOR}{text}")
            }
            None => format!("{USER_TEXT_PREFIX}{text}"),
        };

        if self.mode.is_estimate() {
            let count = |string: &str| self.tokenizer.count(&self.model, string);
            let tokens: usize = ESTIMATE_ROUND_TRIP_FACTOR * count(&user_text)
                + context.iter().map(|message| count(message)).sum::<usize>()
                + count(system);

            return Ok(Outcome::Translated(Completion {
                text: text.to_owned(),
                tokens: tokens as u64,
            }));
        }

        let attempts: u32 = self.retry.attempts.max(1);
        let mut last_error: BackendError =
            BackendError::Transport(NO_BACKEND_MSG.to_owned());

        for attempt in 1..=attempts {
            match self.attempt(system, &context, &user_text, text, request) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    if attempt < attempts {
                        warn!(
                            "{RETRYING_MSG} ({attempt}/{attempts}): {err}"
                        );
                        sleep(self.retry.delay_after(attempt));
                    }

                    last_error = err;
                }
            }
        }

        Err(BackendError::Exhausted {
            attempts,
            last: Box::new(last_error),
        })
    }

    fn attempt(
        &self,
        system: &str,
        context: &[String],
        user_text: &str,
        text: &str,
        request: &Request,
    ) -> Result<Outcome, BackendError> {
        let Some(backend) = &self.backend else {
            return Err(BackendError::Transport(NO_BACKEND_MSG.to_owned()));
        };

        let completion: Completion = backend.submit(system, context, user_text)?;
        let reply: String = clean_reply(&completion.text, request.speaker);

        match self.check(text, &reply) {
            Ok(()) => Ok(Outcome::Translated(Completion {
                text: reply,
                tokens: completion.tokens,
            })),
            Err(err) if self.response_policy.is_lenient() => {
                warn!("{SANITY_FALLBACK_MSG}: {err}");

                Ok(Outcome::Rejected {
                    tokens: completion.tokens,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn check(&self, text: &str, reply: &str) -> Result<(), BackendError> {
        if REFUSAL_PHRASES.iter().any(|phrase| reply.contains(phrase)) {
            return Err(BackendError::Refusal);
        }

        let input: usize = text.chars().count();
        let output: usize = reply.chars().count();

        if output > input.saturating_mul(self.length_ratio) {
            return Err(BackendError::LengthExceeded { input, output });
        }

        Ok(())
    }

    /// Runs the whole text pipeline on `text`: normalization, boundary trimming, token protection, translation,
    /// scrubbing and restoration.
    ///
    /// Text without source script is returned exactly as is, with zero tokens. So is the text of a reply rejected
    /// under [`ResponsePolicy::Lenient`], though its tokens are still counted.
    ///
    /// # Errors
    /// Same as [`Adapter::translate`].
    pub fn translate_text(
        &self,
        text: &str,
        request: &Request,
    ) -> Result<Completion, BackendError> {
        if !has_source_script(text) {
            return Ok(Completion {
                text: text.to_owned(),
                tokens: 0,
            });
        }

        let normalized: String = normalize(text);
        let boundary: Boundary = trim(&normalized);
        let (sanitized, tokens): (String, ProtectedTokens) =
            protect(boundary.core);

        if !has_source_script(&sanitized) {
            return Ok(Completion {
                text: text.to_owned(),
                tokens: 0,
            });
        }

        let completion: Completion = match self.call(&sanitized, request)? {
            Outcome::Translated(completion) => completion,
            Outcome::Rejected { tokens } => {
                return Ok(Completion {
                    text: text.to_owned(),
                    tokens,
                });
            }
        };

        let scrubbed: String = request.scrub.apply(&completion.text);
        let restored: String = restore(&scrubbed, &tokens);

        Ok(Completion {
            text: boundary.rejoin(&restored),
            tokens: completion.tokens,
        })
    }
}

/// Removes the noise backends like to surround translations with.
fn clean_reply(reply: &str, speaker: Option<&str>) -> String {
    let reply = ECHOED_CONTEXT_RE.replace(reply, "");
    let reply = NOTE_RE.replace_all(&reply, "");
    let mut reply: &str = reply.trim();

    while let Some(rest) = BOILERPLATE_PREFIXES
        .iter()
        .find_map(|prefix| reply.strip_prefix(prefix))
    {
        reply = rest.trim_start();
    }

    if let Some(speaker) = speaker {
        if let Some(rest) = reply
            .strip_prefix(speaker)
            .and_then(|rest| rest.strip_prefix(SPEAKER_SEPARATOR.trim_end()))
        {
            reply = rest.trim_start();
        }
    }

    reply.trim().to_owned()
}
