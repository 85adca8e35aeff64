use crate::{
    adapter::{Adapter, Instruction, Request},
    aggregate::{Dispatcher, NoProgress, ProgressSink},
    backend::{Backend, Completion, HeuristicTokenizer, Tokenizer},
    constants::*,
    scanner::NameRegistry,
    types::*,
};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use serde_json::Value;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

pub(crate) struct Processor {
    pub backend: Option<Arc<dyn Backend>>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub model: String,
    pub sink: Arc<dyn ProgressSink>,
    pub mode: Mode,
    pub format: FormatConfig,
    pub codes: CodeFlags,
    pub retry: RetryPolicy,
    pub response_policy: ResponsePolicy,
    pub failure_policy: FailurePolicy,
    pub system_prompt: String,
    pub glossary: Option<String>,
    pub length_ratio: usize,
    pub history_depth: usize,
    pub price_per_1k: f64,
    pub threads: usize,
    pub file_threads: usize,
}

impl Default for Processor {
    fn default() -> Self {
        Self {
            backend: None,
            tokenizer: Arc::new(HeuristicTokenizer),
            model: DEFAULT_MODEL.to_owned(),
            sink: Arc::new(NoProgress),
            mode: Mode::default(),
            format: FormatConfig::default(),
            codes: CodeFlags::default(),
            retry: RetryPolicy::default(),
            response_policy: ResponsePolicy::default(),
            failure_policy: FailurePolicy::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            glossary: None,
            length_ratio: DEFAULT_LENGTH_RATIO,
            history_depth: DEFAULT_HISTORY_DEPTH,
            price_per_1k: DEFAULT_PRICE_PER_1K,
            threads: DEFAULT_THREADS,
            file_threads: DEFAULT_FILE_THREADS,
        }
    }
}

impl Processor {
    fn adapter(&self) -> Adapter {
        let mut adapter: Adapter = Adapter::new(self.backend.clone(), self.mode);
        adapter.set_tokenizer(Arc::clone(&self.tokenizer));
        adapter.set_model(self.model.clone());
        adapter.set_retry(self.retry);
        adapter.set_response_policy(self.response_policy);
        adapter.set_system_prompt(self.system_prompt.clone());
        adapter.set_glossary(self.glossary.clone());
        adapter.set_length_ratio(self.length_ratio);
        adapter
    }
}

/// A builder struct for [`Translator`].
///
/// # Example
/// ```no_run
/// use rpgm_translate_lib::{TranslatorBuilder, CodeFlags, Mode};
///
/// let translator = TranslatorBuilder::new()
///     .with_codes(CodeFlags::Dialogue | CodeFlags::Choice | CodeFlags::Speaker)
///     .mode(Mode::Estimate)
///     .build()?;
/// # Ok::<(), rpgm_translate_lib::Error>(())
/// ```
#[derive(Default)]
pub struct TranslatorBuilder {
    processor: Processor,
}

impl TranslatorBuilder {
    /// Creates a new [`TranslatorBuilder`] instance with default values.
    ///
    /// By default, 401 dialogue and 102 choices of MV/MZ data are translated with the OpenAI-style default prompt,
    /// five attempts per call five seconds apart, and ten worker threads. Backend failures abort their page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the translation backend. Required in [`Mode::Translate`].
    ///
    /// # Parameters
    /// - `backend` - any [`Backend`], like [`crate::OpenAiBackend`].
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.processor.backend = Some(backend);
        self
    }

    /// Sets the tokenizer used for estimates. Defaults to [`HeuristicTokenizer`].
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.processor.tokenizer = tokenizer;
        self
    }

    /// Sets the model identifier the tokenizer counts estimates for. Should match [`crate::BackendConfig::model`].
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.processor.model = model.into();
        self
    }

    /// Sets the sink that receives progress updates. See [`ProgressSink`].
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.processor.sink = sink;
        self
    }

    /// Sets the event codes to translate. See [`CodeFlags`] for more info.
    ///
    /// # Parameters
    /// - `codes` - [`CodeFlags`] bitflags.
    ///
    /// # Example
    /// ```
    /// use rpgm_translate_lib::{TranslatorBuilder, CodeFlags};
    ///
    /// let builder = TranslatorBuilder::new().with_codes(CodeFlags::all());
    /// ```
    #[must_use]
    pub fn with_codes(mut self, codes: CodeFlags) -> Self {
        self.processor.codes = codes;
        self
    }

    /// Sets whether to translate or estimate. See [`Mode`] for more info.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.processor.mode = mode;
        self
    }

    /// Sets the data layout. See [`FormatConfig`] for more info.
    ///
    /// # Example
    /// ```
    /// use rpgm_translate_lib::{TranslatorBuilder, FormatConfig, GameFormat};
    ///
    /// let builder = TranslatorBuilder::new().format(FormatConfig::new(GameFormat::Ace));
    /// ```
    #[must_use]
    pub fn format(mut self, format: FormatConfig) -> Self {
        self.processor.format = format;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.processor.retry = retry;
        self
    }

    #[must_use]
    pub fn response_policy(mut self, policy: ResponsePolicy) -> Self {
        self.processor.response_policy = policy;
        self
    }

    /// Sets what to do with runs that exhausted their retries. See [`FailurePolicy`] for more info.
    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.processor.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.processor.system_prompt = prompt.into();
        self
    }

    /// Sets the glossary, that is sent with every request as context. Usually a list of proper nouns with their
    /// translations.
    #[must_use]
    pub fn glossary(mut self, glossary: impl Into<String>) -> Self {
        self.processor.glossary = Some(glossary.into());
        self
    }

    /// Sets the maximum length of a response, as a multiple of the request length.
    #[must_use]
    pub fn length_ratio(mut self, ratio: usize) -> Self {
        self.processor.length_ratio = ratio;
        self
    }

    /// Sets the number of previous translations sent as context.
    #[must_use]
    pub fn history_depth(mut self, depth: usize) -> Self {
        self.processor.history_depth = depth;
        self
    }

    /// Sets the price in dollars per 1000 tokens.
    #[must_use]
    pub fn price_per_1k(mut self, price: f64) -> Self {
        self.processor.price_per_1k = price;
        self
    }

    /// Sets the number of units translated at once within a file.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.processor.threads = threads;
        self
    }

    /// Sets the number of files translated at once.
    #[must_use]
    pub fn file_threads(mut self, threads: usize) -> Self {
        self.processor.file_threads = threads;
        self
    }

    /// Builds the [`Translator`] and its worker pools.
    ///
    /// # Errors
    /// - [`Error::NoBackend`] if mode is [`Mode::Translate`] and no backend was set.
    /// - [`Error::ThreadPool`] if a worker pool can't be built.
    pub fn build(self) -> Result<Translator, Error> {
        if self.processor.mode.is_translate() && self.processor.backend.is_none()
        {
            return Err(Error::NoBackend);
        }

        let unit_pool: ThreadPool = ThreadPoolBuilder::new()
            .num_threads(self.processor.threads.max(1))
            .thread_name(|index| format!("rpgm-translate-unit-{index}"))
            .build()?;

        let file_pool: ThreadPool = ThreadPoolBuilder::new()
            .num_threads(self.processor.file_threads.max(1))
            .thread_name(|index| format!("rpgm-translate-file-{index}"))
            .build()?;

        let adapter: Adapter = self.processor.adapter();

        Ok(Translator {
            processor: self.processor,
            adapter,
            unit_pool,
            file_pool,
        })
    }
}

/// Translates RPG Maker data trees in place.
///
/// Built with [`TranslatorBuilder`].
pub struct Translator {
    processor: Processor,
    adapter: Adapter,
    unit_pool: ThreadPool,
    file_pool: ThreadPool,
}

impl Translator {
    fn dispatcher<'a>(&'a self, names: &'a NameRegistry) -> Dispatcher<'a> {
        Dispatcher {
            adapter: &self.adapter,
            format: &self.processor.format,
            codes: self.processor.codes,
            failure_policy: self.processor.failure_policy,
            history_depth: self.processor.history_depth,
            price_per_1k: self.processor.price_per_1k,
            pool: &self.unit_pool,
            sink: self.processor.sink.as_ref(),
            names,
        }
    }

    /// Sets the event codes to translate. See [`CodeFlags`] for more info.
    pub fn set_codes(&mut self, codes: CodeFlags) {
        self.processor.codes = codes;
    }

    /// Sets the data layout. See [`FormatConfig`] for more info.
    pub fn set_format(&mut self, format: FormatConfig) {
        self.processor.format = format;
    }

    /// Sets what to do with runs that exhausted their retries. See [`FailurePolicy`] for more info.
    pub fn set_failure_policy(&mut self, policy: FailurePolicy) {
        self.processor.failure_policy = policy;
    }

    pub fn set_history_depth(&mut self, depth: usize) {
        self.processor.history_depth = depth;
    }

    pub fn set_price_per_1k(&mut self, price: f64) {
        self.processor.price_per_1k = price;
    }

    /// Returns the adapter that performs every translation call.
    #[must_use]
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Translates a single string with the full system prompt and no context.
    ///
    /// # Errors
    /// - [`Error::Backend`] if every attempt failed.
    pub fn translate_text(&self, text: &str) -> Result<Completion, Error> {
        Ok(self
            .adapter
            .translate_text(text, &Request::new(Instruction::Full))?)
    }

    /// Translates a single page (event command list) in place, on the calling thread.
    ///
    /// In [`Mode::Estimate`], `list` stays untouched.
    pub fn translate_page(&self, list: &mut [Value]) -> UnitResult {
        let names: NameRegistry = Mutex::default();
        let dispatcher: Dispatcher = self.dispatcher(&names);

        if self.adapter.mode().is_estimate() {
            let mut copy: Vec<Value> = list.to_vec();
            return dispatcher.translate_page("", 0, &mut copy);
        }

        dispatcher.translate_page("", 0, list)
    }

    /// Translates every unit of a file in place, in parallel.
    ///
    /// # Parameters
    /// - `name` - file name, like `Map001.json`. Selects how units are collected, see [`FileKind`].
    /// - `root` - parsed file contents.
    ///
    /// Failed units don't stop their siblings. The file is only successful if every unit succeeded, see
    /// [`FileReport::is_success`].
    pub fn translate_file(&self, name: &str, root: &mut Value) -> FileReport {
        let names: NameRegistry = Mutex::default();
        self.dispatcher(&names).translate_file(name, root)
    }

    /// Translates every file in place, and returns the merged summary.
    ///
    /// # Example
    /// ```
    /// use rpgm_translate_lib::{TranslatorBuilder, Mode};
    /// use serde_json::json;
    ///
    /// let translator = TranslatorBuilder::new().mode(Mode::Estimate).build().unwrap();
    /// let mut files = vec![(
    ///     String::from("CommonEvents.json"),
    ///     json!([null, {"list": [{"code": 401, "parameters": ["こんにちは"]}, {"code": 0, "parameters": []}]}]),
    /// )];
    ///
    /// let report = translator.translate_files(&mut files);
    /// assert!(report.is_success());
    /// assert!(report.tokens > 0);
    /// ```
    pub fn translate_files(&self, files: &mut [(String, Value)]) -> RunReport {
        let start: Instant = Instant::now();
        let names: NameRegistry = Mutex::default();
        let dispatcher: Dispatcher = self.dispatcher(&names);

        let reports: Vec<FileReport> = self.file_pool.install(|| {
            files
                .par_iter_mut()
                .map(|(name, root)| dispatcher.translate_file(name, root))
                .collect()
        });

        let tokens: u64 = reports.iter().map(|report| report.tokens).sum();

        RunReport {
            tokens,
            cost: tokens as f64 / 1000.0 * self.processor.price_per_1k,
            elapsed: start.elapsed(),
            names: names
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .into_iter()
                .collect(),
            files: reports,
        }
    }
}
