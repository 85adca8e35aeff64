use crate::{
    adapter::{Adapter, Instruction, Request},
    backend::Completion,
    constants::{localization::*, regexes::SPEAKER_RE, *},
    context::ContextWindow,
    functions::wrap,
    trim::has_source_script,
    types::*,
};
use indexmap::IndexSet;
use log::{debug, warn};
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::{Mutex, PoisonError};

/// Deduplicated, insertion-ordered set of translated speaker names, shared between workers.
pub type NameRegistry = Mutex<IndexSet<String>>;

/// Consecutive text-bearing records, merged into a single translation unit.
///
/// Translation of the whole run is written into its anchor, the first record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    indices: SmallVec<[usize; 4]>,
    fragments: SmallVec<[String; 4]>,
}

impl Run {
    fn open(index: usize, fragment: String) -> Self {
        let mut run: Run = Self {
            indices: SmallVec::new(),
            fragments: SmallVec::new(),
        };

        run.push(index, fragment);
        run
    }

    fn push(&mut self, index: usize, fragment: String) {
        self.indices.push(index);
        self.fragments.push(fragment);
    }

    /// Index of the first record.
    #[must_use]
    pub fn anchor(&self) -> usize {
        self.indices[0]
    }

    /// Indices of every merged record, anchor included.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[must_use]
    pub fn text(&self, separator: &str) -> String {
        self.fragments.join(separator)
    }
}

/// Parameter slot of a record, that holds translatable text.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Parameter(usize),
    /// String under a key of an object parameter.
    Argument(usize, &'static str),
}

impl Slot {
    fn get_mut<'v>(
        self,
        record: &'v mut Value,
        format: &FormatConfig,
    ) -> Option<&'v mut Value> {
        let parameters = record.get_mut(format.parameters)?;

        match self {
            Self::Parameter(index) => parameters.get_mut(index),
            Self::Argument(index, key) => parameters.get_mut(index)?.get_mut(key),
        }
    }
}

/// Single-record translation task.
struct Field {
    slot: Slot,
    instruction: Instruction<'static>,
    scrub: Scrub,
    width: usize,
}

/// Walks a single page and translates it in place.
///
/// Runs of the same text-bearing code are merged, translated with the page's rolling context, and written into their
/// anchor record. Other merged records are neutralized (code set to the neutral code, parameters cleared), so the
/// page length never changes.
pub struct PageScanner<'a> {
    adapter: &'a Adapter,
    format: &'a FormatConfig,
    codes: CodeFlags,
    failure_policy: FailurePolicy,
    names: &'a NameRegistry,
    location: Location<'a>,

    history: ContextWindow,
    speaker: Option<String>,
    tokens: u64,
    deferred: Option<Error>,
}

impl<'a> PageScanner<'a> {
    #[must_use]
    pub fn new(
        adapter: &'a Adapter,
        format: &'a FormatConfig,
        codes: CodeFlags,
        failure_policy: FailurePolicy,
        history_depth: usize,
        names: &'a NameRegistry,
        location: Location<'a>,
    ) -> Self {
        Self {
            adapter,
            format,
            codes,
            failure_policy,
            names,
            location,

            history: ContextWindow::new(history_depth),
            speaker: None,
            tokens: 0,
            deferred: None,
        }
    }

    /// Translates every enabled record of `list`.
    ///
    /// With [`FailurePolicy::Abort`], the first backend failure stops the page. Runs flushed before it stay
    /// translated. With [`FailurePolicy::KeepOriginal`], failed runs keep their source text, the rest of the page
    /// is processed, and the first failure is reported in the result.
    ///
    /// Structural errors always stop the page.
    pub fn scan(mut self, list: &mut [Value]) -> UnitResult {
        let result: Result<(), Error> = self.walk(list);

        UnitResult {
            tokens: self.tokens,
            error: result.err().or(self.deferred),
        }
    }

    /// Returns the runs of `list` without translating anything.
    ///
    /// # Errors
    /// - [`Error::Structural`] if a record has no code, or a text-bearing record has no text.
    pub fn runs(&self, list: &[Value]) -> Result<Vec<Run>, Error> {
        let mut runs: Vec<Run> = Vec::new();
        let mut index: usize = 0;

        while index < list.len() {
            let code: Code = self.code_at(list, index)?;

            if self.is_mergeable(code) {
                runs.push(self.collect_run(list, &mut index, code)?);
            }

            index += 1;
        }

        Ok(runs)
    }

    fn walk(&mut self, list: &mut [Value]) -> Result<(), Error> {
        let mut index: usize = 0;

        while index < list.len() {
            let code: Code = self.code_at(list, index)?;

            if self.is_mergeable(code) {
                let run: Run = self.collect_run(list, &mut index, code)?;
                self.flush(list, &run)?;
            } else if self.codes.intersects(code.flag()) {
                self.process_record(list, index, code)?;
            }

            index += 1;
        }

        Ok(())
    }

    fn is_mergeable(&self, code: Code) -> bool {
        self.codes.intersection(CodeFlags::mergeable()).intersects(code.flag())
    }

    /// Consumes records while the next one has the same code. Leaves `index` at the last record of the run.
    fn collect_run(
        &self,
        list: &[Value],
        index: &mut usize,
        code: Code,
    ) -> Result<Run, Error> {
        let mut run: Run = Run::open(*index, self.text_at(list, *index)?);

        while *index + 1 < list.len() && self.code_at(list, *index + 1)? == code {
            *index += 1;
            run.push(*index, self.text_at(list, *index)?);
        }

        Ok(run)
    }

    fn code_at(&self, list: &[Value], index: usize) -> Result<Code, Error> {
        let record: &Value = &list[index];

        if !record.is_object() {
            return Err(self.location.structural(
                index,
                &record.to_string(),
                NOT_AN_OBJECT_MSG,
            ));
        }

        record
            .get(self.format.code)
            .and_then(Value::as_i64)
            .map(Code::from_raw)
            .ok_or_else(|| {
                self.location.structural(
                    index,
                    &record.to_string(),
                    MISSING_CODE_MSG,
                )
            })
    }

    fn text_at(&self, list: &[Value], index: usize) -> Result<String, Error> {
        let record: &Value = &list[index];

        let Some(parameters) =
            record.get(self.format.parameters).and_then(Value::as_array)
        else {
            return Err(self.location.structural(
                index,
                &record.to_string(),
                MISSING_PARAMETERS_MSG,
            ));
        };

        parameters
            .first()
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                self.location.structural(
                    index,
                    &record.to_string(),
                    MISSING_TEXT_MSG,
                )
            })
    }

    fn set_text(&self, record: &mut Value, text: String) {
        if let Some(slot) = Slot::Parameter(0).get_mut(record, self.format) {
            *slot = Value::String(text);
        }
    }

    fn neutralize(&self, record: &mut Value) {
        if let Some(object) = record.as_object_mut() {
            object.insert(
                self.format.code.to_owned(),
                Value::from(self.format.neutral_code),
            );
            object.insert(
                self.format.parameters.to_owned(),
                Value::Array(Vec::new()),
            );
        }
    }

    fn register_name(&self, name: &str) {
        if name.is_empty() {
            return;
        }

        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned());
    }

    /// Either propagates the failure, or records it and lets the caller keep the source text.
    fn fail(
        &mut self,
        index: usize,
        text: &str,
        err: BackendError,
    ) -> Result<(), Error> {
        if self.failure_policy.is_abort() {
            return Err(Error::Backend(err));
        }

        warn!(
            "{file}: page {page}, record {index}: {KEEPING_ORIGINAL_MSG}: {err}. Source text: {text:?}",
            file = self.location.file,
            page = self.location.page,
        );

        if self.deferred.is_none() {
            self.deferred = Some(Error::Backend(err));
        }

        Ok(())
    }

    fn translate_name(&mut self, name: &str) -> Result<String, BackendError> {
        let request: Request = Request::new(Instruction::Short(NAME_INSTRUCTION))
            .with_scrub(Scrub::Periods | Scrub::Quotes);

        let completion: Completion = self.adapter.translate_text(name, &request)?;
        self.tokens += completion.tokens;

        self.register_name(&completion.text);
        Ok(completion.text)
    }

    /// Finds a speaker tag, translates the name in it and removes the tag from the text.
    ///
    /// Returns the text without the tag, and the tag with the translated name.
    fn extract_speaker(
        &mut self,
        text: &str,
    ) -> Result<(String, Option<String>), BackendError> {
        let Some(captures) = SPEAKER_RE.captures(text) else {
            return Ok((text.to_owned(), None));
        };

        let (Some(tag), Some(name)) = (
            captures.get(0),
            captures
                .name("box")
                .or_else(|| captures.name("plain"))
                .or_else(|| captures.name("window")),
        ) else {
            return Ok((text.to_owned(), None));
        };

        let translated: String = self.translate_name(name.as_str())?;

        let nametag: String = format!(
            "{}{translated}{}",
            &text[tag.start()..name.start()],
            &text[name.end()..tag.end()]
        );

        let body: String = format!(
            "{}{}",
            &text[..tag.start()],
            text[tag.end()..].trim_start()
        );

        if !translated.is_empty() {
            self.speaker = Some(translated);
        }

        Ok((body, Some(nametag)))
    }

    fn flush(&mut self, list: &mut [Value], run: &Run) -> Result<(), Error> {
        let joined: String = run.text(self.format.join_separator);

        if !has_source_script(&joined) {
            self.history.push(joined);
            self.speaker = None;
            return Ok(());
        }

        let (body, nametag): (String, Option<String>) =
            match self.extract_speaker(&joined) {
                Ok(extracted) => extracted,
                Err(err) => return self.fail(run.anchor(), &joined, err),
            };

        let request: Request = Request::new(Instruction::Full)
            .with_context(self.history.as_slice())
            .with_speaker(self.speaker.as_deref())
            .with_scrub(Scrub::Quotes);

        let completion: Completion =
            match self.adapter.translate_text(&body, &request) {
                Ok(completion) => completion,
                Err(err) => {
                    self.speaker = None;
                    return self.fail(run.anchor(), &joined, err);
                }
            };

        self.tokens += completion.tokens;

        let entry: String = match self.speaker.take() {
            Some(speaker) => {
                format!("{speaker}{SPEAKER_SEPARATOR}{}", completion.text)
            }
            None => completion.text.clone(),
        };
        self.history.push(entry);

        let wrapped: String =
            wrap(&completion.text, self.format.width, self.format.line_break);

        let indices: &[usize] = run.indices();
        let own_line: bool = self.format.name_on_own_line && indices.len() > 1;

        let rest: &[usize] = match nametag {
            Some(nametag) if own_line => {
                self.set_text(&mut list[indices[0]], nametag);
                self.set_text(&mut list[indices[1]], wrapped);
                &indices[2..]
            }
            Some(nametag) => {
                self.set_text(&mut list[indices[0]], nametag + &wrapped);
                &indices[1..]
            }
            None => {
                self.set_text(&mut list[indices[0]], wrapped);
                &indices[1..]
            }
        };

        for &index in rest {
            self.neutralize(&mut list[index]);
        }

        debug!(
            "{file}: page {page}: flushed {count} records at {anchor}",
            file = self.location.file,
            page = self.location.page,
            count = indices.len(),
            anchor = run.anchor(),
        );

        Ok(())
    }

    fn process_record(
        &mut self,
        list: &mut [Value],
        index: usize,
        code: Code,
    ) -> Result<(), Error> {
        let scrub_all: Scrub = Scrub::Periods | Scrub::Quotes;

        match code {
            Code::ChoiceArray => return self.process_choices(list, index),
            Code::SpeakerWindow => {
                let field: Field = Field {
                    slot: Slot::Parameter(4),
                    instruction: Instruction::Short(NAME_INSTRUCTION),
                    scrub: scrub_all,
                    width: 0,
                };

                if let Some(name) =
                    self.process_field(list, index, &field, |text| {
                        !text.contains('_')
                    })?
                {
                    self.register_name(&name);
                    self.speaker = Some(name);
                }
            }
            Code::ControlVariable => {
                let field: Field = Field {
                    slot: Slot::Parameter(4),
                    instruction: Instruction::Short(MESSAGE_INSTRUCTION),
                    scrub: scrub_all | Scrub::Newlines,
                    width: 0,
                };

                self.process_field(list, index, &field, |text| {
                    !text.contains('_') && !text.contains('■')
                })?;
            }
            Code::Script | Code::ScriptContinuation => {
                let field: Field = Field {
                    slot: Slot::Parameter(0),
                    instruction: Instruction::Short(MESSAGE_INSTRUCTION),
                    scrub: scrub_all,
                    width: 0,
                };

                self.process_field(list, index, &field, |text| {
                    if code.is_script() {
                        text.contains("this.BLogAdd")
                    } else {
                        !text.contains("this.")
                    }
                })?;
            }
            Code::PluginCommand => {
                let field: Field = Field {
                    slot: Slot::Parameter(0),
                    instruction: Instruction::Short(MESSAGE_INSTRUCTION),
                    scrub: Scrub::Quotes,
                    width: 0,
                };

                self.process_field(list, index, &field, |text| {
                    text.contains("D_TEXT ")
                })?;
            }
            Code::PluginText => {
                let field: Field = Field {
                    slot: Slot::Argument(3, "text"),
                    instruction: Instruction::Full,
                    scrub: Scrub::Quotes,
                    width: self.format.width,
                };

                self.process_field(list, index, &field, |text| {
                    !text.contains('_')
                })?;
            }
            Code::ChangeName | Code::ChangeNickname => {
                let field: Field = Field {
                    slot: Slot::Parameter(1),
                    instruction: Instruction::Short(NAME_INSTRUCTION),
                    scrub: scrub_all,
                    width: 0,
                };

                if let Some(name) =
                    self.process_field(list, index, &field, |text| {
                        !text.contains('_') && !text.contains('■')
                    })?
                {
                    self.register_name(&name);
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Translates the string under `field`, if the record has one and `accept` returns `true` for it.
    ///
    /// Returns the written translation.
    fn process_field(
        &mut self,
        list: &mut [Value],
        index: usize,
        field: &Field,
        accept: impl Fn(&str) -> bool,
    ) -> Result<Option<String>, Error> {
        let Some(text) = field
            .slot
            .get_mut(&mut list[index], self.format)
            .and_then(|value| value.as_str())
            .map(str::to_owned)
        else {
            return Ok(None);
        };

        if !has_source_script(&text) || !accept(&text) {
            return Ok(None);
        }

        let request: Request =
            Request::new(field.instruction).with_scrub(field.scrub);

        let completion: Completion =
            match self.adapter.translate_text(&text, &request) {
                Ok(completion) => completion,
                Err(err) => {
                    self.fail(index, &text, err)?;
                    return Ok(None);
                }
            };

        self.tokens += completion.tokens;

        let translated: String =
            wrap(&completion.text, field.width, self.format.line_break);

        if let Some(slot) = field.slot.get_mut(&mut list[index], self.format) {
            *slot = Value::String(translated.clone());
        }

        Ok(Some(translated))
    }

    /// Translates every option of a choice list, with the latest translation as the only context.
    fn process_choices(
        &mut self,
        list: &mut [Value],
        index: usize,
    ) -> Result<(), Error> {
        let latest: Vec<String> =
            self.history.latest().cloned().into_iter().collect();

        let Some(choices) = Slot::Parameter(0)
            .get_mut(&mut list[index], self.format)
            .and_then(Value::as_array_mut)
        else {
            return Err(self.location.structural(
                index,
                &list[index].to_string(),
                MISSING_PARAMETERS_MSG,
            ));
        };

        let request: Request = Request::new(Instruction::Short(CHOICE_INSTRUCTION))
            .with_context(&latest)
            .with_scrub(Scrub::Periods | Scrub::Quotes);

        let mut failure: Option<(String, BackendError)> = None;

        for choice in choices.iter_mut() {
            let Some(text) = choice.as_str() else {
                continue;
            };

            match self.adapter.translate_text(text, &request) {
                Ok(completion) => {
                    self.tokens += completion.tokens;
                    *choice = Value::String(completion.text);
                }
                Err(err) => {
                    failure = Some((text.to_owned(), err));

                    if self.failure_policy.is_abort() {
                        break;
                    }
                }
            }
        }

        match failure {
            Some((text, err)) => self.fail(index, &text, err),
            None => Ok(()),
        }
    }
}
