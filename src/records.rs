use crate::{
    adapter::{Adapter, Instruction, Request},
    backend::Completion,
    constants::{localization::*, regexes::NOTE_TAG_RE, *},
    functions::wrap,
    trim::has_source_script,
    types::*,
};
use log::warn;
use serde_json::Value;

/// How a translated field is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wrap {
    None,
    List,
}

/// Translatable field of a flat record, addressed by a JSON pointer. Empty pointer addresses the record itself.
///
/// Strings nested in arrays and objects under the pointer are translated one by one. If `tags` isn't empty, the
/// field is a note, and only bodies of `<tag:body>` note tags with listed tags are translated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    pub pointer: &'static str,
    pub instruction: &'static str,
    pub scrub: Scrub,
    pub wrap: Wrap,
    pub tags: &'static [&'static str],
}

const fn name(pointer: &'static str, instruction: &'static str) -> FieldSpec {
    FieldSpec {
        pointer,
        instruction,
        scrub: Scrub::Periods.union(Scrub::Quotes),
        wrap: Wrap::None,
        tags: &[],
    }
}

const fn text(
    pointer: &'static str,
    instruction: &'static str,
    wrap: Wrap,
) -> FieldSpec {
    FieldSpec {
        pointer,
        instruction,
        scrub: Scrub::Quotes,
        wrap,
        tags: &[],
    }
}

const fn note(tags: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        pointer: "/note",
        instruction: NOTE_INSTRUCTION,
        scrub: Scrub::Quotes,
        wrap: Wrap::None,
        tags,
    }
}

const ACTOR_FIELDS: &[FieldSpec] = &[
    name("/name", NAME_INSTRUCTION),
    name("/nickname", NAME_INSTRUCTION),
    text("/profile", DESCRIPTION_INSTRUCTION, Wrap::List),
    note(&["特徴1"]),
];

const ITEM_FIELDS: &[FieldSpec] = &[
    name("/name", MENU_INSTRUCTION),
    text("/description", DESCRIPTION_INSTRUCTION, Wrap::List),
    note(&["SG説明", "SGカテゴリ"]),
];

const EQUIPMENT_FIELDS: &[FieldSpec] = &[
    name("/name", MENU_INSTRUCTION),
    text("/description", DESCRIPTION_INSTRUCTION, Wrap::List),
    note(&["hint", "SG説明", "SGカテゴリ"]),
];

const CLASS_FIELDS: &[FieldSpec] = &[name("/name", MENU_INSTRUCTION)];

const ENEMY_FIELDS: &[FieldSpec] = &[
    name("/name", NAME_INSTRUCTION),
    note(&["desc2", "desc3"]),
];

const SKILL_FIELDS: &[FieldSpec] = &[
    name("/name", MENU_INSTRUCTION),
    text("/description", DESCRIPTION_INSTRUCTION, Wrap::List),
    text("/message1", ACTION_INSTRUCTION, Wrap::None),
    text("/message2", ACTION_INSTRUCTION, Wrap::None),
];

const STATE_FIELDS: &[FieldSpec] = &[
    name("/name", MENU_INSTRUCTION),
    text("/message1", ACTION_INSTRUCTION, Wrap::None),
    text("/message2", ACTION_INSTRUCTION, Wrap::None),
    text("/message3", ACTION_INSTRUCTION, Wrap::None),
    text("/message4", ACTION_INSTRUCTION, Wrap::None),
    note(&["help"]),
];

const MAP_INFO_FIELDS: &[FieldSpec] = &[name("/name", LOCATION_INSTRUCTION)];

/// Map display name is its own unit, so it's addressed directly.
const MAP_FIELDS: &[FieldSpec] =
    &[text("", LOCATION_INSTRUCTION, Wrap::None)];

const SYSTEM_FIELDS: &[FieldSpec] = &[
    name("/gameTitle", MENU_INSTRUCTION),
    name("/currencyUnit", MENU_INSTRUCTION),
    name("/elements", MENU_INSTRUCTION),
    name("/skillTypes", MENU_INSTRUCTION),
    name("/weaponTypes", MENU_INSTRUCTION),
    name("/armorTypes", MENU_INSTRUCTION),
    name("/equipTypes", MENU_INSTRUCTION),
    name("/terms/basic", MENU_INSTRUCTION),
    name("/terms/commands", MENU_INSTRUCTION),
    name("/terms/params", MENU_INSTRUCTION),
    text("/terms/messages", MESSAGE_INSTRUCTION, Wrap::None),
];

/// Returns translatable fields of records in files of `kind`. Empty for files that only consist of pages.
pub(crate) const fn fields(kind: FileKind) -> &'static [FieldSpec] {
    match kind {
        FileKind::Actors => ACTOR_FIELDS,
        FileKind::Items => ITEM_FIELDS,
        FileKind::Armors | FileKind::Weapons => EQUIPMENT_FIELDS,
        FileKind::Classes => CLASS_FIELDS,
        FileKind::Enemies => ENEMY_FIELDS,
        FileKind::Skills => SKILL_FIELDS,
        FileKind::States => STATE_FIELDS,
        FileKind::MapInfos => MAP_INFO_FIELDS,
        FileKind::System => SYSTEM_FIELDS,
        FileKind::Map => MAP_FIELDS,
        FileKind::CommonEvents | FileKind::Troops | FileKind::Invalid => &[],
    }
}

/// Translates fields of a single flat record. Every field is translated independently, without context.
pub(crate) struct RecordTranslator<'a> {
    adapter: &'a Adapter,
    format: &'a FormatConfig,
    failure_policy: FailurePolicy,
    location: Location<'a>,
    tokens: u64,
    deferred: Option<Error>,
}

impl<'a> RecordTranslator<'a> {
    pub fn new(
        adapter: &'a Adapter,
        format: &'a FormatConfig,
        failure_policy: FailurePolicy,
        location: Location<'a>,
    ) -> Self {
        Self {
            adapter,
            format,
            failure_policy,
            location,
            tokens: 0,
            deferred: None,
        }
    }

    pub fn translate(
        mut self,
        record: &mut Value,
        fields: &[FieldSpec],
    ) -> UnitResult {
        let mut result: Result<(), Error> = Ok(());

        for field in fields {
            if let Some(value) = record.pointer_mut(field.pointer) {
                result = self.translate_value(value, field);

                if result.is_err() {
                    break;
                }
            }
        }

        UnitResult {
            tokens: self.tokens,
            error: result.err().or(self.deferred),
        }
    }

    fn translate_value(
        &mut self,
        value: &mut Value,
        field: &FieldSpec,
    ) -> Result<(), Error> {
        match value {
            Value::String(string) if !field.tags.is_empty() => {
                self.translate_note(string, field)?;
            }
            Value::String(string) => {
                if let Some(text) = self.translate_string(string, field)? {
                    *string = match field.wrap {
                        Wrap::None => text,
                        Wrap::List => wrap(
                            &text,
                            self.format.list_width,
                            self.format.line_break,
                        ),
                    };
                }
            }
            Value::Array(array) => {
                for item in array {
                    self.translate_value(item, field)?;
                }
            }
            Value::Object(object) => {
                for item in object.values_mut() {
                    self.translate_value(item, field)?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Translates bodies of listed tags in `note`. Everything else in the note stays as is.
    fn translate_note(
        &mut self,
        note: &mut String,
        field: &FieldSpec,
    ) -> Result<(), Error> {
        let mut result: String = String::with_capacity(note.len());
        let mut last: usize = 0;

        for captures in NOTE_TAG_RE.captures_iter(note.as_str()) {
            let (Some(tag), Some(body)) =
                (captures.name("tag"), captures.name("body"))
            else {
                continue;
            };

            if !field.tags.contains(&tag.as_str()) {
                continue;
            }

            let unwrapped: String = body.as_str().replace('\n', " ");

            let Some(text) = self.translate_string(&unwrapped, field)? else {
                continue;
            };

            result.push_str(&note[last..body.start()]);
            result.push_str(&wrap(&text, self.format.note_width, "\n"));
            last = body.end();
        }

        if last != 0 {
            result.push_str(&note[last..]);
            *note = result;
        }

        Ok(())
    }

    /// Returns `None` if `string` has nothing to translate, or the translation failed and the original is kept.
    fn translate_string(
        &mut self,
        string: &str,
        field: &FieldSpec,
    ) -> Result<Option<String>, Error> {
        if !has_source_script(string) {
            return Ok(None);
        }

        let request: Request =
            Request::new(Instruction::Short(field.instruction))
                .with_scrub(field.scrub);

        match self.adapter.translate_text(string, &request) {
            Ok(Completion { text, tokens }) => {
                self.tokens += tokens;
                Ok(Some(text))
            }
            Err(err) => {
                if self.failure_policy.is_abort() {
                    return Err(Error::Backend(err));
                }

                warn!(
                    "{file}: record {record}, {pointer}: {KEEPING_ORIGINAL_MSG}: {err}",
                    file = self.location.file,
                    record = self.location.page,
                    pointer = field.pointer,
                );

                if self.deferred.is_none() {
                    self.deferred = Some(Error::Backend(err));
                }

                Ok(None)
            }
        }
    }
}
