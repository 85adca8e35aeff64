use crate::{
    adapter::Adapter,
    constants::localization::*,
    records::{fields, RecordTranslator},
    scanner::{NameRegistry, PageScanner},
    types::*,
};
use log::{info, warn};
use rayon::{prelude::*, ThreadPool};
use serde_json::Value;
use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// Receives progress updates while units are translated.
///
/// Called from worker threads.
pub trait ProgressSink: Send + Sync {
    /// Called after every completed unit.
    fn advance(&self, completed: usize, total: usize, label: &str);

    /// Called once a file is done.
    fn finish(&self, _report: &FileReport) {}
}

/// [`ProgressSink`] that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _completed: usize, _total: usize, _label: &str) {}
}

#[derive(Debug, Default)]
struct Counters {
    completed: usize,
    failed: usize,
    tokens: u64,
}

/// Running totals of a single file, shared between workers.
struct Telemetry<'a> {
    counters: Mutex<Counters>,
    total: usize,
    label: &'a str,
    sink: &'a dyn ProgressSink,
}

impl<'a> Telemetry<'a> {
    fn new(total: usize, label: &'a str, sink: &'a dyn ProgressSink) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            total,
            label,
            sink,
        }
    }

    fn record(&self, result: &UnitResult) {
        let completed: usize = {
            let mut counters =
                self.counters.lock().unwrap_or_else(PoisonError::into_inner);

            counters.completed += 1;
            counters.tokens += result.tokens;

            if !result.is_ok() {
                counters.failed += 1;
            }

            counters.completed
        };

        self.sink.advance(completed, self.total, self.label);
    }

    fn into_counters(self) -> Counters {
        self.counters
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Independent piece of work inside a file.
enum Unit<'v> {
    Page(usize, &'v mut Vec<Value>),
    Record(usize, &'v mut Value),
    Malformed(Error),
}

/// Iterates over array elements or object values of `value`.
fn children<'v>(
    value: Option<&'v mut Value>,
) -> Box<dyn Iterator<Item = &'v mut Value> + 'v> {
    match value {
        Some(Value::Array(array)) => Box::new(array.iter_mut()),
        Some(Value::Object(object)) => Box::new(object.values_mut()),
        _ => Box::new(std::iter::empty()),
    }
}

/// Everything a single translation run needs. Created per call, never shared between runs.
pub(crate) struct Dispatcher<'a> {
    pub adapter: &'a Adapter,
    pub format: &'a FormatConfig,
    pub codes: CodeFlags,
    pub failure_policy: FailurePolicy,
    pub history_depth: usize,
    pub price_per_1k: f64,
    pub pool: &'a ThreadPool,
    pub sink: &'a dyn ProgressSink,
    pub names: &'a NameRegistry,
}

impl Dispatcher<'_> {
    pub fn translate_page(
        &self,
        file: &str,
        page: usize,
        list: &mut [Value],
    ) -> UnitResult {
        PageScanner::new(
            self.adapter,
            self.format,
            self.codes,
            self.failure_policy,
            self.history_depth,
            self.names,
            Location { file, page },
        )
        .scan(list)
    }

    fn collect_units<'v>(
        &self,
        file: &str,
        kind: FileKind,
        root: &'v mut Value,
    ) -> Vec<Unit<'v>> {
        let format: &FormatConfig = self.format;
        let mut units: Vec<Unit<'v>> = Vec::new();
        let mut lists: Vec<&'v mut Value> = Vec::new();

        match kind {
            FileKind::Map => {
                let Value::Object(map) = root else {
                    return units;
                };

                for (key, value) in map.iter_mut() {
                    if key == format.display_name {
                        if value.is_string() {
                            units.push(Unit::Record(0, value));
                        }
                    } else if key == format.events {
                        for event in children(Some(value)) {
                            for page in children(event.get_mut(format.pages)) {
                                lists.extend(page.get_mut(format.list));
                            }
                        }
                    }
                }
            }
            FileKind::Troops => {
                for troop in children(Some(root)) {
                    for page in children(troop.get_mut(format.pages)) {
                        lists.extend(page.get_mut(format.list));
                    }
                }
            }
            FileKind::CommonEvents => {
                for event in children(Some(root)) {
                    lists.extend(event.get_mut(format.list));
                }
            }
            FileKind::System => return vec![Unit::Record(0, root)],
            _ => {
                return children(Some(root))
                    .enumerate()
                    .filter(|(_, record)| record.is_object())
                    .map(|(index, record)| Unit::Record(index, record))
                    .collect();
            }
        }

        units.extend(lists.into_iter().enumerate().map(|(page, list)| {
            match list {
                Value::Array(list) => Unit::Page(page, list),
                other => Unit::Malformed(Location { file, page }.structural(
                    0,
                    &other.to_string(),
                    NOT_A_LIST_MSG,
                )),
            }
        }));

        units
    }

    fn translate_unit(&self, file: &str, kind: FileKind, unit: Unit) -> UnitResult {
        match unit {
            Unit::Page(page, list) => self.translate_page(file, page, list),
            Unit::Record(index, record) => RecordTranslator::new(
                self.adapter,
                self.format,
                self.failure_policy,
                Location { file, page: index },
            )
            .translate(record, fields(kind)),
            Unit::Malformed(err) => UnitResult {
                tokens: 0,
                error: Some(err),
            },
        }
    }

    /// Translates every unit of `root` in the worker pool.
    ///
    /// In estimate mode, a copy of `root` is processed, and `root` stays untouched.
    pub fn translate_file(&self, name: &str, root: &mut Value) -> FileReport {
        let start: Instant = Instant::now();
        let kind: FileKind = FileKind::from_filename(name);

        if kind.is_invalid() {
            let report: FileReport = FileReport {
                name: name.to_owned(),
                tokens: 0,
                cost: 0.0,
                elapsed: start.elapsed(),
                units: 0,
                failed_units: 0,
                error: Some(Error::UnsupportedFile(name.to_owned())),
            };

            warn!("{FAILED_FILE_MSG}: {report}");
            self.sink.finish(&report);
            return report;
        }

        let mut estimate_copy: Option<Value> =
            self.adapter.mode().is_estimate().then(|| root.clone());
        let root: &mut Value = estimate_copy.as_mut().unwrap_or(root);

        let units: Vec<Unit> = self.collect_units(name, kind, root);
        let telemetry: Telemetry = Telemetry::new(units.len(), name, self.sink);

        let results: Vec<UnitResult> = self.pool.install(|| {
            units
                .into_par_iter()
                .map(|unit| {
                    let result: UnitResult = self.translate_unit(name, kind, unit);
                    telemetry.record(&result);

                    if let Some(err) = &result.error {
                        warn!("{name}: {UNIT_FAILED_MSG}: {err}");
                    }

                    result
                })
                .collect()
        });

        let counters: Counters = telemetry.into_counters();
        let elapsed: Duration = start.elapsed();

        let report: FileReport = FileReport {
            name: name.to_owned(),
            tokens: counters.tokens,
            cost: counters.tokens as f64 / 1000.0 * self.price_per_1k,
            elapsed,
            units: counters.completed,
            failed_units: counters.failed,
            error: results.into_iter().find_map(|result| result.error),
        };

        if !report.is_success() {
            warn!("{FAILED_FILE_MSG}: {report}");
        } else if self.adapter.mode().is_estimate() {
            info!("{ESTIMATED_FILE_MSG}: {report}");
        } else {
            info!("{TRANSLATED_FILE_MSG}: {report}");
        }

        self.sink.finish(&report);
        report
    }
}
