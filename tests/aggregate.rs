mod common;

use common::*;
use rpgm_translate_lib::{
    BackendError, Error, FileKind, FileReport, FormatConfig, GameFormat, Mode,
    ProgressSink, TranslatorBuilder,
};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

#[derive(Default)]
struct RecordingSink {
    updates: Mutex<Vec<(usize, usize, String)>>,
    finished: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn advance(&self, completed: usize, total: usize, label: &str) {
        self.updates
            .lock()
            .unwrap()
            .push((completed, total, label.to_owned()));
    }

    fn finish(&self, report: &FileReport) {
        self.finished.lock().unwrap().push(report.name.clone());
    }
}

fn common_events(count: usize) -> Value {
    let mut events = vec![Value::Null];

    for id in 1..=count {
        events.push(json!({
            "id": id,
            "list": [
                {"code": 401, "parameters": ["こんにちは"]},
                {"code": 401, "parameters": ["アリス"]},
                {"code": 0, "parameters": []},
            ],
        }));
    }

    Value::Array(events)
}

fn event(text: &str) -> Value {
    json!({
        "pages": [{
            "list": [
                {"code": 401, "parameters": [text]},
                {"code": 0, "parameters": []},
            ],
        }],
    })
}

#[test]
fn file_total_equals_sum_of_units() {
    let backend = MockBackend::dictionary();
    let sink = Arc::new(RecordingSink::default());
    let translator = builder(&backend)
        .threads(4)
        .with_progress(sink.clone())
        .build()
        .unwrap();

    let mut root = common_events(20);
    let report = translator.translate_file("CommonEvents.json", &mut root);

    assert!(report.is_success());
    assert_eq!(report.units, 20);
    assert_eq!(report.failed_units, 0);
    assert_eq!(report.tokens, backend.call_count() as u64 * TOKENS_PER_CALL);
    assert_eq!(report.tokens, 20 * TOKENS_PER_CALL);

    for id in 1..=20 {
        assert_eq!(root[id]["list"][0]["parameters"][0], "HelloAlice");
        assert_eq!(root[id]["list"][1]["code"], 0);
    }

    let updates = sink.updates.lock().unwrap();
    assert_eq!(updates.len(), 20);
    assert!(updates.iter().all(|(_, total, label)| {
        *total == 20 && label == "CommonEvents.json"
    }));
    assert_eq!(updates.iter().map(|(completed, ..)| *completed).max(), Some(20));
    assert_eq!(*sink.finished.lock().unwrap(), ["CommonEvents.json"]);
}

#[test]
fn failed_unit_does_not_affect_siblings() {
    let backend = MockBackend::new(|call| {
        if call.line().contains("さようなら") {
            Err(BackendError::Timeout)
        } else {
            Ok(fake_translate(call.line()))
        }
    });
    let translator = builder(&backend).threads(3).build().unwrap();

    let mut root = json!({
        "displayName": "",
        "events": [
            null,
            event("こんにちは"),
            event("さようなら"),
            event("はい"),
        ],
    });

    let report = translator.translate_file("Map001.json", &mut root);

    assert!(!report.is_success());
    assert_eq!(report.units, 4);
    assert_eq!(report.failed_units, 1);
    assert_eq!(report.tokens, 2 * TOKENS_PER_CALL);
    assert!(matches!(
        report.error,
        Some(Error::Backend(BackendError::Exhausted { .. }))
    ));

    let text = |index: usize| root["events"][index]["pages"][0]["list"][0]["parameters"][0].clone();
    assert_eq!(text(1), "Hello");
    assert_eq!(text(2), "さようなら");
    assert_eq!(text(3), "Yes");
}

#[test]
fn map_display_name_is_a_unit() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend).build().unwrap();

    let mut root = json!({
        "displayName": "さようなら",
        "events": [null, event("こんにちは")],
    });

    let report = translator.translate_file("Map002.json", &mut root);

    assert!(report.is_success());
    assert_eq!(report.units, 2);
    assert_eq!(root["displayName"], "Goodbye");
    assert_eq!(root["events"][1]["pages"][0]["list"][0]["parameters"][0], "Hello");

    let calls = backend.calls();
    let location = calls
        .iter()
        .find(|call| call.line() == "さようなら")
        .unwrap();
    assert!(location.system.contains("location name"));
    assert!(location.context.is_empty());
}

#[test]
fn ace_map_display_name() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend)
        .format(FormatConfig::new(GameFormat::Ace))
        .build()
        .unwrap();

    let mut root = json!({"display_name": "はい", "events": {}});
    let report = translator.translate_file("Map003.json", &mut root);

    assert_eq!(report.units, 1);
    assert_eq!(root["display_name"], "Yes");
}

#[test]
fn troop_pages_are_units() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([
        null,
        {"name": "スライム*2", "pages": [
            {"list": [{"code": 401, "parameters": ["こんにちは"]}]},
            {"list": [{"code": 401, "parameters": ["さようなら"]}]},
        ]},
    ]);

    let report = translator.translate_file("Troops.json", &mut root);

    assert!(report.is_success());
    assert_eq!(report.units, 2);
    assert_eq!(root[1]["pages"][1]["list"][0]["parameters"][0], "Goodbye");
    assert_eq!(root[1]["name"], "スライム*2");
}

#[test]
fn unsupported_file() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([null, {"name": "草原"}]);
    let report = translator.translate_file("Tilesets.json", &mut root);

    assert!(matches!(report.error, Some(Error::UnsupportedFile(ref name)) if name == "Tilesets.json"));
    assert_eq!(backend.call_count(), 0);
    assert_eq!(root[1]["name"], "草原");
}

#[test]
fn malformed_list_fails_its_unit() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([
        null,
        {"list": "not a list"},
        {"list": [{"code": 401, "parameters": ["はい"]}]},
    ]);

    let report = translator.translate_file("CommonEvents.json", &mut root);

    assert_eq!(report.units, 2);
    assert_eq!(report.failed_units, 1);
    assert!(matches!(report.error, Some(Error::Structural { page: 0, .. })));
    assert_eq!(root[2]["list"][0]["parameters"][0], "Yes");
}

#[test]
fn run_report_merges_files() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend).file_threads(2).build().unwrap();

    let mut files = vec![
        (
            String::from("Map001.json"),
            json!({"events": [null, event("\\n<アリス>こんにちは")]}),
        ),
        (String::from("CommonEvents.json"), common_events(3)),
    ];

    let report = translator.translate_files(&mut files);

    assert!(report.is_success());
    assert_eq!(report.files.len(), 2);
    assert_eq!(
        report.tokens,
        report.files.iter().map(|file| file.tokens).sum::<u64>()
    );
    assert_eq!(report.tokens, backend.call_count() as u64 * TOKENS_PER_CALL);
    assert_eq!(report.names, ["Alice"]);
    assert!((report.cost - report.tokens as f64 / 1000.0 * 0.002).abs() < 1e-9);
}

#[test]
fn estimate_mode_leaves_file_untouched() {
    let translator = TranslatorBuilder::new()
        .mode(Mode::Estimate)
        .price_per_1k(0.5)
        .build()
        .unwrap();

    let original = common_events(5);
    let mut root = original.clone();

    let report = translator.translate_file("CommonEvents.json", &mut root);

    assert!(report.is_success());
    assert!(report.tokens > 0);
    assert!(report.cost > 0.0);
    assert_eq!(root, original);
}

#[test]
fn report_display() {
    let mut report = FileReport {
        name: String::from("Map001.json"),
        tokens: 1500,
        cost: 0.003,
        elapsed: Duration::from_millis(2500),
        units: 4,
        failed_units: 0,
        error: None,
    };

    assert_eq!(report.to_string(), "Map001.json: [1500 Tokens/$0.0030][2.5s] ✓");

    report.failed_units = 1;
    report.error = Some(Error::Backend(BackendError::Timeout));

    assert_eq!(
        report.to_string(),
        "Map001.json: [1500 Tokens/$0.0030][2.5s] ✗ Translation backend failed: Request timed out. (1/4 units failed)"
    );
}

#[test]
fn resolves_file_kinds() {
    assert_eq!(FileKind::from_filename("Map001.json"), FileKind::Map);
    assert_eq!(FileKind::from_filename("map12.yaml"), FileKind::Map);
    assert_eq!(FileKind::from_filename("MapInfos.json"), FileKind::MapInfos);
    assert_eq!(FileKind::from_filename("CommonEvents.json"), FileKind::CommonEvents);
    assert_eq!(FileKind::from_filename("System.json"), FileKind::System);
    assert_eq!(FileKind::from_filename("Skills"), FileKind::Skills);
    assert_eq!(FileKind::from_filename("Mapper.json"), FileKind::Invalid);
    assert_eq!(FileKind::from_filename("Tilesets.json"), FileKind::Invalid);
}
