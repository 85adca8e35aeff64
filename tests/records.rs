mod common;

use common::*;
use serde_json::json;

#[test]
fn actors() {
    let backend = MockBackend::new(|call| Ok(format!("{}.", fake_translate(call.line()))));
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([
        null,
        {"id": 1, "name": "アリス", "nickname": "", "profile": "こんにちは", "note": "<タグ:はい>"},
    ]);

    let report = translator.translate_file("Actors.json", &mut root);

    assert!(report.is_success());
    assert_eq!(report.units, 1);
    assert_eq!(root[1]["name"], "Alice");
    assert_eq!(root[1]["nickname"], "");
    assert_eq!(root[1]["profile"], "Hello.");
    assert_eq!(root[1]["note"], "<タグ:はい>");

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| call.context.is_empty()));
}

#[test]
fn item_descriptions_wrap_to_list_width() {
    let backend = MockBackend::new(|_| {
        Ok(String::from(
            "A sturdy wooden shield, that was handed down in the family of the village elder for generations.",
        ))
    });
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([null, {"name": "", "description": "村長の家に代々伝わる頑丈な木の盾。"}]);
    translator.translate_file("Armors.json", &mut root);

    let description = root[1]["description"].as_str().unwrap();
    assert!(description.contains('\n'));
    assert!(description.lines().all(|line| line.len() <= 90));
}

#[test]
fn skills() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([
        null,
        {"name": "はい", "description": "", "message1": "%1はこんにちはと言った！", "message2": "", "note": ""},
    ]);

    translator.translate_file("Skills.json", &mut root);

    assert_eq!(root[1]["name"], "Yes");
    assert_eq!(root[1]["message1"], "%1はHelloと言った！");

    let calls = backend.calls();
    assert!(calls[1].system.contains("action"));
}

#[test]
fn system() {
    let backend = MockBackend::dictionary();
    let translator = builder(&backend).build().unwrap();

    let mut root = json!({
        "gameTitle": "アリス",
        "currencyUnit": "G",
        "elements": ["", "はい", "いいえ"],
        "switches": ["", "こんにちは"],
        "terms": {
            "basic": ["はい", "Lv"],
            "messages": {"victory": "%1の勝利！", "greeting": "こんにちは"},
        },
    });

    let report = translator.translate_file("System.json", &mut root);

    assert!(report.is_success());
    assert_eq!(report.units, 1);
    assert_eq!(root["gameTitle"], "Alice");
    assert_eq!(root["currencyUnit"], "G");
    assert_eq!(root["elements"], json!(["", "Yes", "No"]));
    assert_eq!(root["switches"], json!(["", "こんにちは"]));
    assert_eq!(root["terms"]["basic"], json!(["Yes", "Lv"]));
    assert_eq!(root["terms"]["messages"]["greeting"], "Hello");
}

#[test]
fn note_tags() {
    let backend = MockBackend::new(|call| Ok(fake_translate(call.line())));
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([
        null,
        {
            "name": "",
            "description": "",
            "note": "<SG説明:こんにちは\nさようなら>\n<SGカテゴリ:はい>\n<SG画像:アリス>",
        },
    ]);

    let report = translator.translate_file("Items.json", &mut root);

    assert!(report.is_success());
    assert_eq!(
        root[1]["note"],
        "<SG説明:Hello Goodbye>\n<SGカテゴリ:Yes>\n<SG画像:アリス>"
    );

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| call.system.contains("note")));
}

#[test]
fn note_tags_wrap_to_note_width() {
    let backend = MockBackend::new(|_| {
        Ok(String::from(
            "A sturdy wooden shield, that was handed down in the family of the village elder for generations.",
        ))
    });
    let translator = builder(&backend).build().unwrap();

    let mut root = json!([null, {"name": "", "note": "<desc2:村長の家に代々伝わる頑丈な木の盾。>"}]);
    translator.translate_file("Enemies.json", &mut root);

    let note = root[1]["note"].as_str().unwrap();
    let body = note
        .strip_prefix("<desc2:")
        .and_then(|note| note.strip_suffix('>'))
        .unwrap();

    assert!(body.contains('\n'));
    assert!(body.lines().all(|line| line.len() <= 50));
}
