use rpgm_translate_lib::{Mode, TranslatorBuilder};
use serde_json::Value;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let translator = TranslatorBuilder::new().mode(Mode::Estimate).build()?;

    let mut files: Vec<(String, Value)> = Vec::new();

    for entry in fs::read_dir("data")? {
        let path = entry?.path();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        files.push((name.into_owned(), serde_json::from_str(&fs::read_to_string(&path)?)?));
    }

    let report = translator.translate_files(&mut files);

    for file in &report.files {
        println!("{file}");
    }

    println!("Total: {} tokens, ${:.4}", report.tokens, report.cost);
    Ok(())
}
