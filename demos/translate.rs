use rpgm_translate_lib::{
    BackendConfig, CodeFlags, OpenAiBackend, TranslatorBuilder,
};
use std::{env, fs, sync::Arc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let backend = OpenAiBackend::new(BackendConfig {
        api_key: env::var("OPENAI_API_KEY")?,
        ..Default::default()
    })?;

    let translator = TranslatorBuilder::new()
        .with_backend(Arc::new(backend))
        .with_codes(CodeFlags::Dialogue | CodeFlags::Choice | CodeFlags::Speaker)
        .glossary("アリス == Alice")
        .build()?;

    let mut map = serde_json::from_str(&fs::read_to_string("data/Map001.json")?)?;
    let report = translator.translate_file("Map001.json", &mut map);

    println!("{report}");
    fs::create_dir_all("output")?;
    fs::write("output/Map001.json", serde_json::to_string(&map)?)?;
    Ok(())
}
