use rpgm_translate_lib::{protect, restore};

#[test]
fn colors() {
    let text = r"\c[1]こんにちは\c[0]";
    let (sanitized, tokens) = protect(text);

    assert_eq!(sanitized, "<COLOR_0>こんにちは<COLOR_1>");
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens.get("<COLOR_0>"), Some(r"\c[1]"));
    assert_eq!(restore(&sanitized, &tokens), text);
}

#[test]
fn every_category() {
    let text = r"\I[64]\C[2]\N[1]は\V[10]ゴールドを持っている\!\CL";
    let (sanitized, tokens) = protect(text);

    assert_eq!(
        sanitized,
        "<ICON_0><COLOR_0><NAME_0>は<VARIABLE_0>ゴールドを持っている<FORMAT_0><FORMAT_1>"
    );
    assert_eq!(tokens.len(), 6);
    assert_eq!(restore(&sanitized, &tokens), text);
}

#[test]
fn repeated_matches_share_placeholder() {
    let text = r"\C[2]赤\C[0]と\C[2]赤\C[0]";
    let (sanitized, tokens) = protect(text);

    assert_eq!(sanitized, "<COLOR_0>赤<COLOR_1>と<COLOR_0>赤<COLOR_1>");
    assert_eq!(tokens.len(), 2);
    assert_eq!(restore(&sanitized, &tokens), text);
}

#[test]
fn tolerates_spaces_inside_placeholders() {
    let (_, tokens) = protect(r"\C[2]赤\C[0]");
    let translated = "< COLOR_0 >Red< color _ 1>";

    assert_eq!(restore(translated, &tokens), r"\C[2]Red\C[0]");
}

#[test]
fn dropped_placeholder_is_lost() {
    let (_, tokens) = protect(r"\C[2]赤\C[0]");

    assert_eq!(restore("<COLOR_0>Red", &tokens), r"\C[2]Red");
}

#[test]
fn unknown_placeholders_stay() {
    let (_, tokens) = protect(r"\C[2]赤");

    assert_eq!(restore("<COLOR_0>Red <HP_3>", &tokens), r"\C[2]Red <HP_3>");
}

#[test]
fn plain_text() {
    let (sanitized, tokens) = protect("こんにちは");

    assert_eq!(sanitized, "こんにちは");
    assert!(tokens.is_empty());
    assert_eq!(restore("Hello", &tokens), "Hello");
}

#[test]
fn placeholder_text_in_source_survives() {
    let text = r"<COLOR_0>\c[1]あ";
    let (sanitized, tokens) = protect(text);

    assert_eq!(sanitized, "<COLOR_0><COLOR_1>あ");
    assert_eq!(tokens.get("<COLOR_1>"), Some(r"\c[1]"));
    assert_eq!(tokens.get("<COLOR_0>"), None);
    assert_eq!(restore(&sanitized, &tokens), text);
}

#[test]
fn loose_placeholder_text_in_source_survives() {
    let text = r"< icon_0 >\I[5]\I[6]剣";
    let (sanitized, tokens) = protect(text);

    assert_eq!(sanitized, "< icon_0 ><ICON_1><ICON_2>剣");
    assert_eq!(restore(&sanitized, &tokens), text);
}
