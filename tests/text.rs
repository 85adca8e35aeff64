use rpgm_translate_lib::{
    collapse_repeats, normalize, strip_furigana, strip_wrap, wrap,
};

#[test]
fn collapses_wide_repeats() {
    assert_eq!(collapse_repeats("あああああ！"), "ああ！");
    assert_eq!(collapse_repeats("えっ……！！！"), "えっ……！！");
    assert_eq!(collapse_repeats("ええ"), "ええ");
    assert_eq!(collapse_repeats("Nooooo...."), "Nooooo....");
}

#[test]
fn strips_engine_wrap() {
    assert_eq!(strip_wrap("一行目\n二行目<br>三行目"), "一行目 二行目 三行目");
    assert_eq!(strip_wrap("全角\u{3000}空白"), "全角 空白");
}

#[test]
fn strips_furigana() {
    assert_eq!(strip_furigana(r"\r[漢字,かんじ]です"), "漢字です");
    assert_eq!(strip_furigana(r"\rb[明日,あした]"), "明日");
}

#[test]
fn normalizes_everything() {
    assert_eq!(
        normalize("ああああ\n\\r[漢字,かんじ]"),
        "ああ 漢字"
    );
}

#[test]
fn wraps_words() {
    assert_eq!(wrap("the quick brown fox", 10, "\n"), "the quick\nbrown fox");
    assert_eq!(
        wrap("the quick brown fox", 10, "<br>"),
        "the quick<br>brown fox"
    );
    assert_eq!(wrap("short", 10, "\n"), "short");
    assert_eq!(wrap("not wrapped at all", 0, "\n"), "not wrapped at all");
}

#[test]
fn wraps_by_display_width() {
    assert_eq!(wrap("あいうえお", 4, "\n"), "あい\nうえ\nお");
    assert_eq!(wrap("supercalifragilistic", 5, "\n"), "super\ncalif\nragil\nistic");
}
