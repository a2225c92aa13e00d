/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 文字列置換テーブルと置換処理
//!

///
/// アクセント付き文字をASCIIの綴りに畳み込む置換表
///
pub(crate) const CHAR_FOLDS: &[(&str, &str)] = &[
    ("Ä", "Ae"),
    ("Ö", "Oe"),
    ("Ü", "Ue"),
    ("ä", "ae"),
    ("ö", "oe"),
    ("ü", "ue"),
    ("ß", "ss"),
    ("À", "A"),
    ("Á", "A"),
    ("Â", "A"),
    ("à", "a"),
    ("á", "a"),
    ("â", "a"),
    ("Ç", "C"),
    ("ç", "c"),
    ("È", "E"),
    ("É", "E"),
    ("Ê", "E"),
    ("è", "e"),
    ("é", "e"),
    ("ê", "e"),
    ("ë", "e"),
    ("Ì", "I"),
    ("Í", "I"),
    ("Î", "I"),
    ("ì", "i"),
    ("í", "i"),
    ("î", "i"),
    ("ï", "i"),
    ("Ñ", "N"),
    ("ñ", "n"),
    ("Ò", "O"),
    ("Ó", "O"),
    ("Ô", "O"),
    ("ò", "o"),
    ("ó", "o"),
    ("ô", "o"),
    ("Ù", "U"),
    ("Ú", "U"),
    ("Û", "U"),
    ("ù", "u"),
    ("ú", "u"),
    ("û", "u"),
];

///
/// HTML実体参照の置換表
///
/// `&amp;`は他の実体参照を作り出さないよう最後に置く。
///
pub(crate) const ENTITY_REPLACEMENTS: &[(&str, &str)] = &[
    ("&Auml;", "Ae"),
    ("&Ouml;", "Oe"),
    ("&Uuml;", "Ue"),
    ("&auml;", "ae"),
    ("&ouml;", "oe"),
    ("&uuml;", "ue"),
    ("&szlig;", "ss"),
    ("&agrave;", "a"),
    ("&aacute;", "a"),
    ("&acirc;", "a"),
    ("&ccedil;", "c"),
    ("&egrave;", "e"),
    ("&eacute;", "e"),
    ("&ecirc;", "e"),
    ("&Eacute;", "E"),
    ("&ograve;", "o"),
    ("&oacute;", "o"),
    ("&ocirc;", "o"),
    ("&ugrave;", "u"),
    ("&uacute;", "u"),
    ("&ucirc;", "u"),
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&shy;", ""),
    ("&ndash;", "-"),
    ("&mdash;", "-"),
    ("&bdquo;", "\""),
    ("&ldquo;", "\""),
    ("&rdquo;", "\""),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&copy;", "(c)"),
    ("&euro;", "EUR"),
    ("&amp;", "&"),
];

///
/// 置換表を先頭から順に適用する
///
/// # 引数
/// * `text` - 対象文字列
/// * `table` - (置換元, 置換先)の並び
///
/// # 戻り値
/// 置換後の文字列
///
pub(crate) fn apply<S>(text: &str, table: &[(S, S)]) -> String
where
    S: AsRef<str>,
{
    let mut result = text.to_string();

    for (from, to) in table {
        let from = from.as_ref();
        if !from.is_empty() && result.contains(from) {
            result = result.replace(from, to.as_ref());
        }
    }

    result
}

///
/// 連続する空白文字を1文字の空白にまとめ、前後の空白を除去する
///
/// # 引数
/// * `text` - 対象文字列
///
/// # 戻り値
/// 整形後の文字列
///
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_umlauts_to_digraphs() {
        assert_eq!(apply("Müller Straße", CHAR_FOLDS), "Mueller Strasse");
        assert_eq!(apply("ÄÖÜ", CHAR_FOLDS), "AeOeUe");
    }

    #[test]
    fn entities_do_not_cascade() {
        assert_eq!(apply("&amp;auml;", ENTITY_REPLACEMENTS), "&auml;");
        assert_eq!(apply("M&uuml;nchen&nbsp;Nord", ENTITY_REPLACEMENTS),
            "Muenchen Nord");
    }

    #[test]
    fn collapse_whitespace_trims() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(" \n "), "");
    }
}
