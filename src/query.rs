/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 検索クエリ文字列の正規化
//!

use crate::extract::fold::{self, CHAR_FOLDS};

/// 先頭に置かれると問い合わせ文法の演算子として働く文字
const LEADING_OPERATORS: &[char] = &[
    '/', '\\', '`', '´', '*', '~', '\'', '#', '$', '%',
];

/// 畳み込みの前に除去する文字列
const STRIP: &[(&str, &str)] = &[("&nbsp;", "")];

///
/// 検索クエリ文字列の正規化
///
/// # 概要
/// 前後の空白を除去し、先頭の演算子文字を1文字取り除いた上で、アクセント
/// 付き文字をASCIIの綴りに畳み込む。結果が変化しなくなるまで繰り返すため、
/// 正規化済みの文字列に再度適用しても結果は変わらない。
///
/// # 引数
/// * `raw` - 利用者が入力した問い合わせ文字列
///
/// # 戻り値
/// 正規化した問い合わせ文字列
///
pub fn sanitize(raw: &str) -> String {
    let mut current = sanitize_once(raw);

    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(raw: &str) -> String {
    let text = raw.trim();

    let text = match text.chars().next() {
        Some(c) if LEADING_OPERATORS.contains(&c) => &text[c.len_utf8()..],
        _ => text,
    };

    let text = fold::apply(text.trim(), STRIP);
    fold::apply(&text, CHAR_FOLDS).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_operator_and_folds() {
        assert_eq!(sanitize("  *Müller "), "Mueller");
        assert_eq!(sanitize("´Straße"), "Strasse");
        assert_eq!(sanitize("Grüße&nbsp;Welt"), "GruesseWelt");
        assert_eq!(sanitize("a*b"), "a*b");
    }

    #[test]
    fn repeated_operators_are_removed() {
        assert_eq!(sanitize("// ~ Haus"), "Haus");
        assert_eq!(sanitize("%"), "");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn idempotent_on_representative_inputs() {
        let inputs = [
            "",
            "   ",
            "Hallo Welt",
            "  *Müller ",
            "//x",
            "\\ '#$%abc",
            "&nbsp;",
            "&nb&nbsp;sp;x",
            "Ärger AND Öl",
            "title:\"foo bar\" OR baz",
            "´`~",
            "ß ü ö ä Ä Ö Ü é",
        ];

        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {:?}", input);
        }
    }
}
