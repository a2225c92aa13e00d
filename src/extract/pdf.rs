/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! PDF文書からのテキスト抽出
//!
//! オブジェクト構造は解釈せず、バイト列を先頭から一度だけ走査して文書情報
//! 辞書の項目と内容ストリーム中の文字列を拾い出す。
//!

use std::io::Read;

use chrono::NaiveDateTime;
use flate2::read::ZlibDecoder;
use log::debug;

use crate::cancel::CancelFlag;
use super::fold::{self, CHAR_FOLDS};
use super::{ExtractError, ExtractedDocument};

/// 内容ストリームとみなす辞書の長さの既定上限
pub const DEFAULT_DESCRIPTOR_LIMIT: usize = 38;

/// キャンセル確認を行うバイト間隔
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// 作成日時の書式
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

///
/// 本文に対する後処理の置換表
///
/// MacRomanとLatin-1の二種類の8進エスケープを扱う。
///
const OCTAL_ESCAPES: &[(&str, &str)] = &[
    ("\\212", "ä"),
    ("\\232", "ö"),
    ("\\237", "ü"),
    ("\\247", "ß"),
    ("\\200", "Ä"),
    ("\\205", "Ö"),
    ("\\206", "Ü"),
    ("\\344", "ä"),
    ("\\366", "ö"),
    ("\\374", "ü"),
    ("\\337", "ß"),
    ("\\304", "Ä"),
    ("\\326", "Ö"),
    ("\\334", "Ü"),
    ("\\(", "("),
    ("\\)", ")"),
    ("\\\\", "\\"),
];

///
/// 走査対象のトークン
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Author,
    CreationDate,
    Keywords,
    Subject,
    Title,
    DictStart,
    Stream,
}

impl Token {
    const ALL: [Token; 7] = [
        Token::Author,
        Token::CreationDate,
        Token::Keywords,
        Token::Subject,
        Token::Title,
        Token::DictStart,
        Token::Stream,
    ];

    fn text(self) -> &'static [u8] {
        match self {
            Token::Author => b"/Author",
            Token::CreationDate => b"/CreationDate",
            Token::Keywords => b"/Keywords",
            Token::Subject => b"/Subject",
            Token::Title => b"/Title",
            Token::DictStart => b"<<",
            Token::Stream => b"stream",
        }
    }
}

///
/// 指定位置から始まるトークンの判定
///
/// # 概要
/// トークン毎に「まだ一致し得るか」のフラグを持ち、カーソルを1バイトずつ
/// 進めて一致しなくなったものを落としていく。全て落ちた時点で、それまでに
/// 完全一致した最長のトークンを返す。1バイト当たりの処理量は最長トークン
/// の長さで抑えられる。
///
fn match_token(data: &[u8], pos: usize) -> Option<Token> {
    let mut viable = [true; Token::ALL.len()];
    let mut matched = None;
    let mut depth = 0;

    while let Some(&b) = data.get(pos + depth) {
        let mut any = false;

        for (idx, token) in Token::ALL.iter().enumerate() {
            if !viable[idx] {
                continue;
            }

            let text = token.text();
            if text.get(depth) != Some(&b) {
                viable[idx] = false;
                continue;
            }

            any = true;
            if depth + 1 == text.len() {
                matched = Some(*token);
            }
        }

        if !any {
            break;
        }
        depth += 1;
    }

    matched
}

///
/// ストリームの圧縮方式
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamFilter {
    Plain,
    Flate,
    Lzw,
}

///
/// PDF文書の抽出器
///
#[derive(Clone, Debug)]
pub struct PdfExtractor {
    /// 内容ストリームとみなす辞書の長さの上限
    descriptor_limit: usize,
}

impl PdfExtractor {
    ///
    /// 抽出器の生成
    ///
    /// # 引数
    /// * `descriptor_limit` - 内容ストリームとみなすストリーム辞書の長さの
    ///   上限(この長さ未満のもののみ対象とする)
    ///
    /// # 戻り値
    /// 生成した抽出器
    ///
    pub fn new(descriptor_limit: usize) -> Self {
        Self { descriptor_limit }
    }

    ///
    /// PDF文書から各フィールドを抽出する
    ///
    /// # 概要
    /// 個々のフィールドの読み取り失敗は`field_errors`に記録して処理を続け
    /// る。キャンセルが要求された場合はそれまでの結果を返す。
    ///
    /// # 引数
    /// * `data` - PDFのバイト列
    /// * `cancel` - 中断要求フラグ
    ///
    /// # 戻り値
    /// 抽出結果
    ///
    pub fn extract(&self, data: &[u8], cancel: &CancelFlag)
        -> Result<ExtractedDocument, ExtractError>
    {
        if data.is_empty() {
            return Err(ExtractError::TruncatedInput {
                what: "pdf document".to_string(),
            });
        }

        let mut doc = ExtractedDocument::default();
        let mut streams: Vec<String> = Vec::new();
        let mut checkpoint: Option<usize> = None;
        let mut last_check = 0;
        let mut pos = 0;

        while pos < data.len() {
            if pos - last_check >= CANCEL_CHECK_INTERVAL {
                last_check = pos;
                if cancel.is_cancelled() {
                    debug!("pdf scan cancelled at byte {}", pos);
                    break;
                }
            }

            let token = match match_token(data, pos) {
                Some(token) => token,
                None => {
                    pos += 1;
                    continue;
                }
            };

            if cancel.is_cancelled() {
                debug!("pdf scan cancelled at byte {}", pos);
                break;
            }

            let after = pos + token.text().len();

            match token {
                Token::DictStart => {
                    checkpoint = Some(after);
                    pos = after;
                }

                Token::Stream => {
                    // "endstream"等の一部は対象外
                    if pos > 0 && data[pos - 1].is_ascii_alphabetic() {
                        pos = after;
                        continue;
                    }

                    let filter = checkpoint
                        .take()
                        .and_then(|cp| self.content_filter(data, cp, pos));

                    let (body, next) = read_stream_body(data, after, cancel);
                    pos = next;

                    if let Some(text) = filter.and_then(|f| stream_text(body, f)) {
                        streams.push(text);
                    }
                }

                field => {
                    pos = read_field(data, after, field, &mut doc);
                }
            }
        }

        /*
         * 本文の後処理
         */
        let body = streams.join("\n");
        let body = fold::apply(&body, OCTAL_ESCAPES);
        doc.body = fold::apply(&body, CHAR_FOLDS).trim().to_string();

        Ok(doc)
    }

    ///
    /// ストリーム辞書を調べ、内容ストリームであれば圧縮方式を返す
    ///
    /// # 引数
    /// * `data` - PDFのバイト列
    /// * `checkpoint` - 直前の`<<`の直後の位置
    /// * `limit` - `stream`キーワードの位置(辞書の探索範囲の上限)
    ///
    fn content_filter(&self, data: &[u8], checkpoint: usize, limit: usize)
        -> Option<StreamFilter>
    {
        let region = data.get(checkpoint..limit)?;
        let end = find(region, b">>")?;
        let dict = &region[..end];

        if dict.len() >= self.descriptor_limit || find(dict, b"/Length ").is_none() {
            return None;
        }

        if find(dict, b"FlateDecode").is_some() {
            Some(StreamFilter::Flate)
        } else if find(dict, b"LZWDecode").is_some() {
            Some(StreamFilter::Lzw)
        } else {
            Some(StreamFilter::Plain)
        }
    }
}

// Defaultトレイトの実装
impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIPTOR_LIMIT)
    }
}

///
/// 文書情報辞書の項目を読み取る
///
/// # 概要
/// 値はバイト列のまま格納せず、`decode_string()`でエスケープの解除と
/// 文字コードの変換、文字の畳み込みを行ってから格納する。
///
/// # 引数
/// * `data` - PDFのバイト列
/// * `from` - トークン直後の位置
/// * `token` - 読み取った項目のトークン
/// * `doc` - 結果の格納先
///
/// # 戻り値
/// 走査を再開する位置
///
fn read_field(
    data: &[u8],
    from: usize,
    token: Token,
    doc: &mut ExtractedDocument,
) -> usize {
    let mut pos = from;
    while data.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }

    // 文字列以外(間接参照、16進文字列等)は読み飛ばす
    if data.get(pos) != Some(&b'(') {
        return pos;
    }

    let close = match matching_paren(data, pos + 1) {
        Some(close) => close,
        None => {
            doc.field_errors.push(ExtractError::TruncatedInput {
                what: String::from_utf8_lossy(token.text()).into_owned(),
            });
            return data.len();
        }
    };

    let value = decode_string(&data[pos + 1..close]);

    match token {
        Token::Author => doc.author = value,
        Token::Keywords => doc.keywords = value,
        Token::Subject => doc.description = value,
        Token::Title => doc.title = value,
        Token::CreationDate => match parse_date(&value) {
            Ok(date) => doc.created = Some(date),
            Err(err) => {
                doc.created = None;
                doc.field_errors.push(err);
            }
        },
        Token::DictStart | Token::Stream => {}
    }

    close + 1
}

///
/// 作成日時文字列の解釈
///
/// # 引数
/// * `value` - `D:YYYYMMDDHHmmSS...`形式の文字列
///
/// # 戻り値
/// 解釈した日時
///
fn parse_date(value: &str) -> Result<NaiveDateTime, ExtractError> {
    let digits = value.get(2..16)
        .ok_or_else(|| ExtractError::DateParseFailed(value.to_string()))?;

    NaiveDateTime::parse_from_str(digits, DATE_FORMAT)
        .map_err(|_| ExtractError::DateParseFailed(value.to_string()))
}

///
/// ストリーム本体を読み取る
///
/// # 概要
/// `stream`キーワードの行末から、`endstream`のみの行の手前までを本体と
/// する。`endstream`が無い場合は入力の終わりまでを本体とする。
///
/// # 戻り値
/// (本体のバイト列, 走査を再開する位置)
///
fn read_stream_body<'a>(data: &'a [u8], from: usize, cancel: &CancelFlag)
    -> (&'a [u8], usize)
{
    /*
     * キーワード行の残り(改行まで)を読み飛ばす
     */
    let start = match data[from..].iter().position(|&b| b == b'\n') {
        Some(offset) => from + offset + 1,
        None => return (&data[data.len()..], data.len()),
    };

    /*
     * endstream行の探索
     */
    let mut line_start = start;
    let mut last_check = start;

    loop {
        if line_start - last_check >= CANCEL_CHECK_INTERVAL {
            last_check = line_start;
            if cancel.is_cancelled() {
                return (&data[start..line_start], data.len());
            }
        }

        let line_end = data[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|offset| line_start + offset)
            .unwrap_or(data.len());

        if data[line_start..line_end].trim_ascii() == b"endstream" {
            return (&data[start..line_start], (line_end + 1).min(data.len()));
        }

        if line_end >= data.len() {
            return (&data[start..], data.len());
        }

        line_start = line_end + 1;
    }
}

///
/// 内容ストリームから表示文字列を取り出す
///
/// # 戻り値
/// 括弧で囲まれた文字列を連結したもの。LZW圧縮のストリームは扱わない
/// ため`None`を返す。
///
fn stream_text(body: &[u8], filter: StreamFilter) -> Option<String> {
    let inflated;
    let content = match filter {
        StreamFilter::Plain => body,
        StreamFilter::Flate => {
            let mut out = Vec::new();
            if let Err(err) = ZlibDecoder::new(body).read_to_end(&mut out) {
                debug!("inflate failed after {} bytes: {}", out.len(), err);
            }
            inflated = out;
            &inflated[..]
        }
        StreamFilter::Lzw => {
            debug!("skip lzw compressed stream ({} bytes)", body.len());
            return None;
        }
    };

    let mut text = Vec::new();
    let mut i = 0;

    while i < content.len() {
        if content[i] != b'(' {
            i += 1;
            continue;
        }

        match matching_paren(content, i + 1) {
            Some(close) => {
                text.extend_from_slice(&content[i + 1..close]);
                i = close + 1;
            }
            None => break,
        }
    }

    Some(latin1(&text))
}

///
/// 対応する閉じ括弧の位置を探す
///
/// # 引数
/// * `data` - 対象バイト列
/// * `from` - 開き括弧の直後の位置
///
/// # 戻り値
/// 閉じ括弧の位置。見つからない場合は`None`
///
fn matching_paren(data: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = from;

    while i < data.len() {
        match data[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

///
/// 文書情報辞書の文字列値の復号
///
/// # 概要
/// エスケープを解除した上で、BOM(FE FF)で始まる場合はUTF-16BE、それ以外
/// はLatin-1として解釈し、アクセント付き文字を畳み込む。
///
fn decode_string(raw: &[u8]) -> String {
    let bytes = unescape(raw);

    let text = if bytes.starts_with(&[0xfe, 0xff]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|pair| {
                let hi = pair[0] as u16;
                let lo = pair.get(1).copied().unwrap_or(0) as u16;
                (hi << 8) | lo
            })
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        latin1(&bytes)
    };

    fold::apply(&text, CHAR_FOLDS).trim().to_string()
}

///
/// PDF文字列のエスケープ解除
///
fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' {
            out.push(raw[i]);
            i += 1;
            continue;
        }

        i += 1;
        let Some(&c) = raw.get(i) else {
            break;
        };

        match c {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'0'..=b'7' => {
                let mut value = 0u16;
                let mut len = 0;
                while len < 3 && raw.get(i + len).is_some_and(|d| (b'0'..=b'7').contains(d)) {
                    value = value * 8 + (raw[i + len] - b'0') as u16;
                    len += 1;
                }
                out.push(value as u8);
                i += len;
                continue;
            }
            b'\r' => {
                // 行継続
                if raw.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => {}
            other => out.push(other),
        }
        i += 1;
    }

    out
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
