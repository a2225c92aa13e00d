/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! HTML文書からのテキスト抽出
//!
//! 抽出内容は宣言的な変換設定([`HtmlTransformConfig`])で決まり、変換処理
//! ([`transform`])自体は設定とHTMLテキストのみに依存する純粋関数として
//! 実装している。
//!

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::fold::{self, CHAR_FOLDS, ENTITY_REPLACEMENTS};
use super::{ExtractError, ExtractedDocument};

/// 除去時に区切り空白を挿入しないインライン要素
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "big", "code", "em", "font", "i", "s", "small", "span",
    "strike", "strong", "sub", "sup", "tt", "u",
];

/// 内容を字句解析しない要素(閉じタグのみを探す)
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea"];

///
/// 属性値による置換対象の絞り込み条件
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AttrCondition {
    /// 属性名
    pub name: String,

    /// 属性値(大文字小文字は区別しない)
    pub value: String,
}

///
/// 指定属性の値でタグを置き換える規則
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ReplaceTag {
    /// 対象タグ名
    pub tag: String,

    /// 出力に使用する属性名
    pub attribute: String,

    /// 適用条件
    #[serde(default)]
    pub when: Option<AttrCondition>,
}

impl ReplaceTag {
    ///
    /// 条件付き置換規則の生成
    ///
    /// # 引数
    /// * `tag` - 対象タグ名
    /// * `attribute` - 出力する属性名
    /// * `name` - 条件とする属性名
    /// * `value` - 条件とする属性値
    ///
    /// # 戻り値
    /// 生成した規則
    ///
    pub fn when(tag: &str, attribute: &str, name: &str, value: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
            when: Some(AttrCondition {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

///
/// HTML変換設定
///
/// # 概要
/// どの規則にも該当しないタグは`use_defaults`が`true`の場合は除去(内容は
/// 残す)、`false`の場合はそのまま文字列として出力する。
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct HtmlTransformConfig {
    /// 内容ごと除去するタグ
    pub remove_blocks: Vec<String>,

    /// タグのみ除去し内容を残すタグ
    pub remove_tags: Vec<String>,

    /// 属性値で置き換えるタグ
    pub replace_tags: Vec<ReplaceTag>,

    /// 変換後テキストに適用する文字列置換(先頭から順に適用)
    pub replacements: Vec<(String, String)>,

    /// 未定義タグの既定処理を使用するか否か
    pub use_defaults: bool,
}

impl HtmlTransformConfig {
    ///
    /// keywords抽出用の既定設定
    ///
    pub fn keywords() -> Self {
        Self::meta_content("keywords")
    }

    ///
    /// description抽出用の既定設定
    ///
    pub fn description() -> Self {
        Self::meta_content("description")
    }

    ///
    /// title抽出用の既定設定
    ///
    pub fn title() -> Self {
        Self {
            remove_blocks: strings(&["body", "noscript", "script", "style"]),
            remove_tags: strings(&["base", "head", "html", "link", "meta"]),
            ..Self::default()
        }
    }

    ///
    /// 本文抽出用の既定設定
    ///
    pub fn body() -> Self {
        Self {
            remove_blocks: strings(&[
                "head", "noscript", "script", "select", "style", "title",
            ]),
            ..Self::default()
        }
    }

    ///
    /// metaタグのcontent属性を取り出す設定
    ///
    /// # 引数
    /// * `name` - metaタグのname属性値
    ///
    /// # 戻り値
    /// 生成した設定
    ///
    fn meta_content(name: &str) -> Self {
        Self {
            remove_blocks: strings(&[
                "body", "noscript", "script", "style", "title",
            ]),
            remove_tags: strings(&["base", "head", "html", "link", "meta"]),
            replace_tags: vec![
                ReplaceTag::when("meta", "content", "name", name),
            ],
            ..Self::default()
        }
    }

    ///
    /// 設定ファイルの読み込み
    ///
    /// # 概要
    /// ファイルが存在しない場合は`fallback`を返す。
    ///
    /// # 引数
    /// * `path` - TOML形式の設定ファイルのパス
    /// * `fallback` - ファイルが無い場合に使用する設定
    ///
    /// # 戻り値
    /// 読み込んだ設定
    ///
    pub fn load_or(path: &Path, fallback: Self) -> Result<Self, ExtractError> {
        if !path.exists() {
            return Ok(fallback);
        }

        let source = fs::read_to_string(path)
            .map_err(|err| ExtractError::InvalidConfig {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        toml::from_str(&source)
            .map_err(|err| ExtractError::InvalidConfig {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
    }
}

// Defaultトレイトの実装
impl Default for HtmlTransformConfig {
    fn default() -> Self {
        let replacements = ENTITY_REPLACEMENTS
            .iter()
            .chain(CHAR_FOLDS.iter())
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();

        Self {
            remove_blocks: Vec::new(),
            remove_tags: Vec::new(),
            replace_tags: Vec::new(),
            replacements,
            use_defaults: true,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

///
/// 字句解析したタグ
///
struct RawTag<'a> {
    /// 小文字化したタグ名
    name: String,

    /// 属性部分のソース
    attrs: &'a str,

    /// 閉じタグか否か
    closing: bool,

    /// `<!...>`または`<?...>`形式か否か
    declaration: bool,

    /// `>`の直後の位置
    end: usize,
}

///
/// タグに対する処理
///
enum TagAction {
    Drop,
    RemoveBlock,
    Replace(String),
    Strip,
    Keep,
}

///
/// 変換設定から組み立てたタグ判定規則
///
struct TagRules<'a> {
    remove_blocks: HashSet<String>,
    remove_tags: HashSet<String>,
    replace_tags: &'a [ReplaceTag],
    use_defaults: bool,
}

impl<'a> TagRules<'a> {
    fn new(config: &'a HtmlTransformConfig) -> Self {
        Self {
            remove_blocks: config.remove_blocks
                .iter()
                .map(|tag| tag.to_ascii_lowercase())
                .collect(),
            remove_tags: config.remove_tags
                .iter()
                .map(|tag| tag.to_ascii_lowercase())
                .collect(),
            replace_tags: &config.replace_tags,
            use_defaults: config.use_defaults,
        }
    }

    ///
    /// タグに対する処理を決定する
    ///
    /// # 概要
    /// 置換規則、ブロック除去、タグ除去、既定処理の順に判定する。
    ///
    fn action(&self, tag: &RawTag<'_>) -> TagAction {
        if tag.declaration {
            return TagAction::Drop;
        }

        if !tag.closing {
            for rule in self.replace_tags {
                if !rule.tag.eq_ignore_ascii_case(&tag.name) {
                    continue;
                }

                let attrs = parse_attributes(tag.attrs);
                let matched = match &rule.when {
                    Some(cond) => attrs.iter().any(|(name, value)| {
                        name.eq_ignore_ascii_case(&cond.name)
                            && value.trim().eq_ignore_ascii_case(&cond.value)
                    }),
                    None => true,
                };

                if matched {
                    let value = attrs
                        .into_iter()
                        .find(|(name, _)| {
                            name.eq_ignore_ascii_case(&rule.attribute)
                        })
                        .map(|(_, value)| value)
                        .unwrap_or_default();
                    return TagAction::Replace(value);
                }
            }
        } else if self.replace_tags
            .iter()
            .any(|rule| rule.tag.eq_ignore_ascii_case(&tag.name)
                && rule.when.is_none())
        {
            return TagAction::Drop;
        }

        if self.remove_blocks.contains(&tag.name) {
            return TagAction::RemoveBlock;
        }

        if self.remove_tags.contains(&tag.name) || self.use_defaults {
            return TagAction::Strip;
        }

        TagAction::Keep
    }
}

///
/// HTMLテキストを変換設定に従ってプレーンテキストに変換する
///
/// # 概要
/// `<`から`>`までをタグとして切り出し、設定に従って除去/置換/保持する。
/// タグとして解釈できない`<`は文字として扱い、閉じタグが見つからないブ
/// ロックは開始タグのみを除去して残りを通常のテキストとして処理する。
/// 最後に文字列置換を適用し、空白をまとめる。
///
/// # 引数
/// * `html` - 変換対象のHTMLテキスト
/// * `config` - 変換設定
///
/// # 戻り値
/// 変換結果
///
pub fn transform(html: &str, config: &HtmlTransformConfig) -> String {
    let rules = TagRules::new(config);
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while pos < html.len() {
        /*
         * 次のタグ開始位置の探索
         */
        let start = match html[pos..].find('<') {
            Some(offset) => pos + offset,
            None => {
                out.push_str(&html[pos..]);
                break;
            }
        };
        out.push_str(&html[pos..start]);

        /*
         * コメントの読み飛ばし
         */
        if html[start..].starts_with("<!--") {
            match html[start + 4..].find("-->") {
                Some(offset) => {
                    pos = start + 4 + offset + 3;
                    continue;
                }
                None => {
                    out.push_str(&html[start..]);
                    break;
                }
            }
        }

        /*
         * タグの切り出し
         */
        let tag = match parse_tag(html, start) {
            Some(tag) => tag,
            None => {
                out.push('<');
                pos = start + 1;
                continue;
            }
        };
        pos = tag.end;

        /*
         * タグに応じた出力
         */
        match rules.action(&tag) {
            TagAction::Drop => {}
            TagAction::RemoveBlock => {
                if !tag.closing && !is_self_closing(tag.attrs) {
                    if let Some(after) = skip_block(html, pos, &tag.name) {
                        pos = after;
                    }
                }
                out.push(' ');
            }
            TagAction::Replace(value) => {
                out.push(' ');
                out.push_str(&value);
                out.push(' ');
            }
            TagAction::Strip => {
                if !INLINE_TAGS.contains(&tag.name.as_str()) {
                    out.push(' ');
                }
            }
            TagAction::Keep => out.push_str(&html[start..tag.end]),
        }
    }

    fold::collapse_whitespace(&fold::apply(&out, &config.replacements))
}

///
/// `start`位置の`<`からタグを切り出す
///
/// # 戻り値
/// タグとして解釈できない場合は`None`
///
fn parse_tag(html: &str, start: usize) -> Option<RawTag<'_>> {
    let bytes = html.as_bytes();
    let mut i = start + 1;

    /*
     * 宣言(<!DOCTYPE ...>, <?xml ...?>)
     */
    if matches!(bytes.get(i), Some(b'!') | Some(b'?')) {
        let end = html[i..].find('>')? + i + 1;
        return Some(RawTag {
            name: String::new(),
            attrs: "",
            closing: false,
            declaration: true,
            end,
        });
    }

    /*
     * タグ名
     */
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    if !bytes.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }

    let name_start = i;
    while bytes.get(i).is_some_and(|b| is_name_byte(*b)) {
        i += 1;
    }
    let name = html[name_start..i].to_ascii_lowercase();

    /*
     * 終端の探索(引用符内の'>'は無視する)
     */
    let mut quote: Option<u8> = None;
    let mut j = i;
    while j < bytes.len() {
        let b = bytes[j];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'>' {
                    break;
                }
            }
        }
        j += 1;
    }

    if j >= bytes.len() {
        // 引用符が閉じていない場合は単純に最初の'>'を終端とする
        j = html[i..].find('>')? + i;
    }

    Some(RawTag {
        name,
        attrs: &html[i..j],
        closing,
        declaration: false,
        end: j + 1,
    })
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b':' || b == b'_'
}

fn is_self_closing(attrs: &str) -> bool {
    attrs.trim_end().ends_with('/')
}

///
/// タグの属性部分を(属性名, 値)の並びに分解する
///
/// # 引数
/// * `src` - タグ名の直後から`>`の手前までの文字列
///
/// # 戻り値
/// 小文字化した属性名と値の並び
///
fn parse_attributes(src: &str) -> Vec<(String, String)> {
    let bytes = src.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;

    loop {
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace() || *b == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        /*
         * 属性名
         */
        let name_start = i;
        while bytes.get(i).is_some_and(|b| {
            !b.is_ascii_whitespace() && *b != b'=' && *b != b'/'
        }) {
            i += 1;
        }
        if i == name_start {
            i += 1;
            continue;
        }
        let name = src[name_start..i].to_ascii_lowercase();

        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }

        /*
         * 属性値
         */
        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
                i += 1;
            }

            match bytes.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let value_start = i + 1;
                    let value_end = src[value_start..]
                        .find(q as char)
                        .map(|offset| value_start + offset)
                        .unwrap_or(src.len());
                    value = src[value_start..value_end].to_string();
                    i = value_end + 1;
                }
                Some(_) => {
                    let value_start = i;
                    while bytes.get(i).is_some_and(|b| !b.is_ascii_whitespace()) {
                        i += 1;
                    }
                    value = src[value_start..i].to_string();
                }
                None => {}
            }
        }

        attrs.push((name, value));
    }

    attrs
}

///
/// ブロック要素の終端まで読み飛ばす
///
/// # 引数
/// * `html` - HTMLテキスト
/// * `from` - 開始タグ直後の位置
/// * `name` - 要素名
///
/// # 戻り値
/// 対応する閉じタグの直後の位置。見つからない場合は`None`
///
fn skip_block(html: &str, from: usize, name: &str) -> Option<usize> {
    let lower = html[from..].to_ascii_lowercase();
    let open = format!("<{}", name);
    let close = format!("</{}", name);
    let nested = !RAW_TEXT_TAGS.contains(&name);
    let mut depth = 1usize;
    let mut i = 0;

    loop {
        let next_close = find_tag_start(&lower, i, &close)?;
        let next_open = if nested {
            find_tag_start(&lower, i, &open)
        } else {
            None
        };

        match next_open {
            Some(open_pos) if open_pos < next_close => {
                depth += 1;
                i = open_pos + open.len();
            }
            _ => {
                depth -= 1;
                let end = lower[next_close..]
                    .find('>')
                    .map(|offset| next_close + offset + 1)
                    .unwrap_or(lower.len());
                if depth == 0 {
                    return Some(from + end);
                }
                i = end;
            }
        }
    }
}

///
/// `<name`の出現位置を探す(`<b`が`<body`に一致しないよう後続文字を確認)
///
fn find_tag_start(text: &str, from: usize, pattern: &str) -> Option<usize> {
    let mut i = from;

    while let Some(offset) = text[i..].find(pattern) {
        let pos = i + offset;
        let next = text.as_bytes().get(pos + pattern.len());
        if !next.is_some_and(|b| is_name_byte(*b)) {
            return Some(pos);
        }
        i = pos + pattern.len();
    }

    None
}

///
/// HTML文書の抽出器
///
/// # 概要
/// 同一のHTMLテキストに4種類の変換設定を適用し、keywords/description/
/// title/本文をそれぞれ得る。
///
#[derive(Clone, Debug)]
pub struct HtmlExtractor {
    keywords: HtmlTransformConfig,
    description: HtmlTransformConfig,
    title: HtmlTransformConfig,
    body: HtmlTransformConfig,
}

impl HtmlExtractor {
    ///
    /// 変換設定を指定して抽出器を生成する
    ///
    pub fn new(
        keywords: HtmlTransformConfig,
        description: HtmlTransformConfig,
        title: HtmlTransformConfig,
        body: HtmlTransformConfig,
    ) -> Self {
        Self { keywords, description, title, body }
    }

    ///
    /// 設定ディレクトリから抽出器を生成する
    ///
    /// # 概要
    /// `keywords.toml`、`description.toml`、`title.toml`、`body.toml`を読み
    /// 込む。存在しないファイルは既定の設定で補う。
    ///
    /// # 引数
    /// * `dir` - 設定ディレクトリ(`None`の場合は全て既定の設定)
    ///
    /// # 戻り値
    /// 生成した抽出器
    ///
    pub fn load(dir: Option<&Path>) -> Result<Self, ExtractError> {
        let dir = match dir {
            Some(dir) => dir,
            None => return Ok(Self::default()),
        };

        Ok(Self {
            keywords: HtmlTransformConfig::load_or(
                &dir.join("keywords.toml"),
                HtmlTransformConfig::keywords(),
            )?,
            description: HtmlTransformConfig::load_or(
                &dir.join("description.toml"),
                HtmlTransformConfig::description(),
            )?,
            title: HtmlTransformConfig::load_or(
                &dir.join("title.toml"),
                HtmlTransformConfig::title(),
            )?,
            body: HtmlTransformConfig::load_or(
                &dir.join("body.toml"),
                HtmlTransformConfig::body(),
            )?,
        })
    }

    ///
    /// HTML文書から各フィールドを抽出する
    ///
    /// # 引数
    /// * `bytes` - 文書のバイト列(UTF-8として解釈できない場合はLatin-1)
    ///
    /// # 戻り値
    /// 抽出結果
    ///
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument, ExtractError> {
        let html = decode(bytes);

        Ok(ExtractedDocument {
            title: transform(&html, &self.title),
            keywords: transform(&html, &self.keywords),
            description: transform(&html, &self.description),
            body: transform(&html, &self.body),
            ..ExtractedDocument::default()
        })
    }
}

// Defaultトレイトの実装
impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new(
            HtmlTransformConfig::keywords(),
            HtmlTransformConfig::description(),
            HtmlTransformConfig::title(),
            HtmlTransformConfig::body(),
        )
    }
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = concat!(
        "<html><head><meta name=\"keywords\" content=\"a,b\"/></head>",
        "<body><p>Hello</p></body></html>",
    );

    #[test]
    fn keywords_come_from_meta_content() {
        let doc = HtmlExtractor::default()
            .extract(PAGE.as_bytes())
            .expect("extract failed");

        assert_eq!(doc.keywords, "a,b");
        assert!(doc.body.contains("Hello"));
        assert!(!doc.body.contains('<'));
        assert!(!doc.body.contains("a,b"));
    }

    #[test]
    fn all_four_fields_are_extracted() {
        let html = concat!(
            "<!DOCTYPE html>\n<html><head>",
            "<TITLE>Willkommen &amp; Gr&uuml;&szlig;e</TITLE>",
            "<META NAME=\"Description\" CONTENT=\"Die Startseite\">",
            "<meta name=\"keywords\" content=\"start, home\">",
            "<style>p { color: red; }</style>",
            "</head><body><h1>Start</h1><!-- <p>hidden</p> -->",
            "<script>if (a < b) { x = '</p>'; }</script>",
            "<p>M&uuml;nchen ist <b>sch</b>ön</p></body></html>",
        );
        let doc = HtmlExtractor::default()
            .extract(html.as_bytes())
            .expect("extract failed");

        assert_eq!(doc.title, "Willkommen & Gruesse");
        assert_eq!(doc.description, "Die Startseite");
        assert_eq!(doc.keywords, "start, home");
        assert_eq!(doc.body, "Start Muenchen ist schoen");
    }

    #[test]
    fn remove_blocks_handle_nesting() {
        let config = HtmlTransformConfig {
            remove_blocks: strings(&["div"]),
            ..HtmlTransformConfig::default()
        };
        let html = "a<div>b<div>c</div>d</div>e";
        assert_eq!(transform(html, &config), "a e");
    }

    #[test]
    fn unclosed_block_falls_back_to_plain_text() {
        let config = HtmlTransformConfig {
            remove_blocks: strings(&["div"]),
            ..HtmlTransformConfig::default()
        };
        assert_eq!(transform("a<div>b c", &config), "a b c");
    }

    #[test]
    fn malformed_markup_does_not_panic() {
        let config = HtmlTransformConfig::body();
        assert_eq!(transform("1 < 2 and <p", &config), "1 < 2 and <p");
        assert_eq!(transform("x <!-- open", &config), "x <!-- open");
        assert_eq!(transform("<a href=\"x>y", &config), "y");
        assert_eq!(transform("<>", &config), "<>");
    }

    #[test]
    fn unknown_tags_pass_through_without_defaults() {
        let config = HtmlTransformConfig {
            remove_tags: strings(&["p"]),
            use_defaults: false,
            replacements: Vec::new(),
            ..HtmlTransformConfig::default()
        };
        assert_eq!(
            transform("<p>x <custom>y</custom></p>", &config),
            "x <custom>y</custom>"
        );
    }

    #[test]
    fn replace_tag_without_condition_uses_attribute() {
        let config = HtmlTransformConfig {
            replace_tags: vec![ReplaceTag {
                tag: "img".to_string(),
                attribute: "alt".to_string(),
                when: None,
            }],
            ..HtmlTransformConfig::default()
        };
        assert_eq!(
            transform("Logo: <img src='l.png' alt='Firma'> ok", &config),
            "Logo: Firma ok"
        );
    }

    #[test]
    fn config_loads_from_toml() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("title.toml");
        fs::write(&path, concat!(
            "remove_blocks = [\"body\"]\n",
            "replacements = [[\"foo\", \"bar\"]]\n",
        )).expect("write failed");

        let config = HtmlTransformConfig::load_or(
            &path,
            HtmlTransformConfig::default(),
        ).expect("load failed");
        assert_eq!(config.remove_blocks, strings(&["body"]));
        assert!(config.use_defaults);
        assert_eq!(
            config.replacements,
            vec![("foo".to_string(), "bar".to_string())]
        );

        let missing = HtmlTransformConfig::load_or(
            &dir.path().join("none.toml"),
            HtmlTransformConfig::title(),
        ).expect("load failed");
        assert_eq!(missing, HtmlTransformConfig::title());
    }

    #[test]
    fn latin1_bytes_are_decoded() {
        let bytes = b"<p>Gr\xfc\xdfe</p>";
        let doc = HtmlExtractor::default()
            .extract(bytes)
            .expect("extract failed");
        assert_eq!(doc.body, "Gruesse");
    }
}
