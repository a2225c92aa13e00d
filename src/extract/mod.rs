/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 文書からのテキスト抽出
//!

pub(crate) mod fold;
pub mod html;
pub mod pdf;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::cancel::CancelFlag;
pub use html::{AttrCondition, HtmlExtractor, HtmlTransformConfig, ReplaceTag};
pub use pdf::PdfExtractor;

///
/// 抽出処理のエラー
///
/// いずれも文書単位(もしくはフィールド単位)のエラーで、インデックス作成
/// 処理全体を失敗させるものではない。
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("truncated input: {what}")]
    TruncatedInput { what: String },

    #[error("invalid date: {0}")]
    DateParseFailed(String),

    #[error("invalid parser config {}: {reason}", path.display())]
    InvalidConfig { path: PathBuf, reason: String },
}

///
/// 抽出結果
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedDocument {
    /// タイトル
    pub title: String,

    /// キーワード
    pub keywords: String,

    /// 概要
    pub description: String,

    /// 本文
    pub body: String,

    /// 作成者(PDFのみ)
    pub author: String,

    /// 作成日時(PDFのみ)
    pub created: Option<NaiveDateTime>,

    /// 読み取りに失敗したフィールドのエラー
    pub field_errors: Vec<ExtractError>,
}

///
/// コンテンツタイプに応じた抽出器
///
#[derive(Clone, Debug)]
pub enum ContentExtractor {
    Html(HtmlExtractor),
    Pdf(PdfExtractor),
}

impl ContentExtractor {
    ///
    /// 文書の抽出
    ///
    /// # 引数
    /// * `bytes` - 文書のバイト列
    /// * `cancel` - 中断要求フラグ(PDFの走査中に参照する)
    ///
    /// # 戻り値
    /// 抽出結果
    ///
    pub fn extract(&self, bytes: &[u8], cancel: &CancelFlag)
        -> Result<ExtractedDocument, ExtractError>
    {
        match self {
            Self::Html(extractor) => extractor.extract(bytes),
            Self::Pdf(extractor) => extractor.extract(bytes, cancel),
        }
    }
}

///
/// 対応する全ての抽出器の組
///
#[derive(Clone, Debug)]
pub struct ExtractorSet {
    html: ContentExtractor,
    pdf: ContentExtractor,
}

impl ExtractorSet {
    ///
    /// 抽出器の組の生成
    ///
    pub fn new(html: HtmlExtractor, pdf: PdfExtractor) -> Self {
        Self {
            html: ContentExtractor::Html(html),
            pdf: ContentExtractor::Pdf(pdf),
        }
    }

    ///
    /// 設定を読み込んで抽出器の組を生成する
    ///
    /// # 引数
    /// * `parser_config` - HTML変換設定のディレクトリ
    /// * `descriptor_limit` - PDFの内容ストリーム辞書の長さの上限
    ///
    /// # 戻り値
    /// 生成した抽出器の組
    ///
    pub fn load(parser_config: Option<&Path>, descriptor_limit: usize)
        -> Result<Self, ExtractError>
    {
        Ok(Self::new(
            HtmlExtractor::load(parser_config)?,
            PdfExtractor::new(descriptor_limit),
        ))
    }

    ///
    /// コンテンツタイプから抽出器を選択する
    ///
    /// # 概要
    /// `text/html`はHTML、`application/pdf`はPDFの抽出器を返す。パラメータ
    /// (`; charset=...`)と大文字小文字の違いは無視する。
    ///
    /// # 引数
    /// * `content_type` - コンテンツタイプ
    ///
    /// # 戻り値
    /// 選択した抽出器。対象外のコンテンツタイプの場合は
    /// `ExtractError::UnsupportedContentType`
    ///
    pub fn for_content_type(&self, content_type: &str)
        -> Result<&ContentExtractor, ExtractError>
    {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/html" => Ok(&self.html),
            "application/pdf" => Ok(&self.pdf),
            _ => Err(ExtractError::UnsupportedContentType(content_type.to_string())),
        }
    }
}

// Defaultトレイトの実装
impl Default for ExtractorSet {
    fn default() -> Self {
        Self::new(HtmlExtractor::default(), PdfExtractor::default())
    }
}
