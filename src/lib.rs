/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 公開サイトの全文検索インデックス構築と検索を提供するライブラリ
//!
//! 公開URLの取得、HTML/PDFからのテキスト抽出、インデックスの更新と検索を
//! モジュール単位で提供する。
//!

pub mod cancel;
pub mod extract;
pub mod index;
pub mod query;
pub mod search;
pub mod worker;

pub use cancel::CancelFlag;
pub use extract::{
    ContentExtractor, ExtractError, ExtractedDocument, ExtractorSet,
};
pub use index::{DocumentRecord, IndexConfig, IndexError, IndexWriterSession};
pub use query::sanitize;
pub use search::{
    SearchError, SearchHit, SearchMethod, SearchQuery, SearchResultPage,
    SearchService, SortKey,
};
pub use worker::{
    IndexRunStatus, ModuleConfig, RunError, RunHandle, RunRegistry, RunState,
};
