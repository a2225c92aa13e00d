/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 全文検索
//!

pub mod page;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, RegexQuery};
use tantivy::schema::Value;
use tantivy::snippet::SnippetGenerator;
use tantivy::{
    DocAddress, Index, IndexReader, Order, ReloadPolicy, Score, Searcher,
    TantivyDocument,
};
use thiserror::Error;

use crate::index::{is_initialized, register_tokenizer, IndexConfig, IndexSchema};
use crate::query::sanitize;

/// 抜粋の最大文字数
const EXCERPT_LENGTH: usize = 200;

/// 問い合わせ文法の演算子
const OPERATOR_WORDS: &[&str] = &["AND", "OR", "NOT"];

///
/// 検索処理のエラー
///
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("query syntax error: {0}")]
    QuerySyntax(String),

    #[error("search failed: {0}")]
    Engine(String),
}

fn engine_error<E: ToString>(err: E) -> SearchError {
    SearchError::Engine(err.to_string())
}

///
/// 検索語の結合方法
///
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// 全ての語を含む文書
    #[default]
    And,

    /// いずれかの語を含む文書
    Or,

    /// 問い合わせ文法(AND/OR/NOT、括弧、フレーズ等)をそのまま解釈する
    Boolean,
}

// AsRefトレイトの実装
impl AsRef<str> for SearchMethod {
    fn as_ref(&self) -> &str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Boolean => "boolean",
        }
    }
}

///
/// 検索結果の並び順
///
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// 適合度順
    #[default]
    Relevance,

    /// 最終更新日時の新しい順
    Date,
}

// AsRefトレイトの実装
impl AsRef<str> for SortKey {
    fn as_ref(&self) -> &str {
        match self {
            Self::Relevance => "relevance",
            Self::Date => "date",
        }
    }
}

///
/// 検索条件
///
#[derive(Clone, Debug)]
pub struct SearchQuery {
    /// 利用者が入力した問い合わせ文字列
    pub raw_text: String,

    /// 検索語の結合方法
    pub method: SearchMethod,

    /// 並び順
    pub sort: SortKey,

    /// ページ番号(1始まり)
    pub page_number: usize,

    /// 1ページあたりの件数
    pub page_size: usize,

    /// URLの前方一致による絞り込み
    pub restrict_prefix: Option<String>,
}

impl SearchQuery {
    /// 既定の1ページあたりの件数
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    ///
    /// 既定の条件で検索条件を生成する
    ///
    pub fn new<S: Into<String>>(raw_text: S) -> Self {
        Self {
            raw_text: raw_text.into(),
            method: SearchMethod::default(),
            sort: SortKey::default(),
            page_number: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
            restrict_prefix: None,
        }
    }
}

///
/// 検索結果の1件
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub score_percent: u8,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

///
/// 検索結果の1ページ
///
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchResultPage {
    pub items: Vec<SearchHit>,
    pub total_matches: usize,
    pub first_index_on_page: usize,
    pub last_index_on_page: usize,
    pub page_count: usize,
}

///
/// 全文検索サービス
///
/// # 概要
/// 検索毎にインデックスを読み取り専用で開く。書き込み中のインデックスに
/// 対しても検索でき、書き込み側のセグメント統合と競合して読み取りに失敗
/// した場合は一度だけ開き直して再実行する。
///
#[derive(Clone, Debug)]
pub struct SearchService {
    config: IndexConfig,
}

impl SearchService {
    ///
    /// サービスの生成
    ///
    /// # 引数
    /// * `config` - インデックス設定
    ///
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    ///
    /// 検索の実行
    ///
    /// # 引数
    /// * `query` - 検索条件
    ///
    /// # 戻り値
    /// 検索結果のページ。一致する文書が無い場合は空のページ
    ///
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResultPage, SearchError> {
        match self.search_once(query) {
            Err(SearchError::Engine(reason)) => {
                debug!("retry search after reader failure: {}", reason);
                self.search_once(query)
            }
            result => result,
        }
    }

    fn search_once(&self, query: &SearchQuery) -> Result<SearchResultPage, SearchError> {
        let text = sanitize(&query.raw_text);

        /*
         * インデックスのオープン
         */
        let opened = self.open()?;

        if text.is_empty() {
            return Ok(empty_page(query));
        }

        /*
         * クエリの構築
         */
        let engine_query = self.build_query(&opened, &text, query)?;
        let searcher = opened.reader.searcher();

        /*
         * 件数と最高スコアの取得
         */
        let (total, best) = searcher
            .search(&*engine_query, &(Count, TopDocs::with_limit(1)))
            .map_err(engine_error)?;
        let max_score = best.first().map(|(score, _)| *score).unwrap_or(0.0);

        let window = page::window(total, query.page_number, query.page_size);
        let mut result = SearchResultPage {
            items: Vec::new(),
            total_matches: total,
            first_index_on_page: window.first_index,
            last_index_on_page: window.last_index,
            page_count: window.page_count,
        };

        if window.is_empty() {
            return Ok(result);
        }

        /*
         * 表示範囲の文書のみ取得
         */
        let hits = self.collect_window(&searcher, &*engine_query, query.sort, window)?;

        let mut snippets = SnippetGenerator::create(
            &searcher,
            &*engine_query,
            opened.schema.body,
        ).map_err(engine_error)?;
        snippets.set_max_num_chars(EXCERPT_LENGTH);

        for (score, address) in hits {
            let doc: TantivyDocument = searcher.doc(address).map_err(engine_error)?;
            let stored = |field| {
                doc.get_first(field)
                    .and_then(|value| value.as_str())
                    .unwrap_or_default()
                    .to_string()
            };

            let snippet = snippets.snippet_from_doc(&doc);
            let excerpt = match snippet.fragment().trim() {
                "" => stored(opened.schema.description),
                fragment => fragment.to_string(),
            };

            result.items.push(SearchHit {
                url: stored(opened.schema.url),
                title: stored(opened.schema.title),
                excerpt,
                score_percent: score_percent(score, max_score),
                size_bytes: doc.get_first(opened.schema.size_bytes)
                    .and_then(|value| value.as_u64())
                    .unwrap_or(0),
                last_modified: doc.get_first(opened.schema.last_modified)
                    .and_then(|value| value.as_i64())
                    .filter(|seconds| *seconds != 0)
                    .and_then(|seconds| DateTime::from_timestamp(seconds, 0)),
            });
        }

        Ok(result)
    }

    ///
    /// インデックスを読み取り専用で開く
    ///
    fn open(&self) -> Result<OpenedIndex, SearchError> {
        let path = self.config.index_path();
        if !is_initialized(path) {
            return Err(SearchError::IndexUnavailable(
                format!("no index at {}", path.display()),
            ));
        }

        let index = Index::open_in_dir(path)
            .map_err(|err| SearchError::IndexUnavailable(err.to_string()))?;
        register_tokenizer(&index, self.config.tokenizer_kind());

        let schema = IndexSchema::from_index(&index, path)
            .map_err(|err| SearchError::IndexUnavailable(err.to_string()))?;
        let reader: IndexReader = index.reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(engine_error)?;

        Ok(OpenedIndex { index, schema, reader })
    }

    ///
    /// 正規化済みの問い合わせ文字列からクエリを組み立てる
    ///
    fn build_query(&self, opened: &OpenedIndex, text: &str, query: &SearchQuery)
        -> Result<Box<dyn Query>, SearchError>
    {
        let mut parser = QueryParser::for_index(&opened.index, vec![opened.schema.body]);

        let parsed = match query.method {
            SearchMethod::And => {
                parser.set_conjunction_by_default();
                parser.parse_query(&plain_terms(text))
            }
            SearchMethod::Or => parser.parse_query(&plain_terms(text)),
            SearchMethod::Boolean => parser.parse_query(text),
        }.map_err(|err| SearchError::QuerySyntax(err.to_string()))?;

        let prefix = match &query.restrict_prefix {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => return Ok(parsed),
        };

        let pattern = format!("{}.*", regex::escape(prefix));
        let filter = RegexQuery::from_pattern(&pattern, opened.schema.url)
            .map_err(|err| SearchError::QuerySyntax(err.to_string()))?;

        Ok(Box::new(BooleanQuery::new(vec![
            (Occur::Must, parsed),
            (Occur::Must, Box::new(filter)),
        ])))
    }

    ///
    /// 表示範囲の文書のアドレスとスコアを取得する
    ///
    fn collect_window(
        &self,
        searcher: &Searcher,
        query: &dyn Query,
        sort: SortKey,
        window: page::PageWindow,
    ) -> Result<Vec<(Score, DocAddress)>, SearchError> {
        let collector = TopDocs::with_limit(window.limit).and_offset(window.offset);

        match sort {
            SortKey::Relevance => {
                searcher.search(query, &collector).map_err(engine_error)
            }

            SortKey::Date => {
                let by_date = collector
                    .order_by_fast_field::<i64>("last_modified", Order::Desc);
                let hits = searcher.search(query, &by_date).map_err(engine_error)?;

                hits.into_iter()
                    .map(|(_, address)| {
                        let score = query.explain(searcher, address)
                            .map_err(engine_error)?
                            .value();
                        Ok((score, address))
                    })
                    .collect()
            }
        }
    }
}

///
/// 開いたインデックス一式
///
struct OpenedIndex {
    index: Index,
    schema: IndexSchema,
    reader: IndexReader,
}

///
/// 問い合わせ文法の記号を取り除き、語の並びにする
///
/// # 概要
/// 英数字以外を空白に置き換え、演算子として解釈される大文字の
/// AND/OR/NOTは取り除く(検索方法によって語の結合は決まるため)。
///
fn plain_terms(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|word| !OPERATOR_WORDS.contains(word))
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

///
/// 最高スコアに対する百分率
///
fn score_percent(score: Score, max_score: Score) -> u8 {
    if max_score <= 0.0 {
        return 100;
    }

    ((score / max_score) * 100.0).round().clamp(0.0, 100.0) as u8
}

///
/// 一致が無い場合のページ
///
fn empty_page(query: &SearchQuery) -> SearchResultPage {
    let window = page::window(0, query.page_number, query.page_size);

    SearchResultPage {
        first_index_on_page: window.first_index,
        last_index_on_page: window.last_index,
        page_count: window.page_count,
        ..SearchResultPage::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_terms_drop_syntax() {
        assert_eq!(plain_terms("title:\"foo bar\" AND -baz"), "title foo bar baz");
        assert_eq!(plain_terms("alpha OR beta NOT gamma"), "alpha beta gamma");
        assert_eq!(plain_terms("Android ORACLE and"), "android oracle and");
        assert_eq!(plain_terms("(("), "");
        assert_eq!(plain_terms("AND"), "");
    }

    #[test]
    fn score_percent_is_relative_to_best() {
        assert_eq!(score_percent(2.0, 4.0), 50);
        assert_eq!(score_percent(4.0, 4.0), 100);
        assert_eq!(score_percent(5.0, 4.0), 100);
        assert_eq!(score_percent(0.0, 0.0), 100);
    }
}
