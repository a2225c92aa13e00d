/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! サブコマンド"search"の実装
//!

use anyhow::{anyhow, Result};

use sitesearch::{
    SearchError, SearchHit, SearchQuery, SearchResultPage, SearchService,
};

use crate::cmd_args::{Options, SearchOpts};
use super::CommandContext;

///
/// "search"コマンド実行コンテキスト
///
struct SearchCommandContext {
    service: SearchService,
    query: SearchQuery,
    json: bool,
}

impl SearchCommandContext {
    ///
    /// コンテキストの生成
    ///
    /// # 引数
    /// * `opts` - コマンドラインオプション
    /// * `sub_opts` - サブコマンドオプション
    ///
    /// # 戻り値
    /// 生成したコンテキスト
    ///
    fn new(opts: &Options, sub_opts: &SearchOpts) -> Self {
        Self {
            service: SearchService::new(opts.index_config()),
            query: sub_opts.to_query(),
            json: sub_opts.is_json(),
        }
    }

    ///
    /// 検索結果のテキスト表示
    ///
    fn print_page(&self, page: &SearchResultPage) {
        if page.total_matches == 0 {
            println!("no matches");
            return;
        }

        if page.items.is_empty() {
            println!(
                "{} matches, page {} is out of range (1-{})",
                page.total_matches,
                self.query.page_number,
                page.page_count,
            );
            return;
        }

        println!(
            "{} matches, showing {}-{} (page {}/{})",
            page.total_matches,
            page.first_index_on_page,
            page.last_index_on_page,
            self.query.page_number,
            page.page_count,
        );

        for hit in &page.items {
            print_hit(hit);
        }
    }
}

impl CommandContext for SearchCommandContext {
    ///
    /// コマンドの実行
    ///
    /// # 戻り値
    /// 処理に成功した場合は`Ok(())`
    ///
    fn exec(&self) -> Result<()> {
        /*
         * 検索の実行
         */
        let page = match self.service.search(&self.query) {
            Ok(page) => page,
            Err(SearchError::QuerySyntax(reason)) => {
                return Err(anyhow!("invalid search expression: {}", reason));
            }
            Err(err) => return Err(err.into()),
        };

        /*
         * 検索結果の表示
         */
        if self.json {
            println!("{}", serde_json::to_string_pretty(&page)?);
        } else {
            self.print_page(&page);
        }

        Ok(())
    }
}

///
/// 検索結果1件の表示
///
fn print_hit(hit: &SearchHit) {
    let title = if hit.title.is_empty() {
        "(no title)"
    } else {
        hit.title.as_str()
    };

    let modified = hit.last_modified
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("- {:3}% {}", hit.score_percent, title);
    println!("  {} ({} bytes, {})", hit.url, hit.size_bytes, modified);

    let excerpt = normalize_excerpt(&hit.excerpt);
    if !excerpt.is_empty() {
        println!("  {}", excerpt);
    }
}

///
/// 抜粋文字列の整形
///
/// # 引数
/// * `excerpt` - 抜粋文字列
///
/// # 戻り値
/// 1行にまとめた抜粋
///
fn normalize_excerpt(excerpt: &str) -> String {
    excerpt
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

///
/// コマンドコンテキストの生成
///
/// # 引数
/// * `opts` - コマンドラインオプション
/// * `sub_opts` - サブコマンドオプション
///
/// # 戻り値
/// 生成したコマンドコンテキスト
///
pub(crate) fn build_context(
    opts: &Options,
    sub_opts: &SearchOpts,
) -> Result<Box<dyn CommandContext>> {
    Ok(Box::new(SearchCommandContext::new(opts, sub_opts)))
}
