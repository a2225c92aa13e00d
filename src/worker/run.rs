/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! ワーカースレッド上で行う1回分のインデックス作成処理
//!

use std::sync::Arc;

use log::{debug, info, warn};
use url::Url;

use super::{Fetcher, ModuleConfig, RunShared, RunState};
use crate::extract::{ContentExtractor, ExtractorSet};
use crate::index::{
    recreate_index, DocumentRecord, IndexError, IndexWriterSession,
};

/// 「見つからない」ページとみなす本文中の文字列
const NOT_FOUND_MARKERS: &[&str] = &[
    "Not Found (404)",
    "HTTP Status 404",
    "Error 404",
];

/// インデックスの再作成による再試行を含めた最大試行回数
const MAX_ATTEMPTS: usize = 2;

///
/// ワーカースレッドに渡す処理の情報
///
pub(super) struct RunContext {
    pub(super) module: ModuleConfig,
    pub(super) fetcher: Arc<dyn Fetcher>,
    pub(super) urls: Vec<Url>,
    pub(super) shared: Arc<RunShared>,
}

///
/// 1件のURLの処理結果
///
enum Outcome {
    Indexed,
    Skipped,
    Cancelled,
}

///
/// インデックス作成処理の本体
///
/// # 概要
/// 終了時に最終状態を共有情報に書き込む。インデックスの破損もしくは書き
/// 込み失敗の場合は一度だけインデックスを作り直して最初からやり直す。
///
pub(super) fn execute(context: RunContext) {
    let shared = context.shared.clone();

    let extractors = match ExtractorSet::load(
        context.module.parser_config_directory.as_deref(),
        context.module.pdf_descriptor_limit,
    ) {
        Ok(extractors) => extractors,
        Err(err) => {
            warn!("index run {} failed: {}", shared.id, err);
            shared.update(|status| {
                status.state = RunState::Failed { error: err.to_string() };
            });
            return;
        }
    };

    let mut attempt = 1;
    let state = loop {
        match process(&context, &extractors) {
            Ok(cancelled) => break RunState::Done { cancelled },

            Err(err) if attempt < MAX_ATTEMPTS && err.is_recoverable() => {
                warn!("index error ({}), recreate index and retry", err);

                if let Err(err) = recreate_index(&context.module.index_config()) {
                    break RunState::Failed { error: err.to_string() };
                }

                shared.update(|status| {
                    status.urls_processed = 0;
                    status.urls_skipped = 0;
                });
                attempt += 1;
            }

            Err(err) => break RunState::Failed { error: err.to_string() },
        }
    };

    match &state {
        RunState::Failed { error } => {
            warn!("index run {} failed: {}", shared.id, error);
        }
        _ => {
            let status = shared.status();
            info!(
                "index run {} finished: {}/{} urls, {} skipped{}",
                shared.id,
                status.urls_processed,
                status.urls_total,
                status.urls_skipped,
                if state == (RunState::Done { cancelled: true }) {
                    " (cancelled)"
                } else {
                    ""
                },
            );
        }
    }

    shared.update(|status| status.state = state);
}

///
/// 全URLを1回処理する
///
/// # 戻り値
/// キャンセルにより中断した場合は`true`
///
fn process(context: &RunContext, extractors: &ExtractorSet) -> Result<bool, IndexError> {
    let shared = &context.shared;
    let cancel = shared.cancel_flag();
    let mut session = IndexWriterSession::open_or_create(
        &context.module.index_config(),
    )?;

    for url in &context.urls {
        let outcome = index_url(context, extractors, &mut session, url)?;

        if let Outcome::Cancelled = outcome {
            info!("index run {}: cancellation observed", shared.id);
            session.close()?;
            return Ok(true);
        }

        shared.update(|status| {
            status.urls_processed += 1;
            if let Outcome::Skipped = outcome {
                status.urls_skipped += 1;
            }
        });
    }

    if cancel.is_cancelled() {
        session.close()?;
        return Ok(true);
    }

    session.optimize()?;
    session.close()?;

    Ok(false)
}

///
/// 1件のURLを取得、抽出してインデックスに登録する
///
fn index_url(
    context: &RunContext,
    extractors: &ExtractorSet,
    session: &mut IndexWriterSession,
    url: &Url,
) -> Result<Outcome, IndexError> {
    let cancel = context.shared.cancel_flag();
    if cancel.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }

    let record = match build_record(context, extractors, url) {
        Some(record) => record,
        None => return Ok(Outcome::Skipped),
    };

    // 抽出中に要求された中断は書き込み前に反映する
    if cancel.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }

    let removed = session.delete_by_url(&record.url)?;
    session.add_document(&record)?;
    debug!("indexed {} (replaced {})", record.url, removed);

    Ok(Outcome::Indexed)
}

///
/// 文書を取得して登録用の文書を組み立てる
///
/// # 戻り値
/// 登録しない文書の場合は`None`
///
fn build_record(
    context: &RunContext,
    extractors: &ExtractorSet,
    url: &Url,
) -> Option<DocumentRecord> {
    /*
     * 取得
     */
    let fetched = match context.fetcher.fetch(url) {
        Ok(fetched) => fetched,
        Err(err) => {
            warn!("skip {}: {}", url, err);
            return None;
        }
    };

    /*
     * 抽出
     */
    let extractor = match extractors.for_content_type(&fetched.content_type) {
        Ok(extractor) => extractor,
        Err(err) => {
            debug!("skip {}: {}", url, err);
            return None;
        }
    };

    // 拡張子に関わらず、PDFとして返された文書も設定に従う
    if matches!(extractor, ContentExtractor::Pdf(_)) && !context.module.index_pdfs {
        debug!("skip {}: pdf indexing disabled", url);
        return None;
    }

    let doc = match extractor.extract(&fetched.bytes, context.shared.cancel_flag()) {
        Ok(doc) => doc,
        Err(err) => {
            warn!("skip {}: {}", url, err);
            return None;
        }
    };

    for err in &doc.field_errors {
        debug!("{}: {}", url, err);
    }

    if NOT_FOUND_MARKERS.iter().any(|marker| doc.body.contains(marker)) {
        info!("skip {}: not found page", url);
        return None;
    }

    Some(DocumentRecord {
        url: url.to_string(),
        title: doc.title,
        keywords: doc.keywords,
        description: doc.description,
        body: doc.body,
        size_bytes: fetched.bytes.len() as u64,
        last_modified: fetched.last_modified
            .or_else(|| doc.created.map(|created| created.and_utc())),
    })
}
