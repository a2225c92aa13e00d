/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! サブコマンド"index run"の実装
//!

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::info;
use tokio::runtime::Builder;
use tokio::time;

use sitesearch::worker::fetch::DEFAULT_TIMEOUT;
use sitesearch::worker::{Fetcher, HttpFetcher, SiteContext};
use sitesearch::{IndexRunStatus, ModuleConfig, RunHandle, RunRegistry, RunState};

use crate::cmd_args::{IndexRunOpts, Options};
use super::CommandContext;

/// 進捗表示の間隔
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

///
/// "index run"コマンド実行コンテキスト
///
struct IndexRunCommandContext {
    /// モジュール設定
    module: ModuleConfig,

    /// URLの解決に使うサイト情報
    site: SiteContext,

    /// 変更のあったURLの並び
    urls: Vec<String>,
}

impl IndexRunCommandContext {
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
    fn new(opts: &Options, sub_opts: &IndexRunOpts) -> Result<Self> {
        let module = opts.module_config();

        /*
         * URL一覧の集約
         */
        let mut urls = sub_opts.urls();

        if let Some(path) = sub_opts.url_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;

            urls.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string)
            );
        }

        let site = SiteContext::new(
            sub_opts.site_prefix(),
            sub_opts.allow_external(),
        );

        Ok(Self { module, site, urls })
    }
}

// トレイトCommandContextの実装
impl CommandContext for IndexRunCommandContext {
    fn exec(&self) -> Result<()> {
        /*
         * 処理の開始
         */
        // HTTPクライアントはランタイムの外で生成と破棄を行う
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(DEFAULT_TIMEOUT)?);
        let registry = RunRegistry::new();
        let handle = registry.start(
            &self.module,
            fetcher.clone(),
            &self.site,
            &self.urls,
        )?;

        println!("index run {} started", handle.id());

        /*
         * 終了の待ち合わせ
         */
        let rt = Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("tokio runtime")?;

        rt.block_on(watch(&handle))?;
        drop(rt);

        let status = handle.wait();
        drop(fetcher);

        /*
         * 結果の表示
         */
        match &status.state {
            RunState::Failed { error } => {
                Err(anyhow!("index run failed: {}", error))
            }

            RunState::Done { cancelled: true } => {
                // 中断された処理の後始末としてインデックスを空にする
                registry.delete_all(&self.module.index_config())?;
                info!("index cleared after cancellation");
                println!(
                    "cancelled after {} of {} urls, index cleared",
                    status.urls_processed,
                    status.urls_total,
                );
                Ok(())
            }

            _ => {
                println!(
                    "done: {} urls processed, {} skipped",
                    status.urls_processed,
                    status.urls_skipped,
                );
                Ok(())
            }
        }
    }
}

///
/// 処理の終了までの進捗表示と中断要求の受け付け
///
/// # 引数
/// * `handle` - 処理のハンドル
///
async fn watch(handle: &RunHandle) -> Result<()> {
    let mut ticker = time::interval(PROGRESS_INTERVAL);
    let mut last = (usize::MAX, usize::MAX);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("signal handler")?;
                eprintln!("cancel requested, waiting for the worker");
                handle.cancel();
            }

            _ = ticker.tick() => {
                let status = handle.status();

                if (status.urls_processed, status.urls_skipped) != last {
                    last = (status.urls_processed, status.urls_skipped);
                    print_progress(&status);
                }

                if status.state.is_terminal() {
                    return Ok(());
                }
            }
        }
    }
}

fn print_progress(status: &IndexRunStatus) {
    println!(
        "  {}/{} urls ({} skipped)",
        status.urls_processed,
        status.urls_total,
        status.urls_skipped,
    );
}

///
/// コマンドコンテキストの生成
///
pub(crate) fn build_context(opts: &Options, sub_opts: &IndexRunOpts)
    -> Result<Box<dyn CommandContext>>
{
    Ok(Box::new(IndexRunCommandContext::new(opts, sub_opts)?))
}
