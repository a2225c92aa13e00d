/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! バックグラウンドでのインデックス作成処理
//!
//! インデックスのパス毎に実行中の処理を[`RunRegistry`]で管理し、同じパスに
//! 対して同時に複数の処理が走らないようにする。
//!

pub mod fetch;
mod run;
pub mod urls;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use ulid::Ulid;

use crate::cancel::CancelFlag;
use crate::extract::pdf::DEFAULT_DESCRIPTOR_LIMIT;
use crate::index::{recreate_index, IndexConfig, IndexError, TokenizerKind};
pub use fetch::{FetchError, FetchedContent, Fetcher, HttpFetcher};
pub use urls::SiteContext;

///
/// インデックス作成処理のエラー
///
#[derive(Debug, Error)]
pub enum RunError {
    #[error("index run {run_id} is already active on {}", index_path.display())]
    RunConflict { index_path: PathBuf, run_id: RunId },

    #[error("search module is not active")]
    Inactive,

    #[error("cannot spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Index(#[from] IndexError),
}

///
/// モジュール設定
///
/// 処理の開始時に一度だけ参照する。
///
#[derive(Clone, Debug)]
pub struct ModuleConfig {
    /// インデックス作成を有効にするか否か
    pub active: bool,

    /// PDFを対象に含めるか否か
    pub index_pdfs: bool,

    /// インデックスの格納ディレクトリ
    pub index_directory: PathBuf,

    /// HTML変換設定のディレクトリ
    pub parser_config_directory: Option<PathBuf>,

    /// 本文の言語(ステミング)
    pub language: TokenizerKind,

    /// PDFの内容ストリームとみなす辞書の長さの上限
    pub pdf_descriptor_limit: usize,
}

impl ModuleConfig {
    ///
    /// 既定値で設定を生成する
    ///
    /// # 引数
    /// * `index_directory` - インデックスの格納ディレクトリ
    ///
    /// # 戻り値
    /// 生成した設定
    ///
    pub fn new(index_directory: PathBuf) -> Self {
        Self {
            active: true,
            index_pdfs: true,
            index_directory,
            parser_config_directory: None,
            language: TokenizerKind::default(),
            pdf_descriptor_limit: DEFAULT_DESCRIPTOR_LIMIT,
        }
    }

    ///
    /// インデックス設定の取得
    ///
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new(self.index_directory.clone(), self.language)
    }
}

///
/// 処理の識別子
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunId(Ulid);

impl RunId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

// Displayトレイトの実装
impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// 処理の状態
///
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Done { cancelled: bool },
    Failed { error: String },
}

impl RunState {
    ///
    /// 終了状態か否か
    ///
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

///
/// 処理の進捗状況
///
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexRunStatus {
    /// 状態
    #[serde(flatten)]
    pub state: RunState,

    /// 処理を終えたURLの数(読み飛ばしたものを含む)
    pub urls_processed: usize,

    /// 対象URLの総数
    pub urls_total: usize,

    /// 読み飛ばしたURLの数
    pub urls_skipped: usize,
}

impl IndexRunStatus {
    ///
    /// 失敗で終了したか否か
    ///
    pub fn is_failed(&self) -> bool {
        matches!(self.state, RunState::Failed { .. })
    }

    ///
    /// キャンセルにより終了したか否か
    ///
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, RunState::Done { cancelled: true })
    }
}

///
/// ワーカースレッドと呼び出し側で共有する処理の情報
///
#[derive(Debug)]
pub(crate) struct RunShared {
    id: RunId,
    cancel: CancelFlag,
    status: Mutex<IndexRunStatus>,
}

impl RunShared {
    fn new(urls_total: usize) -> Self {
        Self {
            id: RunId::new(),
            cancel: CancelFlag::new(),
            status: Mutex::new(IndexRunStatus {
                state: RunState::Running,
                urls_total,
                ..IndexRunStatus::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexRunStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn status(&self) -> IndexRunStatus {
        self.lock().clone()
    }

    pub(crate) fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub(crate) fn update<F>(&self, func: F)
    where
        F: FnOnce(&mut IndexRunStatus),
    {
        func(&mut self.lock());
    }

    fn request_cancel(&self) {
        self.cancel.cancel();

        let mut status = self.lock();
        if status.state == RunState::Running {
            status.state = RunState::Cancelling;
        }
    }
}

///
/// 開始した処理のハンドル
///
#[derive(Debug)]
pub struct RunHandle {
    index_path: PathBuf,
    shared: Arc<RunShared>,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    ///
    /// 処理の識別子
    ///
    pub fn id(&self) -> RunId {
        self.shared.id
    }

    ///
    /// 対象インデックスのパス
    ///
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    ///
    /// 処理の中断を要求する
    ///
    /// # 概要
    /// ワーカーは処理中の文書の削除/追加を終えてからセッションを閉じ、
    /// `Done { cancelled: true }`で終了する。
    ///
    pub fn cancel(&self) {
        info!("cancel index run {}", self.shared.id);
        self.shared.request_cancel();
    }

    ///
    /// 現在の進捗状況
    ///
    pub fn status(&self) -> IndexRunStatus {
        self.shared.status()
    }

    ///
    /// 処理の終了を待つ
    ///
    /// # 戻り値
    /// 終了時の進捗状況
    ///
    pub fn wait(mut self) -> IndexRunStatus {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("index worker {} panicked", self.shared.id);
                self.shared.update(|status| {
                    status.state = RunState::Failed {
                        error: "worker thread panicked".to_string(),
                    };
                });
            }
        }

        self.shared.status()
    }
}

///
/// 実行中の処理の登録簿
///
/// # 概要
/// インデックスのパス毎に高々1つの処理のみを実行中とする。開始時の確認と
/// 登録は1回のロックの中で行う。
///
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<PathBuf, Arc<RunShared>>>,
}

impl RunRegistry {
    ///
    /// 空の登録簿の生成
    ///
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<RunShared>>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    ///
    /// 実行中の処理があればその識別子を返す
    ///
    fn active_run(
        runs: &HashMap<PathBuf, Arc<RunShared>>,
        key: &Path,
    ) -> Option<RunId> {
        runs.get(key)
            .filter(|shared| !shared.status().state.is_terminal())
            .map(|shared| shared.id)
    }

    ///
    /// インデックス作成処理を開始する
    ///
    /// # 引数
    /// * `module` - モジュール設定
    /// * `fetcher` - 文書の取得に使用するオブジェクト
    /// * `site` - URLの解決に使用するサイト情報
    /// * `urls` - 変更のあったURLの並び
    ///
    /// # 戻り値
    /// 開始した処理のハンドル。同じインデックスに対して実行中の処理がある
    /// 場合は`RunError::RunConflict`
    ///
    pub fn start<S: AsRef<str>>(
        &self,
        module: &ModuleConfig,
        fetcher: Arc<dyn Fetcher>,
        site: &SiteContext,
        urls: &[S],
    ) -> Result<RunHandle, RunError> {
        if !module.active {
            return Err(RunError::Inactive);
        }

        let key = registry_key(&module.index_directory);
        let mut runs = self.lock();

        if let Some(run_id) = Self::active_run(&runs, &key) {
            return Err(RunError::RunConflict { index_path: key, run_id });
        }

        /*
         * ワーカースレッドの起動
         */
        let urls = site.resolve(urls, module.index_pdfs);
        let shared = Arc::new(RunShared::new(urls.len()));
        let context = run::RunContext {
            module: module.clone(),
            fetcher,
            urls,
            shared: shared.clone(),
        };

        let thread = thread::Builder::new()
            .name(format!("sitesearch-index:{}", key.display()))
            .spawn(move || run::execute(context))
            .map_err(RunError::Spawn)?;

        info!(
            "start index run {} on {} ({} urls)",
            shared.id,
            key.display(),
            shared.status().urls_total,
        );

        runs.insert(key.clone(), shared.clone());

        Ok(RunHandle { index_path: key, shared, thread: Some(thread) })
    }

    ///
    /// 指定インデックスで実行中の処理に中断を要求する
    ///
    /// # 戻り値
    /// 実行中の処理があった場合は`true`
    ///
    pub fn cancel(&self, index_path: &Path) -> bool {
        let key = registry_key(index_path);
        let runs = self.lock();

        match runs.get(&key) {
            Some(shared) if !shared.status().state.is_terminal() => {
                info!("cancel index run {}", shared.id);
                shared.request_cancel();
                true
            }
            _ => false,
        }
    }

    ///
    /// 指定インデックスの処理状況を取得する
    ///
    /// # 概要
    /// 終了状態を返した時点でその処理は登録簿から取り除かれ、以降は`Idle`
    /// を返す。
    ///
    pub fn status(&self, index_path: &Path) -> IndexRunStatus {
        let key = registry_key(index_path);
        let mut runs = self.lock();

        let status = match runs.get(&key) {
            Some(shared) => shared.status(),
            None => return IndexRunStatus::default(),
        };

        if status.state.is_terminal() {
            runs.remove(&key);
        }

        status
    }

    ///
    /// 処理が実行中か否か
    ///
    pub fn is_running(&self, index_path: &Path) -> bool {
        Self::active_run(&self.lock(), &registry_key(index_path)).is_some()
    }

    ///
    /// インデックスを空の状態で作り直す
    ///
    /// # 概要
    /// 実行中の処理がある場合は`RunError::RunConflict`を返す。作り直しの
    /// 間は登録簿をロックしたままにし、新たな処理の開始を待たせる。
    ///
    /// # 引数
    /// * `config` - インデックス設定
    ///
    pub fn delete_all(&self, config: &IndexConfig) -> Result<(), RunError> {
        let key = registry_key(config.index_path());
        let runs = self.lock();

        if let Some(run_id) = Self::active_run(&runs, &key) {
            return Err(RunError::RunConflict { index_path: key, run_id });
        }

        recreate_index(config)?;
        drop(runs);

        info!("recreated index at {}", key.display());
        Ok(())
    }
}

///
/// 登録簿のキーとするパス
///
fn registry_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Cancelling.is_terminal());
        assert!(RunState::Done { cancelled: true }.is_terminal());
        assert!(RunState::Failed { error: "x".into() }.is_terminal());
    }

    #[test]
    fn status_serializes_flat() {
        let status = IndexRunStatus {
            state: RunState::Done { cancelled: false },
            urls_processed: 2,
            urls_total: 2,
            urls_skipped: 1,
        };
        let json = serde_json::to_value(&status).expect("serialize");

        assert_eq!(json["state"], "done");
        assert_eq!(json["cancelled"], false);
        assert_eq!(json["urls_skipped"], 1);
    }

    #[test]
    fn unknown_path_is_idle() {
        let registry = RunRegistry::new();
        let path = Path::new("/nonexistent/index");

        assert_eq!(registry.status(path), IndexRunStatus::default());
        assert!(!registry.is_running(path));
        assert!(!registry.cancel(path));
    }

    #[test]
    fn inactive_module_is_rejected() {
        struct NoFetch;
        impl Fetcher for NoFetch {
            fn fetch(&self, url: &url::Url) -> Result<FetchedContent, FetchError> {
                Err(FetchError::Status { url: url.to_string(), status: 404 })
            }
        }

        let mut module = ModuleConfig::new(PathBuf::from("unused-index"));
        module.active = false;

        let result = RunRegistry::new().start(
            &module,
            Arc::new(NoFetch),
            &SiteContext::default(),
            &["/a.html"],
        );
        assert!(matches!(result, Err(RunError::Inactive)));
    }
}
