/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 結合テスト用の共通ヘルパー
//!

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Condvar, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use url::Url;

use sitesearch::worker::{FetchError, FetchedContent, Fetcher, SiteContext};
use sitesearch::{IndexRunStatus, ModuleConfig, RunHandle, RunRegistry};

/// テスト用サイトのURL
pub const SITE: &str = "http://www.example.com/";

///
/// 取得を一時停止させるためのゲート
///
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
    waiting: Mutex<usize>,
    arrived: Condvar,
}

impl Gate {
    ///
    /// ゲートを開いて待機中の取得を再開させる
    ///
    pub fn open(&self) {
        *self.open.lock().expect("gate lock") = true;
        self.changed.notify_all();
    }

    ///
    /// いずれかの取得がゲートに到達するまで待つ
    ///
    pub fn wait_arrival(&self) {
        let mut waiting = self.waiting.lock().expect("gate lock");
        while *waiting == 0 {
            waiting = self.arrived.wait(waiting).expect("gate wait");
        }
    }

    fn pass(&self) {
        {
            let mut waiting = self.waiting.lock().expect("gate lock");
            *waiting += 1;
            self.arrived.notify_all();
        }

        let mut open = self.open.lock().expect("gate lock");
        while !*open {
            open = self.changed.wait(open).expect("gate wait");
        }
    }
}

/// 取得の直前に呼び出す処理
type FetchHook = Box<dyn Fn(&Url) + Send + Sync>;

///
/// メモリ上の文書を返す取得処理
///
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, FetchedContent>,
    gate: Option<Arc<Gate>>,
    hook: Option<FetchHook>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// 取得の度にゲートで待たせる
    ///
    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    ///
    /// 取得の度に任意の処理を呼び出す
    ///
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Url) + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    ///
    /// HTML文書の登録
    ///
    pub fn html(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), FetchedContent {
            bytes: html.as_bytes().to_vec(),
            content_type: "text/html; charset=utf-8".to_string(),
            last_modified: None,
        });
        self
    }

    ///
    /// 最終更新日時付きのHTML文書の登録
    ///
    pub fn html_at(mut self, url: &str, html: &str, modified: DateTime<Utc>) -> Self {
        self.pages.insert(url.to_string(), FetchedContent {
            bytes: html.as_bytes().to_vec(),
            content_type: "text/html".to_string(),
            last_modified: Some(modified),
        });
        self
    }

    ///
    /// 任意の種別の文書の登録
    ///
    pub fn raw(mut self, url: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.pages.insert(url.to_string(), FetchedContent {
            bytes: bytes.to_vec(),
            content_type: content_type.to_string(),
            last_modified: None,
        });
        self
    }

    ///
    /// これまでに要求されたURL
    ///
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError> {
        self.requests.lock().expect("requests lock").push(url.to_string());

        if let Some(gate) = &self.gate {
            gate.pass();
        }

        if let Some(hook) = &self.hook {
            hook(url);
        }

        self.pages.get(url.as_str()).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

///
/// テスト用HTML文書の生成
///
pub fn html_page(title: &str, description: &str, body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html><head><title>{}</title>",
            "<meta name=\"description\" content=\"{}\">",
            "<meta name=\"keywords\" content=\"test\">",
            "</head><body><p>{}</p></body></html>",
        ),
        title, description, body,
    )
}

///
/// 日時の生成
///
pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid date")
}

///
/// 一時ディレクトリ上のモジュール設定の生成
///
/// # 戻り値
/// (一時ディレクトリ, モジュール設定)
///
pub fn temp_module() -> (TempDir, ModuleConfig) {
    let dir = TempDir::new().expect("temp dir");
    let module = ModuleConfig::new(dir.path().join("index"));
    (dir, module)
}

///
/// テスト用サイトの情報
///
pub fn site() -> SiteContext {
    SiteContext::new(Some(Url::parse(SITE).expect("site url")), false)
}

///
/// インデックス作成を行い終了を待つ
///
pub fn run_to_end(
    registry: &RunRegistry,
    module: &ModuleConfig,
    fetcher: Arc<dyn Fetcher>,
    urls: &[&str],
) -> IndexRunStatus {
    start(registry, module, fetcher, urls).wait()
}

///
/// インデックス作成の開始
///
pub fn start(
    registry: &RunRegistry,
    module: &ModuleConfig,
    fetcher: Arc<dyn Fetcher>,
    urls: &[&str],
) -> RunHandle {
    registry.start(module, fetcher, &site(), urls).expect("start failed")
}

///
/// テスト対象バイナリのパスを返す
///
pub fn test_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sitesearch"))
}

///
/// バイナリの実行
///
/// # 概要
/// 設定ファイルとログの出力先を一時ディレクトリに閉じ込めて実行する。
///
/// # 引数
/// * `base` - 一時ディレクトリ
/// * `args` - サブコマンド以降の引数
///
pub fn run_cli(base: &Path, args: &[&str]) -> Output {
    Command::new(test_binary_path())
        .env("HOME", base)
        .env("XDG_CONFIG_HOME", base.join("config"))
        .env("XDG_DATA_HOME", base.join("data"))
        .arg("--log-output")
        .arg(base.join("log"))
        .arg("--index-dir")
        .arg(base.join("index"))
        .args(args)
        .output()
        .expect("run binary failed")
}
