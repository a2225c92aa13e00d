/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 文書の取得
//!

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use thiserror::Error;
use url::Url;

/// 既定のタイムアウト
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

///
/// 文書取得のエラー
///
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

///
/// 取得した文書
///
#[derive(Clone, Debug, Default)]
pub struct FetchedContent {
    /// 文書のバイト列
    pub bytes: Vec<u8>,

    /// コンテンツタイプ
    pub content_type: String,

    /// 最終更新日時(判明している場合)
    pub last_modified: Option<DateTime<Utc>>,
}

///
/// URLから文書を取得する機能のトレイト
///
/// インデックス作成処理はワーカースレッド上からこのトレイトを通して文書を
/// 取得する。失敗した文書は再試行せずに読み飛ばされる。
///
pub trait Fetcher: Send + Sync {
    ///
    /// 文書の取得
    ///
    /// # 引数
    /// * `url` - 取得するURL
    ///
    /// # 戻り値
    /// 取得した文書
    ///
    fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError>;
}

///
/// HTTPによる文書取得
///
/// # 注意
/// ブロッキングAPIを使用するため、非同期ランタイムの外で生成および破棄
/// すること。
///
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    ///
    /// HTTPクライアントの生成
    ///
    /// # 引数
    /// * `timeout` - 1リクエストあたりのタイムアウト
    ///
    /// # 戻り値
    /// 生成したオブジェクト
    ///
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Request {
                url: String::new(),
                reason: err.to_string(),
            })?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError> {
        let request_error = |err: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            reason: err.to_string(),
        };

        let response = self.client.get(url.clone())
            .send()
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        /*
         * ヘッダの読み取り
         */
        let content_type = response.headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .unwrap_or_else(|| guess_content_type(url));

        let last_modified = response.headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|time| time.with_timezone(&Utc));

        let bytes = response.bytes().map_err(request_error)?.to_vec();

        Ok(FetchedContent { bytes, content_type, last_modified })
    }
}

///
/// URLのパスからコンテンツタイプを推定する
///
pub fn guess_content_type(url: &Url) -> String {
    mime_guess::from_path(url.path())
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_is_guessed_from_path() {
        let url = Url::parse("http://example.com/docs/a.PDF").expect("url");
        assert_eq!(guess_content_type(&url), "application/pdf");

        let url = Url::parse("http://example.com/index.html").expect("url");
        assert_eq!(guess_content_type(&url), "text/html");

        let url = Url::parse("http://example.com/data").expect("url");
        assert_eq!(guess_content_type(&url), "application/octet-stream");
    }
}
