/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 全文検索インデックスの管理
//!

mod session;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use tantivy::collector::Count;
use tantivy::query::TermQuery;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST,
    INDEXED, STORED, STRING,
};
use tantivy::tokenizer::{
    AsciiFoldingFilter, Language, LowerCaser, RemoveLongFilter,
    SimpleTokenizer, Stemmer, TextAnalyzer,
};
use tantivy::{Index, IndexWriter, TantivyDocument, TantivyError, Term};
use thiserror::Error;

pub use session::{IndexWriterSession, SessionState};

/// インデックスライタに割り当てるヒープサイズ
pub(crate) const WRITER_HEAP_SIZE: usize = 50_000_000;

/// 長すぎるトークンを除外する閾値
const MAX_TOKEN_LENGTH: usize = 40;

///
/// インデックス操作のエラー
///
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot open index at {}: {reason}", path.display())]
    OpenFailed { path: PathBuf, reason: String },

    #[error("corrupt index at {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("index write failed: {0}")]
    WriteFailed(String),

    #[error("invalid session operation: {0}")]
    Precondition(String),
}

impl IndexError {
    ///
    /// インデックスの再作成で回復を試みるべきエラーか否か
    ///
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CorruptIndex { .. } | Self::WriteFailed(_))
    }

    fn open_failed<E: ToString>(path: &Path, err: E) -> Self {
        Self::OpenFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    fn corrupt<E: ToString>(path: &Path, err: E) -> Self {
        Self::CorruptIndex {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    ///
    /// インデックスを開く処理で発生したtantivyのエラーを分類する
    ///
    /// # 概要
    /// ロック取得の失敗(他のライタが存在する)は再作成で回復すべきではない
    /// ため`OpenFailed`、それ以外は`CorruptIndex`とする。
    ///
    pub(crate) fn from_open(path: &Path, err: TantivyError) -> Self {
        match err {
            TantivyError::LockFailure(..) => Self::open_failed(path, err),
            err => Self::corrupt(path, err),
        }
    }
}

///
/// 利用するトークナイザ(ステミング言語)の種別
///
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    #[default]
    German,
    English,
}

impl TokenizerKind {
    ///
    /// トークナイザ登録名を返す
    ///
    /// # 戻り値
    /// トークナイザ登録名
    ///
    pub fn name(&self) -> &'static str {
        match self {
            Self::German => "sitesearch_german",
            Self::English => "sitesearch_english",
        }
    }

    fn language(&self) -> Language {
        match self {
            Self::German => Language::German,
            Self::English => Language::English,
        }
    }
}

// AsRefトレイトの実装
impl AsRef<str> for TokenizerKind {
    fn as_ref(&self) -> &str {
        match self {
            Self::German => "german",
            Self::English => "english",
        }
    }
}

///
/// 全文検索インデックスの設定情報
///
#[derive(Clone, Debug)]
pub struct IndexConfig {
    index_path: PathBuf,
    tokenizer_kind: TokenizerKind,
}

impl IndexConfig {
    ///
    /// 設定情報の生成
    ///
    /// # 引数
    /// * `index_path` - インデックス格納ディレクトリのパス
    /// * `tokenizer_kind` - 本文に適用するトークナイザ
    ///
    /// # 戻り値
    /// 生成した設定情報
    ///
    pub fn new(index_path: PathBuf, tokenizer_kind: TokenizerKind) -> Self {
        Self { index_path, tokenizer_kind }
    }

    ///
    /// インデックス格納パスへのアクセサ
    ///
    /// # 戻り値
    /// インデックス格納パス
    ///
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    ///
    /// トークナイザ種別へのアクセサ
    ///
    pub fn tokenizer_kind(&self) -> TokenizerKind {
        self.tokenizer_kind
    }
}

///
/// インデックスに登録する文書
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentRecord {
    /// 文書のURL(一意キー)
    pub url: String,

    /// タイトル
    pub title: String,

    /// キーワード
    pub keywords: String,

    /// 概要
    pub description: String,

    /// 本文
    pub body: String,

    /// 取得時のバイト数
    pub size_bytes: u64,

    /// 最終更新日時
    pub last_modified: Option<DateTime<Utc>>,
}

///
/// 全文検索スキーマ情報
///
#[derive(Clone, Debug)]
pub(crate) struct IndexSchema {
    pub(crate) schema: Schema,
    pub(crate) url: Field,
    pub(crate) title: Field,
    pub(crate) keywords: Field,
    pub(crate) description: Field,
    pub(crate) body: Field,
    pub(crate) size_bytes: Field,
    pub(crate) last_modified: Field,
}

impl IndexSchema {
    ///
    /// 新規インデックス用のスキーマ生成
    ///
    /// # 概要
    /// URLと短いメタデータは分かち書きしない単一の語として、本文は指定の
    /// トークナイザで索引付けする。
    ///
    /// # 引数
    /// * `tokenizer_name` - 本文に適用するトークナイザ名
    ///
    /// # 戻り値
    /// 構築済みスキーマ
    ///
    pub(crate) fn build(tokenizer_name: &str) -> Self {
        let mut builder = Schema::builder();

        /*
         * 本文フィールド設定
         */
        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer(tokenizer_name)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default()
            .set_indexing_options(text_indexing)
            .set_stored();

        /*
         * 各フィールドの定義
         */
        let url = builder.add_text_field("url", STRING | STORED);
        let title = builder.add_text_field("title", STRING | STORED);
        let keywords = builder.add_text_field("keywords", STRING | STORED);
        let description = builder.add_text_field("description", STRING | STORED);
        let body = builder.add_text_field("body", text_options);
        let size_bytes = builder.add_u64_field("size_bytes", STORED);
        let last_modified = builder.add_i64_field(
            "last_modified",
            INDEXED | STORED | FAST,
        );

        Self {
            schema: builder.build(),
            url,
            title,
            keywords,
            description,
            body,
            size_bytes,
            last_modified,
        }
    }

    ///
    /// 既存インデックスからスキーマを復元
    ///
    /// # 引数
    /// * `index` - インデックス
    /// * `path` - インデックス格納パス(エラー報告用)
    ///
    /// # 戻り値
    /// 参照に成功したスキーマ
    ///
    pub(crate) fn from_index(index: &Index, path: &Path) -> Result<Self, IndexError> {
        let schema = index.schema();
        let field = |name: &str| {
            schema.get_field(name).map_err(|err| IndexError::corrupt(path, err))
        };

        Ok(Self {
            url: field("url")?,
            title: field("title")?,
            keywords: field("keywords")?,
            description: field("description")?,
            body: field("body")?,
            size_bytes: field("size_bytes")?,
            last_modified: field("last_modified")?,
            schema,
        })
    }

    ///
    /// 登録用ドキュメントの構築
    ///
    /// # 概要
    /// 最終更新日時が不明な場合は0(エポック)を格納する。日付順の並べ替え
    /// で全ての文書が値を持つようにするため。
    ///
    pub(crate) fn to_document(&self, record: &DocumentRecord) -> TantivyDocument {
        let mut doc = TantivyDocument::default();

        doc.add_text(self.url, &record.url);
        doc.add_text(self.title, &record.title);
        doc.add_text(self.keywords, &record.keywords);
        doc.add_text(self.description, &record.description);
        doc.add_text(self.body, &record.body);
        doc.add_u64(self.size_bytes, record.size_bytes);
        doc.add_i64(
            self.last_modified,
            record.last_modified.map(|time| time.timestamp()).unwrap_or(0),
        );

        doc
    }

    ///
    /// URLの検索語
    ///
    pub(crate) fn url_term(&self, url: &str) -> Term {
        Term::from_field_text(self.url, url)
    }
}

///
/// 本文用トークナイザの登録
///
/// # 引数
/// * `index` - 登録先のインデックス
/// * `kind` - トークナイザ種別
///
pub(crate) fn register_tokenizer(index: &Index, kind: TokenizerKind) {
    let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
        .filter(LowerCaser)
        .filter(AsciiFoldingFilter)
        .filter(Stemmer::new(kind.language()))
        .build();

    index.tokenizers().register(kind.name(), analyzer);
}

///
/// インデックスが初期化済みか否か
///
/// # 概要
/// ディレクトリが存在しない場合と、存在するが空(メタ情報が無い)場合は
/// いずれも未初期化として扱う。
///
pub(crate) fn is_initialized(path: &Path) -> bool {
    path.join("meta.json").is_file()
}

///
/// インデックスを開く(未作成なら生成)
///
/// # 引数
/// * `config` - インデックス設定
///
/// # 戻り値
/// トークナイザ登録済みのインデックスとスキーマ
///
pub(crate) fn open_or_create(config: &IndexConfig)
    -> Result<(Index, IndexSchema), IndexError>
{
    let path = config.index_path();

    if !is_initialized(path) {
        return create(config);
    }

    let index = Index::open_in_dir(path)
        .map_err(|err| IndexError::from_open(path, err))?;
    register_tokenizer(&index, config.tokenizer_kind());
    let schema = IndexSchema::from_index(&index, path)?;

    Ok((index, schema))
}

///
/// 空のインデックスを生成する
///
/// # 概要
/// 生成直後に空のコミットと最適化を行い、検索可能な状態にする。
///
fn create(config: &IndexConfig) -> Result<(Index, IndexSchema), IndexError> {
    let path = config.index_path();
    info!("create index at {}", path.display());

    fs::create_dir_all(path)
        .map_err(|err| IndexError::open_failed(path, err))?;

    /*
     * インデックスの生成
     */
    let schema = IndexSchema::build(config.tokenizer_kind().name());
    let index = Index::create_in_dir(path, schema.schema.clone())
        .map_err(|err| IndexError::open_failed(path, err))?;
    register_tokenizer(&index, config.tokenizer_kind());

    /*
     * 初期コミットと最適化
     */
    let mut writer: IndexWriter = index.writer(WRITER_HEAP_SIZE)
        .map_err(|err| IndexError::from_open(path, err))?;
    writer.commit()
        .map_err(|err| IndexError::WriteFailed(err.to_string()))?;
    merge_segments(&index, &mut writer)?;
    writer.wait_merging_threads()
        .map_err(|err| IndexError::WriteFailed(err.to_string()))?;

    Ok((index, schema))
}

///
/// 全セグメントを1つに統合する
///
/// # 引数
/// * `index` - 対象インデックス
/// * `writer` - インデックスライタ
///
pub(crate) fn merge_segments(index: &Index, writer: &mut IndexWriter)
    -> Result<(), IndexError>
{
    let segment_ids = index.searchable_segment_ids()
        .map_err(|err| IndexError::WriteFailed(err.to_string()))?;

    if segment_ids.len() > 1 {
        writer.merge(&segment_ids)
            .wait()
            .map_err(|err| IndexError::WriteFailed(err.to_string()))?;
    }

    Ok(())
}

///
/// インデックスを空の状態で作り直す
///
/// # 概要
/// 既存のディレクトリを削除して空のインデックスを生成する。実行中の
/// インデックス作成処理との排他は呼び出し側(`RunRegistry`)で行う。
///
/// # 引数
/// * `config` - インデックス設定
///
pub fn recreate_index(config: &IndexConfig) -> Result<(), IndexError> {
    let path = config.index_path();

    if path.exists() {
        info!("remove index at {}", path.display());
        fs::remove_dir_all(path)
            .map_err(|err| IndexError::open_failed(path, err))?;
    }

    create(config).map(|_| ())
}

///
/// 指定URLの文書数を数える
///
/// # 引数
/// * `config` - インデックス設定
/// * `url` - 対象URL
///
/// # 戻り値
/// コミット済みの文書のうちURLが一致するものの数
///
pub fn count_documents(config: &IndexConfig, url: &str) -> Result<usize, IndexError> {
    let path = config.index_path();
    if !is_initialized(path) {
        return Ok(0);
    }

    let index = Index::open_in_dir(path)
        .map_err(|err| IndexError::from_open(path, err))?;
    let schema = IndexSchema::from_index(&index, path)?;
    let reader = index.reader()
        .map_err(|err| IndexError::corrupt(path, err))?;
    let query = TermQuery::new(schema.url_term(url), IndexRecordOption::Basic);

    reader.searcher()
        .search(&query, &Count)
        .map_err(|err| IndexError::corrupt(path, err))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &TempDir) -> IndexConfig {
        IndexConfig::new(dir.path().join("index"), TokenizerKind::German)
    }

    #[test]
    fn missing_directory_is_bootstrapped() {
        let dir = TempDir::new().expect("temp dir");
        let config = config(&dir);

        open_or_create(&config).expect("open failed");
        assert!(is_initialized(config.index_path()));
        assert_eq!(count_documents(&config, "/a.html").expect("count"), 0);
    }

    #[test]
    fn empty_directory_is_bootstrapped() {
        let dir = TempDir::new().expect("temp dir");
        let config = config(&dir);
        fs::create_dir_all(config.index_path()).expect("mkdir");

        open_or_create(&config).expect("open failed");
        assert!(is_initialized(config.index_path()));
    }

    #[test]
    fn corrupt_meta_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let config = config(&dir);
        fs::create_dir_all(config.index_path()).expect("mkdir");
        fs::write(config.index_path().join("meta.json"), b"{ broken")
            .expect("write");

        let err = open_or_create(&config).err().expect("open must fail");
        assert!(matches!(err, IndexError::CorruptIndex { .. }));
        assert!(err.is_recoverable());

        recreate_index(&config).expect("recreate failed");
        open_or_create(&config).expect("open after recreate failed");
    }

    #[test]
    fn unusable_parent_is_open_failure() {
        let dir = TempDir::new().expect("temp dir");
        let file = dir.path().join("plain");
        fs::write(&file, b"x").expect("write");

        let config = IndexConfig::new(file.join("index"), TokenizerKind::English);
        let err = open_or_create(&config).err().expect("open must fail");
        assert!(matches!(err, IndexError::OpenFailed { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn tokenizer_kind_names() {
        assert_eq!(TokenizerKind::German.as_ref(), "german");
        assert_ne!(TokenizerKind::German.name(), TokenizerKind::English.name());
    }
}
