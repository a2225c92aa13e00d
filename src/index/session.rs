/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! インデックス書き込みセッション
//!

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, info, warn};
use tantivy::collector::Count;
use tantivy::indexer::NoMergePolicy;
use tantivy::query::TermQuery;
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};

use super::{
    merge_segments, open_or_create, DocumentRecord, IndexConfig, IndexError,
    IndexSchema, WRITER_HEAP_SIZE,
};

///
/// セッションの状態
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Deleting,
    Adding,
    Optimizing,
    Closed,
}

///
/// 1回のインデックス作成処理の書き込みを受け持つセッション
///
/// # 概要
/// 状態は`Open → (Deleting | Adding)* → Optimizing → Closed`と遷移する。
/// 文書の追加は同じURLの削除を済ませた後でなければ受け付けない。
/// `close()`を呼ばずに破棄された場合は未コミットの変更を破棄してライタを
/// 解放する。
///
pub struct IndexWriterSession {
    config: IndexConfig,
    index: Index,
    schema: IndexSchema,
    writer: Option<IndexWriter>,
    reader: IndexReader,
    state: SessionState,

    /// 削除済みで追加を待っているURL
    cleared: HashSet<String>,

    /// このセッションで追加し、まだコミットしていないURL
    pending: HashSet<String>,

    /// このセッションで削除し、まだコミットしていないURL
    purged: HashSet<String>,

    /// 未コミットの変更の有無
    dirty: bool,
}

impl IndexWriterSession {
    ///
    /// セッションを開く
    ///
    /// # 概要
    /// インデックスが存在しない(もしくは空のディレクトリ)場合は空の
    /// インデックスを生成してから開く。
    ///
    /// # 引数
    /// * `config` - インデックス設定
    ///
    /// # 戻り値
    /// 開いたセッション
    ///
    pub fn open_or_create(config: &IndexConfig) -> Result<Self, IndexError> {
        let path = config.index_path();
        let (index, schema) = open_or_create(config)?;

        let writer: IndexWriter = index.writer(WRITER_HEAP_SIZE)
            .map_err(|err| IndexError::from_open(path, err))?;
        // セグメントの統合はoptimize()でのみ行う
        writer.set_merge_policy(Box::new(NoMergePolicy));

        let reader: IndexReader = index.reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|err| IndexError::from_open(path, err))?;

        debug!("open writer session on {}", path.display());

        Ok(Self {
            config: config.clone(),
            index,
            schema,
            writer: Some(writer),
            reader,
            state: SessionState::Open,
            cleared: HashSet::new(),
            pending: HashSet::new(),
            purged: HashSet::new(),
            dirty: false,
        })
    }

    ///
    /// 現在の状態
    ///
    pub fn state(&self) -> SessionState {
        self.state
    }

    ///
    /// 削除/追加を受け付けられる状態であればライタを返す
    ///
    fn active_writer(&mut self, op: &str) -> Result<&mut IndexWriter, IndexError> {
        match self.state {
            SessionState::Optimizing | SessionState::Closed => {
                Err(IndexError::Precondition(
                    format!("{} in {:?} state", op, self.state),
                ))
            }
            _ => self.writer.as_mut().ok_or_else(|| {
                IndexError::Precondition(format!("{} without writer", op))
            }),
        }
    }

    ///
    /// 指定URLの文書を削除する
    ///
    /// # 概要
    /// 該当する文書が無くてもエラーにはならない。削除したURLは続けて
    /// `add_document()`で追加できるようになる。
    ///
    /// # 引数
    /// * `url` - 対象URL
    ///
    /// # 戻り値
    /// 削除した文書数
    ///
    pub fn delete_by_url(&mut self, url: &str) -> Result<usize, IndexError> {
        self.active_writer("delete")?;
        let term = self.schema.url_term(url);

        /*
         * 削除対象の計数
         */
        let committed = if self.purged.contains(url) {
            0
        } else {
            let query = TermQuery::new(term.clone(), IndexRecordOption::Basic);
            self.reader.searcher()
                .search(&query, &Count)
                .map_err(|err| IndexError::WriteFailed(err.to_string()))?
        };
        let uncommitted = usize::from(self.pending.remove(url));

        /*
         * 削除の実行
         */
        self.active_writer("delete")?.delete_term(term);

        self.purged.insert(url.to_string());
        self.cleared.insert(url.to_string());
        self.state = SessionState::Deleting;
        self.dirty = true;

        Ok(committed + uncommitted)
    }

    ///
    /// 文書を追加する
    ///
    /// # 引数
    /// * `record` - 追加する文書(同じURLは事前に削除済みであること)
    ///
    /// # 戻り値
    /// 処理に成功した場合は`Ok(())`
    ///
    pub fn add_document(&mut self, record: &DocumentRecord) -> Result<(), IndexError> {
        if !self.cleared.contains(&record.url) {
            return Err(IndexError::Precondition(format!(
                "{} must be deleted before it is added",
                record.url,
            )));
        }

        let doc = self.schema.to_document(record);
        self.active_writer("add")?
            .add_document(doc)
            .map_err(|err| IndexError::WriteFailed(err.to_string()))?;

        self.cleared.remove(&record.url);
        self.pending.insert(record.url.clone());
        self.state = SessionState::Adding;
        self.dirty = true;

        Ok(())
    }

    ///
    /// 変更をコミットする
    ///
    pub fn commit(&mut self) -> Result<(), IndexError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            IndexError::Precondition("commit without writer".to_string())
        })?;

        writer.commit()
            .map_err(|err| IndexError::WriteFailed(err.to_string()))?;
        self.reader.reload()
            .map_err(|err| IndexError::WriteFailed(err.to_string()))?;

        self.pending.clear();
        self.purged.clear();
        self.dirty = false;

        Ok(())
    }

    ///
    /// インデックスを最適化する
    ///
    /// # 概要
    /// 変更をコミットした上でセグメントを統合する。以降このセッションで
    /// 削除/追加は行えない。
    ///
    pub fn optimize(&mut self) -> Result<(), IndexError> {
        if self.state == SessionState::Closed {
            return Err(IndexError::Precondition(
                "optimize in Closed state".to_string(),
            ));
        }

        let started = Instant::now();
        self.commit()?;

        if let Some(writer) = self.writer.as_mut() {
            merge_segments(&self.index, writer)?;
        }
        self.reader.reload()
            .map_err(|err| IndexError::WriteFailed(err.to_string()))?;

        self.state = SessionState::Optimizing;
        info!(
            "optimized {} in {:?}",
            self.config.index_path().display(),
            started.elapsed(),
        );

        Ok(())
    }

    ///
    /// コミット済みの文書数
    ///
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    ///
    /// セッションを閉じる
    ///
    /// # 概要
    /// 未コミットの変更をコミットし、マージ処理の完了を待ってライタを解放
    /// する。
    ///
    pub fn close(mut self) -> Result<(), IndexError> {
        let result = self.finish();
        self.state = SessionState::Closed;
        result
    }

    fn finish(&mut self) -> Result<(), IndexError> {
        if self.dirty {
            self.commit()?;
        }

        if let Some(writer) = self.writer.take() {
            writer.wait_merging_threads()
                .map_err(|err| IndexError::WriteFailed(err.to_string()))?;
        }

        Ok(())
    }
}

// Dropトレイトの実装
impl Drop for IndexWriterSession {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if self.dirty {
                warn!(
                    "discard uncommitted changes on {}",
                    self.config.index_path().display(),
                );
            }

            if let Err(err) = writer.rollback() {
                warn!("rollback failed: {}", err);
            }
        }
        self.state = SessionState::Closed;
    }
}
