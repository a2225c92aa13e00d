/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! サブコマンド"index optimize"の実装
//!

use anyhow::Result;

use sitesearch::{IndexConfig, IndexWriterSession};

use crate::cmd_args::Options;
use super::CommandContext;

///
/// "index optimize"コマンド実行コンテキスト
///
struct IndexOptimizeCommandContext {
    config: IndexConfig,
}

impl IndexOptimizeCommandContext {
    ///
    /// コンテキストの生成
    ///
    /// # 引数
    /// * `opts` - コマンドラインオプション
    ///
    /// # 戻り値
    /// 生成したコンテキスト
    ///
    fn new(opts: &Options) -> Self {
        Self {
            config: opts.index_config(),
        }
    }
}

impl CommandContext for IndexOptimizeCommandContext {
    ///
    /// コマンドの実行
    ///
    /// # 戻り値
    /// 処理に成功した場合は`Ok(())`
    ///
    fn exec(&self) -> Result<()> {
        let mut session = IndexWriterSession::open_or_create(&self.config)?;
        session.optimize()?;
        let num_docs = session.num_docs();
        session.close()?;

        println!("optimize completed ({} documents)", num_docs);
        Ok(())
    }
}

///
/// コマンドコンテキストの生成
///
/// # 引数
/// * `opts` - コマンドラインオプション
///
/// # 戻り値
/// 生成したコマンドコンテキスト
///
pub(crate) fn build_context(
    opts: &Options,
) -> Result<Box<dyn CommandContext>> {
    Ok(Box::new(IndexOptimizeCommandContext::new(opts)))
}
