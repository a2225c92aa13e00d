/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! サブコマンド"index delete-all"の実装
//!

use anyhow::Result;

use sitesearch::{IndexConfig, RunRegistry};

use crate::cmd_args::Options;
use super::CommandContext;

///
/// "index delete-all"コマンド実行コンテキスト
///
struct IndexDeleteAllCommandContext {
    config: IndexConfig,
}

impl IndexDeleteAllCommandContext {
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

impl CommandContext for IndexDeleteAllCommandContext {
    ///
    /// コマンドの実行
    ///
    /// # 概要
    /// インデックスを空の状態で作り直す。
    ///
    /// # 戻り値
    /// 処理に成功した場合は`Ok(())`
    ///
    fn exec(&self) -> Result<()> {
        RunRegistry::new().delete_all(&self.config)?;
        println!("index cleared: {}", self.config.index_path().display());
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
    Ok(Box::new(IndexDeleteAllCommandContext::new(opts)))
}
