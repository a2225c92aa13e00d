/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! サブコマンド"extract"の実装
//!

use std::path::PathBuf;

use anyhow::{Context, Result};

use sitesearch::{CancelFlag, ExtractorSet};

use crate::cmd_args::{ExtractOpts, Options};
use super::CommandContext;

///
/// "extract"コマンド実行コンテキスト
///
struct ExtractCommandContext {
    extractors: ExtractorSet,
    content_type: String,
    file: PathBuf,
}

impl ExtractCommandContext {
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
    fn new(opts: &Options, sub_opts: &ExtractOpts) -> Result<Self> {
        let module = opts.module_config();
        let extractors = ExtractorSet::load(
            module.parser_config_directory.as_deref(),
            module.pdf_descriptor_limit,
        )?;

        Ok(Self {
            extractors,
            content_type: sub_opts.content_type(),
            file: sub_opts.file().to_path_buf(),
        })
    }
}

impl CommandContext for ExtractCommandContext {
    ///
    /// コマンドの実行
    ///
    /// # 概要
    /// ファイルの内容種別に応じた抽出処理を行い、抽出結果を表示する。
    ///
    /// # 戻り値
    /// 処理に成功した場合は`Ok(())`
    ///
    fn exec(&self) -> Result<()> {
        let bytes = std::fs::read(&self.file)
            .with_context(|| format!("read {}", self.file.display()))?;

        let extractor = self.extractors.for_content_type(&self.content_type)?;
        let doc = extractor.extract(&bytes, &CancelFlag::new())?;

        println!("title:       {}", doc.title);
        println!("keywords:    {}", doc.keywords);
        println!("description: {}", doc.description);

        if !doc.author.is_empty() {
            println!("author:      {}", doc.author);
        }

        if let Some(created) = doc.created {
            println!("created:     {}", created.format("%Y-%m-%d %H:%M:%S"));
        }

        for err in &doc.field_errors {
            println!("warning:     {}", err);
        }

        println!("body:");
        println!("{}", doc.body);

        Ok(())
    }
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
    sub_opts: &ExtractOpts,
) -> Result<Box<dyn CommandContext>> {
    Ok(Box::new(ExtractCommandContext::new(opts, sub_opts)?))
}
