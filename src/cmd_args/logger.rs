/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! ログ機能の初期化
//!

use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming,
    detailed_format,
};

use super::{LogLevel, Options};

/// ローテーションを行うログファイルのサイズ(1MiB)
const ROTATE_SIZE: u64 = 1024 * 1024;

/// 保持するログファイルの数
const KEEP_LOG_FILES: usize = 5;

/// ロガーのハンドル(プロセス終了まで保持する)
static LOGGER: OnceLock<LoggerHandle> = OnceLock::new();

///
/// ログ機能の初期化
///
/// # 引数
/// * `opts` - オプション情報
///
/// # 戻り値
/// 初期化に成功した場合は`Ok(())`を返す。
///
pub(super) fn init(opts: &Options) -> Result<()> {
    let level = opts.log_level();

    if level == LogLevel::None {
        return Ok(());
    }

    let dir = opts.log_output();
    std::fs::create_dir_all(&dir)
        .map_err(|err| anyhow!("{}: {}", dir.display(), err))?;

    let duplicate = if opts.log_tee() {
        Duplicate::All
    } else {
        Duplicate::None
    };

    let handle = Logger::try_with_str(level.as_ref())?
        .log_to_file(
            FileSpec::default()
                .directory(&dir)
                .basename(env!("CARGO_PKG_NAME"))
        )
        .rotate(
            Criterion::Size(ROTATE_SIZE),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .duplicate_to_stdout(duplicate)
        .format(detailed_format)
        .start()?;

    if LOGGER.set(handle).is_err() {
        return Err(anyhow!("logger already initialized"));
    }

    Ok(())
}
