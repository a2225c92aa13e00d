/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 協調的キャンセルのためのフラグ
//!

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

///
/// 処理中断要求を伝搬するフラグ
///
/// # 概要
/// 複製したフラグは同じ状態を共有する。ワーカーとPDF走査ループが同一の
/// フラグを参照し、決められたチェックポイントで状態を確認する。
///
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    ///
    /// 未要求状態のフラグを生成する
    ///
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    ///
    /// 中断を要求する
    ///
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    ///
    /// 中断が要求されているか否か
    ///
    /// # 戻り値
    /// 中断要求済みの場合は`true`
    ///
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
