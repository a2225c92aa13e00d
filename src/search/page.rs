/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 検索結果のページ分割
//!

///
/// 1ページ分の表示範囲
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    /// 先頭から読み飛ばす件数
    pub offset: usize,

    /// ページ内の件数
    pub limit: usize,

    /// ページ先頭の通し番号(1始まり、空のページでは0)
    pub first_index: usize,

    /// ページ末尾の通し番号(1始まり、空のページでは0)
    pub last_index: usize,

    /// 総ページ数
    pub page_count: usize,
}

impl PageWindow {
    ///
    /// ページ内に結果が無いか否か
    ///
    pub fn is_empty(&self) -> bool {
        self.limit == 0
    }
}

///
/// 表示範囲の計算
///
/// # 概要
/// ページ番号とページサイズは1未満の値を1とみなす。最終ページより後ろを
/// 指定した場合はエラーとせず空の範囲を返す。
///
/// # 引数
/// * `total` - 検索結果の総数
/// * `page_number` - ページ番号(1始まり)
/// * `page_size` - 1ページあたりの件数
///
/// # 戻り値
/// 表示範囲
///
pub fn window(total: usize, page_number: usize, page_size: usize) -> PageWindow {
    let page_number = page_number.max(1);
    let page_size = page_size.max(1);
    let page_count = total.div_ceil(page_size);
    let offset = (page_number - 1).saturating_mul(page_size);

    if offset >= total {
        return PageWindow {
            offset,
            limit: 0,
            first_index: 0,
            last_index: 0,
            page_count,
        };
    }

    let last_index = page_number.saturating_mul(page_size).min(total);

    PageWindow {
        offset,
        limit: last_index - offset,
        first_index: offset + 1,
        last_index,
        page_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_and_last_pages() {
        assert_eq!(window(25, 2, 10), PageWindow {
            offset: 10,
            limit: 10,
            first_index: 11,
            last_index: 20,
            page_count: 3,
        });
        assert_eq!(window(25, 3, 10), PageWindow {
            offset: 20,
            limit: 5,
            first_index: 21,
            last_index: 25,
            page_count: 3,
        });
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let page = window(25, 4, 10);
        assert!(page.is_empty());
        assert_eq!((page.first_index, page.last_index, page.page_count), (0, 0, 3));

        let page = window(0, 1, 10);
        assert!(page.is_empty());
        assert_eq!(page.page_count, 0);

        assert!(window(5, usize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn zero_arguments_are_clamped() {
        assert_eq!(window(3, 0, 0), window(3, 1, 1));
    }

    #[test]
    fn window_never_exceeds_page_size() {
        for total in 0..40 {
            for page_size in 1..12 {
                for page_number in 1..10 {
                    let page = window(total, page_number, page_size);
                    if page.is_empty() {
                        continue;
                    }

                    assert!(page.first_index <= page.last_index);
                    assert!(page.last_index - page.first_index + 1 <= page_size);
                    assert_eq!(page.first_index, (page_number - 1) * page_size + 1);
                    assert_eq!(page.last_index, (page_number * page_size).min(total));
                }
            }
        }
    }
}
