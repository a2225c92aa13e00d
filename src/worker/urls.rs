/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! インデックス対象URLの選別と解決
//!

use std::collections::HashSet;

use log::debug;
use url::{ParseError, Url};

///
/// URLを解決する際のサイト情報
///
#[derive(Clone, Debug, Default)]
pub struct SiteContext {
    /// 相対URLの基点となるサイトのURL
    site_prefix: Option<Url>,

    /// サイト外の絶対URLを対象に含めるか否か
    allow_external: bool,
}

impl SiteContext {
    ///
    /// サイト情報の生成
    ///
    /// # 引数
    /// * `site_prefix` - 相対URLの基点となるURL
    /// * `allow_external` - サイト外の絶対URLを許可するか否か
    ///
    /// # 戻り値
    /// 生成したサイト情報
    ///
    pub fn new(site_prefix: Option<Url>, allow_external: bool) -> Self {
        Self { site_prefix, allow_external }
    }

    ///
    /// URL一覧からインデックス対象を選び出す
    ///
    /// # 概要
    /// 相対URLはサイトのURLを基点に解決し、パスに`.htm`(PDFを対象とする
    /// 場合は`.pdf`も)を含むものだけを残す。重複は最初の出現のみ残す。
    ///
    /// # 引数
    /// * `urls` - 絶対URLまたはサイト内の相対URLの並び
    /// * `index_pdfs` - PDFを対象に含めるか否か
    ///
    /// # 戻り値
    /// 対象URLの並び(入力の順序を保持)
    ///
    pub fn resolve<S: AsRef<str>>(&self, urls: &[S], index_pdfs: bool) -> Vec<Url> {
        let mut seen = HashSet::new();

        urls.iter()
            .filter_map(|raw| self.resolve_one(raw.as_ref(), index_pdfs))
            .filter(|url| seen.insert(url.to_string()))
            .collect()
    }

    fn resolve_one(&self, raw: &str, index_pdfs: bool) -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        /*
         * 絶対URL化
         */
        let url = match Url::parse(raw) {
            Ok(url) => {
                if !matches!(url.scheme(), "http" | "https") {
                    debug!("skip {}: unsupported scheme", raw);
                    return None;
                }

                if !self.allow_external && !self.is_on_site(&url) {
                    debug!("skip {}: external link", raw);
                    return None;
                }

                url
            }

            Err(ParseError::RelativeUrlWithoutBase) => {
                match self.site_prefix.as_ref().map(|base| base.join(raw)) {
                    Some(Ok(url)) => url,
                    _ => {
                        debug!("skip {}: cannot resolve relative url", raw);
                        return None;
                    }
                }
            }

            Err(err) => {
                debug!("skip {}: {}", raw, err);
                return None;
            }
        };

        /*
         * 拡張子による選別
         */
        if !is_indexable(&url, index_pdfs) {
            debug!("skip {}: not an indexable document", url);
            return None;
        }

        Some(url)
    }

    ///
    /// サイト内のURLか否か
    ///
    /// サイトのURLが未指定の場合は全て対象とする。
    ///
    fn is_on_site(&self, url: &Url) -> bool {
        match &self.site_prefix {
            Some(site) => {
                site.host_str() == url.host_str()
                    && site.port_or_known_default() == url.port_or_known_default()
            }
            None => true,
        }
    }
}

fn is_indexable(url: &Url, index_pdfs: bool) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.contains(".htm") || (index_pdfs && path.contains(".pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(allow_external: bool) -> SiteContext {
        let prefix = Url::parse("http://www.example.com/site/").expect("url");
        SiteContext::new(Some(prefix), allow_external)
    }

    fn strings(urls: &[Url]) -> Vec<String> {
        urls.iter().map(|url| url.to_string()).collect()
    }

    #[test]
    fn relative_urls_are_resolved_against_prefix() {
        let urls = site(false).resolve(&[
            "/about.html",
            "news/Index.HTM",
            "docs/manual.pdf",
        ], true);

        assert_eq!(strings(&urls), vec![
            "http://www.example.com/about.html",
            "http://www.example.com/site/news/Index.HTM",
            "http://www.example.com/site/docs/manual.pdf",
        ]);
    }

    #[test]
    fn non_document_paths_are_dropped() {
        let urls = site(false).resolve(&[
            "/image.png",
            "/manual.pdf",
            "/style.css",
            "/page.shtml",
            "mailto:info@example.com",
            "",
        ], false);

        assert_eq!(strings(&urls), vec!["http://www.example.com/page.shtml"]);
    }

    #[test]
    fn external_links_require_permission() {
        let input = [
            "http://other.example.org/a.html",
            "https://www.example.com/b.html",
            "http://www.example.com/c.html",
        ];

        assert_eq!(strings(&site(false).resolve(&input, true)), vec![
            "http://www.example.com/c.html",
        ]);
        assert_eq!(site(true).resolve(&input, true).len(), 3);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let urls = site(false).resolve(&[
            "/b.html", "/a.html", "http://www.example.com/b.html",
        ], true);
        assert_eq!(strings(&urls), vec![
            "http://www.example.com/b.html",
            "http://www.example.com/a.html",
        ]);
    }

    #[test]
    fn relative_urls_without_prefix_are_skipped() {
        let context = SiteContext::new(None, false);
        let urls = context.resolve(&["/a.html", "http://host.example/b.html"], true);
        assert_eq!(strings(&urls), vec!["http://host.example/b.html"]);
    }
}
