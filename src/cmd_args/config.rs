/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! コンフィギュレーション情報の定義
//!

use std::default::Default;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use sitesearch::extract::pdf::DEFAULT_DESCRIPTOR_LIMIT;
use sitesearch::index::TokenizerKind;
use sitesearch::{ModuleConfig, SearchMethod, SearchQuery, SortKey};

use super::{default_index_path, default_log_path, LogLevel};

///
/// コンフィギュレーションデータを集約する構造体
///
#[derive(Debug, Deserialize, Serialize)]
pub(super) struct Config {
    #[serde(skip)]
    config_path: Option<PathBuf>,

    /// グローバルオプションに対する情報
    global: Option<GlobalInfo>,

    /// インデックス作成モジュールの設定
    module: Option<ModuleInfo>,

    /// searchサブコマンド用の設定
    search: Option<SearchInfo>,
}

impl Config {
    ///
    /// グローバル設定のログレベルを更新
    ///
    pub(super) fn set_log_level(&mut self, level: LogLevel) {
        self.ensure_global().log_level = Some(level);
    }

    ///
    /// グローバル設定のログ出力先を更新
    ///
    pub(super) fn set_log_output(&mut self, path: PathBuf) {
        self.ensure_global().log_output = Some(path);
    }

    ///
    /// グローバル設定のインデックス格納パスを更新
    ///
    pub(super) fn set_index_dir(&mut self, path: PathBuf) {
        self.ensure_global().index_dir = Some(path);
    }

    ///
    /// グローバル設定のHTML変換設定パスを更新
    ///
    pub(super) fn set_parser_config(&mut self, path: PathBuf) {
        self.ensure_global().parser_config = Some(path);
    }

    ///
    /// モジュール設定を更新
    ///
    /// # 引数
    /// * `module` - 反映するモジュール設定
    ///
    pub(super) fn set_module(&mut self, module: &ModuleConfig) {
        let info = self.ensure_module();
        info.active = Some(module.active);
        info.index_pdfs = Some(module.index_pdfs);
        info.language = Some(module.language);
        info.pdf_descriptor_limit = Some(module.pdf_descriptor_limit);
    }

    ///
    /// モジュール設定のサイトURLを更新
    ///
    pub(super) fn set_module_site_prefix(&mut self, site: String) {
        self.ensure_module().site_prefix = Some(site);
    }

    ///
    /// モジュール設定のサイト外URL許可を更新
    ///
    pub(super) fn set_module_allow_external(&mut self, allow: bool) {
        self.ensure_module().allow_external = Some(allow);
    }

    ///
    /// searchサブコマンドの検索方法を更新
    ///
    pub(super) fn set_search_method(&mut self, method: SearchMethod) {
        self.ensure_search().method = Some(method);
    }

    ///
    /// searchサブコマンドの並び順を更新
    ///
    pub(super) fn set_search_sort(&mut self, sort: SortKey) {
        self.ensure_search().sort = Some(sort);
    }

    ///
    /// searchサブコマンドのページサイズを更新
    ///
    pub(super) fn set_search_page_size(&mut self, page_size: usize) {
        self.ensure_search().page_size = Some(page_size);
    }

    ///
    /// ログレベルへのアクセサ
    ///
    pub(super) fn log_level(&self) -> Option<LogLevel> {
        self.global
            .as_ref()
            .and_then(|global| global.log_level)
    }

    ///
    /// ログ出力先へのアクセサ
    ///
    pub(super) fn log_output(&self) -> Option<PathBuf> {
        self.global
            .as_ref()
            .and_then(|global| global.log_output.as_ref())
            .map(|path| self.resolve_path(path))
    }

    ///
    /// インデックス格納ディレクトリへのアクセサ
    ///
    /// # 戻り値
    /// パスが設定されている場合はconfig.tomlのディレクトリを基準に解決した
    /// パスを`Some()`でラップして返す。
    ///
    pub(super) fn index_dir(&self) -> Option<PathBuf> {
        self.global
            .as_ref()
            .and_then(|global| global.index_dir.as_ref())
            .map(|path| self.resolve_path(path))
    }

    ///
    /// HTML変換設定ディレクトリへのアクセサ
    ///
    pub(super) fn parser_config(&self) -> Option<PathBuf> {
        self.global
            .as_ref()
            .and_then(|global| global.parser_config.as_ref())
            .map(|path| self.resolve_path(path))
    }

    pub(super) fn module_active(&self) -> Option<bool> {
        self.module.as_ref().and_then(|module| module.active)
    }

    pub(super) fn module_index_pdfs(&self) -> Option<bool> {
        self.module.as_ref().and_then(|module| module.index_pdfs)
    }

    pub(super) fn module_site_prefix(&self) -> Option<String> {
        self.module
            .as_ref()
            .and_then(|module| module.site_prefix.clone())
    }

    pub(super) fn module_allow_external(&self) -> Option<bool> {
        self.module.as_ref().and_then(|module| module.allow_external)
    }

    pub(super) fn module_language(&self) -> Option<TokenizerKind> {
        self.module.as_ref().and_then(|module| module.language)
    }

    pub(super) fn module_pdf_descriptor_limit(&self) -> Option<usize> {
        self.module
            .as_ref()
            .and_then(|module| module.pdf_descriptor_limit)
    }

    ///
    /// searchサブコマンドの検索方法へのアクセサ
    ///
    pub(super) fn search_method(&self) -> Option<SearchMethod> {
        self.search.as_ref().and_then(|search| search.method)
    }

    ///
    /// searchサブコマンドの並び順へのアクセサ
    ///
    pub(super) fn search_sort(&self) -> Option<SortKey> {
        self.search.as_ref().and_then(|search| search.sort)
    }

    ///
    /// searchサブコマンドのページサイズへのアクセサ
    ///
    pub(super) fn search_page_size(&self) -> Option<usize> {
        self.search.as_ref().and_then(|search| search.page_size)
    }

    ///
    /// コンフィギュレーション情報の保存
    ///
    /// # 戻り値
    /// 保存に成功した場合は`Ok(())`を返す。失敗した場合はエラー情報を`Err()`で
    /// ラップして返す。
    ///
    pub(super) fn save<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>
    {
        if let Err(err) = std::fs::write(path, &toml::to_string(self)?) {
            Err(anyhow!("write config error: {}", err))
        } else {
            Ok(())
        }
    }

    fn ensure_global(&mut self) -> &mut GlobalInfo {
        self.global.get_or_insert_with(GlobalInfo::default)
    }

    fn ensure_module(&mut self) -> &mut ModuleInfo {
        self.module.get_or_insert_with(ModuleInfo::default)
    }

    fn ensure_search(&mut self) -> &mut SearchInfo {
        self.search.get_or_insert_with(SearchInfo::default)
    }

    ///
    /// コンフィギュレーションのパスに応じてパスを解決
    ///
    /// # 戻り値
    /// config.tomlが存在するディレクトリを基準に解決したパスを返す。
    ///
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }

        if let Some(config_path) = &self.config_path {
            if let Some(parent) = config_path.parent() {
                return Self::normalize_path(parent.join(path));
            }
        }

        path.to_path_buf()
    }

    fn normalize_path(path: PathBuf) -> PathBuf {
        let mut result = PathBuf::new();
        let mut segments: Vec<OsString> = Vec::new();
        let mut prefix: Option<std::path::PrefixComponent<'_>> = None;
        let mut has_root = false;

        for component in path.components() {
            match component {
                Component::Prefix(value) => prefix = Some(value),
                Component::RootDir => has_root = true,
                Component::CurDir => {}
                Component::ParentDir => {
                    if segments.pop().is_none() && !has_root {
                        segments.push(OsString::from(".."));
                    }
                }
                Component::Normal(value) => segments.push(value.to_os_string()),
            }
        }

        if let Some(value) = prefix {
            result.push(value.as_os_str());
        }

        if has_root {
            result.push(Path::new("/"));
        }

        for segment in segments {
            result.push(segment);
        }

        result
    }
}

// Defaultトレイトの実装
impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            global: Some(GlobalInfo {
                log_level: Some(LogLevel::Info),
                log_output: Some(default_log_path()),
                index_dir: Some(default_index_path()),
                parser_config: None,
            }),

            module: Some(ModuleInfo {
                active: Some(true),
                index_pdfs: Some(true),
                site_prefix: None,
                allow_external: Some(false),
                language: Some(TokenizerKind::default()),
                pdf_descriptor_limit: Some(DEFAULT_DESCRIPTOR_LIMIT),
            }),

            search: Some(SearchInfo {
                method: Some(SearchMethod::default()),
                sort: Some(SortKey::default()),
                page_size: Some(SearchQuery::DEFAULT_PAGE_SIZE),
            }),
        }
    }
}

///
/// グローバル設定を格納する構造体
///
#[derive(Debug, Default, Deserialize, Serialize)]
struct GlobalInfo {
    /// ログレベル
    log_level: Option<LogLevel>,

    /// ログの出力先
    log_output: Option<PathBuf>,

    /// インデックスの格納ディレクトリ
    index_dir: Option<PathBuf>,

    /// HTML変換設定の格納ディレクトリ
    parser_config: Option<PathBuf>,
}

///
/// インデックス作成モジュールの設定情報
///
#[derive(Debug, Default, Deserialize, Serialize)]
struct ModuleInfo {
    /// インデックス作成の有効/無効
    active: Option<bool>,

    /// PDFを対象に含めるか否か
    index_pdfs: Option<bool>,

    /// 相対URLの基点とするサイトのURL
    site_prefix: Option<String>,

    /// サイト外の絶対URLを許可するか否か
    allow_external: Option<bool>,

    /// 本文の言語
    language: Option<TokenizerKind>,

    /// PDFの内容ストリーム判定に使う辞書長の上限
    pdf_descriptor_limit: Option<usize>,
}

///
/// searchサブコマンドの設定情報
///
#[derive(Debug, Default, Deserialize, Serialize)]
struct SearchInfo {
    /// 検索方法
    method: Option<SearchMethod>,

    /// 並び順
    sort: Option<SortKey>,

    /// 1ページあたりの件数
    page_size: Option<usize>,
}

///
/// コンフィギュレーション情報の読み込み
///
pub(super) fn load<P>(path: P) -> Result<Config>
where
    P: AsRef<Path>
{
    let path = path.as_ref();
    let mut config: Config = toml::from_str(&std::fs::read_to_string(path)?)?;
    config.config_path = Some(path.to_path_buf());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_module_section_from_toml() {
        let toml_str = r#"
            [module]
            active = false
            site_prefix = "https://www.example.com/"
            allow_external = true
            language = "english"
        "#;

        let config: Config = toml::from_str(toml_str).expect("parse failed");
        assert_eq!(config.module_active(), Some(false));
        assert_eq!(
            config.module_site_prefix().as_deref(),
            Some("https://www.example.com/")
        );
        assert_eq!(config.module_allow_external(), Some(true));
        assert_eq!(config.module_language(), Some(TokenizerKind::English));
        assert_eq!(config.module_index_pdfs(), None);
    }

    #[test]
    fn load_search_section_from_toml() {
        let toml_str = r#"
            [search]
            method = "or"
            sort = "date"
            page_size = 20
        "#;

        let config: Config = toml::from_str(toml_str).expect("parse failed");
        assert_eq!(config.search_method(), Some(SearchMethod::Or));
        assert_eq!(config.search_sort(), Some(SortKey::Date));
        assert_eq!(config.search_page_size(), Some(20));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let output = toml::to_string(&Config::default()).expect("serialize failed");
        assert!(output.contains("[module]"));
        assert!(output.contains("[search]"));

        let config: Config = toml::from_str(&output).expect("parse failed");
        assert_eq!(config.log_level(), Some(LogLevel::Info));
        assert_eq!(
            config.module_pdf_descriptor_limit(),
            Some(DEFAULT_DESCRIPTOR_LIMIT)
        );
    }

    #[test]
    fn resolve_relative_paths_with_config_dir() {
        let toml_str = r#"
            [global]
            log_output = "log"
            index_dir = "./data/index"
            parser_config = "../parser"
        "#;

        let mut config: Config = toml::from_str(toml_str).expect("parse failed");
        config.config_path = Some(PathBuf::from("/tmp/config/config.toml"));

        assert_eq!(config.log_output(), Some(PathBuf::from("/tmp/config/log")));
        assert_eq!(
            config.index_dir(),
            Some(PathBuf::from("/tmp/config/data/index"))
        );
        assert_eq!(config.parser_config(), Some(PathBuf::from("/tmp/parser")));
    }

    #[test]
    fn preserve_absolute_paths() {
        let toml_str = r#"
            [global]
            log_output = "/var/log/sitesearch"
            index_dir = "/var/lib/sitesearch/index"
        "#;

        let mut config: Config = toml::from_str(toml_str).expect("parse failed");
        config.config_path = Some(PathBuf::from("/tmp/config/config.toml"));

        assert_eq!(
            config.log_output(),
            Some(PathBuf::from("/var/log/sitesearch"))
        );
        assert_eq!(
            config.index_dir(),
            Some(PathBuf::from("/var/lib/sitesearch/index"))
        );
    }

    #[test]
    fn keep_relative_paths_when_config_path_is_missing() {
        let toml_str = r#"
            [global]
            index_dir = "index"
        "#;

        let config: Config = toml::from_str(toml_str).expect("parse failed");
        assert_eq!(config.index_dir(), Some(PathBuf::from("index")));
    }
}
