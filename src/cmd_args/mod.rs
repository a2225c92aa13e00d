/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! コマンドライン引数を取り扱うモジュール
//!

mod config;
mod logger;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use sitesearch::index::TokenizerKind;
use sitesearch::extract::pdf::DEFAULT_DESCRIPTOR_LIMIT;
use sitesearch::{IndexConfig, ModuleConfig, SearchMethod, SearchQuery, SortKey};

use crate::command::{
    CommandContext, extract, index_delete_all, index_optimize, index_run,
    search,
};
use config::Config;

/// デフォルトのコンフィギュレーションパス
static DEFAULT_CONFIG_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    BaseDirs::new()
        .map(|dirs| dirs.config_local_dir().join(env!("CARGO_PKG_NAME")))
        .unwrap_or_else(|| PathBuf::from("."))
});

/// デフォルトのデータパス
static DEFAULT_DATA_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    BaseDirs::new()
        .map(|dirs| dirs.data_local_dir().join(env!("CARGO_PKG_NAME")))
        .unwrap_or_else(|| PathBuf::from("."))
});

///
/// デフォルトのコンフィグレーションファイルのパス情報を生成
///
/// # 戻り値
/// コンフィギュレーションファイルのパス情報
///
fn default_config_path() -> PathBuf {
    DEFAULT_CONFIG_PATH.join("config.toml")
}

///
/// デフォルトのログ出力先のパスを生成
///
/// # 戻り値
/// ログ出力先ディレクトリのパス情報
///
fn default_log_path() -> PathBuf {
    DEFAULT_DATA_PATH.join("log")
}

///
/// デフォルトのインデックス格納ディレクトリのパス情報を生成
///
/// # 戻り値
/// インデックス格納ディレクトリのパス情報
///
fn default_index_path() -> PathBuf {
    DEFAULT_DATA_PATH.join("index")
}

///
/// show_options()実装を要求するトレイト
///
trait ShowOptions {
    ///
    /// オプション設定内容の表示
    ///
    fn show_options(&self);
}

///
/// validate()実装を要求するトレイト
///
trait Validate {
    ///
    /// オプション設定内容の検証
    ///
    fn validate(&mut self) -> Result<()>;
}

///
/// apply_config()実装を要求するトレイト
///
trait ApplyConfig {
    ///
    /// オプション設定へのコンフィギュレーションの反映
    ///
    fn apply_config(&mut self, config: &Config);
}

///
/// ログレベルを指し示す列挙子
///
#[derive(Debug, Clone, Copy, PartialEq, ValueEnum, Deserialize, Serialize)]
#[clap(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "UPPERCASE")]
enum LogLevel {
    /// ログを記録しない
    #[serde(alias = "off", alias = "OFF")]
    #[value(alias = "off")]
    None,

    /// エラー情報以上のレベルを記録
    Error,

    /// 警告情報以上のレベルを記録
    Warn,

    /// 一般情報以上のレベルを記録
    Info,

    /// デバッグ情報以上のレベルを記録
    Debug,

    /// トレース情報以上のレベルを記録
    Trace,
}

// AsRefトレイトの実装
impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            Self::None => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

///
/// グローバルオプション情報を格納する構造体
///
#[derive(Parser, Debug, Clone)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    about = "公開サイトの全文検索インデックスの作成と検索",
    version,
    long_about = None,
    subcommand_required = false,
    arg_required_else_help = true,
)]
pub struct Options {
    /// config.tomlを使用する場合のパス
    #[arg(short = 'c', long = "config-path")]
    config_path: Option<PathBuf>,

    /// 記録するログレベルの指定
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL",
        ignore_case = true)]
    log_level: Option<LogLevel>,

    /// ログの出力先の指定
    #[arg(short = 'L', long = "log-output", value_name = "PATH")]
    log_output: Option<PathBuf>,

    /// ログを標準出力にも同時出力するか否か
    #[arg(long = "log-tee")]
    log_tee: bool,

    /// インデックスの格納パス
    #[arg(short = 'I', long = "index-dir", value_name = "PATH")]
    index_dir: Option<PathBuf>,

    /// HTML変換設定の格納パス
    #[arg(short = 'P', long = "parser-config", value_name = "PATH")]
    parser_config: Option<PathBuf>,

    /// 設定情報の表示
    #[arg(long = "show-options")]
    show_options: bool,

    /// 設定情報の保存
    #[arg(long = "save-config")]
    save_config: bool,

    /// インデックス作成の有効/無効(config.tomlのみで指定)
    #[arg(skip)]
    active: Option<bool>,

    /// PDFを対象に含めるか否か(config.tomlのみで指定)
    #[arg(skip)]
    index_pdfs: Option<bool>,

    /// 本文の言語(config.tomlのみで指定)
    #[arg(skip)]
    language: Option<TokenizerKind>,

    /// PDFの内容ストリーム判定に使う辞書長の上限(config.tomlのみで指定)
    #[arg(skip)]
    pdf_descriptor_limit: Option<usize>,

    /// 実行するサブコマンド
    #[command(subcommand)]
    command: Option<Command>,
}

impl Options {
    ///
    /// ログレベルへのアクセサ
    ///
    /// # 戻り値
    /// 設定されたログレベルを返す
    fn log_level(&self) -> LogLevel {
        if let Some(level) = self.log_level {
            level
        } else {
            LogLevel::Info
        }
    }

    ///
    /// ログの出力先へのアクセサ
    ///
    /// # 戻り値
    /// ログの出力先として設定されたパス情報を返す。未設定の場合はデフォルトの
    /// パスを返す。
    ///
    fn log_output(&self) -> PathBuf {
        if let Some(path) = &self.log_output {
            path.clone()
        } else {
            default_log_path()
        }
    }

    ///
    /// ログの標準出力同時出力フラグへのアクセサ
    ///
    /// # 戻り値
    /// ログの標準出力同時出力が有効であればtrueを返す
    ///
    fn log_tee(&self) -> bool {
        self.log_tee
    }

    ///
    /// インデックス格納ディレクトリのパスへのアクセサ
    ///
    /// # 戻り値
    /// オプションで指定されたインデックス格納ディレクトリへのパスを返す。オプ
    /// ションで未定義の場合はデフォルトのパスを返す。
    ///
    pub(crate) fn index_dir(&self) -> PathBuf {
        if let Some(path) = &self.index_dir {
            path.clone()
        } else {
            default_index_path()
        }
    }

    ///
    /// HTML変換設定の格納パスへのアクセサ
    ///
    pub(crate) fn parser_config(&self) -> Option<PathBuf> {
        self.parser_config.clone()
    }

    ///
    /// モジュール設定の生成
    ///
    /// # 戻り値
    /// オプションとコンフィギュレーションを反映したモジュール設定
    ///
    pub(crate) fn module_config(&self) -> ModuleConfig {
        let mut module = ModuleConfig::new(self.index_dir());

        module.active = self.active.unwrap_or(true);
        module.index_pdfs = self.index_pdfs.unwrap_or(true);
        module.parser_config_directory = self.parser_config();
        module.language = self.language.unwrap_or_default();
        module.pdf_descriptor_limit = self.pdf_descriptor_limit
            .unwrap_or(DEFAULT_DESCRIPTOR_LIMIT);

        module
    }

    ///
    /// インデックス設定の生成
    ///
    pub(crate) fn index_config(&self) -> IndexConfig {
        self.module_config().index_config()
    }

    ///
    /// 使用するコンフィギュレーションファイルのパス
    ///
    fn config_file(&self) -> PathBuf {
        if let Some(path) = &self.config_path {
            path.clone()
        } else {
            default_config_path()
        }
    }

    ///
    /// コンフィギュレーションファイルの適用
    ///
    /// # 戻り値
    /// 処理に成功した場合は`Ok(())`を返す。
    ///
    /// # 注記
    /// config.tomlを読み込みオプション情報に反映する。コマンドラインでの指定
    /// が優先される。
    ///
    fn apply_config(&mut self) -> Result<()> {
        // オプションでパスが指定されている場合、そのパスに何もなければエラー
        if let Some(path) = &self.config_path {
            if !path.exists() {
                return Err(anyhow!("{} is not exists", path.display()));
            }
        }

        let path = self.config_file();

        // この時点でパスに何も無い場合はそのまま何もせず正常終了
        if !path.exists() {
            return Ok(());
        }

        if !path.is_file() {
            return Err(anyhow!("{} is not file", path.display()));
        }

        let config = config::load(&path)
            .map_err(|err| anyhow!("{}: {}", path.display(), err))?;

        if self.log_level.is_none() {
            self.log_level = config.log_level();
        }

        if self.log_output.is_none() {
            self.log_output = config.log_output();
        }

        if self.index_dir.is_none() {
            self.index_dir = config.index_dir();
        }

        if self.parser_config.is_none() {
            self.parser_config = config.parser_config();
        }

        self.active = config.module_active();
        self.index_pdfs = config.module_index_pdfs();
        self.language = config.module_language();
        self.pdf_descriptor_limit = config.module_pdf_descriptor_limit();

        // コマンド毎のオプション情報へもコンフィギュレーションの内容を反映
        // する。
        let opts: Option<&mut dyn ApplyConfig> = match &mut self.command {
            Some(Command::Index(index)) => match &mut index.subcommand {
                IndexSubCommand::Run(opts) => Some(opts),
                _ => None,
            }
            Some(Command::Search(opts)) => Some(opts),
            _ => None,
        };

        if let Some(opts) = opts {
            opts.apply_config(&config);
        }

        Ok(())
    }

    ///
    /// オプション情報のバリデート
    ///
    /// # 戻り値
    /// オプション情報に矛盾が無い場合は`Ok(())`を返す。
    ///
    fn validate(&mut self) -> Result<()> {
        if self.show_options && self.save_config {
            return Err(anyhow!(
                "--show-options and --save-config can't be specified mutually"
            ));
        }

        if self.pdf_descriptor_limit == Some(0) {
            return Err(anyhow!("pdf_descriptor_limit must be greater than 0"));
        }

        let opts: Option<&mut dyn Validate> = match &mut self.command {
            Some(Command::Index(index)) => match &mut index.subcommand {
                IndexSubCommand::Run(opts) => Some(opts),
                _ => None,
            }
            Some(Command::Search(opts)) => Some(opts),
            Some(Command::Extract(opts)) => Some(opts),
            None => None,
        };

        if let Some(opts) = opts {
            opts.validate()?;
        }

        Ok(())
    }

    ///
    /// オプション設定内容の表示
    ///
    fn show_options(&self) {
        let config_path = if let Some(path) = &self.config_path {
            path.display().to_string()
        } else {
            let path = default_config_path();

            if path.exists() {
                path.display().to_string()
            } else {
                "(none)".to_string()
            }
        };

        let module = self.module_config();

        println!("global options");
        println!("   config path:          {}", config_path);
        println!("   index path:           {}", self.index_dir().display());
        println!(
            "   parser config:        {}",
            self.parser_config
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(built-in)".to_string())
        );
        println!("   log level:            {}", self.log_level().as_ref());
        println!("   log output:           {}", self.log_output().display());
        println!("   log tee:              {}", self.log_tee());
        println!("   active:               {}", module.active);
        println!("   index pdfs:           {}", module.index_pdfs);
        println!("   language:             {}", module.language.as_ref());
        println!("   pdf descriptor limit: {}", module.pdf_descriptor_limit);

        // サブコマンドが指定されており、そのサブコマンドがオプションを持つなら
        // そのオプションも表示する。
        let opts: Option<&dyn ShowOptions> = match &self.command {
            Some(Command::Index(index)) => match &index.subcommand {
                IndexSubCommand::Run(opts) => Some(opts),
                _ => None,
            }
            Some(Command::Search(opts)) => Some(opts),
            Some(Command::Extract(opts)) => Some(opts),
            None => None,
        };

        if let Some(opts) = opts {
            println!();
            opts.show_options();
        }
    }

    ///
    /// サブコマンドのコマンドコンテキストの生成
    ///
    pub(crate) fn build_context(&self) -> Result<Box<dyn CommandContext>> {
        match &self.command {
            Some(Command::Index(index)) => match &index.subcommand {
                IndexSubCommand::Run(opts) => index_run::build_context(self, opts),
                IndexSubCommand::DeleteAll => index_delete_all::build_context(self),
                IndexSubCommand::Optimize => index_optimize::build_context(self),
            }
            Some(Command::Search(opts)) => search::build_context(self, opts),
            Some(Command::Extract(opts)) => extract::build_context(self, opts),
            None => Err(anyhow!("command not specified")),
        }
    }
}

///
/// サブコマンドの定義
///
#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// インデックス管理コマンド一覧の表示
    #[command(name = "index", alias = "i")]
    Index(IndexCommand),

    /// 全文検索
    #[command(name = "search", alias = "s")]
    Search(SearchOpts),

    /// ローカルファイルからのテキスト抽出
    #[command(name = "extract", alias = "x")]
    Extract(ExtractOpts),
}

#[derive(Clone, Args, Debug)]
pub(crate) struct IndexCommand {
    #[command(subcommand)]
    subcommand: IndexSubCommand,
}

#[derive(Clone, Debug, Subcommand)]
enum IndexSubCommand {
    /// URL一覧のインデックス作成
    #[command(name = "run", alias = "r")]
    Run(IndexRunOpts),

    /// インデックスの全削除
    #[command(name = "delete-all", alias = "clear")]
    DeleteAll,

    /// インデックスのセグメント統合
    #[command(name = "optimize", alias = "o")]
    Optimize,
}

///
/// サブコマンド"index run"のオプション
///
#[derive(Clone, Args, Debug)]
pub(crate) struct IndexRunOpts {
    /// 相対URLの基点とするサイトのURL
    #[arg(short = 's', long = "site", value_name = "URL")]
    site: Option<String>,

    /// サイト外の絶対URLを対象に含める
    #[arg(short = 'x', long = "allow-external")]
    allow_external: bool,

    /// URL一覧を記述したファイル(1行1URL)
    #[arg(short = 'f', long = "url-file", value_name = "FILE")]
    url_file: Option<PathBuf>,

    /// 対象とするURL
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// 検証済みのサイトURL
    #[arg(skip)]
    site_url: Option<Url>,
}

impl IndexRunOpts {
    ///
    /// サイトURLへのアクセサ
    ///
    pub(crate) fn site_prefix(&self) -> Option<Url> {
        self.site_url.clone()
    }

    ///
    /// サイト外URL許可フラグへのアクセサ
    ///
    pub(crate) fn allow_external(&self) -> bool {
        self.allow_external
    }

    ///
    /// URL一覧ファイルへのアクセサ
    ///
    pub(crate) fn url_file(&self) -> Option<PathBuf> {
        self.url_file.clone()
    }

    ///
    /// コマンドラインで指定されたURLへのアクセサ
    ///
    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.clone()
    }
}

// Validateトレイトの実装
impl Validate for IndexRunOpts {
    fn validate(&mut self) -> Result<()> {
        if self.urls.is_empty() && self.url_file.is_none() {
            return Err(anyhow!("no url specified"));
        }

        if let Some(path) = &self.url_file {
            if !path.is_file() {
                return Err(anyhow!("{} is not file", path.display()));
            }
        }

        if let Some(site) = &self.site {
            let url = Url::parse(site)
                .map_err(|err| anyhow!("invalid site url {}: {}", site, err))?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(anyhow!("site url must be http or https: {}", site));
            }

            self.site_url = Some(url);
        }

        Ok(())
    }
}

// ApplyConfigトレイトの実装
impl ApplyConfig for IndexRunOpts {
    fn apply_config(&mut self, config: &Config) {
        if self.site.is_none() {
            self.site = config.module_site_prefix();
        }

        if !self.allow_external {
            if let Some(allow) = config.module_allow_external() {
                self.allow_external = allow;
            }
        }
    }
}

// ShowOptionsトレイトの実装
impl ShowOptions for IndexRunOpts {
    fn show_options(&self) {
        println!("index run command options");
        println!(
            "   site:           {}",
            self.site.as_deref().unwrap_or("(none)")
        );
        println!("   allow external: {}", self.allow_external);
        println!(
            "   url file:       {}",
            self.url_file
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        println!("   urls:           {}", self.urls.len());
    }
}

///
/// サブコマンドsearchのオプション
///
#[derive(Clone, Args, Debug)]
pub(crate) struct SearchOpts {
    /// 検索方法
    #[arg(short = 'm', long = "method", value_name = "METHOD",
        ignore_case = true)]
    method: Option<SearchMethod>,

    /// 並び順
    #[arg(short = 's', long = "sort", value_name = "KEY", ignore_case = true)]
    sort: Option<SortKey>,

    /// ページ番号(1始まり)
    #[arg(short = 'p', long = "page", value_name = "N")]
    page: Option<usize>,

    /// 1ページあたりの件数
    #[arg(short = 'n', long = "page-size", value_name = "SIZE")]
    page_size: Option<usize>,

    /// 対象とするURLの前方一致条件
    #[arg(long = "prefix", value_name = "URL")]
    prefix: Option<String>,

    /// 結果をJSONで出力する
    #[arg(long = "json")]
    json: bool,

    /// 検索文字列
    #[arg()]
    query: String,
}

impl SearchOpts {
    ///
    /// 検索方法へのアクセサ
    ///
    pub(crate) fn method(&self) -> SearchMethod {
        self.method.unwrap_or_default()
    }

    ///
    /// 並び順へのアクセサ
    ///
    pub(crate) fn sort(&self) -> SortKey {
        self.sort.unwrap_or_default()
    }

    ///
    /// ページ番号へのアクセサ
    ///
    pub(crate) fn page(&self) -> usize {
        self.page.unwrap_or(1)
    }

    ///
    /// ページサイズへのアクセサ
    ///
    pub(crate) fn page_size(&self) -> usize {
        self.page_size.unwrap_or(SearchQuery::DEFAULT_PAGE_SIZE)
    }

    ///
    /// JSON出力フラグへのアクセサ
    ///
    pub(crate) fn is_json(&self) -> bool {
        self.json
    }

    ///
    /// 検索条件の生成
    ///
    /// # 戻り値
    /// オプションの内容を反映した検索条件
    ///
    pub(crate) fn to_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.query.clone());

        query.method = self.method();
        query.sort = self.sort();
        query.page_number = self.page();
        query.page_size = self.page_size();
        query.restrict_prefix = self.prefix.clone();

        query
    }
}

// Validateトレイトの実装
impl Validate for SearchOpts {
    fn validate(&mut self) -> Result<()> {
        if self.page == Some(0) {
            return Err(anyhow!("page number must be 1 or greater"));
        }

        if self.page_size == Some(0) {
            return Err(anyhow!("page size must be 1 or greater"));
        }

        Ok(())
    }
}

// ApplyConfigトレイトの実装
impl ApplyConfig for SearchOpts {
    fn apply_config(&mut self, config: &Config) {
        if self.method.is_none() {
            self.method = config.search_method();
        }

        if self.sort.is_none() {
            self.sort = config.search_sort();
        }

        if self.page_size.is_none() {
            self.page_size = config.search_page_size();
        }
    }
}

// ShowOptionsトレイトの実装
impl ShowOptions for SearchOpts {
    fn show_options(&self) {
        println!("search command options");
        println!("   method:    {}", self.method().as_ref());
        println!("   sort:      {}", self.sort().as_ref());
        println!("   page:      {}", self.page());
        println!("   page size: {}", self.page_size());
        println!(
            "   prefix:    {}",
            self.prefix.as_deref().unwrap_or("(none)")
        );
        println!("   json:      {}", self.json);
        println!("   query:     {}", self.query);
    }
}

///
/// サブコマンドextractのオプション
///
#[derive(Clone, Args, Debug)]
pub(crate) struct ExtractOpts {
    /// 内容の種別(省略時はファイル名から推定)
    #[arg(short = 't', long = "content-type", value_name = "TYPE")]
    content_type: Option<String>,

    /// 対象ファイル
    #[arg()]
    file: PathBuf,
}

impl ExtractOpts {
    ///
    /// 内容の種別へのアクセサ
    ///
    /// # 戻り値
    /// 指定された種別を返す。未指定の場合はファイル名から推定した種別を返
    /// す。
    ///
    pub(crate) fn content_type(&self) -> String {
        if let Some(content_type) = &self.content_type {
            content_type.clone()
        } else {
            mime_guess::from_path(&self.file)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        }
    }

    ///
    /// 対象ファイルへのアクセサ
    ///
    pub(crate) fn file(&self) -> &Path {
        &self.file
    }
}

// Validateトレイトの実装
impl Validate for ExtractOpts {
    fn validate(&mut self) -> Result<()> {
        if !self.file.is_file() {
            return Err(anyhow!("{} is not file", self.file.display()));
        }

        Ok(())
    }
}

// ShowOptionsトレイトの実装
impl ShowOptions for ExtractOpts {
    fn show_options(&self) {
        println!("extract command options");
        println!("   content type: {}", self.content_type());
        println!("   file:         {}", self.file.display());
    }
}

///
/// コマンドライン引数のパース処理
///
/// # 戻り値
/// オプション情報をまとめたオブジェクトを返す。
///
pub(crate) fn parse() -> Result<Arc<Options>> {
    let mut opts = Options::parse();

    /*
     * コンフィギュレーションファイルの適用
     */
    opts.apply_config()?;

    /*
     * 設定情報のバリデーション
     */
    opts.validate()?;

    /*
     * ログ機能の初期化
     */
    logger::init(&opts)?;

    /*
     * 設定情報の表示
     */
    if opts.show_options {
        opts.show_options();
        std::process::exit(0);
    }

    /*
     * 設定の保存
     */
    if opts.save_config {
        save_config(&opts)?;
        std::process::exit(0);
    }

    /*
     * 設定情報の返却
     */
    Ok(Arc::new(opts))
}

///
/// 設定保存が必要であればconfig.tomlへ書き込みを行う
///
/// # 概要
/// 既存の設定ファイルがある場合は読み込み、現在の設定内容で更新した上で保存
/// する。設定ファイルが存在しない場合はデフォルト設定を基準に更新して保存す
/// る。
///
/// # 引数
/// * `opts` - コマンドラインとコンフィグ適用後の設定情報
///
/// # 戻り値
/// 保存処理に成功した場合は`Ok(())`を返す。
///
fn save_config(opts: &Options) -> Result<()> {
    let path = opts.config_file();

    /*
     * 既存ファイルの上書き確認
     */
    if path.exists() && !confirm_overwrite(&path)? {
        return Ok(());
    }

    /*
     * 保存先ディレクトリの作成
     */
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    /*
     * 現在の設定内容を反映
     */
    let mut config = if path.exists() {
        config::load(&path)?
    } else {
        Config::default()
    };

    let module = opts.module_config();

    config.set_log_level(opts.log_level());
    config.set_log_output(opts.log_output());
    config.set_index_dir(opts.index_dir());
    if let Some(path) = opts.parser_config() {
        config.set_parser_config(path);
    }
    config.set_module(&module);

    match &opts.command {
        Some(Command::Index(index)) => match &index.subcommand {
            IndexSubCommand::Run(opts) => {
                if let Some(site) = &opts.site {
                    config.set_module_site_prefix(site.clone());
                }
                config.set_module_allow_external(opts.allow_external());
            }
            _ => {}
        }

        Some(Command::Search(opts)) => {
            config.set_search_method(opts.method());
            config.set_search_sort(opts.sort());
            config.set_search_page_size(opts.page_size());
        }

        _ => {}
    }

    /*
     * 保存処理の実行
     */
    config.save(&path)?;

    Ok(())
}

///
/// config.tomlの上書き可否を標準入出力で問い合わせる
///
/// # 引数
/// * `path` - 対象となるパス
///
/// # 戻り値
/// 上書きを許可する場合は`true`、拒否された場合は`false`を返す。
///
fn confirm_overwrite(path: &Path) -> Result<bool> {
    let stdin = io::stdin();
    let stdout = io::stdout();

    let mut input = stdin.lock();
    let mut output = stdout.lock();

    confirm_overwrite_with_io(path, &mut input, &mut output)
}

///
/// 任意の入出力を使ってconfig.tomlの上書き可否を問い合わせる
///
/// # 引数
/// * `path` - 対象となるパス
/// * `input` - 入力ストリーム（質問への回答を受け取る）
/// * `output` - 出力ストリーム（質問を表示する）
///
/// # 戻り値
/// 上書きを許可する場合は`true`、拒否された場合は`false`を返す。
///
fn confirm_overwrite_with_io<R, W>(path: &Path, input: &mut R, output: &mut W)
    -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    write!(
        output,
        "{} は既に存在します。上書きしますか？ [y/N]: ",
        path.display()
    )?;
    output.flush()?;

    let mut buf = String::new();
    input.read_line(&mut buf)?;

    let ans = buf.trim().to_lowercase();
    Ok(ans == "y" || ans == "yes")
}
