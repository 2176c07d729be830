use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use ini::{Ini, ParseOption, Properties};

/// 設定ファイル内の日付の書式。
const DATE_FORMAT: &str = "%Y-%m-%d";

/// 設定ファイルの内容。
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub time: TimeSettings,
    pub io: IoSettings,
}

/// `[Time]`セクション。
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSettings {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 基準とするタイムゾーン
    pub internal_time: Tz,
    /// 表示に利用するタイムゾーン
    pub display_time: Tz,
}

/// `[IO]`セクション。
#[derive(Debug, Clone, PartialEq)]
pub struct IoSettings {
    /// CSVの出力先ディレクトリ
    pub dump_path: PathBuf,
}

impl Settings {
    /// 設定ファイルを読み込む。
    ///
    /// # Arguments
    ///
    /// * `path` - INI形式の設定ファイルのパス
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    /// INI形式の文字列から設定を読み込む。
    ///
    /// 値は書かれたまま扱い、引用符やバックスラッシュを解釈しない。
    /// キー名の大文字小文字は区別しない。
    pub fn parse(content: &str) -> Result<Self> {
        let option = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..Default::default()
        };
        let ini = Ini::load_from_str_opt(content, option).context("Failed to parse settings")?;

        let time = section(&ini, "Time")?;
        let start_date = parse_date(get(time, "Time", "StartDate")?)?;
        let end_date = parse_date(get(time, "Time", "EndDate")?)?;
        ensure!(
            start_date <= end_date,
            "StartDate {} is after EndDate {}",
            start_date,
            end_date
        );
        let internal_time = parse_timezone(get(time, "Time", "InternalTime")?)?;
        let display_time = parse_timezone(get(time, "Time", "DisplayTime")?)?;

        let io = section(&ini, "IO")?;
        let dump_path = PathBuf::from(get(io, "IO", "DumpPath")?);

        Ok(Self {
            time: TimeSettings {
                start_date,
                end_date,
                internal_time,
                display_time,
            },
            io: IoSettings { dump_path },
        })
    }
}

/// APIトークンをファイルから読み込む。
///
/// ファイルの内容をそのままトークンとするが、末尾の改行だけは取り除く。
pub fn read_api_token(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read API key file: {}", path.display()))?;
    let token = content.trim_end_matches(['\r', '\n']);
    ensure!(!token.is_empty(), "API key file is empty: {}", path.display());

    Ok(token.to_string())
}

fn section<'a>(ini: &'a Ini, name: &str) -> Result<&'a Properties> {
    ini.section(Some(name)).with_context(|| format!("Missing section [{}]", name))
}

fn get<'a>(properties: &'a Properties, section: &str, key: &str) -> Result<&'a str> {
    properties
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
        .with_context(|| format!("Missing key {} in section [{}]", key, section))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("Failed to parse date: {}", s))
}

fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>().map_err(|e| anyhow!("Unknown timezone {}: {}", s, e))
}
