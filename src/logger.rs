use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// ログレベルを上書きするための環境変数。
const LOG_LEVEL_ENV: &str = "RUST_LOG";

/// ログ出力を初期化する。
///
/// 標準エラー出力に色付きで出力する。
/// レベルは`RUST_LOG`で指定でき、未指定または解釈できない場合は`Info`とする。
pub fn init() -> Result<()> {
    let level = level_from(env::var(LOG_LEVEL_ENV).ok().as_deref());
    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()
        .context("Failed to initialize logger")?;

    Ok(())
}

/// 環境変数の値からログレベルを決める。
fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}
