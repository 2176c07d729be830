use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

mod dump;
mod enrich;
mod export_command;
mod logger;
mod settings;
mod time_entry;
mod toggl;

use export_command::ExportCommand;
use settings::{read_api_token, Settings};
use toggl::TogglClient;

/// Togglのtime entryを日毎のCSVに書き出すCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- api_key.txt config.ini
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    /// APIトークンを記載したファイル
    #[clap(parse(from_os_str))]
    api_key_file: PathBuf,

    /// INI形式の設定ファイル
    #[clap(parse(from_os_str), default_value = "config.ini")]
    settings_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::init()?;

    info!("Reading settings: {}", args.settings_file.display());
    let api_token = read_api_token(&args.api_key_file)?;
    let settings = Settings::load(&args.settings_file)?;

    let client = TogglClient::new(api_token);
    ExportCommand::new(&client, &settings)
        .run()
        .await
        .context("Failed to export time entries")?;
    info!("Done");

    Ok(())
}
