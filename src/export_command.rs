use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use crate::dump::CsvDumper;
use crate::enrich::{collect_project_keys, enrich};
use crate::settings::Settings;
use crate::toggl::TogglRepository;

/// タイムエントリーを取得してCSVに書き出すコマンド。
pub struct ExportCommand<'a, T: TogglRepository> {
    toggl_client: &'a T,
    settings: &'a Settings,
}

impl<'a, T: TogglRepository> ExportCommand<'a, T> {
    /// 新しい`ExportCommand`を返す。
    ///
    /// # Arguments
    /// * `toggl_client` - Toggl APIと通信するためのリポジトリ
    /// * `settings` - 設定ファイルの内容
    pub fn new(toggl_client: &'a T, settings: &'a Settings) -> Self {
        Self {
            toggl_client,
            settings,
        }
    }

    /// 設定された期間のタイムエントリーを取得し、CSVに書き出す。
    ///
    /// 全件のファイル、表示タイムゾーンの日毎のファイル、基準タイムゾーンの日毎のファイルの順に書き出し、
    /// 書き出したファイルのパスを返す。
    pub async fn run(&self) -> Result<Vec<PathBuf>> {
        let time = &self.settings.time;
        let dumper = CsvDumper::new(
            &self.settings.io.dump_path,
            &time.internal_time,
            &time.display_time,
        )?;

        let time_entries = self
            .toggl_client
            .read_time_entries(&time.start_date, &time.end_date)
            .await
            .context("Failed to retrieve time entries")?;
        info!("Time entries retrieved successfully: {}", time_entries.len());

        let project_keys = collect_project_keys(&time_entries);
        info!("Requesting {} projects", project_keys.len());
        let mut project_names = HashMap::new();
        for key in project_keys {
            let project = self
                .toggl_client
                .read_project(key.workspace_id, key.project_id)
                .await
                .with_context(|| format!("Failed to retrieve project: {}", key.project_id))?;
            project_names.insert(project.id, project.name);
        }
        info!("{} projects retrieved", project_names.len());

        let records = enrich(
            time_entries,
            &project_names,
            time.internal_time,
            time.display_time,
        )
        .context("Failed to convert time entries")?;

        info!("Saving to {}", dumper.dump_path().display());
        let mut written = vec![dumper.write_all(&records)?];
        written.extend(dumper.write_local_daily(&records)?);
        written.extend(dumper.write_utc_daily(&records)?);
        info!("{} files written", written.len());

        Ok(written)
    }
}
