use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::time_entry::{EnrichedRecord, TimeEntry};

/// タイムゾーンを持たない開始日時として受け付ける書式。
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// プロジェクトの取得に必要なIDの組。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectKey {
    pub workspace_id: i64,
    pub project_id: i64,
}

/// タイムエントリーが参照しているプロジェクトを重複なく列挙する。
///
/// プロジェクトIDの昇順で返す。ワークスペースIDは最初に現れたエントリーのものを使う。
pub fn collect_project_keys(entries: &[TimeEntry]) -> Vec<ProjectKey> {
    let mut keys: BTreeMap<i64, i64> = BTreeMap::new();
    for entry in entries {
        if let Some(project_id) = entry.project_id {
            keys.entry(project_id).or_insert(entry.workspace_id);
        }
    }

    keys.into_iter()
        .map(|(project_id, workspace_id)| ProjectKey {
            workspace_id,
            project_id,
        })
        .collect()
}

/// タイムエントリーにプロジェクト名と開始日時の日付・時刻を付与する。
///
/// プロジェクトIDがない、または`project_names`に含まれないエントリーもプロジェクト名なしで残す。
///
/// # Arguments
///
/// * `entries` - APIから取得したタイムエントリー
/// * `project_names` - プロジェクトIDから名前への対応
/// * `reference` - 基準タイムゾーン
/// * `display` - 表示タイムゾーン
pub fn enrich(
    entries: Vec<TimeEntry>,
    project_names: &HashMap<i64, String>,
    reference: Tz,
    display: Tz,
) -> Result<Vec<EnrichedRecord>> {
    entries
        .into_iter()
        .map(|entry| {
            let start = parse_start(&entry.start, &reference)
                .with_context(|| format!("Failed to parse start of time entry {}", entry.id))?;
            let displayed = start.with_timezone(&display);
            let project_name = entry
                .project_id
                .and_then(|project_id| project_names.get(&project_id).cloned());

            Ok(EnrichedRecord {
                entry,
                project_name,
                reference_date: start.date_naive(),
                reference_time: start.time(),
                display_date: displayed.date_naive(),
                display_time: displayed.time(),
            })
        })
        .collect()
}

/// 開始日時をパースし、基準タイムゾーンの日時にする。
///
/// オフセット付きの場合はその時刻を変換し、オフセットがない場合は基準タイムゾーンの時刻とみなす。
pub fn parse_start(start: &str, tz: &Tz) -> Result<DateTime<Tz>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(start) {
        return Ok(datetime.with_timezone(tz));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(start, format).ok())
        .with_context(|| format!("Failed to parse datetime: {}", start))?;
    tz.from_local_datetime(&naive)
        .single()
        .with_context(|| format!("Ambiguous or nonexistent local time {} in {}", start, tz))
}
