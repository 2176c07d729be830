use chrono::{NaiveDate, NaiveTime};

/// Togglから取得したタイムエントリー。
///
/// タイムスタンプはAPIが返した文字列をそのまま保持し、CSVにもそのまま出力する。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub id: i64,
    pub workspace_id: i64,
    pub user_id: i64,
    pub project_id: Option<i64>,
    pub description: Option<String>,
    pub start: String,
    pub stop: Option<String>,
    pub duration: i64,
    pub billable: bool,
    pub duronly: bool,
    pub at: String,
    pub guid: Option<String>,
}

/// プロジェクトのIDと名前。
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// プロジェクト名と開始日時の日付・時刻を付与したタイムエントリー。
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedRecord {
    pub entry: TimeEntry,
    pub project_name: Option<String>,
    /// 基準タイムゾーン(`InternalTime`)での開始日
    pub reference_date: NaiveDate,
    /// 基準タイムゾーン(`InternalTime`)での開始時刻
    pub reference_time: NaiveTime,
    /// 表示タイムゾーン(`DisplayTime`)での開始日
    pub display_date: NaiveDate,
    /// 表示タイムゾーン(`DisplayTime`)での開始時刻
    pub display_time: NaiveTime,
}
