use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;

use crate::time_entry::{Project, TimeEntry};

/// Toggl API v9のベースURL。
const DEFAULT_API_URL: &str = "https://api.track.toggl.com/api/v9";

/// クエリパラメータに渡す日付の書式。
const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Toggl APIのレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglTimeEntry {
    id: i64,
    workspace_id: i64,
    user_id: i64,
    project_id: Option<i64>,
    description: Option<String>,
    start: String,
    stop: Option<String>,
    duration: i64,
    #[serde(default)]
    billable: bool,
    #[serde(default)]
    duronly: bool,
    at: String,
    guid: Option<String>,
}

impl From<TogglTimeEntry> for TimeEntry {
    fn from(entry: TogglTimeEntry) -> Self {
        Self {
            id: entry.id,
            workspace_id: entry.workspace_id,
            user_id: entry.user_id,
            project_id: entry.project_id,
            description: entry.description,
            start: entry.start,
            stop: entry.stop,
            duration: entry.duration,
            billable: entry.billable,
            duronly: entry.duronly,
            at: entry.at,
            guid: entry.guid,
        }
    }
}

/// Toggl APIのプロジェクト情報をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglProject {
    id: i64,
    name: String,
}

impl From<TogglProject> for Project {
    fn from(project: TogglProject) -> Self {
        Self {
            id: project.id,
            name: project.name,
        }
    }
}

/// Toggl APIからデータを読み出すためのリポジトリ。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TogglRepository {
    /// 指定された期間のタイムエントリーを取得する。
    ///
    /// ページングは行わないため、API側の上限を超えた分は返らない。
    ///
    /// # Arguments
    ///
    /// * `start_date` - 取得する期間の開始日
    /// * `end_date` - 取得する期間の終了日
    async fn read_time_entries(
        &self,
        start_date: &NaiveDate,
        end_date: &NaiveDate,
    ) -> Result<Vec<TimeEntry>>;

    /// プロジェクトを1件取得する。
    ///
    /// # Arguments
    ///
    /// * `workspace_id` - プロジェクトが属するワークスペースのID
    /// * `project_id` - 取得するプロジェクトのID
    async fn read_project(&self, workspace_id: i64, project_id: i64) -> Result<Project>;
}

/// Toggl APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TogglClient::new(api_token);
/// let time_entries = client.read_time_entries(&start_date, &end_date).await?;
/// ```
pub struct TogglClient {
    client: Client,
    api_url: String,
    api_token: String,
}

impl TogglClient {
    /// 新しい`TogglClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `api_token` - Toggl APIのトークン
    pub fn new(api_token: impl Into<String>) -> Self {
        Self::with_api_url(api_token, DEFAULT_API_URL)
    }

    /// 接続先を指定して新しい`TogglClient`を返す。
    pub fn with_api_url(api_token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl TogglRepository for TogglClient {
    async fn read_time_entries(
        &self,
        start_date: &NaiveDate,
        end_date: &NaiveDate,
    ) -> Result<Vec<TimeEntry>> {
        let url = format!("{}/me/time_entries", self.api_url);
        info!("Requesting time entries: {} ~ {}", start_date, end_date);
        let toggl_time_entries = self
            .client
            .get(&url)
            .basic_auth(&self.api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
            .query(&[
                ("start_date", start_date.format(QUERY_DATE_FORMAT).to_string()),
                ("end_date", end_date.format(QUERY_DATE_FORMAT).to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send request to Toggl API at {}", url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Vec<TogglTimeEntry>>()
            .await
            .context("Failed to deserialize response")?;
        info!("{} records", toggl_time_entries.len());

        Ok(toggl_time_entries.into_iter().map(TimeEntry::from).collect())
    }

    async fn read_project(&self, workspace_id: i64, project_id: i64) -> Result<Project> {
        let url = format!(
            "{}/workspaces/{}/projects/{}",
            self.api_url, workspace_id, project_id
        );
        debug!("Requesting project: {}", project_id);
        let project = self
            .client
            .get(&url)
            .basic_auth(&self.api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to Toggl API at {}", url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<TogglProject>()
            .await
            .context("Failed to deserialize response")?;

        Ok(project.into())
    }
}
