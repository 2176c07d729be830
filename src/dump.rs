use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use log::{debug, info};
use serde::Serialize;

use crate::time_entry::EnrichedRecord;

/// 全件を出力するファイル名。
pub const ALL_FILE_NAME: &str = "toggl_all.csv";

/// タイムゾーンに依存しない列。並びは`CsvRow`のフィールド順と一致させること。
const ENTRY_COLUMNS: [&str; 13] = [
    "id",
    "workspace_id",
    "user_id",
    "project_id",
    "description",
    "start",
    "stop",
    "duration",
    "billable",
    "duronly",
    "at",
    "guid",
    "proj_name",
];

/// CSVの1行。`None`は空文字として出力される。
///
/// 基準と表示のタイムゾーンが同じ場合、表示側の日付と時刻は列ごと出力しない。
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: i64,
    workspace_id: i64,
    user_id: i64,
    project_id: Option<i64>,
    description: Option<&'a str>,
    start: &'a str,
    stop: Option<&'a str>,
    duration: i64,
    billable: bool,
    duronly: bool,
    at: &'a str,
    guid: Option<&'a str>,
    proj_name: Option<&'a str>,
    reference_date: NaiveDate,
    reference_time: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_time: Option<NaiveTime>,
}

impl<'a> CsvRow<'a> {
    fn new(record: &'a EnrichedRecord, same_zone: bool) -> Self {
        let entry = &record.entry;
        let (display_date, display_time) = if same_zone {
            (None, None)
        } else {
            (Some(record.display_date), Some(record.display_time))
        };
        Self {
            id: entry.id,
            workspace_id: entry.workspace_id,
            user_id: entry.user_id,
            project_id: entry.project_id,
            description: entry.description.as_deref(),
            start: &entry.start,
            stop: entry.stop.as_deref(),
            duration: entry.duration,
            billable: entry.billable,
            duronly: entry.duronly,
            at: &entry.at,
            guid: entry.guid.as_deref(),
            proj_name: record.project_name.as_deref(),
            reference_date: record.reference_date,
            reference_time: record.reference_time,
            display_date,
            display_time,
        }
    }
}

/// CSVの列構成。
#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    header: Vec<String>,
    same_zone: bool,
}

impl Columns {
    /// 新しい`Columns`を返す。
    ///
    /// 日付と時刻の列名にはタイムゾーン名を付ける(例: `start_date_Asia/Tokyo`)。
    /// 基準と表示のタイムゾーンが同じ場合は、日付と時刻の列を1組だけにする。
    pub fn new(reference: &Tz, display: &Tz) -> Self {
        let same_zone = reference == display;
        let zones = if same_zone {
            vec![reference]
        } else {
            vec![reference, display]
        };
        let header = ENTRY_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .chain(zones.into_iter().flat_map(|zone| {
                [
                    format!("start_date_{}", zone.name()),
                    format!("start_time_{}", zone.name()),
                ]
            }))
            .collect();

        Self { header, same_zone }
    }

    /// ヘッダー行。
    pub fn header(&self) -> &[String] {
        &self.header
    }
}

/// ヘッダー付きのCSVとしてレコードを書き出す。
pub fn write_csv<'a, W, I>(writer: W, columns: &Columns, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a EnrichedRecord>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    let header = columns.header();
    writer.write_record(header).context("Failed to write header")?;
    for record in records {
        writer
            .serialize(CsvRow::new(record, columns.same_zone))
            .with_context(|| format!("Failed to write time entry: {}", record.entry.id))?;
    }
    writer.flush().context("Failed to flush csv")?;

    Ok(())
}

/// 出力先ディレクトリへCSVを書き出す。
pub struct CsvDumper {
    dump_path: PathBuf,
    columns: Columns,
}

impl CsvDumper {
    /// 新しい`CsvDumper`を返す。
    ///
    /// 出力先ディレクトリが存在しない場合はエラーを返す。
    ///
    /// # Arguments
    ///
    /// * `dump_path` - 出力先ディレクトリ
    /// * `reference` - 基準タイムゾーン
    /// * `display` - 表示タイムゾーン
    pub fn new(dump_path: impl Into<PathBuf>, reference: &Tz, display: &Tz) -> Result<Self> {
        let dump_path = dump_path.into();
        ensure!(
            dump_path.is_dir(),
            "Dump path is not a directory: {}",
            dump_path.display()
        );

        Ok(Self {
            dump_path,
            columns: Columns::new(reference, display),
        })
    }

    /// 全レコードを`toggl_all.csv`に書き出す。
    pub fn write_all(&self, records: &[EnrichedRecord]) -> Result<PathBuf> {
        self.write_file(ALL_FILE_NAME, records)
    }

    /// 表示タイムゾーンの日付ごとに`toggl_local_<date>.csv`へ書き出す。
    pub fn write_local_daily(&self, records: &[EnrichedRecord]) -> Result<Vec<PathBuf>> {
        self.write_daily(records, "local", |record| record.display_date)
    }

    /// 基準タイムゾーンの日付ごとに`toggl_utc_<date>.csv`へ書き出す。
    pub fn write_utc_daily(&self, records: &[EnrichedRecord]) -> Result<Vec<PathBuf>> {
        self.write_daily(records, "utc", |record| record.reference_date)
    }

    fn write_daily<F>(
        &self,
        records: &[EnrichedRecord],
        label: &str,
        key: F,
    ) -> Result<Vec<PathBuf>>
    where
        F: Fn(&EnrichedRecord) -> NaiveDate,
    {
        let daily: BTreeMap<NaiveDate, Vec<&EnrichedRecord>> =
            records.iter().fold(BTreeMap::new(), |mut acc, record| {
                acc.entry(key(record)).or_default().push(record);
                acc
            });
        info!("Writing {} {} files", daily.len(), label);

        daily
            .iter()
            .map(|(date, bucket)| {
                let file_name = format!("toggl_{}_{}.csv", label, date.format("%Y-%m-%d"));
                self.write_file(&file_name, bucket.iter().copied())
            })
            .collect()
    }

    fn write_file<'a, I>(&self, file_name: &str, records: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = &'a EnrichedRecord>,
    {
        let path = self.dump_path.join(file_name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        write_csv(file, &self.columns, records)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
        debug!("Wrote {}", path.display());

        Ok(path)
    }

    /// 出力先ディレクトリ。
    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::path::Path;

    use chrono_tz::Tz;
    use tempfile::tempdir;

    use super::{write_csv, Columns, CsvDumper};
    use crate::enrich::enrich;
    use crate::time_entry::{EnrichedRecord, TimeEntry};

    fn dummy_entry(id: i64, project_id: Option<i64>, start: &str) -> TimeEntry {
        TimeEntry {
            id,
            workspace_id: 10,
            user_id: 100,
            project_id,
            description: Some(format!("entry{}", id)),
            start: start.to_string(),
            stop: None,
            duration: 3600,
            billable: false,
            duronly: false,
            at: "2023-03-05T00:00:00+00:00".to_string(),
            guid: None,
        }
    }

    /// UTCを基準、New Yorkを表示とした日付の境界をまたぐレコード。
    fn dummy_records() -> Vec<EnrichedRecord> {
        let project_names = HashMap::from([(1000, "Thesis".to_string())]);
        let entries = vec![
            // UTC 3/1, NY 3/1
            dummy_entry(1, Some(1000), "2023-03-01T23:30:00+00:00"),
            // UTC 3/2, NY 3/1
            dummy_entry(2, None, "2023-03-02T01:00:00+00:00"),
            // UTC 3/2, NY 3/2
            dummy_entry(3, Some(1000), "2023-03-02T15:00:00+00:00"),
            // UTC 3/1, NY 3/1
            dummy_entry(4, Some(2000), "2023-03-01T08:00:00+00:00"),
        ];
        enrich(entries, &project_names, Tz::UTC, Tz::America__New_York).unwrap()
    }

    /// CSVファイルを読み、id列を返す。
    fn read_ids(path: &Path) -> Vec<i64> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|record| record.unwrap()[0].parse().unwrap())
            .collect()
    }

    #[test]
    fn test_columns() {
        let columns = Columns::new(&Tz::UTC, &Tz::America__New_York);
        let header = columns.header();

        assert_eq!(header.len(), 17);
        assert_eq!(header[12], "proj_name");
        assert_eq!(
            &header[13..],
            &[
                "start_date_UTC",
                "start_time_UTC",
                "start_date_America/New_York",
                "start_time_America/New_York",
            ]
        );
    }

    /// 基準と表示のタイムゾーンが同じ場合、日付と時刻の列は1組になる。
    #[test]
    fn test_columns_same_zone() {
        let columns = Columns::new(&Tz::Asia__Tokyo, &Tz::Asia__Tokyo);
        let header = columns.header();

        assert_eq!(header.len(), 15);
        assert_eq!(
            &header[13..],
            &["start_date_Asia/Tokyo", "start_time_Asia/Tokyo"]
        );
        let unique: HashSet<&String> = header.iter().collect();
        assert_eq!(unique.len(), header.len());
    }

    #[test]
    fn test_write_csv() {
        let mut entry = dummy_entry(1, Some(1000), "2023-03-01T23:30:00Z");
        entry.description = Some("write report, draft".to_string());
        entry.stop = Some("2023-03-02T00:30:00Z".to_string());
        entry.guid = Some("a1b2c3".to_string());
        let mut no_project = dummy_entry(2, None, "2023-03-02T09:00:00Z");
        no_project.description = None;
        no_project.billable = true;
        let records = enrich(
            vec![entry, no_project],
            &HashMap::from([(1000, "Thesis".to_string())]),
            Tz::UTC,
            Tz::America__New_York,
        )
        .unwrap();

        let columns = Columns::new(&Tz::UTC, &Tz::America__New_York);
        let mut writer = Vec::new();
        write_csv(&mut writer, &columns, &records).unwrap();

        let expected = [
            "id,workspace_id,user_id,project_id,description,start,stop,duration,billable,duronly,at,guid,proj_name,start_date_UTC,start_time_UTC,start_date_America/New_York,start_time_America/New_York",
            "1,10,100,1000,\"write report, draft\",2023-03-01T23:30:00Z,2023-03-02T00:30:00Z,3600,false,false,2023-03-05T00:00:00+00:00,a1b2c3,Thesis,2023-03-01,23:30:00,2023-03-01,18:30:00",
            "2,10,100,,,2023-03-02T09:00:00Z,,3600,true,false,2023-03-05T00:00:00+00:00,,,2023-03-02,09:00:00,2023-03-02,04:00:00",
            "",
        ]
        .join("\n");
        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    #[test]
    fn test_write_csv_same_zone() {
        let records = enrich(
            vec![
                dummy_entry(1, Some(1000), "2023-03-01T23:30:00Z"),
                dummy_entry(2, None, "2023-03-02T09:00:00Z"),
            ],
            &HashMap::from([(1000, "Thesis".to_string())]),
            Tz::UTC,
            Tz::UTC,
        )
        .unwrap();

        let columns = Columns::new(&Tz::UTC, &Tz::UTC);
        let mut writer = Vec::new();
        write_csv(&mut writer, &columns, &records).unwrap();

        let expected = [
            "id,workspace_id,user_id,project_id,description,start,stop,duration,billable,duronly,at,guid,proj_name,start_date_UTC,start_time_UTC",
            "1,10,100,1000,entry1,2023-03-01T23:30:00Z,,3600,false,false,2023-03-05T00:00:00+00:00,,Thesis,2023-03-01,23:30:00",
            "2,10,100,,entry2,2023-03-02T09:00:00Z,,3600,false,false,2023-03-05T00:00:00+00:00,,,2023-03-02,09:00:00",
            "",
        ]
        .join("\n");
        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    #[test]
    fn test_new_missing_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");

        assert!(CsvDumper::new(missing, &Tz::UTC, &Tz::UTC).is_err());
    }

    #[test]
    fn test_write_all() {
        let dir = tempdir().unwrap();
        let dumper = CsvDumper::new(dir.path(), &Tz::UTC, &Tz::America__New_York).unwrap();
        let records = dummy_records();

        let path = dumper.write_all(&records).unwrap();

        assert_eq!(path, dir.path().join("toggl_all.csv"));
        assert_eq!(read_ids(&path), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_write_local_daily() {
        let dir = tempdir().unwrap();
        let dumper = CsvDumper::new(dir.path(), &Tz::UTC, &Tz::America__New_York).unwrap();

        let paths = dumper.write_local_daily(&dummy_records()).unwrap();

        assert_eq!(
            paths,
            vec![
                dir.path().join("toggl_local_2023-03-01.csv"),
                dir.path().join("toggl_local_2023-03-02.csv"),
            ]
        );
        assert_eq!(read_ids(&paths[0]), vec![1, 2, 4]);
        assert_eq!(read_ids(&paths[1]), vec![3]);
    }

    #[test]
    fn test_write_utc_daily() {
        let dir = tempdir().unwrap();
        let dumper = CsvDumper::new(dir.path(), &Tz::UTC, &Tz::America__New_York).unwrap();

        let paths = dumper.write_utc_daily(&dummy_records()).unwrap();

        assert_eq!(
            paths,
            vec![
                dir.path().join("toggl_utc_2023-03-01.csv"),
                dir.path().join("toggl_utc_2023-03-02.csv"),
            ]
        );
        assert_eq!(read_ids(&paths[0]), vec![1, 4]);
        assert_eq!(read_ids(&paths[1]), vec![2, 3]);
    }

    /// 日毎のファイルを合わせると全件と一致し、重複も欠落もない。
    #[test]
    fn test_daily_files_partition_all_records() {
        let dir = tempdir().unwrap();
        let dumper = CsvDumper::new(dir.path(), &Tz::UTC, &Tz::America__New_York).unwrap();
        let records = dummy_records();
        let all: HashSet<i64> = read_ids(&dumper.write_all(&records).unwrap())
            .into_iter()
            .collect();

        for paths in [
            dumper.write_local_daily(&records).unwrap(),
            dumper.write_utc_daily(&records).unwrap(),
        ] {
            let ids: Vec<i64> = paths.iter().flat_map(|path| read_ids(path)).collect();
            let unique: HashSet<i64> = ids.iter().copied().collect();
            assert_eq!(ids.len(), unique.len());
            assert_eq!(unique, all);
        }
    }

    /// 同じ入力で2回書き出すと同じ内容になる。
    #[test]
    fn test_write_idempotent() {
        let dir = tempdir().unwrap();
        let dumper = CsvDumper::new(dir.path(), &Tz::UTC, &Tz::America__New_York).unwrap();
        let records = dummy_records();

        let first = dumper.write_local_daily(&records).unwrap();
        let first_contents: Vec<Vec<u8>> = first.iter().map(|p| fs::read(p).unwrap()).collect();
        let second = dumper.write_local_daily(&records).unwrap();
        let second_contents: Vec<Vec<u8>> = second.iter().map(|p| fs::read(p).unwrap()).collect();

        assert_eq!(first, second);
        assert_eq!(first_contents, second_contents);
    }
}
