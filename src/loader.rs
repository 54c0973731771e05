use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{SessionRecord, UserAggregate};

pub const SESSION_COLUMNS: [&str; 12] = [
    "user_id",
    "session_id",
    "session_start",
    "session_end",
    "app_version",
    "group",
    "device_type",
    "os",
    "language_preference",
    "referral_source",
    "subscription_type",
    "is_premium_user",
];

pub const AGGREGATE_COLUMNS: [&str; 7] = [
    "user_id",
    "total_clicks",
    "total_impressions",
    "total_completed",
    "total_started",
    "total_watch_time",
    "total_sessions",
];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, thiserror::Error)]
pub enum DataFormatError {
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("row {row}, column {column}: cannot read {value:?} as {expected}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read input: {0}")]
    Read(#[from] csv::Error),
}

pub fn load_sessions(path: &Path) -> Result<Vec<SessionRecord>, DataFormatError> {
    read_sessions(csv::Reader::from_path(path)?)
}

pub fn read_sessions<R: Read>(
    mut reader: csv::Reader<R>,
) -> Result<Vec<SessionRecord>, DataFormatError> {
    #[derive(serde::Deserialize)]
    struct RawSession {
        user_id: String,
        session_id: String,
        session_start: String,
        session_end: String,
        app_version: String,
        group: String,
        device_type: String,
        os: String,
        language_preference: String,
        referral_source: String,
        subscription_type: String,
        is_premium_user: Option<String>,
    }

    check_columns(reader.headers()?, &SESSION_COLUMNS)?;

    let mut sessions = Vec::new();
    for (index, result) in reader.deserialize::<RawSession>().enumerate() {
        let raw = result?;
        let row = index + 2; // line 1 is the header
        sessions.push(SessionRecord {
            session_start: parse_datetime(row, "session_start", &raw.session_start)?,
            session_end: parse_datetime(row, "session_end", &raw.session_end)?,
            is_premium_user: parse_tri_state(
                row,
                "is_premium_user",
                raw.is_premium_user.as_deref(),
            )?,
            user_id: raw.user_id,
            session_id: raw.session_id,
            app_version: raw.app_version,
            group: raw.group,
            device_type: raw.device_type,
            os: raw.os,
            language_preference: raw.language_preference,
            referral_source: raw.referral_source,
            subscription_type: raw.subscription_type,
        });
    }

    Ok(sessions)
}

pub fn load_user_aggregates(path: &Path) -> Result<Vec<UserAggregate>, DataFormatError> {
    read_user_aggregates(csv::Reader::from_path(path)?)
}

pub fn read_user_aggregates<R: Read>(
    mut reader: csv::Reader<R>,
) -> Result<Vec<UserAggregate>, DataFormatError> {
    check_columns(reader.headers()?, &AGGREGATE_COLUMNS)?;

    let mut aggregates = Vec::new();
    for result in reader.deserialize::<UserAggregate>() {
        aggregates.push(result?);
    }

    Ok(aggregates)
}

fn check_columns(
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<(), DataFormatError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !headers.iter().any(|header| header == **name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataFormatError::MissingColumns(missing))
    }
}

fn parse_datetime(
    row: usize,
    column: &'static str,
    value: &str,
) -> Result<NaiveDateTime, DataFormatError> {
    let trimmed = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(DataFormatError::InvalidValue {
        row,
        column,
        value: value.to_string(),
        expected: "a date-time",
    })
}

fn parse_tri_state(
    row: usize,
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<bool>, DataFormatError> {
    let raw = match value {
        Some(raw) => raw.trim(),
        None => return Ok(None),
    };
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(DataFormatError::InvalidValue {
            row,
            column,
            value: raw.to_string(),
            expected: "true, false, or empty",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_HEADER: &str = "user_id,session_id,session_start,session_end,app_version,\
group,device_type,os,language_preference,referral_source,subscription_type,is_premium_user";

    fn sessions_from(body: &str) -> Result<Vec<SessionRecord>, DataFormatError> {
        let data = format!("{SESSION_HEADER}\n{body}");
        read_sessions(csv::Reader::from_reader(data.as_bytes()))
    }

    #[test]
    fn loads_typed_session_rows() {
        let rows = sessions_from(
            "u1,s1,2024-03-01 20:15:00,2024-03-01 21:00:00,2.4.1,A,mobile,ios,en,organic,basic,True\n\
             u2,s2,2024-03-02T09:30:00,2024-03-02T09:55:00,2.4.1,B,tv,tvos,de,paid,premium,",
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "u1");
        assert_eq!(rows[0].group, "A");
        assert_eq!(
            rows[0].session_start,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(20, 15, 0)
                .unwrap()
        );
        assert_eq!(rows[0].is_premium_user, Some(true));
        assert_eq!(rows[1].is_premium_user, None);
    }

    #[test]
    fn bare_dates_parse_to_midnight() {
        let rows = sessions_from(
            "u1,s1,2024-03-01,2024-03-01,2.4.1,A,mobile,ios,en,organic,basic,false",
        )
        .unwrap();

        assert_eq!(
            rows[0].session_start,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(rows[0].is_premium_user, Some(false));
    }

    #[test]
    fn missing_columns_are_reported_by_name() {
        let data = "user_id,session_start\nu1,2024-03-01 20:15:00";
        let err = read_sessions(csv::Reader::from_reader(data.as_bytes())).unwrap_err();

        match err {
            DataFormatError::MissingColumns(missing) => {
                assert!(missing.contains(&"session_end".to_string()));
                assert!(missing.contains(&"is_premium_user".to_string()));
                assert!(!missing.contains(&"user_id".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_timestamps_name_row_and_column() {
        let err = sessions_from(
            "u1,s1,not-a-date,2024-03-01 21:00:00,2.4.1,A,mobile,ios,en,organic,basic,true",
        )
        .unwrap_err();

        match err {
            DataFormatError::InvalidValue { row, column, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "session_start");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn premium_flag_rejects_garbage() {
        let err = sessions_from(
            "u1,s1,2024-03-01 20:15:00,2024-03-01 21:00:00,2.4.1,A,mobile,ios,en,organic,basic,maybe",
        )
        .unwrap_err();

        match err {
            DataFormatError::InvalidValue { column, .. } => {
                assert_eq!(column, "is_premium_user");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn loads_user_aggregates() {
        let data = "user_id,total_clicks,total_impressions,total_completed,total_started,\
total_watch_time,total_sessions\nu1,12,200,8,10,95.5,3";
        let rows = read_user_aggregates(csv::Reader::from_reader(data.as_bytes())).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "u1");
        assert_eq!(rows[0].total_clicks, 12.0);
        assert_eq!(rows[0].total_watch_time, 95.5);
    }

    #[test]
    fn aggregate_header_is_checked() {
        let data = "user_id,total_clicks\nu1,12";
        let err = read_user_aggregates(csv::Reader::from_reader(data.as_bytes())).unwrap_err();

        match err {
            DataFormatError::MissingColumns(missing) => {
                assert!(missing.contains(&"total_sessions".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }
}
