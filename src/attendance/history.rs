use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::model::attendance::AttendanceRecord;

/// One calendar day of a worker's history: every session that day, the
/// union of punch methods seen, and the summed duration of closed pairs.
#[derive(Debug, Serialize, ToSchema)]
pub struct DaySummary {
    #[schema(example = "2025-03-14", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
    /// Union of check-in and check-out methods used that day.
    #[schema(example = json!(["face", "rfid"]))]
    pub methods: Vec<String>,
    pub total_seconds: i64,
    #[schema(example = "1h 0m 0s")]
    pub total_duration: String,
}

/// `3661` -> `"1h 1m 1s"`.
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

/// Group records into per-day summaries, newest date first. Open records
/// contribute zero duration until closed.
pub fn summarize(records: Vec<AttendanceRecord>) -> Vec<DaySummary> {
    let mut by_date: BTreeMap<NaiveDate, Vec<AttendanceRecord>> = BTreeMap::new();
    for record in records {
        by_date.entry(record.date).or_default().push(record);
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, mut records)| {
            records.sort_by_key(|r| r.id);

            let mut methods: Vec<String> = Vec::new();
            for record in &records {
                for method in [&record.check_in_method, &record.check_out_method]
                    .into_iter()
                    .flatten()
                {
                    if !methods.contains(method) {
                        methods.push(method.clone());
                    }
                }
            }

            let total_seconds: i64 = records.iter().map(|r| r.duration_seconds()).sum();

            DaySummary {
                date,
                methods,
                total_seconds,
                total_duration: format_duration(total_seconds),
                records,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn record(
        id: u64,
        date: NaiveDate,
        check_in: Option<NaiveDateTime>,
        check_out: Option<NaiveDateTime>,
        in_method: &str,
        out_method: Option<&str>,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id,
            worker_id: 1,
            date,
            check_in,
            check_out,
            check_in_method: Some(in_method.to_string()),
            check_out_method: out_method.map(str::to_string),
        }
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "0h 0m 0s");
        assert_eq!(format_duration(3600), "1h 0m 0s");
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(7322), "2h 2m 2s");
        assert_eq!(format_duration(-5), "0h 0m 0s");
    }

    #[test]
    fn alternating_punches_round_trip() {
        // two closed sessions on one day: 1h and 30m
        let start = day(14).and_hms_opt(9, 0, 0).unwrap();
        let records = vec![
            record(
                1,
                day(14),
                Some(start),
                Some(start + Duration::seconds(3600)),
                "face",
                Some("face"),
            ),
            record(
                2,
                day(14),
                Some(start + Duration::seconds(7200)),
                Some(start + Duration::seconds(9000)),
                "rfid",
                Some("face"),
            ),
        ];

        let summary = summarize(records);
        assert_eq!(summary.len(), 1);
        let today = &summary[0];
        assert_eq!(today.records.len(), 2);
        assert_eq!(today.total_seconds, 5400);
        assert_eq!(today.total_duration, "1h 30m 0s");
        // union of methods across both sides
        assert_eq!(today.methods, vec!["face".to_string(), "rfid".to_string()]);
    }

    #[test]
    fn open_record_contributes_zero() {
        let start = day(14).and_hms_opt(9, 0, 0).unwrap();
        let records = vec![record(1, day(14), Some(start), None, "face", None)];

        let summary = summarize(records);
        assert_eq!(summary[0].total_seconds, 0);
        assert_eq!(summary[0].total_duration, "0h 0m 0s");
    }

    #[test]
    fn days_ordered_newest_first() {
        let s1 = day(10).and_hms_opt(9, 0, 0).unwrap();
        let s2 = day(14).and_hms_opt(9, 0, 0).unwrap();
        let records = vec![
            record(1, day(10), Some(s1), Some(s1 + Duration::seconds(60)), "face", Some("face")),
            record(2, day(14), Some(s2), Some(s2 + Duration::seconds(60)), "rfid", Some("rfid")),
        ];

        let summary = summarize(records);
        assert_eq!(summary[0].date, day(14));
        assert_eq!(summary[1].date, day(10));
    }
}
