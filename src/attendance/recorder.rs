use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

use crate::attendance::cooldown::CooldownCheck;
use crate::attendance::geofence::{self, Location};
use crate::attendance::store::{AttendanceStore, WorkerRef};
use crate::model::attendance::{AttendanceRecord, PunchMethod};
use crate::model::geofence::GeofenceConfig;

#[derive(Debug, Error)]
pub enum PunchError {
    #[error("Worker not found")]
    WorkerNotFound,

    #[error("{reason}")]
    LocationInvalid { distance_km: f64, reason: String },

    #[error("Please wait {remaining_seconds}s before punching again")]
    CooldownActive { remaining_seconds: i64 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy)]
pub enum WorkerLookup<'a> {
    Id(u64),
    RfidTag(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchAction {
    CheckedIn,
    CheckedOut,
}

#[derive(Debug)]
pub struct PunchOutcome {
    pub worker: WorkerRef,
    pub record: AttendanceRecord,
    pub action: PunchAction,
}

/// Turn one punch event into a check-in or check-out.
///
/// Order matters: worker resolution, then the server-side geofence re-check
/// (client claims are never trusted), then the cooldown reservation — only a
/// punch that passed everything touches the day's records. The reservation
/// doubles as the per-worker serialization point, so two concurrent punches
/// cannot both open (or both close) the same record.
pub async fn record_punch<S: AttendanceStore>(
    store: &S,
    lookup: WorkerLookup<'_>,
    location: Location,
    config: &GeofenceConfig,
    now: NaiveDateTime,
    method: PunchMethod,
    min_interval_seconds: i64,
) -> Result<PunchOutcome, PunchError> {
    let worker = match lookup {
        WorkerLookup::Id(id) => store.worker_by_id(id).await?,
        WorkerLookup::RfidTag(tag) => store.worker_by_rfid(tag).await?,
    }
    .ok_or(PunchError::WorkerNotFound)?;

    let decision = geofence::validate(location, config);
    if !decision.allowed {
        return Err(PunchError::LocationInvalid {
            distance_km: decision.distance_km(),
            reason: decision
                .reason
                .unwrap_or_else(|| "Location not permitted".to_string()),
        });
    }

    match store
        .reserve_punch(worker.id, now, min_interval_seconds)
        .await?
    {
        CooldownCheck::Reserved => {}
        CooldownCheck::CoolingDown { remaining_seconds } => {
            return Err(PunchError::CooldownActive { remaining_seconds });
        }
    }

    let today = now.date();

    let (record, action) = match store.open_record(worker.id, today).await? {
        Some(open) => {
            let closed = store.close_record(open.id, now, method).await?;
            (closed, PunchAction::CheckedOut)
        }
        None => {
            let opened = store.insert_record(worker.id, today, now, method).await?;
            (opened, PunchAction::CheckedIn)
        }
    };

    info!(
        worker_id = worker.id,
        method = %method,
        action = ?action,
        record_id = record.id,
        "Punch recorded"
    );

    Ok(PunchOutcome {
        worker,
        record,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{Duration, NaiveDate};
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::attendance::cooldown;

    struct MemStore {
        workers: Vec<(u64, String, Option<String>)>,
        records: Mutex<Vec<AttendanceRecord>>,
        last_punch: Mutex<HashMap<u64, NaiveDateTime>>,
        next_id: Mutex<u64>,
    }

    impl MemStore {
        fn with_worker(id: u64, name: &str, tag: Option<&str>) -> Self {
            Self {
                workers: vec![(id, name.to_string(), tag.map(str::to_string))],
                records: Mutex::new(Vec::new()),
                last_punch: Mutex::new(HashMap::new()),
                next_id: Mutex::new(1),
            }
        }
    }

    impl AttendanceStore for MemStore {
        async fn worker_by_id(&self, id: u64) -> Result<Option<WorkerRef>> {
            Ok(self
                .workers
                .iter()
                .find(|(wid, _, _)| *wid == id)
                .map(|(id, name, _)| WorkerRef {
                    id: *id,
                    name: name.clone(),
                }))
        }

        async fn worker_by_rfid(&self, tag: &str) -> Result<Option<WorkerRef>> {
            Ok(self
                .workers
                .iter()
                .find(|(_, _, t)| t.as_deref() == Some(tag))
                .map(|(id, name, _)| WorkerRef {
                    id: *id,
                    name: name.clone(),
                }))
        }

        async fn reserve_punch(
            &self,
            worker_id: u64,
            now: NaiveDateTime,
            min_interval_seconds: i64,
        ) -> Result<CooldownCheck> {
            let mut last_punch = self.last_punch.lock().unwrap();
            let last = last_punch.get(&worker_id).copied();
            let remaining = cooldown::remaining_seconds(last, now, min_interval_seconds);
            if remaining > 0 {
                return Ok(CooldownCheck::CoolingDown {
                    remaining_seconds: remaining,
                });
            }
            last_punch.insert(worker_id, now);
            Ok(CooldownCheck::Reserved)
        }

        async fn open_record(
            &self,
            worker_id: u64,
            date: NaiveDate,
        ) -> Result<Option<AttendanceRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| r.worker_id == worker_id && r.date == date && r.is_open())
                .cloned())
        }

        async fn insert_record(
            &self,
            worker_id: u64,
            date: NaiveDate,
            check_in: NaiveDateTime,
            method: PunchMethod,
        ) -> Result<AttendanceRecord> {
            let mut next_id = self.next_id.lock().unwrap();
            let record = AttendanceRecord {
                id: *next_id,
                worker_id,
                date,
                check_in: Some(check_in),
                check_out: None,
                check_in_method: Some(method.to_string()),
                check_out_method: None,
            };
            *next_id += 1;
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn close_record(
            &self,
            record_id: u64,
            check_out: NaiveDateTime,
            method: PunchMethod,
        ) -> Result<AttendanceRecord> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id == record_id)
                .expect("record exists");
            record.check_out = Some(check_out);
            record.check_out_method = Some(method.to_string());
            Ok(record.clone())
        }

        async fn records_for_worker(&self, worker_id: u64) -> Result<Vec<AttendanceRecord>> {
            let mut records: Vec<_> = self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.worker_id == worker_id)
                .cloned()
                .collect();
            records.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
            Ok(records)
        }

        async fn descriptors_for_worker(&self, _worker_id: u64) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    fn site_config() -> GeofenceConfig {
        GeofenceConfig {
            enabled: true,
            latitude: Some(12.2253),
            longitude: Some(79.0747),
            radius_m: Some(100.0),
            updated_at: None,
        }
    }

    fn at_site() -> Location {
        Location {
            lat: 12.2253,
            lon: 79.0747,
        }
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[actix_web::test]
    async fn punch_pair_produces_one_closed_record() {
        let store = MemStore::with_worker(1, "Ravi", Some("04A22F19"));
        let cfg = site_config();

        let first = record_punch(
            &store,
            WorkerLookup::Id(1),
            at_site(),
            &cfg,
            t0(),
            PunchMethod::Face,
            60,
        )
        .await
        .unwrap();
        assert_eq!(first.action, PunchAction::CheckedIn);
        assert!(first.record.is_open());

        let second = record_punch(
            &store,
            WorkerLookup::RfidTag("04A22F19"),
            at_site(),
            &cfg,
            t0() + Duration::seconds(3600),
            PunchMethod::Rfid,
            60,
        )
        .await
        .unwrap();
        assert_eq!(second.action, PunchAction::CheckedOut);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.duration_seconds(), 3600);
        // methods recorded per side, not assumed symmetric
        assert_eq!(second.record.check_in_method.as_deref(), Some("face"));
        assert_eq!(second.record.check_out_method.as_deref(), Some("rfid"));

        let records = store.records_for_worker(1).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[actix_web::test]
    async fn third_punch_opens_second_record() {
        let store = MemStore::with_worker(1, "Ravi", None);
        let cfg = site_config();

        for i in 0..3u32 {
            record_punch(
                &store,
                WorkerLookup::Id(1),
                at_site(),
                &cfg,
                t0() + Duration::seconds(i as i64 * 120),
                PunchMethod::Face,
                60,
            )
            .await
            .unwrap();
        }

        let records = store.records_for_worker(1).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|r| r.is_open()).count(), 1);
    }

    #[actix_web::test]
    async fn cooldown_rejects_then_allows() {
        let store = MemStore::with_worker(1, "Ravi", None);
        let cfg = site_config();

        record_punch(
            &store,
            WorkerLookup::Id(1),
            at_site(),
            &cfg,
            t0(),
            PunchMethod::Face,
            60,
        )
        .await
        .unwrap();

        let err = record_punch(
            &store,
            WorkerLookup::Id(1),
            at_site(),
            &cfg,
            t0() + Duration::seconds(10),
            PunchMethod::Rfid,
            60,
        )
        .await
        .unwrap_err();
        let remaining = match err {
            PunchError::CooldownActive { remaining_seconds } => remaining_seconds,
            other => panic!("expected cooldown, got {other:?}"),
        };
        assert!(remaining > 0);

        // after the reported remaining time elapses the punch goes through
        let third = record_punch(
            &store,
            WorkerLookup::Id(1),
            at_site(),
            &cfg,
            t0() + Duration::seconds(10 + remaining),
            PunchMethod::Rfid,
            60,
        )
        .await
        .unwrap();
        assert_eq!(third.action, PunchAction::CheckedOut);
    }

    #[actix_web::test]
    async fn outside_geofence_writes_nothing() {
        let store = MemStore::with_worker(1, "Ravi", None);
        let cfg = site_config();

        let err = record_punch(
            &store,
            WorkerLookup::Id(1),
            Location {
                lat: 13.0827,
                lon: 80.2707,
            },
            &cfg,
            t0(),
            PunchMethod::Face,
            60,
        )
        .await
        .unwrap_err();

        match err {
            PunchError::LocationInvalid { distance_km, .. } => assert!(distance_km > 1.0),
            other => panic!("expected location error, got {other:?}"),
        }
        assert!(store.records_for_worker(1).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn unknown_worker_and_unknown_tag_fail() {
        let store = MemStore::with_worker(1, "Ravi", Some("04A22F19"));
        let cfg = site_config();

        for lookup in [WorkerLookup::Id(99), WorkerLookup::RfidTag("FFFF")] {
            let err = record_punch(
                &store,
                lookup,
                at_site(),
                &cfg,
                t0(),
                PunchMethod::Rfid,
                60,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, PunchError::WorkerNotFound));
        }
    }
}
