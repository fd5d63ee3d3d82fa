use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;

use crate::attendance::cooldown::{self, CooldownCheck};
use crate::model::attendance::{AttendanceRecord, PunchMethod};

/// Minimal worker view the recorder needs.
#[derive(Debug, Clone)]
pub struct WorkerRef {
    pub id: u64,
    pub name: String,
}

/// Persistence seam for the attendance core. The MySQL implementation is
/// the production path; tests drive the recorder through an in-memory one.
pub trait AttendanceStore {
    async fn worker_by_id(&self, id: u64) -> Result<Option<WorkerRef>>;

    async fn worker_by_rfid(&self, tag: &str) -> Result<Option<WorkerRef>>;

    /// Cooldown check-and-set. Atomically claims `now` as the worker's last
    /// punch iff the previous one is at least `min_interval_seconds` old.
    /// Losing this race is indistinguishable from an ordinary cooldown hit.
    async fn reserve_punch(
        &self,
        worker_id: u64,
        now: NaiveDateTime,
        min_interval_seconds: i64,
    ) -> Result<CooldownCheck>;

    async fn open_record(
        &self,
        worker_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>>;

    async fn insert_record(
        &self,
        worker_id: u64,
        date: NaiveDate,
        check_in: NaiveDateTime,
        method: PunchMethod,
    ) -> Result<AttendanceRecord>;

    async fn close_record(
        &self,
        record_id: u64,
        check_out: NaiveDateTime,
        method: PunchMethod,
    ) -> Result<AttendanceRecord>;

    /// All records for a worker, newest date first.
    async fn records_for_worker(&self, worker_id: u64) -> Result<Vec<AttendanceRecord>>;

    /// Enrolled face descriptors for a worker.
    async fn descriptors_for_worker(&self, worker_id: u64) -> Result<Vec<Vec<f32>>>;
}

pub struct MySqlAttendanceStore<'a> {
    pool: &'a MySqlPool,
}

impl<'a> MySqlAttendanceStore<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_record(&self, record_id: u64) -> Result<AttendanceRecord> {
        sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, worker_id, date, check_in, check_out, check_in_method, check_out_method
            FROM attendance_records
            WHERE id = ?
            "#,
        )
        .bind(record_id)
        .fetch_one(self.pool)
        .await
        .context("attendance record vanished after write")
    }
}

impl AttendanceStore for MySqlAttendanceStore<'_> {
    async fn worker_by_id(&self, id: u64) -> Result<Option<WorkerRef>> {
        let row = sqlx::query_as::<_, (u64, String)>(
            "SELECT id, name FROM workers WHERE id = ? AND status = 'active'",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id, name)| WorkerRef { id, name }))
    }

    async fn worker_by_rfid(&self, tag: &str) -> Result<Option<WorkerRef>> {
        let row = sqlx::query_as::<_, (u64, String)>(
            "SELECT id, name FROM workers WHERE rfid_tag = ? AND status = 'active'",
        )
        .bind(tag)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id, name)| WorkerRef { id, name }))
    }

    async fn reserve_punch(
        &self,
        worker_id: u64,
        now: NaiveDateTime,
        min_interval_seconds: i64,
    ) -> Result<CooldownCheck> {
        let threshold = now - Duration::seconds(min_interval_seconds);

        // Conditional update: only one concurrent punch per worker can win.
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET last_punch_at = ?
            WHERE id = ? AND (last_punch_at IS NULL OR last_punch_at <= ?)
            "#,
        )
        .bind(now)
        .bind(worker_id)
        .bind(threshold)
        .execute(self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(CooldownCheck::Reserved);
        }

        let last: Option<NaiveDateTime> =
            sqlx::query_scalar("SELECT last_punch_at FROM workers WHERE id = ?")
                .bind(worker_id)
                .fetch_one(self.pool)
                .await?;

        let remaining = cooldown::remaining_seconds(last, now, min_interval_seconds).max(1);
        Ok(CooldownCheck::CoolingDown {
            remaining_seconds: remaining,
        })
    }

    async fn open_record(
        &self,
        worker_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, worker_id, date, check_in, check_out, check_in_method, check_out_method
            FROM attendance_records
            WHERE worker_id = ? AND date = ? AND check_in IS NOT NULL AND check_out IS NULL
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(worker_id)
        .bind(date)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_record(
        &self,
        worker_id: u64,
        date: NaiveDate,
        check_in: NaiveDateTime,
        method: PunchMethod,
    ) -> Result<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records (worker_id, date, check_in, check_in_method)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(worker_id)
        .bind(date)
        .bind(check_in)
        .bind(method.to_string())
        .execute(self.pool)
        .await?;

        self.fetch_record(result.last_insert_id()).await
    }

    async fn close_record(
        &self,
        record_id: u64,
        check_out: NaiveDateTime,
        method: PunchMethod,
    ) -> Result<AttendanceRecord> {
        sqlx::query(
            r#"
            UPDATE attendance_records
            SET check_out = ?, check_out_method = ?
            WHERE id = ? AND check_out IS NULL
            "#,
        )
        .bind(check_out)
        .bind(method.to_string())
        .bind(record_id)
        .execute(self.pool)
        .await?;

        self.fetch_record(record_id).await
    }

    async fn records_for_worker(&self, worker_id: u64) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, worker_id, date, check_in, check_out, check_in_method, check_out_method
            FROM attendance_records
            WHERE worker_id = ?
            ORDER BY date DESC, id ASC
            "#,
        )
        .bind(worker_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    async fn descriptors_for_worker(&self, worker_id: u64) -> Result<Vec<Vec<f32>>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT descriptor FROM worker_descriptors WHERE worker_id = ?",
        )
        .bind(worker_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(json,)| {
                serde_json::from_str::<Vec<f32>>(&json).context("malformed stored descriptor")
            })
            .collect()
    }
}
