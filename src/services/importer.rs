//! Import engines
//!
//! Two write strategies over the same row stream:
//!
//! - bulk create (properties, rooms): rows accumulate into fixed-size
//!   batches, each batch dispatched as one bulk upsert running concurrently
//!   with row consumption and with sibling batches;
//! - merge update (management windows): one read-modify-write transaction
//!   per row, dispatched concurrently.
//!
//! Both bound their fan-out with a semaphore sized from configuration and
//! join every dispatched write before reporting the import complete. A
//! failed batch or row is logged and counted in the report; it never aborts
//! its siblings.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::db::queries;
use crate::services::csv_stream::RawRecord;
use crate::services::mapper;
use crate::types::{ImportIssueLevel, ImportReport, Management, Property, RoomEntity};

/// Entities per bulk write
pub const BATCH_SIZE: usize = 200;

/// Seam for the bulk-create path; the store client in production, a
/// recorder in tests.
#[async_trait]
pub trait BatchWriter<T: Send + 'static>: Send + Sync + 'static {
    async fn write_batch(&self, batch: Vec<T>) -> Result<()>;
}

/// Seam for the per-row merge path. Fails when the target property does
/// not exist.
#[async_trait]
pub trait MergeWriter: Send + Sync + 'static {
    async fn merge_management(&self, key: &str, management: Management) -> Result<()>;
}

/// Accumulates entities and dispatches full batches without blocking row
/// consumption, up to `max_in_flight` concurrent writes.
struct BatchDispatcher<T, W> {
    writer: Arc<W>,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<(usize, Result<()>)>,
    buf: Vec<T>,
    batches: u64,
}

impl<T, W> BatchDispatcher<T, W>
where
    T: Send + 'static,
    W: BatchWriter<T>,
{
    fn new(writer: Arc<W>, max_in_flight: usize) -> Self {
        Self {
            writer,
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            tasks: JoinSet::new(),
            buf: Vec::with_capacity(BATCH_SIZE),
            batches: 0,
        }
    }

    async fn push(&mut self, entity: T) {
        self.buf.push(entity);
        if self.buf.len() >= BATCH_SIZE {
            self.dispatch().await;
        }
    }

    async fn dispatch(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let batch = std::mem::replace(&mut self.buf, Vec::with_capacity(BATCH_SIZE));
        self.batches += 1;
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("semaphore never closed");
        let writer = Arc::clone(&self.writer);
        self.tasks.spawn(async move {
            let _permit = permit;
            let len = batch.len();
            (len, writer.write_batch(batch).await)
        });
    }

    /// Dispatch the remainder and join every in-flight batch.
    ///
    /// Returns (persisted, failed, batches).
    async fn finish(mut self) -> (u64, u64, u64) {
        self.dispatch().await;
        let mut persisted = 0u64;
        let mut failed = 0u64;
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((len, Ok(()))) => persisted += len as u64,
                Ok((len, Err(e))) => {
                    error!("batch of {} rows failed: {:#}", len, e);
                    failed += len as u64;
                }
                Err(e) => error!("batch task aborted: {}", e),
            }
        }
        (persisted, failed, self.batches)
    }
}

/// Bulk-create properties from the row stream.
pub async fn run_property_import<W>(
    mut rows: mpsc::Receiver<RawRecord>,
    writer: Arc<W>,
    max_in_flight: usize,
) -> ImportReport
where
    W: BatchWriter<(String, Property)>,
{
    let mut report = ImportReport::default();
    let mut dispatcher = BatchDispatcher::new(writer, max_in_flight);
    let mut row_number: i64 = 1; // the header occupies line 1

    while let Some(row) = rows.recv().await {
        row_number += 1;
        report.rows_read += 1;
        match mapper::property_from_row(&row) {
            Some(entity) => dispatcher.push(entity).await,
            None => {
                report.skipped += 1;
                report.push_issue(
                    row_number,
                    ImportIssueLevel::Warning,
                    mapper::COL_PROPERTY_NO,
                    "row has no property number, skipped".to_string(),
                    None,
                );
            }
        }
    }

    let (persisted, failed, batches) = dispatcher.finish().await;
    report.persisted = persisted;
    report.failed = failed;
    report.batches = batches;
    info!(
        "property import: {} read, {} persisted, {} failed, {} batches",
        report.rows_read, report.persisted, report.failed, report.batches
    );
    report
}

/// Bulk-create rooms from the row stream.
///
/// Summary rows (no room number) are skipped; unrecognized contract-status
/// codes are diagnostic only, the row is still persisted.
pub async fn run_room_import<W>(
    mut rows: mpsc::Receiver<RawRecord>,
    writer: Arc<W>,
    max_in_flight: usize,
) -> ImportReport
where
    W: BatchWriter<RoomEntity>,
{
    let mut report = ImportReport::default();
    let mut dispatcher = BatchDispatcher::new(writer, max_in_flight);
    let mut row_number: i64 = 1;

    while let Some(row) = rows.recv().await {
        row_number += 1;
        report.rows_read += 1;
        match mapper::room_from_row(&row) {
            Some(mapped) => {
                if let Some(code) = mapped.unknown_status {
                    warn!("unrecognized contract status {:?} on row {}", code, row_number);
                    report.push_issue(
                        row_number,
                        ImportIssueLevel::Info,
                        mapper::COL_CONTRACT_STATUS,
                        "unrecognized contract status".to_string(),
                        Some(code),
                    );
                }
                dispatcher
                    .push(RoomEntity {
                        property_key: mapped.property_key,
                        room_no: mapped.room_no,
                        room: mapped.room,
                    })
                    .await;
            }
            None => report.skipped += 1, // vendor summary row
        }
    }

    let (persisted, failed, batches) = dispatcher.finish().await;
    report.persisted = persisted;
    report.failed = failed;
    report.batches = batches;
    info!(
        "room import: {} read, {} persisted, {} failed, {} skipped, {} batches",
        report.rows_read, report.persisted, report.failed, report.skipped, report.batches
    );
    report
}

/// Merge management windows into existing properties, one transaction per
/// row. `now` is the single wall-clock snapshot for the run.
pub async fn run_management_import<W>(
    mut rows: mpsc::Receiver<RawRecord>,
    writer: Arc<W>,
    max_in_flight: usize,
    now: DateTime<Utc>,
) -> ImportReport
where
    W: MergeWriter,
{
    let mut report = ImportReport::default();
    let semaphore = Arc::new(Semaphore::new(max_in_flight));
    let mut tasks: JoinSet<(i64, String, Result<()>)> = JoinSet::new();
    let mut row_number: i64 = 1;

    while let Some(row) = rows.recv().await {
        row_number += 1;
        report.rows_read += 1;
        match mapper::management_from_row(&row, now) {
            Some((key, management)) => {
                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                let writer = Arc::clone(&writer);
                tasks.spawn(async move {
                    let _permit = permit;
                    let result = writer.merge_management(&key, management).await;
                    (row_number, key, result)
                });
            }
            None => {
                report.skipped += 1;
                report.push_issue(
                    row_number,
                    ImportIssueLevel::Warning,
                    mapper::COL_PROPERTY_NO,
                    "row has no property number, skipped".to_string(),
                    None,
                );
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, _, Ok(()))) => report.persisted += 1,
            Ok((row, key, Err(e))) => {
                warn!("management update for {} failed: {:#}", key, e);
                report.failed += 1;
                report.push_issue(
                    row,
                    ImportIssueLevel::Error,
                    mapper::COL_PROPERTY_NO,
                    format!("update failed: {:#}", e),
                    Some(key),
                );
            }
            Err(e) => error!("merge task aborted: {}", e),
        }
    }

    info!(
        "management import: {} read, {} merged, {} failed",
        report.rows_read, report.persisted, report.failed
    );
    report
}

// =============================================================================
// STORE-BACKED WRITERS
// =============================================================================

pub struct PgPropertyWriter {
    pool: PgPool,
}

impl PgPropertyWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchWriter<(String, Property)> for PgPropertyWriter {
    async fn write_batch(&self, batch: Vec<(String, Property)>) -> Result<()> {
        queries::property::upsert_properties(&self.pool, &batch).await
    }
}

pub struct PgRoomWriter {
    pool: PgPool,
}

impl PgRoomWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchWriter<RoomEntity> for PgRoomWriter {
    async fn write_batch(&self, batch: Vec<RoomEntity>) -> Result<()> {
        queries::room::upsert_rooms(&self.pool, &batch).await
    }
}

pub struct PgManagementWriter {
    pool: PgPool,
}

impl PgManagementWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MergeWriter for PgManagementWriter {
    async fn merge_management(&self, key: &str, management: Management) -> Result<()> {
        queries::property::set_management(&self.pool, key, &management).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::services::mapper::{COL_MGMT_END, COL_MGMT_START, COL_PROPERTY_NO, COL_ROOM_NO};

    fn property_row(no: usize) -> RawRecord {
        [(COL_PROPERTY_NO.to_string(), no.to_string())].into_iter().collect()
    }

    async fn feed(rows: Vec<RawRecord>) -> mpsc::Receiver<RawRecord> {
        let (tx, rx) = mpsc::channel(rows.len().max(1));
        for row in rows {
            tx.send(row).await.unwrap();
        }
        rx
    }

    /// Records batch sizes; fails any batch containing a poisoned key.
    struct RecordingWriter {
        sizes: Mutex<Vec<usize>>,
        poison: Option<String>,
    }

    impl RecordingWriter {
        fn new(poison: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                sizes: Mutex::new(Vec::new()),
                poison: poison.map(str::to_string),
            })
        }
    }

    #[async_trait]
    impl BatchWriter<(String, Property)> for RecordingWriter {
        async fn write_batch(&self, batch: Vec<(String, Property)>) -> Result<()> {
            if let Some(ref poison) = self.poison {
                if batch.iter().any(|(key, _)| key == poison) {
                    anyhow::bail!("simulated store failure");
                }
            }
            self.sizes.lock().unwrap().push(batch.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_401_rows_make_three_batches() {
        let rows = (1..=401).map(property_row).collect();
        let writer = RecordingWriter::new(None);
        let report = run_property_import(feed(rows).await, Arc::clone(&writer), 4).await;

        assert_eq!(report.rows_read, 401);
        assert_eq!(report.persisted, 401);
        assert_eq!(report.failed, 0);
        assert_eq!(report.batches, 3);

        let mut sizes = writer.sizes.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 200, 200]);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_abort_siblings() {
        let rows = (1..=401).map(property_row).collect();
        // ck-13 lands in the first batch of 200
        let writer = RecordingWriter::new(Some("ck-13"));
        let report = run_property_import(feed(rows).await, Arc::clone(&writer), 4).await;

        assert_eq!(report.persisted, 201);
        assert_eq!(report.failed, 200);
        assert_eq!(report.batches, 3);

        let mut sizes = writer.sizes.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 200]);
    }

    #[tokio::test]
    async fn test_rows_without_key_are_skipped_with_issue() {
        let mut rows: Vec<RawRecord> = (1..=2).map(property_row).collect();
        rows.push(RawRecord::new());
        let writer = RecordingWriter::new(None);
        let report = run_property_import(feed(rows).await, writer, 4).await;

        assert_eq!(report.persisted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.issues.len(), 1);
    }

    struct RecordingRoomWriter {
        written: Mutex<Vec<RoomEntity>>,
    }

    #[async_trait]
    impl BatchWriter<RoomEntity> for RecordingRoomWriter {
        async fn write_batch(&self, batch: Vec<RoomEntity>) -> Result<()> {
            self.written.lock().unwrap().extend(batch);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_room_import_skips_summary_rows() {
        let unit = |prop: &str, room: &str| -> RawRecord {
            [
                (COL_PROPERTY_NO.to_string(), prop.to_string()),
                (COL_ROOM_NO.to_string(), room.to_string()),
            ]
            .into_iter()
            .collect()
        };
        let rows = vec![unit("1", "101"), unit("1", ""), unit("1", "102")];
        let writer = Arc::new(RecordingRoomWriter {
            written: Mutex::new(Vec::new()),
        });
        let report = run_room_import(feed(rows).await, Arc::clone(&writer), 4).await;

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.persisted, 2);
        assert_eq!(report.skipped, 1);
        let written = writer.written.lock().unwrap();
        assert!(written.iter().all(|r| !r.room_no.is_empty()));
    }

    /// Succeeds unless the key is in the missing set.
    struct RecordingMergeWriter {
        merged: Mutex<Vec<String>>,
        missing: Vec<String>,
    }

    #[async_trait]
    impl MergeWriter for RecordingMergeWriter {
        async fn merge_management(&self, key: &str, _management: Management) -> Result<()> {
            if self.missing.iter().any(|m| m == key) {
                anyhow::bail!("property {} not found", key);
            }
            self.merged.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_merge_missing_key_fails_that_row_only() {
        let row = |no: &str| -> RawRecord {
            [
                (COL_PROPERTY_NO.to_string(), no.to_string()),
                (COL_MGMT_START.to_string(), "2023/04".to_string()),
                (COL_MGMT_END.to_string(), "2024/03".to_string()),
            ]
            .into_iter()
            .collect()
        };
        let rows = vec![row("1"), row("2"), row("3")];
        let writer = Arc::new(RecordingMergeWriter {
            merged: Mutex::new(Vec::new()),
            missing: vec!["ck-2".to_string()],
        });
        let now = Utc::now();
        let report = run_management_import(feed(rows).await, Arc::clone(&writer), 4, now).await;

        assert_eq!(report.persisted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].original_value.as_deref(), Some("ck-2"));

        let mut merged = writer.merged.lock().unwrap().clone();
        merged.sort();
        assert_eq!(merged, vec!["ck-1".to_string(), "ck-3".to_string()]);
    }
}
