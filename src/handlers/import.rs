//! CSV import handlers
//!
//! Each endpoint accepts a multipart upload (field `file`) containing a
//! Shift-JIS vendor export. The handler pumps the body chunks into the
//! streaming decoder and consumes mapped rows concurrently, so the full
//! file is never buffered. Per-batch and per-row failures end up in the
//! returned report; a decode failure or missing field fails the request.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::services::csv_stream;
use crate::services::importer::{self, PgManagementWriter, PgPropertyWriter, PgRoomWriter};
use crate::types::ImportReport;

pub async fn import_properties(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let (bytes_tx, bytes_rx) = mpsc::channel(csv_stream::BYTE_CHANNEL_CAPACITY);
    let (rows_rx, reader) = csv_stream::spawn_reader(bytes_rx);

    let writer = Arc::new(PgPropertyWriter::new(state.pool.clone()));
    let import = importer::run_property_import(rows_rx, writer, state.max_concurrent_writes);
    let pump = pump_file_field(multipart, state.max_upload_bytes, bytes_tx);

    let (pumped, report) = tokio::join!(pump, import);
    pumped?;
    reader.await.map_err(anyhow::Error::from)??;
    Ok(Json(report))
}

pub async fn import_property_managements(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let (bytes_tx, bytes_rx) = mpsc::channel(csv_stream::BYTE_CHANNEL_CAPACITY);
    let (rows_rx, reader) = csv_stream::spawn_reader(bytes_rx);

    // One wall-clock snapshot for the whole run
    let now = chrono::Utc::now();
    let writer = Arc::new(PgManagementWriter::new(state.pool.clone()));
    let import =
        importer::run_management_import(rows_rx, writer, state.max_concurrent_writes, now);
    let pump = pump_file_field(multipart, state.max_upload_bytes, bytes_tx);

    let (pumped, report) = tokio::join!(pump, import);
    pumped?;
    reader.await.map_err(anyhow::Error::from)??;
    Ok(Json(report))
}

pub async fn import_rooms(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let (bytes_tx, bytes_rx) = mpsc::channel(csv_stream::BYTE_CHANNEL_CAPACITY);
    let (rows_rx, reader) = csv_stream::spawn_reader(bytes_rx);

    let writer = Arc::new(PgRoomWriter::new(state.pool.clone()));
    let import = importer::run_room_import(rows_rx, writer, state.max_concurrent_writes);
    let pump = pump_file_field(multipart, state.max_upload_bytes, bytes_tx);

    let (pumped, report) = tokio::join!(pump, import);
    pumped?;
    reader.await.map_err(anyhow::Error::from)??;
    Ok(Json(report))
}

/// Forward the `file` field's chunks into the decoder's byte channel.
///
/// A closed channel means the reader stopped early; the pump stops quietly
/// and the reader's own error surfaces through its join handle.
async fn pump_file_field(
    mut multipart: Multipart,
    max_bytes: usize,
    bytes_tx: mpsc::Sender<Bytes>,
) -> Result<(), ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let mut total: usize = 0;
        while let Some(chunk) = field.chunk().await? {
            total += chunk.len();
            if total > max_bytes {
                return Err(ApiError::BadRequest(format!(
                    "upload exceeds the {} byte limit",
                    max_bytes
                )));
            }
            if bytes_tx.send(chunk).await.is_err() {
                break;
            }
        }
        return Ok(());
    }
    Err(ApiError::BadRequest(
        "missing multipart field 'file'".to_string(),
    ))
}
