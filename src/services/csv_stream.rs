//! Streaming Shift-JIS CSV reader
//!
//! The vendor exports are comma-separated and Shift-JIS encoded. This
//! reader turns a stream of raw upload chunks into header-keyed records,
//! decoding incrementally so memory stays bounded by one row regardless of
//! file size.
//!
//! The decode runs on a blocking task: upload chunks arrive over a bounded
//! byte channel, are bridged into a `std::io::Read`, transcoded with
//! `encoding_rs`, and parsed by the `csv` crate. Completed records are
//! handed off over a capacity-1 channel, which is the sole back-pressure
//! mechanism between the reader and the import loop. The reader owns that
//! channel: dropping the sender (on every exit path, success or failure)
//! signals end-of-stream exactly once.

use std::collections::HashMap;
use std::io::Read;

use anyhow::{Context, Result};
use bytes::{Buf, Bytes};
use encoding_rs::SHIFT_JIS;
use encoding_rs_io::DecodeReaderBytesBuilder;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One CSV row keyed by the header row's column names
pub type RawRecord = HashMap<String, String>;

/// How many upload chunks may sit between the HTTP handler and the decoder
pub const BYTE_CHANNEL_CAPACITY: usize = 4;

/// Blocking `Read` over a channel of upload chunks.
///
/// Returns 0 (EOF) once the sender is dropped and the pending chunk is
/// drained.
struct ChannelReader {
    rx: mpsc::Receiver<Bytes>,
    pending: Bytes,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            pending: Bytes::new(),
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pending.is_empty() {
            match self.rx.blocking_recv() {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

/// Spawn the reader task.
///
/// Returns the record channel and the reader's join handle. The handle
/// resolves to the number of rows emitted, or to the decode/read error
/// that stopped the reader — such an error is fatal to the whole request.
pub fn spawn_reader(bytes_rx: mpsc::Receiver<Bytes>) -> (mpsc::Receiver<RawRecord>, JoinHandle<Result<u64>>) {
    let (row_tx, row_rx) = mpsc::channel(1);
    let handle = tokio::task::spawn_blocking(move || read_rows(bytes_rx, row_tx));
    (row_rx, handle)
}

fn read_rows(bytes_rx: mpsc::Receiver<Bytes>, row_tx: mpsc::Sender<RawRecord>) -> Result<u64> {
    let transcoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(SHIFT_JIS))
        .build(ChannelReader::new(bytes_rx));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(transcoded);

    let headers = reader
        .headers()
        .context("reading CSV header row")?
        .clone();

    let mut count = 0u64;
    for result in reader.records() {
        let record = result.context("decoding CSV row")?;
        // The vendor appends blank rows at the end of some exports
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let row: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        if row_tx.blocking_send(row).is_err() {
            debug!("record channel closed by consumer, stopping reader");
            break;
        }
        count += 1;
    }

    info!("CSV reader emitted {} rows", count);
    Ok(count)
}
