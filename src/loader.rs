//! Ledger I/O off the interactive thread.
//!
//! Reading, decoding, encoding and writing run on a shared thread pool.
//! Results come back over a channel and are drained on the main thread,
//! where resolution against the anchor service happens.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel as channel;
use rayon::ThreadPool;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::ledger::LedgerError;
use crate::record::AnchorRecord;
use crate::storage::LedgerStore;

#[derive(Debug)]
pub enum LoadResponse {
    /// Decoded records, not yet resolved.
    Loaded(Vec<AnchorRecord>),
    Saved(usize),
    LoadFailed(LedgerError),
    SaveFailed(LedgerError),
}

pub struct LedgerLoader {
    store: Arc<dyn LedgerStore>,
    codec: Codec,
    thread_pool: Arc<ThreadPool>,
    in_flight: AtomicUsize,

    response_tx: channel::Sender<LoadResponse>,
    response_rx: channel::Receiver<LoadResponse>,
}

impl LedgerLoader {
    pub fn new(store: Arc<dyn LedgerStore>, codec: Codec, thread_pool: Arc<ThreadPool>) -> Self {
        let (response_tx, response_rx) = channel::unbounded();

        Self {
            store,
            codec,
            thread_pool,
            in_flight: AtomicUsize::new(0),

            response_tx,
            response_rx,
        }
    }

    pub fn load_async(&self) {
        let store = self.store.clone();
        let codec = self.codec;
        let response_tx = self.response_tx.clone();
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        self.thread_pool.spawn(move || {
            let response = match read_records(store.as_ref(), codec) {
                Ok(records) => LoadResponse::Loaded(records),
                Err(err) => LoadResponse::LoadFailed(err),
            };

            send(&response_tx, response);
        });
    }

    /// Writes a snapshot of the ledger taken on the caller's thread.
    pub fn save_async(&self, records: Vec<AnchorRecord>) {
        let store = self.store.clone();
        let codec = self.codec;
        let response_tx = self.response_tx.clone();
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        self.thread_pool.spawn(move || {
            let response = match write_records(store.as_ref(), codec, &records) {
                Ok(()) => LoadResponse::Saved(records.len()),
                Err(err) => LoadResponse::SaveFailed(err),
            };

            send(&response_tx, response);
        });
    }

    /// Responses that have arrived so far. Never blocks.
    pub fn poll(&self) -> impl Iterator<Item = LoadResponse> + '_ {
        self.response_rx
            .try_iter()
            .inspect(|_| self.finish_one())
    }

    /// Blocks until the next response arrives. Returns `None` right away
    /// when no job is in flight.
    pub fn wait(&self) -> Option<LoadResponse> {
        if self.in_flight() == 0 {
            return None;
        }

        let response = self.response_rx.recv().ok()?;
        self.finish_one();
        Some(response)
    }

    /// Jobs started whose response has not been taken yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn finish_one(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

fn read_records(store: &dyn LedgerStore, codec: Codec) -> Result<Vec<AnchorRecord>, LedgerError> {
    match store.read()? {
        Some(text) => Ok(codec.decode(&text)?),
        None => Ok(Vec::new()),
    }
}

fn write_records(
    store: &dyn LedgerStore,
    codec: Codec,
    records: &[AnchorRecord],
) -> Result<(), LedgerError> {
    let text = codec.encode(records)?;
    store.write(&text)?;
    Ok(())
}

fn send(response_tx: &channel::Sender<LoadResponse>, response: LoadResponse) {
    if let Err(err) = response_tx.send(response) {
        warn!("ledger response dropped: {:?}", err.into_inner());
    } else {
        debug!("ledger response queued");
    }
}
