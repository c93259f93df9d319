//! Background metadata loading
//!
//! ```text
//! Control context                 Metadata loader thread
//!        │                              │
//!        │  request(id, path)           │
//!        │─────────────────────────────>│
//!        │                              │ MetadataLoader::load()
//!        │                              │ (disk I/O)
//!        │  poll() -> results           │
//!        │<─────────────────────────────│
//! ```
//!
//! Each track id has at most one outstanding ticket. A newer request for
//! the same id supersedes the older one and `cancel` forgets the ticket, so
//! results arriving for stale tickets are dropped in [`MetadataTasks::poll`].

use crate::error::{PlaybackError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tapedeck_core::{AudioProperties, TrackId, TrackMetadata};
use tracing::{debug, warn};

/// Capacity of the request queue
const REQUEST_QUEUE_SIZE: usize = 256;

/// Reads tags and stream properties from a file
pub trait MetadataLoader: Send + 'static {
    /// Load metadata for `path`
    fn load(&self, path: &Path) -> Result<(TrackMetadata, AudioProperties)>;
}

/// A finished, still-wanted metadata load
#[derive(Debug)]
pub struct MetadataOutcome {
    /// Track the request was made for
    pub track_id: TrackId,
    /// Loaded metadata, or the failure message
    pub result: std::result::Result<(TrackMetadata, AudioProperties), String>,
}

struct Request {
    ticket: u64,
    track_id: TrackId,
    path: PathBuf,
}

struct Response {
    ticket: u64,
    track_id: TrackId,
    result: std::result::Result<(TrackMetadata, AudioProperties), String>,
}

/// Tracker for asynchronous metadata loads
pub struct MetadataTasks {
    request_tx: Option<Sender<Request>>,
    result_rx: Receiver<Response>,
    outstanding: HashMap<TrackId, u64>,
    next_ticket: u64,
    thread_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MetadataTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataTasks")
            .field("outstanding", &self.outstanding.len())
            .finish_non_exhaustive()
    }
}

impl MetadataTasks {
    /// Spawn the loader thread
    pub fn new(loader: impl MetadataLoader) -> Result<Self> {
        let (request_tx, request_rx) = bounded::<Request>(REQUEST_QUEUE_SIZE);
        let (result_tx, result_rx) = unbounded::<Response>();

        let thread_handle = thread::Builder::new()
            .name("metadata-loader".to_string())
            .spawn(move || Self::loader_thread(&loader, &request_rx, &result_tx))?;

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            outstanding: HashMap::new(),
            next_ticket: 0,
            thread_handle: Some(thread_handle),
        })
    }

    fn loader_thread(
        loader: &impl MetadataLoader,
        request_rx: &Receiver<Request>,
        result_tx: &Sender<Response>,
    ) {
        debug!("Metadata loader started");
        for request in request_rx {
            let result = loader.load(&request.path).map_err(|e| e.to_string());
            let response = Response {
                ticket: request.ticket,
                track_id: request.track_id,
                result,
            };
            if result_tx.send(response).is_err() {
                break;
            }
        }
        debug!("Metadata loader exiting");
    }

    /// Queue a load for `track_id`, superseding any earlier request for it
    pub fn request(&mut self, track_id: TrackId, path: impl Into<PathBuf>) -> Result<()> {
        let sender = self
            .request_tx
            .as_ref()
            .ok_or_else(|| PlaybackError::Metadata("loader shut down".into()))?;

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let request = Request {
            ticket,
            track_id: track_id.clone(),
            path: path.into(),
        };

        sender.try_send(request).map_err(|err| {
            warn!("Metadata request for {} dropped: {}", track_id, err);
            PlaybackError::Metadata(err.to_string())
        })?;

        self.outstanding.insert(track_id, ticket);
        Ok(())
    }

    /// Forget the outstanding request for `track_id`
    pub fn cancel(&mut self, track_id: &TrackId) {
        self.outstanding.remove(track_id);
    }

    /// Forget every outstanding request
    pub fn cancel_all(&mut self) {
        self.outstanding.clear();
    }

    /// Whether a request for `track_id` is outstanding
    pub fn is_pending(&self, track_id: &TrackId) -> bool {
        self.outstanding.contains_key(track_id)
    }

    /// Number of outstanding requests
    pub fn pending_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Collect finished loads whose request is still current
    pub fn poll(&mut self) -> Vec<MetadataOutcome> {
        let mut ready = Vec::new();
        loop {
            match self.result_rx.try_recv() {
                Ok(response) => {
                    if self.outstanding.get(&response.track_id) != Some(&response.ticket) {
                        debug!("Dropping superseded metadata for {}", response.track_id);
                        continue;
                    }
                    self.outstanding.remove(&response.track_id);
                    ready.push(MetadataOutcome {
                        track_id: response.track_id,
                        result: response.result,
                    });
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        ready
    }

    /// Stop accepting requests and join the loader thread
    pub fn shutdown(&mut self) {
        self.outstanding.clear();
        self.request_tx = None;
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Metadata loader thread panicked");
            }
        }
    }
}

impl Drop for MetadataTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Loader that blocks until the test opens the gate
    struct GatedLoader {
        gate: Arc<Mutex<()>>,
    }

    impl MetadataLoader for GatedLoader {
        fn load(&self, path: &Path) -> Result<(TrackMetadata, AudioProperties)> {
            let _open = self.gate.lock().unwrap();
            if path.ends_with("missing.flac") {
                return Err(PlaybackError::Metadata("no such file".into()));
            }
            Ok((
                TrackMetadata {
                    title: path.display().to_string(),
                    artist: "Artist".into(),
                    duration_secs: 1.0,
                },
                AudioProperties::default(),
            ))
        }
    }

    fn wait_for(tasks: &mut MetadataTasks, expected: usize) -> Vec<MetadataOutcome> {
        let mut results = Vec::new();
        for _ in 0..200 {
            results.extend(tasks.poll());
            if results.len() >= expected && tasks.pending_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        results
    }

    #[test]
    fn newer_request_supersedes_older() {
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock().unwrap();
        let mut tasks = MetadataTasks::new(GatedLoader {
            gate: Arc::clone(&gate),
        })
        .unwrap();

        let id = TrackId::new("t1");
        tasks.request(id.clone(), "/music/old.flac").unwrap();
        tasks.request(id.clone(), "/music/new.flac").unwrap();
        drop(held);

        let results = wait_for(&mut tasks, 1);
        assert_eq!(results.len(), 1);
        let (metadata, _) = results[0].result.as_ref().unwrap();
        assert_eq!(metadata.title, "/music/new.flac");
    }

    #[test]
    fn cancelled_request_yields_nothing() {
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock().unwrap();
        let mut tasks = MetadataTasks::new(GatedLoader {
            gate: Arc::clone(&gate),
        })
        .unwrap();

        let id = TrackId::new("t1");
        tasks.request(id.clone(), "/music/a.flac").unwrap();
        tasks.cancel(&id);
        assert!(!tasks.is_pending(&id));
        drop(held);

        std::thread::sleep(Duration::from_millis(50));
        assert!(tasks.poll().is_empty());
    }

    #[test]
    fn failures_are_reported() {
        let mut tasks = MetadataTasks::new(GatedLoader {
            gate: Arc::new(Mutex::new(())),
        })
        .unwrap();
        tasks
            .request(TrackId::new("m"), "/music/missing.flac")
            .unwrap();

        let results = wait_for(&mut tasks, 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].result.is_err());
    }

    #[test]
    fn shutdown_rejects_new_requests() {
        let mut tasks = MetadataTasks::new(GatedLoader {
            gate: Arc::new(Mutex::new(())),
        })
        .unwrap();
        tasks.shutdown();
        assert!(tasks.request(TrackId::new("x"), "/a.flac").is_err());
        tasks.shutdown();
    }
}
