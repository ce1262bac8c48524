//! Background preview and import workers.
//!
//! The [`Coordinator`] lives on the foreground thread and never blocks on
//! file or database I/O. Each preview load and each import runs on its own
//! thread and reports back over one channel. At most one of each runs at a
//! time. Preview results are tagged with the request that produced them and
//! are dropped on receipt if a newer file has been selected since.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error};

use crate::{
    error::{ImportError, ImportResult},
    import_spec::ImportSpec,
    loader::{ChunkedLoader, ImportReport, ImportStatus, ProgressSink},
    preview::PipelineState,
    reader::SourceLocator,
    store::TableStore,
    transform::TransformOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug)]
pub enum WorkerEvent {
    Preview {
        id: RequestId,
        path: PathBuf,
        result: ImportResult<Box<PipelineState>>,
    },
    Progress {
        rows_written: usize,
        rows_total: usize,
    },
    ImportFinished(ImportResult<ImportReport>),
}

/// Forwards loader progress to the coordinator's channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<WorkerEvent>,
}

impl ProgressSink for ChannelSink {
    fn progress(&mut self, rows_written: usize, rows_total: usize) {
        let event = WorkerEvent::Progress {
            rows_written,
            rows_total,
        };
        if self.sender.send(event).is_err() {
            debug!("Progress dropped: coordinator is gone");
        }
    }

    fn finished(&mut self, status: &ImportStatus) {
        debug!("Import worker finished: {status:?}");
    }
}

pub struct Coordinator {
    sender: Sender<WorkerEvent>,
    receiver: Receiver<WorkerEvent>,
    next_request: u64,
    pending_preview: Option<RequestId>,
    selected: Option<PathBuf>,
    preview_busy: Arc<AtomicBool>,
    import_busy: Arc<AtomicBool>,
    stale_discarded: usize,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            next_request: 0,
            pending_preview: None,
            selected: None,
            preview_busy: Arc::new(AtomicBool::new(false)),
            import_busy: Arc::new(AtomicBool::new(false)),
            stale_discarded: 0,
        }
    }

    pub fn selected_file(&self) -> Option<&PathBuf> {
        self.selected.as_ref()
    }

    pub fn select_file(&mut self, path: PathBuf) {
        self.selected = Some(path);
    }

    pub fn is_previewing(&self) -> bool {
        self.preview_busy.load(Ordering::SeqCst)
    }

    pub fn is_importing(&self) -> bool {
        self.import_busy.load(Ordering::SeqCst)
    }

    /// Number of preview results thrown away because the selection moved on.
    pub fn stale_discarded(&self) -> usize {
        self.stale_discarded
    }

    /// Selects `path` and starts loading its preview. Returns `None` when a
    /// preview is already loading; that request is dropped.
    pub fn request_preview(
        &mut self,
        path: PathBuf,
        locator: SourceLocator,
        options: TransformOptions,
    ) -> Option<RequestId> {
        self.selected = Some(path.clone());
        if self.preview_busy.swap(true, Ordering::SeqCst) {
            debug!("Preview of {path:?} dropped: another preview is loading");
            return None;
        }
        self.next_request += 1;
        let id = RequestId(self.next_request);
        self.pending_preview = Some(id);

        let sender = self.sender.clone();
        let busy = Arc::clone(&self.preview_busy);
        thread::spawn(move || {
            let result = PipelineState::load(&path, &locator).map(|mut state| {
                state.apply(options);
                Box::new(state)
            });
            busy.store(false, Ordering::SeqCst);
            if sender.send(WorkerEvent::Preview { id, path, result }).is_err() {
                error!("Failed to deliver preview result");
            }
        });
        Some(id)
    }

    /// Runs `spec` on a background thread against the store built by
    /// `connect`. Refused while another import is running.
    pub fn start_import<S, F>(&mut self, spec: ImportSpec, connect: F) -> ImportResult<()>
    where
        S: TableStore,
        F: FnOnce() -> ImportResult<S> + Send + 'static,
    {
        if self.import_busy.swap(true, Ordering::SeqCst) {
            return Err(ImportError::ImportInProgress);
        }
        let sender = self.sender.clone();
        let busy = Arc::clone(&self.import_busy);
        thread::spawn(move || {
            let sink = ChannelSink {
                sender: sender.clone(),
            };
            let result = connect().and_then(|store| ChunkedLoader::new(spec, store, sink).run());
            busy.store(false, Ordering::SeqCst);
            if sender.send(WorkerEvent::ImportFinished(result)).is_err() {
                error!("Failed to deliver import result");
            }
        });
        Ok(())
    }

    /// Drains every event already delivered, without blocking.
    pub fn poll(&mut self) -> Vec<WorkerEvent> {
        let events = self.receiver.try_iter().collect::<Vec<_>>();
        events
            .into_iter()
            .filter_map(|event| self.accept(event))
            .collect()
    }

    /// Like [`poll`](Self::poll), but first waits up to `timeout` for an
    /// event to arrive.
    pub fn wait(&mut self, timeout: Duration) -> Vec<WorkerEvent> {
        let first = match self.receiver.recv_timeout(timeout) {
            Ok(event) => self.accept(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        };
        first.into_iter().chain(self.poll()).collect()
    }

    fn accept(&mut self, event: WorkerEvent) -> Option<WorkerEvent> {
        if let WorkerEvent::Preview { id, path, .. } = &event {
            let current = self.pending_preview == Some(*id);
            let selected = self.selected.as_ref() == Some(path);
            if !(current && selected) {
                debug!("Discarding stale preview of {path:?}");
                self.stale_discarded += 1;
                return None;
            }
            self.pending_preview = None;
        }
        Some(event)
    }
}
