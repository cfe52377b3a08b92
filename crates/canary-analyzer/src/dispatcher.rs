//! The analysis dispatcher and its isolated worker.

use crate::message::AnalysisRequest;
use crate::registry::ListenerRegistry;
use crate::verdict::{AnalysisResult, HeapAnalyzer};
use canary_watcher::{HeapDump, HeapDumpListener};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, info_span, warn};

/// Runs snapshot analysis on a dedicated worker, isolated from the
/// watcher's scheduler.
///
/// [`AnalysisDispatcher::dispatch`] serializes the request, hands it to the
/// worker, and returns immediately. There is no return path: delivery
/// happens later, out of band, through the [`ListenerRegistry`]. If the
/// worker cannot be reached the request is logged and dropped.
pub struct AnalysisDispatcher {
    tx: Mutex<Option<Sender<Vec<u8>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AnalysisDispatcher {
    /// Start the dispatcher and its worker thread.
    pub fn new(
        analyzer: Arc<dyn HeapAnalyzer>,
        registry: Arc<ListenerRegistry>,
    ) -> io::Result<Self> {
        let (tx, rx) = unbounded::<Vec<u8>>();
        let worker = std::thread::Builder::new()
            .name("canary-analysis".into())
            .spawn(move || run_worker(&rx, analyzer.as_ref(), &registry))?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a descriptor for analysis; the verdict will be delivered to
    /// the listener registered under `listener`. Fire-and-forget.
    pub fn dispatch(&self, heap_dump: HeapDump, listener: &str) {
        let request = AnalysisRequest {
            listener: listener.to_string(),
            heap_dump,
        };
        let bytes = match request.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, listener, "could not serialize analysis request, dropping it");
                return;
            }
        };
        let tx = self.tx.lock();
        let sent = tx.as_ref().is_some_and(|tx| tx.send(bytes).is_ok());
        if !sent {
            warn!(listener, "analysis worker is gone, dropping heap dump");
        }
    }

    /// Stop accepting requests, finish queued ones, and join the worker.
    pub fn shutdown(&self) {
        self.tx.lock().take();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && worker.join().is_err()
        {
            warn!("analysis worker exited abnormally");
        }
    }
}

impl Drop for AnalysisDispatcher {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit on its own.
        self.tx.lock().take();
    }
}

fn run_worker(rx: &Receiver<Vec<u8>>, analyzer: &dyn HeapAnalyzer, registry: &ListenerRegistry) {
    let _span = info_span!("analysis-worker").entered();
    debug!("analysis worker started");
    for bytes in rx.iter() {
        handle_message(&bytes, analyzer, registry);
    }
    debug!("analysis worker stopped");
}

/// Process one incoming message. A malformed or empty message is a
/// transport anomaly: logged and skipped, never a crash.
fn handle_message(bytes: &[u8], analyzer: &dyn HeapAnalyzer, registry: &ListenerRegistry) {
    if bytes.is_empty() {
        warn!("received an empty analysis message, ignoring");
        return;
    }
    let request = match AnalysisRequest::from_bytes(bytes) {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "received a malformed analysis message, ignoring");
            return;
        }
    };
    let AnalysisRequest {
        listener,
        heap_dump,
    } = request;

    debug!(key = %heap_dump.key, listener = %listener, "analyzing heap dump");
    let rules = heap_dump.exclusion_rules.clone();
    let started = Instant::now();
    let verdict = analyzer.check_for_leak(&heap_dump.snapshot_path, &heap_dump.key, &rules);
    let result = AnalysisResult {
        verdict,
        analysis_duration_ms: started.elapsed().as_millis() as u64,
    };

    match registry.resolve(&listener) {
        Some(target) => target.on_result(heap_dump, result),
        None => warn!(listener = %listener, "no listener registered for analysis result, dropping it"),
    }
}

/// Forwards every confirmed leak's descriptor to a dispatcher under a fixed
/// listener identity. The default wiring between the watcher and the
/// analysis step.
pub struct DispatchingListener {
    dispatcher: Arc<AnalysisDispatcher>,
    listener: String,
}

impl DispatchingListener {
    pub fn new(dispatcher: Arc<AnalysisDispatcher>, listener: impl Into<String>) -> Self {
        Self {
            dispatcher,
            listener: listener.into(),
        }
    }
}

impl HeapDumpListener for DispatchingListener {
    fn analyze(&self, heap_dump: HeapDump) {
        self.dispatcher.dispatch(heap_dump, &self.listener);
    }
}
