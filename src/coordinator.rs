//! Background execution: one worker thread per in-flight request, results
//! marshaled back to the host through a FIFO event queue.
//!
//! The host is assumed single-threaded and cooperative (an editor UI loop):
//! it calls [`Coordinator::drain`] on each idle tick and applies the events
//! on its own thread. Nothing here touches host state directly.
//!
//! Cancellation is cooperative. The stop flag is polled before the network
//! call is issued; a call that has already returned still delivers its
//! result. Superseded requests are handled by sequence number: a stale
//! worker may finish whenever it likes, but its events no longer match the
//! current sequence and are dropped at the drain step.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::ProviderConfig;
use crate::error::{NanoRenderError, Result};
use crate::types::{EditRequest, GeneratedImage, GenerationRequest};

/// How long a newly submitted request waits for its cancelled predecessor
/// before abandoning the stale thread.
const SUPERSEDE_WAIT: Duration = Duration::from_millis(250);

/// Lifecycle of the current request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    /// No request submitted yet.
    #[default]
    Idle,
    /// Worker thread is executing.
    Running,
    /// Final result delivered.
    Succeeded,
    /// Failure delivered.
    Failed,
    /// Cancelled before the network call.
    Cancelled,
}

impl RequestState {
    /// Whether a request is currently executing.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// An event delivered to the host, in submission order.
#[derive(Debug)]
pub enum HostEvent {
    /// Advisory progress text for a status field.
    Status(String),
    /// The request finished with an image.
    Succeeded(GeneratedImage),
    /// The request failed; the message is ready for direct display.
    Failed(String),
    /// The request was cancelled before dispatch.
    Cancelled,
}

struct Envelope {
    seq: u64,
    event: HostEvent,
}

/// Shared stop flag polled between coarse-grained pipeline steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn new() -> Self {
        Self::default()
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle a job uses to report progress and poll for cancellation.
pub struct JobContext {
    token: CancelToken,
    seq: u64,
    tx: Sender<Envelope>,
}

impl JobContext {
    /// Emits an advisory status string.
    pub fn set_status(&self, status: impl Into<String>) {
        self.send(HostEvent::Status(status.into()));
    }

    /// Errors with [`NanoRenderError::Cancelled`] if a cancel was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(NanoRenderError::Cancelled);
        }
        Ok(())
    }

    fn send(&self, event: HostEvent) {
        // The host may have dropped the coordinator; nowhere to deliver.
        let _ = self.tx.send(Envelope {
            seq: self.seq,
            event,
        });
    }
}

struct ActiveRequest {
    token: CancelToken,
    handle: thread::JoinHandle<()>,
}

/// Runs generate/edit pipelines off the host thread and feeds results back
/// through a drainable queue. One request may be running at a time;
/// submitting another supersedes the first.
pub struct Coordinator {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    seq: u64,
    state: RequestState,
    active: Option<ActiveRequest>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    /// Creates an idle coordinator.
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            seq: 0,
            state: RequestState::Idle,
            active: None,
        }
    }

    /// Current request state.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Submits a generate request; any running request is superseded.
    pub fn submit_generate(
        &mut self,
        config: ProviderConfig,
        request: GenerationRequest,
    ) -> Result<()> {
        self.submit(move |ctx| {
            ctx.check_cancelled()?;
            ctx.set_status("Sending to AI...");
            let image = crate::dispatch::generate_image_blocking(&config, &request)?;
            ctx.set_status("Loading result...");
            Ok(image)
        })
    }

    /// Submits an edit request; any running request is superseded.
    pub fn submit_edit(&mut self, config: ProviderConfig, request: EditRequest) -> Result<()> {
        self.submit(move |ctx| {
            ctx.check_cancelled()?;
            ctx.set_status("Sending to AI...");
            let image = crate::dispatch::edit_image_blocking(&config, &request)?;
            ctx.set_status("Loading result...");
            Ok(image)
        })
    }

    /// Submits an arbitrary job to the worker slot.
    ///
    /// The job runs on a fresh worker thread. It should poll
    /// [`JobContext::check_cancelled`] before expensive steps; returning
    /// [`NanoRenderError::Cancelled`] records a cancellation rather than a
    /// failure.
    pub fn submit<F>(&mut self, job: F) -> Result<()>
    where
        F: FnOnce(&JobContext) -> Result<GeneratedImage> + Send + 'static,
    {
        self.supersede_active();

        self.seq += 1;
        let token = CancelToken::new();
        let ctx = JobContext {
            token: token.clone(),
            seq: self.seq,
            tx: self.tx.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("nanorender-request-{}", self.seq))
            .spawn(move || run_job(ctx, job))?;

        self.active = Some(ActiveRequest { token, handle });
        self.state = RequestState::Running;
        Ok(())
    }

    /// Requests cooperative cancellation of the running request.
    ///
    /// A request that has not yet issued its network call will end
    /// CANCELLED; one whose call already returned still delivers its
    /// result.
    pub fn cancel(&mut self) {
        if let Some(active) = &self.active {
            active.token.cancel();
        }
    }

    /// Drains pending events, in order. Call once per host idle tick and
    /// apply the events on the host thread.
    pub fn drain(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = self.rx.try_recv() {
            if envelope.seq != self.seq {
                tracing::debug!("dropping event from superseded request {}", envelope.seq);
                continue;
            }
            match envelope.event {
                HostEvent::Succeeded(_) => self.state = RequestState::Succeeded,
                HostEvent::Failed(_) => self.state = RequestState::Failed,
                HostEvent::Cancelled => self.state = RequestState::Cancelled,
                HostEvent::Status(_) => {}
            }
            events.push(envelope.event);
        }

        if !self.state.is_running()
            && self.active.as_ref().is_some_and(|a| a.handle.is_finished())
        {
            self.active = None;
        }

        events
    }

    /// Cancels the running request and waits briefly for its thread; a
    /// thread that does not finish in time is abandoned (its events will
    /// carry a stale sequence number).
    fn supersede_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.token.cancel();

        let deadline = Instant::now() + SUPERSEDE_WAIT;
        while !active.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if !active.handle.is_finished() {
            tracing::warn!("previous request still in flight; abandoning its worker thread");
        }
    }
}

/// Worker entry point. Every outcome, including a panic, becomes a queue
/// event; nothing propagates across the thread boundary.
fn run_job<F>(ctx: JobContext, job: F)
where
    F: FnOnce(&JobContext) -> Result<GeneratedImage>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(|| job(&ctx))) {
        Ok(Ok(image)) => {
            tracing::debug!("request finished: {} bytes", image.size());
            ctx.send(HostEvent::Succeeded(image));
        }
        Ok(Err(NanoRenderError::Cancelled)) => ctx.send(HostEvent::Cancelled),
        Ok(Err(error)) => {
            tracing::warn!("request failed: {error}");
            ctx.send(HostEvent::Failed(error.status_message()));
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("worker thread panicked: {detail}");
            ctx.send(HostEvent::Failed(format!("Internal error: {detail}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderKind;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::sync_channel;

    fn test_image(tag: u8) -> GeneratedImage {
        GeneratedImage::from_bytes(vec![tag; 4], ProviderKind::Google)
    }

    /// Drains until the coordinator leaves RUNNING or the timeout expires.
    fn drain_until_settled(coordinator: &mut Coordinator) -> Vec<HostEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(coordinator.drain());
            if !coordinator.state().is_running() && !events.is_empty() {
                // One extra pass to pick up anything queued behind the terminal event
                events.extend(coordinator.drain());
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("coordinator never settled; state = {:?}", coordinator.state());
    }

    #[test]
    fn test_successful_request_delivers_status_then_image() {
        let mut coordinator = Coordinator::new();
        coordinator
            .submit(|ctx| {
                ctx.set_status("Sending to AI...");
                Ok(test_image(1))
            })
            .unwrap();

        let events = drain_until_settled(&mut coordinator);
        assert!(matches!(events[0], HostEvent::Status(_)));
        assert!(matches!(events[1], HostEvent::Succeeded(_)));
        assert_eq!(coordinator.state(), RequestState::Succeeded);
    }

    #[test]
    fn test_cancel_before_network_issues_no_call() {
        let network_calls = Arc::new(AtomicUsize::new(0));
        let calls = network_calls.clone();
        // Worker blocks on this channel until the test has cancelled.
        let (release_tx, release_rx) = sync_channel::<()>(0);

        let mut coordinator = Coordinator::new();
        coordinator
            .submit(move |ctx| {
                release_rx.recv().unwrap();
                ctx.check_cancelled()?;
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(test_image(1))
            })
            .unwrap();

        coordinator.cancel();
        release_tx.send(()).unwrap();

        let events = drain_until_settled(&mut coordinator);
        assert!(matches!(events.last(), Some(HostEvent::Cancelled)));
        assert_eq!(network_calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.state(), RequestState::Cancelled);
    }

    #[test]
    fn test_cancel_after_network_returns_still_delivers() {
        // The "network call" completes, the test cancels, then the worker
        // is released to finish delivery.
        let (network_done_tx, network_done_rx) = sync_channel::<()>(0);
        let (release_tx, release_rx) = sync_channel::<()>(0);

        let mut coordinator = Coordinator::new();
        coordinator
            .submit(move |ctx| {
                ctx.check_cancelled()?;
                let image = test_image(7);
                network_done_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(image)
            })
            .unwrap();

        network_done_rx.recv().unwrap();
        coordinator.cancel();
        release_tx.send(()).unwrap();

        let events = drain_until_settled(&mut coordinator);
        match events.last() {
            Some(HostEvent::Succeeded(image)) => assert_eq!(image.data, vec![7; 4]),
            other => panic!("expected Succeeded, got {other:?}"),
        }
        assert_eq!(coordinator.state(), RequestState::Succeeded);
    }

    #[test]
    fn test_second_submit_supersedes_first() {
        let (release_tx, release_rx) = sync_channel::<()>(0);

        let mut coordinator = Coordinator::new();
        coordinator
            .submit(move |_ctx| {
                // Ignore cancellation to emulate a stale in-flight call
                release_rx.recv().unwrap();
                Ok(test_image(1))
            })
            .unwrap();
        assert!(coordinator.state().is_running());

        coordinator.submit(|_ctx| Ok(test_image(2))).unwrap();

        // Let the abandoned first worker complete after supersession
        release_tx.send(()).unwrap();

        let events = drain_until_settled(&mut coordinator);
        let delivered: Vec<&GeneratedImage> = events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Succeeded(image) => Some(image),
                _ => None,
            })
            .collect();

        // Exactly one result lands, and it is the second request's
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].data, vec![2; 4]);

        // The stale worker's late event is dropped on a later drain too
        thread::sleep(Duration::from_millis(50));
        assert!(coordinator.drain().is_empty());
    }

    #[test]
    fn test_job_error_becomes_failed_event() {
        let mut coordinator = Coordinator::new();
        coordinator
            .submit(|_ctx| Err(NanoRenderError::Auth("key expired".into())))
            .unwrap();

        let events = drain_until_settled(&mut coordinator);
        match events.last() {
            Some(HostEvent::Failed(message)) => {
                assert!(message.contains("key"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(coordinator.state(), RequestState::Failed);
    }

    #[test]
    fn test_worker_panic_becomes_failed_event() {
        let mut coordinator = Coordinator::new();
        coordinator.submit(|_ctx| panic!("boom")).unwrap();

        let events = drain_until_settled(&mut coordinator);
        match events.last() {
            Some(HostEvent::Failed(message)) => assert!(message.contains("boom")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_idle_coordinator_drains_nothing() {
        let mut coordinator = Coordinator::new();
        assert!(coordinator.drain().is_empty());
        assert_eq!(coordinator.state(), RequestState::Idle);
    }
}
