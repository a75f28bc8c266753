//! Upload session controller.
//!
//! One controller drives one transfer. It runs as a tokio task that owns
//! the [`TransferState`], the subscription and the in-flight upload, and
//! publishes a [`TransferSnapshot`] on every change. The caller keeps an
//! [`UploadHandle`] to watch and cancel it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use filerelay_protocol::{FileInfo, SessionId};
use filerelay_subscription::{Subscription, SubscriptionItem};
use filerelay_transport::UploadFile;

use crate::error::TransferError;
use crate::registry::{InProgressCounter, Registration};
use crate::relay::Relay;
use crate::state::{Effect, Input, TransferState, reduce};

/// What the presentation layer sees of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSnapshot {
    /// Assigned once the relay created the session.
    pub session_id: Option<SessionId>,
    /// Declared file metadata.
    pub file: FileInfo,
    pub state: TransferState,
    /// Set when the transfer was abandoned by the user.
    pub cancelled: bool,
}

impl TransferSnapshot {
    fn new(file: FileInfo) -> Self {
        Self {
            session_id: None,
            file,
            state: TransferState::Waiting,
            cancelled: false,
        }
    }

    /// `true` once nothing will change anymore.
    pub fn is_final(&self) -> bool {
        self.cancelled || self.state.is_terminal()
    }
}

/// Starts transfers.
pub struct UploadController;

impl UploadController {
    /// Spawns the controller task for `file`.
    ///
    /// The transfer counts toward `counter` from its first `start` event
    /// until it ends. Must be called within a tokio runtime.
    pub fn start(
        relay: Arc<dyn Relay>,
        file: UploadFile,
        counter: Arc<InProgressCounter>,
    ) -> UploadHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(TransferSnapshot::new(file.info().clone()));
        let cancel = CancellationToken::new();
        let tracker = Tracker {
            snapshot_tx,
            registration: Registration::new(counter),
            declared_size: file.size(),
        };
        let task = tokio::spawn(run(relay, file, tracker, cancel.clone()));

        UploadHandle {
            snapshot_rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Handle to a running transfer.
///
/// Dropping it cancels the transfer.
pub struct UploadHandle {
    snapshot_rx: watch::Receiver<TransferSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<TransferSnapshot>>,
}

impl UploadHandle {
    /// The latest published snapshot.
    pub fn snapshot(&self) -> TransferSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver that is notified on every change.
    pub fn watch(&self) -> watch::Receiver<TransferSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Waits for the next change. Returns `None` once the controller is
    /// gone and nothing more will be published.
    pub async fn changed(&mut self) -> Option<TransferSnapshot> {
        self.snapshot_rx.changed().await.ok()?;
        Some(self.snapshot_rx.borrow_and_update().clone())
    }

    /// Abandons the transfer.
    ///
    /// The subscription is closed, the upload request dropped and the
    /// registration released. The state is left as it was; the final
    /// snapshot has `cancelled` set.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Waits for the controller to stop and returns the final snapshot.
    pub async fn wait(mut self) -> TransferSnapshot {
        match self.task.take() {
            Some(task) => match task.await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "transfer task failed");
                    self.snapshot()
                }
            },
            None => self.snapshot(),
        }
    }
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Applies inputs and publishes the result.
struct Tracker {
    snapshot_tx: watch::Sender<TransferSnapshot>,
    registration: Registration,
    declared_size: u64,
}

impl Tracker {
    fn state(&self) -> TransferState {
        self.snapshot_tx.borrow().state.clone()
    }

    fn is_terminal(&self) -> bool {
        self.snapshot_tx.borrow().state.is_terminal()
    }

    fn set_session(&self, id: SessionId) {
        self.snapshot_tx.send_modify(|snap| snap.session_id = Some(id));
    }

    fn apply(&mut self, input: Input) {
        let current = self.state();
        let (next, effect) = reduce(&current, &input, self.declared_size);
        match effect {
            Effect::Register => {
                self.registration.register();
            }
            Effect::Release => {
                self.registration.release();
            }
            Effect::None => {}
        }
        if next == current {
            return;
        }

        let session = self.snapshot_tx.borrow().session_id;
        match &next {
            TransferState::Done { bytes_transferred } => {
                info!(session = ?session, bytes = bytes_transferred, "transfer finished");
            }
            TransferState::Error { cause } => {
                warn!(session = ?session, error = %cause, "transfer failed");
            }
            _ => {}
        }
        self.snapshot_tx.send_modify(|snap| snap.state = next);
    }

    fn cancel(&mut self) {
        self.registration.release();
        self.snapshot_tx.send_modify(|snap| snap.cancelled = true);
    }

    fn snapshot(&self) -> TransferSnapshot {
        self.snapshot_tx.borrow().clone()
    }
}

/// The controller task.
async fn run(
    relay: Arc<dyn Relay>,
    file: UploadFile,
    mut tracker: Tracker,
    cancel: CancellationToken,
) -> TransferSnapshot {
    let info = file.info();
    info!(name = %info.name, size = info.size, mime = %info.mime_type, "starting transfer");

    let created = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("cancelled before the session was created");
            tracker.cancel();
            return tracker.snapshot();
        }
        result = relay.create_session(info) => result,
    };
    let id = match created {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "failed to create upload session");
            tracker.apply(Input::Failed(TransferError::SessionCreation));
            return tracker.snapshot();
        }
    };
    info!(session = %id, "session created");
    tracker.set_session(id);

    let mut subscription = relay.subscribe(id);
    let upload = relay.upload_bytes(id, &file);
    tokio::pin!(upload);
    let mut upload_pending = true;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(session = %id, "transfer cancelled");
                tracker.cancel();
                subscription.close();
                break;
            }

            item = subscription.next(), if !subscription.is_closed() => match item {
                Some(SubscriptionItem::Event(event)) => {
                    debug!(session = %id, kind = event.kind(), "transfer event");
                    tracker.apply(Input::Remote(event));
                }
                Some(SubscriptionItem::Closed(reason)) => {
                    if !tracker.is_terminal() {
                        warn!(session = %id, %reason, "status channel lost");
                        tracker.apply(Input::Failed(TransferError::ChannelFault));
                    }
                }
                None => {}
            },

            result = &mut upload, if upload_pending => {
                upload_pending = false;
                match result {
                    Ok(()) => debug!(session = %id, "upload request completed"),
                    Err(e) => {
                        warn!(session = %id, error = %e, "failed to upload file");
                        tracker.apply(Input::Failed(TransferError::UploadDispatch));
                    }
                }
            }
        }

        if tracker.is_terminal() {
            subscription.close();
            break;
        }
    }

    tracker.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use filerelay_protocol::TransferEvent;
    use filerelay_subscription::CloseReason;
    use filerelay_transport::TransportError;
    use tokio::sync::{mpsc, oneshot};

    use crate::relay::RelayFuture;
    use crate::state::TransferStatus;

    const SIZE: usize = 1_000_000;

    /// Scripted relay. Create answers once; upload resolves when the test
    /// says so (never, if the sender is dropped); the status channel is fed
    /// through an mpsc sender.
    struct MockRelay {
        create_result: Mutex<Option<Result<SessionId, TransportError>>>,
        upload_rx: Mutex<Option<oneshot::Receiver<Result<(), TransportError>>>>,
        events_rx: Mutex<Option<mpsc::Receiver<SubscriptionItem>>>,
        subscribe_calls: AtomicUsize,
        upload_calls: AtomicUsize,
    }

    impl Relay for MockRelay {
        fn create_session<'a>(&'a self, _info: &'a FileInfo) -> RelayFuture<'a, SessionId> {
            let result = self
                .create_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(SessionId::new(0)));
            Box::pin(async move { result })
        }

        fn upload_bytes<'a>(&'a self, _id: SessionId, _file: &'a UploadFile) -> RelayFuture<'a, ()> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            let rx = self.upload_rx.lock().unwrap().take();
            Box::pin(async move {
                match rx {
                    Some(rx) => match rx.await {
                        Ok(result) => result,
                        Err(_) => std::future::pending().await,
                    },
                    None => std::future::pending().await,
                }
            })
        }

        fn subscribe(&self, id: SessionId) -> Subscription {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            let rx = self
                .events_rx
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| mpsc::channel(1).1);
            Subscription::from_receiver(id, rx)
        }
    }

    struct Harness {
        relay: Arc<MockRelay>,
        events_tx: mpsc::Sender<SubscriptionItem>,
        upload_tx: Option<oneshot::Sender<Result<(), TransportError>>>,
        counter: Arc<InProgressCounter>,
    }

    impl Harness {
        fn new(create: Result<SessionId, TransportError>) -> Self {
            let (events_tx, events_rx) = mpsc::channel(64);
            let (upload_tx, upload_rx) = oneshot::channel();
            let relay = Arc::new(MockRelay {
                create_result: Mutex::new(Some(create)),
                upload_rx: Mutex::new(Some(upload_rx)),
                events_rx: Mutex::new(Some(events_rx)),
                subscribe_calls: AtomicUsize::new(0),
                upload_calls: AtomicUsize::new(0),
            });
            Self {
                relay,
                events_tx,
                upload_tx: Some(upload_tx),
                counter: Arc::new(InProgressCounter::new()),
            }
        }

        fn start(&self) -> UploadHandle {
            let file = UploadFile::from_bytes("movie.mp4", None, vec![0u8; SIZE]);
            UploadController::start(self.relay.clone(), file, self.counter.clone())
        }

        /// Queues an event. Sends after the controller closed the
        /// subscription are dropped.
        async fn push(&self, event: TransferEvent) {
            let _ = self.events_tx.send(SubscriptionItem::Event(event)).await;
        }

        fn finish_upload(&mut self, result: Result<(), TransportError>) {
            if let Some(tx) = self.upload_tx.take() {
                let _ = tx.send(result);
            }
        }
    }

    fn refused() -> TransportError {
        TransportError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
    }

    async fn wait_for(
        handle: &UploadHandle,
        pred: impl FnMut(&TransferSnapshot) -> bool,
    ) -> TransferSnapshot {
        let mut rx = handle.watch();
        let snap = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .expect("snapshot condition not reached")
            .expect("controller gone");
        snap.clone()
    }

    async fn finish(handle: UploadHandle) -> TransferSnapshot {
        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("controller should stop")
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_a_successful_transfer() {
        let h = Harness::new(Ok(SessionId::new(7)));
        let handle = h.start();

        let waiting = wait_for(&handle, |s| s.session_id.is_some()).await;
        assert_eq!(waiting.session_id, Some(SessionId::new(7)));
        assert_eq!(waiting.state, TransferState::Waiting);
        assert_eq!(waiting.file.name, "movie.mp4");

        h.push(TransferEvent::Start).await;
        h.push(TransferEvent::Progress { done: 500_000 }).await;
        let running = wait_for(&handle, |s| s.state.bytes_transferred() == Some(500_000)).await;
        assert_eq!(running.state.status(), TransferStatus::Running);
        assert_eq!(h.counter.count(), 1);

        h.push(TransferEvent::Progress { done: 1_000_000 }).await;
        h.push(TransferEvent::Done).await;

        let last = finish(handle).await;
        assert_eq!(
            last.state,
            TransferState::Done {
                bytes_transferred: SIZE as u64
            }
        );
        assert!(!last.cancelled);
        assert_eq!(h.counter.count(), 0);
        assert!(h.events_tx.is_closed(), "subscription should be closed");
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_b_create_failure() {
        let h = Harness::new(Err(refused()));
        let handle = h.start();

        let last = finish(handle).await;
        assert_eq!(last.state.error(), Some(TransferError::SessionCreation));
        assert_eq!(
            last.state.error_message().as_deref(),
            Some("Failed to create upload session.")
        );
        assert_eq!(last.session_id, None);
        assert_eq!(h.relay.subscribe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.relay.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_c_receiver_timeout() {
        let h = Harness::new(Ok(SessionId::new(3)));
        let handle = h.start();

        h.push(TransferEvent::Start).await;
        wait_for(&handle, |s| s.state.status() == TransferStatus::Running).await;
        assert_eq!(h.counter.count(), 1);

        h.push(TransferEvent::Timeout).await;
        let last = finish(handle).await;
        assert_eq!(last.state.error(), Some(TransferError::RemoteTimeout));
        assert_eq!(
            last.state.error_message().as_deref(),
            Some("The receiver did not connect in time.")
        );
        assert_eq!(h.counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_registers_once() {
        let h = Harness::new(Ok(SessionId::new(1)));
        let handle = h.start();

        h.push(TransferEvent::Start).await;
        h.push(TransferEvent::Start).await;
        h.push(TransferEvent::Progress { done: 10 }).await;
        wait_for(&handle, |s| s.state.bytes_transferred() == Some(10)).await;
        assert_eq!(h.counter.count(), 1);

        h.push(TransferEvent::Done).await;
        finish(handle).await;
        assert_eq!(h.counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_error_wins() {
        let h = Harness::new(Ok(SessionId::new(1)));
        let handle = h.start();

        h.push(TransferEvent::Start).await;
        h.push(TransferEvent::Error).await;
        h.push(TransferEvent::Timeout).await;

        let last = finish(handle).await;
        assert_eq!(last.state.error(), Some(TransferError::RemoteTransfer));
        assert_eq!(h.counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn events_after_done_are_not_observed() {
        let h = Harness::new(Ok(SessionId::new(1)));
        let handle = h.start();
        let mut rx = handle.watch();

        h.push(TransferEvent::Start).await;
        h.push(TransferEvent::Done).await;
        h.push(TransferEvent::Progress { done: 3 }).await;
        h.push(TransferEvent::Error).await;

        let last = finish(handle).await;
        assert_eq!(last.state.status(), TransferStatus::Done);
        assert_eq!(last.state.bytes_transferred(), Some(SIZE as u64));
        assert_eq!(rx.borrow_and_update().state, last.state);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_before_start_keeps_waiting() {
        let h = Harness::new(Ok(SessionId::new(1)));
        let handle = h.start();

        h.push(TransferEvent::Progress { done: 99 }).await;
        h.push(TransferEvent::Unknown("resumed".into())).await;
        h.push(TransferEvent::Start).await;

        let running = wait_for(&handle, |s| s.state.status() == TransferStatus::Running).await;
        assert_eq!(running.state.bytes_transferred(), Some(0));
        handle.cancel();
        finish(handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn upload_failure_is_terminal() {
        let mut h = Harness::new(Ok(SessionId::new(2)));
        let handle = h.start();

        h.push(TransferEvent::Start).await;
        wait_for(&handle, |s| s.state.status() == TransferStatus::Running).await;
        h.finish_upload(Err(TransportError::Http {
            status: 404,
            body: "Cannot upload to this session".into(),
        }));

        let last = finish(handle).await;
        assert_eq!(last.state.error(), Some(TransferError::UploadDispatch));
        assert_eq!(
            last.state.error_message().as_deref(),
            Some("Failed to upload file.")
        );
        assert_eq!(h.counter.count(), 0);
        assert!(h.events_tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_upload_does_not_end_transfer() {
        let mut h = Harness::new(Ok(SessionId::new(2)));
        let handle = h.start();

        h.finish_upload(Ok(()));
        wait_for(&handle, |s| s.session_id.is_some()).await;
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());
        assert_eq!(handle.snapshot().state, TransferState::Waiting);

        h.push(TransferEvent::Start).await;
        h.push(TransferEvent::Done).await;
        let last = finish(handle).await;
        assert_eq!(last.state.status(), TransferStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn channel_loss_is_an_error() {
        let h = Harness::new(Ok(SessionId::new(5)));
        let handle = h.start();

        h.push(TransferEvent::Start).await;
        h.events_tx
            .send(SubscriptionItem::Closed(CloseReason::Remote))
            .await
            .unwrap();

        let last = finish(handle).await;
        assert_eq!(last.state.error(), Some(TransferError::ChannelFault));
        assert_eq!(h.counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_event_source_is_an_error() {
        let h = Harness::new(Ok(SessionId::new(5)));
        let handle = h.start();
        let Harness { events_tx, .. } = h;
        drop(events_tx);

        let last = finish(handle).await;
        assert_eq!(last.state.error(), Some(TransferError::ChannelFault));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_running_cleans_up() {
        let h = Harness::new(Ok(SessionId::new(11)));
        let handle = h.start();

        h.push(TransferEvent::Start).await;
        h.push(TransferEvent::Progress { done: 20 }).await;
        wait_for(&handle, |s| s.state.bytes_transferred() == Some(20)).await;
        assert_eq!(h.counter.count(), 1);

        handle.cancel();
        handle.cancel();
        let last = finish(handle).await;
        assert!(last.cancelled);
        assert_eq!(last.state.status(), TransferStatus::Running);
        assert_eq!(last.state.error(), None);
        assert_eq!(h.counter.count(), 0);
        assert!(h.events_tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_tears_down() {
        let h = Harness::new(Ok(SessionId::new(12)));
        let handle = h.start();

        h.push(TransferEvent::Start).await;
        wait_for(&handle, |s| s.state.status() == TransferStatus::Running).await;
        assert!(h.counter.any_active());

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), h.events_tx.closed())
            .await
            .expect("subscription should be closed");
        assert!(!h.counter.any_active());
    }

    #[tokio::test(start_paused = true)]
    async fn no_local_timeout_while_waiting() {
        let h = Harness::new(Ok(SessionId::new(4)));
        let handle = h.start();
        wait_for(&handle, |s| s.session_id.is_some()).await;

        // Only the relay ends a waiting transfer.
        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        assert!(!handle.is_finished());
        assert_eq!(handle.snapshot().state, TransferState::Waiting);

        h.push(TransferEvent::Timeout).await;
        let last = finish(handle).await;
        assert_eq!(last.state.error(), Some(TransferError::RemoteTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_session_created() {
        let h = Harness::new(Ok(SessionId::new(1)));
        let handle = h.start();
        handle.cancel();

        let last = finish(handle).await;
        assert!(last.cancelled);
        assert!(last.is_final());
        assert_eq!(last.state, TransferState::Waiting);
        assert_eq!(h.counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn controllers_share_a_counter() {
        let a = Harness::new(Ok(SessionId::new(1)));
        let mut b = Harness::new(Ok(SessionId::new(2)));
        b.counter = a.counter.clone();

        let ha = a.start();
        let hb = b.start();
        a.push(TransferEvent::Start).await;
        b.push(TransferEvent::Start).await;
        wait_for(&ha, |s| s.state.status() == TransferStatus::Running).await;
        wait_for(&hb, |s| s.state.status() == TransferStatus::Running).await;
        assert_eq!(a.counter.count(), 2);

        a.push(TransferEvent::Done).await;
        finish(ha).await;
        assert_eq!(a.counter.count(), 1);

        hb.cancel();
        finish(hb).await;
        assert_eq!(a.counter.count(), 0);
    }
}
