use crate::{
    error::{Error, Result},
    subscriber::{self, Subscription},
    transport::Transport,
    Backend,
};
use feed::{filter, Change, Counts, Feed, Filter, Generation};
use model::{mutation::ReportReason, ParticipantTag, Question, QuestionId, QuestionRow, RoomContext};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

/// Rows of one fetch, tagged with the feed generation it was issued at.
type Fetched = (Generation, api::error::Result<Vec<QuestionRow>>);

/// What observers of a session see after each change.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Canonical order at the time of publishing.
    pub questions: Arc<[Question]>,
    /// Whether a snapshot fetch has succeeded at least once.
    pub loaded: bool,
    /// Most recent snapshot fetch failure. Cleared by the next success.
    pub error: Option<api::error::Error>,
}

/// One active room. Owns the room's feed through a single reconciliation task,
/// so every stream event and snapshot result is applied to completion before
/// the next one starts. Dropping or closing the session detaches all stream
/// listeners and discards the feed.
pub struct Session<B: Backend> {
    room: Arc<RoomContext>,
    me: ParticipantTag,
    backend: Arc<B>,
    state: watch::Receiver<Snapshot>,
    refreshes: mpsc::UnboundedSender<()>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<B: Backend> Session<B> {
    /// Subscribes to the room's stream and starts the snapshot fetch. The two
    /// race; whichever resolves first, the feed converges to the same set.
    pub fn activate<T>(backend: Arc<B>, transport: Arc<T>, room: RoomContext, me: ParticipantTag) -> Self
    where
        T: Transport + ?Sized + 'static,
    {
        log::info!("activating room {} ({}) as {me}", room.name, room.code);
        let room = Arc::new(room);
        let (changes_tx, changes) = mpsc::unbounded_channel();
        let subscription = subscriber::subscribe(transport, room.code.clone(), changes_tx);

        let (fetched_tx, fetched) = mpsc::unbounded_channel();
        let (refreshes, refresh_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(Snapshot::default());
        let (shutdown, shutdown_rx) = oneshot::channel();

        let reconciler = Reconciler {
            feed: Feed::new(me.clone()),
            me: me.clone(),
            subscription,
            backend: Arc::clone(&backend),
            room: Arc::clone(&room),
            changes,
            fetched_tx,
            fetched,
            refreshes: refresh_rx,
            shutdown: shutdown_rx,
            state: state_tx,
        };
        let task = tokio::spawn(reconciler.run());

        Self { room, me, backend, state, refreshes, shutdown: Some(shutdown), task: Some(task) }
    }

    /// Fetches the room's questions again and merges them into the feed.
    /// Questions the server no longer lists are dropped.
    pub fn refresh(&self) -> Result<()> {
        self.refreshes.send(()).map_err(|_| Error::Closed)
    }

    pub fn room(&self) -> &RoomContext {
        &self.room
    }

    pub fn is_closed(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// A receiver notified after every published change.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.state.clone()
    }

    /// The questions shown under `filter` together with every tab's badge count.
    pub fn view(&self, filter: Filter) -> (Vec<Question>, Counts) {
        let state = self.state.borrow();
        let visibility = self.room.visibility;
        let shown = filter::view(state.questions.iter(), visibility, filter).into_iter().cloned().collect();
        (shown, filter::counts(state.questions.iter(), visibility))
    }

    /// Submits a question. It shows up once the stream delivers it back.
    pub async fn ask(&self, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.backend.ask_question(text, &self.room.id, &self.room.code, &self.me).await?;
        Ok(())
    }

    /// Upvotes a question. The feed keeps showing its current count until the
    /// stream delivers the authoritative one.
    pub async fn upvote(&self, id: &QuestionId) -> Result<u32> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.backend.upvote_question(id, &self.me).await?)
    }

    pub async fn report(&self, id: &QuestionId, reason: ReportReason) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.backend.report_question(id, reason, &self.me).await?;
        Ok(())
    }

    /// Leaves the room and waits until the feed has been discarded.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone.
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::error!("reconciliation task for room {} failed: {err}", self.room.code);
            }
        }
    }
}

/// Sole owner of a room's feed. Applies fetched snapshots and stream changes
/// one at a time and in arrival order, publishing the new canonical set after
/// each change.
struct Reconciler<B: Backend, T: Transport + ?Sized> {
    feed: Feed,
    me: ParticipantTag,
    subscription: Subscription<T>,
    backend: Arc<B>,
    room: Arc<RoomContext>,
    changes: mpsc::UnboundedReceiver<Change>,
    /// Handed to every spawned fetch.
    fetched_tx: mpsc::UnboundedSender<Fetched>,
    fetched: mpsc::UnboundedReceiver<Fetched>,
    refreshes: mpsc::UnboundedReceiver<()>,
    shutdown: oneshot::Receiver<()>,
    state: watch::Sender<Snapshot>,
}

impl<B: Backend, T: Transport + ?Sized> Reconciler<B, T> {
    /// Spawns a snapshot fetch stamped with the current feed generation.
    fn fetch(&self) {
        let since = self.feed.generation();
        let backend = Arc::clone(&self.backend);
        let room = Arc::clone(&self.room);
        let me = self.me.clone();
        let tx = self.fetched_tx.clone();
        tokio::spawn(async move {
            let result = backend.get_questions(&room.id, &me).await;
            if tx.send((since, result)).is_err() {
                log::debug!("snapshot for room {} resolved after the session closed", room.code);
            }
        });
    }

    fn publish(&self) {
        let questions = self.feed.current_set().cloned().collect();
        self.state.send_modify(|snapshot| snapshot.questions = questions);
    }

    fn on_fetched(&mut self, since: Generation, result: api::error::Result<Vec<QuestionRow>>) {
        let code = self.subscription.code();
        match result {
            Ok(rows) => {
                let merge = self.feed.load_snapshot(rows, since);
                log::info!(
                    "loaded {} questions for room {code} ({} already live, {} gone)",
                    merge.inserted + merge.enriched,
                    merge.enriched,
                    merge.removed,
                );
                let questions = self.feed.current_set().cloned().collect();
                self.state.send_modify(|snapshot| {
                    snapshot.questions = questions;
                    snapshot.loaded = true;
                    snapshot.error = None;
                });
            }
            Err(err) => {
                log::warn!("cannot load questions for room {code}: {err}");
                self.state.send_modify(|snapshot| snapshot.error = Some(err));
            }
        }
    }

    async fn run(mut self) {
        self.fetch();
        loop {
            tokio::select! {
                biased;
                // Also fires when the session handle is dropped.
                _ = &mut self.shutdown => break,
                Some(()) = self.refreshes.recv() => self.fetch(),
                Some((since, result)) = self.fetched.recv() => self.on_fetched(since, result),
                Some(change) = self.changes.recv() => {
                    if self.feed.apply(change) {
                        self.publish();
                    }
                }
                else => break,
            }
        }

        self.subscription.close();
        log::info!("left room {}, discarding {} questions", self.subscription.code(), self.feed.len());
    }
}
