use core::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use dashmap::DashMap;
use model::RoomCode;
use std::sync::Arc;
use tokio::{sync::watch, time};

/// Named events a transport delivers. `Connect` is raised locally whenever
/// the underlying connection is (re)established; the rest come from the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    Connect,
    NewQuestion,
    UpvoteUpdate,
    MarkedAnswered,
    Removed,
}

impl EventName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::NewQuestion => "new-question",
            Self::UpvoteUpdate => "question-upvote-update",
            Self::MarkedAnswered => "question-marked-answered",
            Self::Removed => "question-removed",
        }
    }

    /// Maps a server-sent event name. `connect` is never accepted from the wire.
    pub fn from_wire(name: &str) -> Option<Self> {
        [Self::NewQuestion, Self::UpvoteUpdate, Self::MarkedAnswered, Self::Removed]
            .into_iter()
            .find(|event| event.as_str() == name)
    }
}

/// Callback receiving the raw event payload.
pub type Listener = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A connection that can be told to join a room channel and that delivers
/// named events to registered listeners.
pub trait Transport: Send + Sync {
    fn join(&self, code: &RoomCode);
    /// Gives up the room channel once nothing listens on the transport anymore.
    fn leave(&self, code: &RoomCode);
    fn on(&self, event: EventName, listener: Listener) -> ListenerId;
    /// Detaches a listener. Returns `false` if it was already gone.
    fn off(&self, id: ListenerId) -> bool;
}

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// In-process event hub. Listeners are kept in a registry keyed by id, and
/// [`Hub::drive`] feeds it from the backend's event stream.
pub struct Hub {
    listeners: DashMap<ListenerId, (EventName, Arc<Listener>)>,
    next_id: AtomicU64,
    /// Room channel currently joined.
    joined: watch::Sender<Option<RoomCode>>,
}

impl Default for Hub {
    fn default() -> Self {
        Self { listeners: DashMap::new(), next_id: AtomicU64::new(0), joined: watch::Sender::new(None) }
    }
}

impl Transport for Hub {
    fn join(&self, code: &RoomCode) {
        let changed = self.joined.send_if_modified(|current| {
            if current.as_ref() == Some(code) {
                return false;
            }
            *current = Some(code.clone());
            true
        });
        if changed {
            log::info!("joined room channel {code}");
        }
    }

    fn leave(&self, code: &RoomCode) {
        if !self.listeners.is_empty() {
            return;
        }
        let left = self.joined.send_if_modified(|current| {
            if current.as_ref() != Some(code) {
                return false;
            }
            *current = None;
            true
        });
        if left {
            log::info!("left room channel {code}");
        }
    }

    fn on(&self, event: EventName, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, (event, Arc::new(listener)));
        id
    }

    fn off(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }
}

/// How a connected stream came to an end.
enum Ended {
    /// A different room was joined.
    Switched,
    /// The server or the network dropped the stream.
    Dropped,
    /// The joined-room channel is gone.
    Closed,
}

impl Hub {
    pub fn joined(&self) -> Option<RoomCode> {
        self.joined.borrow().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Invokes every listener registered for `event`. Returns how many ran.
    pub fn dispatch(&self, event: EventName, data: &str) -> usize {
        // Listeners may touch the registry, so none run while it is borrowed.
        let targets: Vec<_> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().0 == event)
            .map(|entry| Arc::clone(&entry.value().1))
            .collect();
        for listener in &targets {
            listener(data);
        }
        targets.len()
    }

    /// Keeps the hub connected to the event stream of whichever room is joined,
    /// reconnecting with exponential backoff. Every successful connection raises
    /// [`EventName::Connect`]. Runs until its task is aborted.
    pub async fn drive(self: Arc<Self>, api: api::Client) {
        let mut joined = self.joined.subscribe();
        let mut backoff = MIN_BACKOFF;
        loop {
            let Some(code) = joined.borrow_and_update().clone() else {
                if joined.changed().await.is_err() {
                    return;
                }
                continue;
            };

            let ended = match api.events(&code).await {
                Ok(stream) => {
                    log::info!("event stream for room {code} connected");
                    backoff = MIN_BACKOFF;
                    self.dispatch(EventName::Connect, "");
                    self.pump(stream, &mut joined).await
                }
                Err(err) => {
                    log::warn!("cannot open event stream for room {code}: {err}");
                    Ended::Dropped
                }
            };

            match ended {
                Ended::Closed => return,
                Ended::Switched => continue,
                Ended::Dropped => {}
            }

            log::info!("reconnecting in {}s", backoff.as_secs());
            tokio::select! {
                _ = time::sleep(backoff) => {}
                res = joined.changed() => {
                    if res.is_err() {
                        return;
                    }
                }
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn pump(&self, mut stream: api::EventStream, joined: &mut watch::Receiver<Option<RoomCode>>) -> Ended {
        loop {
            tokio::select! {
                biased;
                res = joined.changed() => {
                    return if res.is_err() { Ended::Closed } else { Ended::Switched };
                }
                next = stream.next() => match next {
                    Ok(Some(message)) => match EventName::from_wire(&message.event) {
                        Some(event) => {
                            self.dispatch(event, &message.data);
                        }
                        None => log::debug!("ignoring unknown event {:?}", message.event),
                    },
                    Ok(None) => {
                        log::warn!("event stream closed by server");
                        return Ended::Dropped;
                    }
                    Err(err) => {
                        log::warn!("event stream failed: {err}");
                        return Ended::Dropped;
                    }
                },
            }
        }
    }
}
