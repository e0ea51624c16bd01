use crate::transport::{EventName, Listener, ListenerId, Transport};
use feed::Change;
use model::{
    event::{QuestionRef, UpvoteUpdate},
    QuestionRow, RoomCode,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything [`subscribe`] attached to a transport. Detaching happens all at
/// once, either through [`Subscription::close`] or on drop.
pub struct Subscription<T: Transport + ?Sized> {
    transport: Arc<T>,
    code: RoomCode,
    listeners: Vec<ListenerId>,
}

impl<T: Transport + ?Sized> Subscription<T> {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn is_active(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Detaches the four event listeners and the rejoin listener, then leaves
    /// the room channel. Idempotent.
    pub fn close(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        for id in self.listeners.drain(..) {
            self.transport.off(id);
        }
        self.transport.leave(&self.code);
        log::info!("unsubscribed from room {}", self.code);
    }
}

impl<T: Transport + ?Sized> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builds a listener that decodes the payload and forwards it as a [`Change`].
/// Malformed payloads are dropped, as are events arriving after the receiving
/// session has gone away.
fn forward<P, F>(event: EventName, tx: &mpsc::UnboundedSender<Change>, wrap: F) -> Listener
where
    P: DeserializeOwned,
    F: Fn(P) -> Change + Send + Sync + 'static,
{
    let tx = tx.clone();
    Box::new(move |data: &str| match serde_json::from_str::<P>(data) {
        Ok(payload) => {
            if tx.send(wrap(payload)).is_err() {
                log::debug!("{} arrived after the feed was discarded", event.as_str());
            }
        }
        Err(err) => log::warn!("malformed {} payload dropped: {err}", event.as_str()),
    })
}

/// Binds the room's channel on `transport` and forwards its four events into
/// `tx`, in delivery order. The room is joined right away and joined again on
/// every reconnection, since the transport forgets channel membership when
/// its connection drops.
pub fn subscribe<T>(transport: Arc<T>, code: RoomCode, tx: mpsc::UnboundedSender<Change>) -> Subscription<T>
where
    T: Transport + ?Sized + 'static,
{
    let weak = Arc::downgrade(&transport);
    let rejoin_code = code.clone();
    let rejoin: Listener = Box::new(move |_: &str| {
        // The listener lives inside the transport, hence the weak handle.
        if let Some(transport) = weak.upgrade() {
            log::info!("connection established, rejoining room {rejoin_code}");
            transport.join(&rejoin_code);
        }
    });

    let listeners = Vec::from([
        transport.on(EventName::Connect, rejoin),
        transport.on(EventName::NewQuestion, forward::<QuestionRow, _>(EventName::NewQuestion, &tx, Change::Created)),
        transport.on(
            EventName::UpvoteUpdate,
            forward::<UpvoteUpdate, _>(EventName::UpvoteUpdate, &tx, Change::UpvoteUpdated),
        ),
        transport.on(
            EventName::MarkedAnswered,
            forward::<QuestionRef, _>(EventName::MarkedAnswered, &tx, Change::Answered),
        ),
        transport.on(EventName::Removed, forward::<QuestionRef, _>(EventName::Removed, &tx, Change::Removed)),
    ]);

    transport.join(&code);
    log::info!("subscribed to room {code}");
    Subscription { transport, code, listeners }
}
