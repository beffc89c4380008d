//! Per-socket view of the delivery stream.
//!
//! Messages are marked delivered only after the socket wrote them (see
//! [`Session::acknowledge`]). When the bus subscription lags, undelivered messages
//! are reloaded from the store; ids already handed out are filtered so each message
//! reaches the socket once.

use crate::protocol::{Delivery, incoming_message_id};
use crate::session::Session;
use serde_json::Value;
use shortly_event_bus::EventBusError;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, warn};

/// Forwarded ids remembered while they may still be waiting in the outbox.
const RECENT_CAPACITY: usize = 256;

pub struct Inbox {
    session: Session,
    deliveries: broadcast::Receiver<Arc<Delivery>>,
    /// Ids sent from the store whose bus copy may still arrive.
    from_store: HashSet<String>,
    /// Ids recently forwarded from the bus, possibly not yet acknowledged.
    recent: VecDeque<String>,
}

impl Inbox {
    /// Subscribes to deliveries, then opens the session. Subscribing first means a
    /// message sent while the greeting loads is seen either in the pending set or
    /// on the bus, never neither.
    ///
    /// # Errors
    /// The bus refused the subscription.
    pub async fn open(session: Session) -> Result<(Self, Vec<Value>), EventBusError> {
        let deliveries = session.chat().events().subscribe::<Delivery>()?;
        let greeting = session.open().await;

        let mut inbox = Self { session, deliveries, from_store: HashSet::new(), recent: VecDeque::new() };
        let email = inbox.session.email().to_owned();
        inbox.from_store.extend(greeting.iter().filter_map(|f| incoming_message_id(f, &email)).map(str::to_owned));
        Ok((inbox, greeting))
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Next frames for this socket. `None` once the bus is closed.
    pub async fn next(&mut self) -> Option<Vec<Value>> {
        loop {
            match self.deliveries.recv().await {
                Ok(delivery) => {
                    if !delivery.recipient.reaches(self.session.email()) {
                        continue;
                    }
                    if let Some(id) = incoming_message_id(&delivery.frame, self.session.email()) {
                        if self.from_store.remove(id) {
                            continue;
                        }
                        self.remember(id.to_owned());
                    }
                    return Some(vec![delivery.frame.clone()]);
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(email = %self.session.email(), skipped, "Chat deliveries lagged; reloading pending messages");
                    let frames = self.resync().await;
                    if !frames.is_empty() {
                        return Some(frames);
                    }
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    async fn resync(&mut self) -> Vec<Value> {
        let pending = match self.session.pending().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(email = %self.session.email(), error = %e, "Failed to reload pending messages");
                return Vec::new();
            },
        };

        let email = self.session.email().to_owned();
        let mut frames = Vec::with_capacity(pending.len());
        for frame in pending {
            let Some(id) = incoming_message_id(&frame, &email) else { continue };
            if self.recent.iter().any(|r| r == id) {
                continue;
            }
            self.from_store.insert(id.to_owned());
            frames.push(frame);
        }
        frames
    }

    fn remember(&mut self, id: String) {
        if self.recent.len() == RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(id);
    }
}
