//! Online status and last-seen times of chat users.

use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use std::time::Duration;

const CAPACITY: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Online,
    Offline,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// In-memory presence. A user is online while at least one socket is open;
/// unknown users read as offline with no last-seen time.
#[derive(Debug, Clone)]
pub struct Presence {
    sockets: Cache<String, u32>,
    /// Unix epoch microseconds.
    last_seen: Cache<String, i64>,
}

impl Presence {
    #[must_use]
    pub fn new(last_seen_ttl: Duration) -> Self {
        Self {
            sockets: Cache::builder().max_capacity(CAPACITY).build(),
            last_seen: Cache::builder().max_capacity(CAPACITY).time_to_live(last_seen_ttl).build(),
        }
    }

    pub fn connected(&self, email: &str, now: i64) {
        self.sockets
            .entry(email.to_owned())
            .and_upsert_with(|open| open.map_or(1, |entry| entry.into_value().saturating_add(1)));
        self.last_seen.insert(email.to_owned(), now);
    }

    /// Closes one socket; returns `true` when it was the user's last.
    pub fn disconnected(&self, email: &str, now: i64) -> bool {
        self.last_seen.insert(email.to_owned(), now);
        let result = self.sockets.entry(email.to_owned()).and_compute_with(|open| {
            match open.map(moka::Entry::into_value) {
                Some(count) if count > 1 => Op::Put(count - 1),
                Some(_) => Op::Remove,
                None => Op::Nop,
            }
        });
        !matches!(result, CompResult::ReplacedWith(_))
    }

    #[must_use]
    pub fn status(&self, email: &str) -> Status {
        if self.sockets.get(email).is_some_and(|open| open > 0) { Status::Online } else { Status::Offline }
    }

    #[must_use]
    pub fn last_seen(&self, email: &str) -> Option<i64> {
        self.last_seen.get(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_is_offline() {
        let presence = Presence::new(Duration::from_secs(60));
        assert_eq!(presence.status("a@x.io"), Status::Offline);
        assert_eq!(presence.last_seen("a@x.io"), None);
    }

    #[test]
    fn online_until_last_socket_closes() {
        let presence = Presence::new(Duration::from_secs(60));
        presence.connected("a@x.io", 10);
        presence.connected("a@x.io", 11);
        assert_eq!(presence.status("a@x.io"), Status::Online);

        assert!(!presence.disconnected("a@x.io", 20));
        assert_eq!(presence.status("a@x.io"), Status::Online);

        assert!(presence.disconnected("a@x.io", 30));
        assert_eq!(presence.status("a@x.io"), Status::Offline);
        assert_eq!(presence.last_seen("a@x.io"), Some(30));
    }
}
