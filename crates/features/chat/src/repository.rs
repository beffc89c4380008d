use crate::error::ChatError;
use shortly_database::{Database, unique_index_violation};
use surrealdb::types::SurrealValue;
use tracing::instrument;

const ROOM_FIELDS: &str = "room_id, participants, pair_key, created_at, last_message_at";
const MESSAGE_FIELDS: &str = "message_id, room_id, sender, receiver, message, timestamp, is_read, read_at, \
     delivered, edited, edited_at, file";

/// A two-person conversation. Timestamps are Unix epoch microseconds.
#[derive(Debug, Clone, SurrealValue)]
pub struct RoomRecord {
    pub room_id: String,
    pub participants: Vec<String>,
    /// Both participants, sorted and joined; unique per pair.
    pub pair_key: String,
    pub created_at: i64,
    pub last_message_at: i64,
}

impl RoomRecord {
    /// The participant that is not `email`.
    #[must_use]
    pub fn peer_of(&self, email: &str) -> Option<&str> {
        if self.participants.len() != 2 || !self.participants.iter().any(|p| p == email) {
            return None;
        }
        self.participants.iter().map(String::as_str).find(|p| *p != email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, SurrealValue)]
pub struct Attachment {
    pub filename: String,
    /// Decoded size in bytes.
    pub size: i64,
    pub content_type: String,
    /// Standard base64 of the file content.
    pub data: String,
}

/// A stored chat message. Timestamps are Unix epoch microseconds.
#[derive(Debug, Clone, SurrealValue)]
pub struct MessageRecord {
    pub message_id: String,
    pub room_id: String,
    pub sender: String,
    pub receiver: String,
    pub message: String,
    pub timestamp: i64,
    pub is_read: bool,
    pub read_at: Option<i64>,
    pub delivered: bool,
    pub edited: bool,
    pub edited_at: Option<i64>,
    pub file: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, SurrealValue)]
pub struct UnreadCount {
    pub sender: String,
    pub unread_count: i64,
}

#[derive(Debug, SurrealValue)]
struct Total {
    total: i64,
}

/// Storage key shared by both orderings of a pair.
#[must_use]
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b { format!("{a}|{b}") } else { format!("{b}|{a}") }
}

/// Rooms and messages.
#[derive(Debug, Clone)]
pub struct ChatStore {
    db: Database,
}

impl ChatStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// # Errors
    /// Storage failures only.
    pub async fn room_between(&self, a: &str, b: &str) -> Result<Option<String>, ChatError> {
        let ids: Vec<String> = self
            .db
            .query("SELECT VALUE room_id FROM chat_room WHERE pair_key = $pair LIMIT 1;")
            .bind(("pair", pair_key(a, b)))
            .await?
            .take(0)?;
        Ok(ids.into_iter().next())
    }

    /// Returns the pair's room, creating it when missing.
    ///
    /// # Errors
    /// Storage failures only.
    #[instrument(skip(self, room_id))]
    pub async fn room_or_create(
        &self,
        a: &str,
        b: &str,
        room_id: String,
        now: i64,
    ) -> Result<String, ChatError> {
        if let Some(existing) = self.room_between(a, b).await? {
            return Ok(existing);
        }

        let room = RoomRecord {
            room_id: room_id.clone(),
            participants: vec![a.to_owned(), b.to_owned()],
            pair_key: pair_key(a, b),
            created_at: now,
            last_message_at: now,
        };
        let result = self
            .db
            .query("CREATE chat_room CONTENT $room RETURN NONE;")
            .bind(("room", room))
            .await?
            .check()
            .map_err(surrealdb::Error::from);

        match result {
            Ok(_) => {
                tracing::debug!(room_id = %room_id, "Chat room created");
                Ok(room_id)
            },
            // Lost a race with the peer creating the same room.
            Err(err) if is_unique_violation(&err) => self
                .room_between(a, b)
                .await?
                .ok_or_else(|| ChatError::from("Chat room vanished after a conflicting insert")),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    /// Storage failures only.
    pub async fn rooms_of(&self, email: &str) -> Result<Vec<RoomRecord>, ChatError> {
        let query = format!("SELECT {ROOM_FIELDS} FROM chat_room WHERE participants CONTAINS $email;");
        Ok(self.db.query(query).bind(("email", email.to_owned())).await?.take(0)?)
    }

    /// # Errors
    /// Storage failures only.
    pub async fn touch_room(&self, room_id: &str, now: i64) -> Result<(), ChatError> {
        self.db
            .query("UPDATE chat_room SET last_message_at = $now WHERE room_id = $room_id RETURN NONE;")
            .bind(("now", now))
            .bind(("room_id", room_id.to_owned()))
            .await?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }

    /// # Errors
    /// Storage failures only.
    #[instrument(skip_all, fields(message_id = %message.message_id))]
    pub async fn insert_message(&self, message: MessageRecord) -> Result<(), ChatError> {
        self.db
            .query("CREATE chat_message CONTENT $message RETURN NONE;")
            .bind(("message", message))
            .await?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }

    /// # Errors
    /// Storage failures only.
    pub async fn find_message(&self, message_id: &str) -> Result<Option<MessageRecord>, ChatError> {
        let query = format!("SELECT {MESSAGE_FIELDS} FROM chat_message WHERE message_id = $id LIMIT 1;");
        let rows: Vec<MessageRecord> = self.db.query(query).bind(("id", message_id.to_owned())).await?.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Undelivered messages addressed to `receiver`, oldest first.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn pending_for(&self, receiver: &str) -> Result<Vec<MessageRecord>, ChatError> {
        let query = format!(
            "SELECT {MESSAGE_FIELDS} FROM chat_message WHERE receiver = $receiver AND delivered = false \
             ORDER BY timestamp ASC;"
        );
        Ok(self.db.query(query).bind(("receiver", receiver.to_owned())).await?.take(0)?)
    }

    /// # Errors
    /// Storage failures only.
    pub async fn mark_delivered(&self, message_ids: Vec<String>) -> Result<(), ChatError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        self.db
            .query("UPDATE chat_message SET delivered = true WHERE message_id IN $ids RETURN NONE;")
            .bind(("ids", message_ids))
            .await?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }

    /// Unread counts addressed to `receiver`, grouped by sender.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn unread_counts(&self, receiver: &str) -> Result<Vec<UnreadCount>, ChatError> {
        Ok(self
            .db
            .query(
                "SELECT sender, count() AS unread_count FROM chat_message \
                 WHERE receiver = $receiver AND is_read = false GROUP BY sender ORDER BY sender;",
            )
            .bind(("receiver", receiver.to_owned()))
            .await?
            .take(0)?)
    }

    /// Marks one message read if `receiver` owns it and it was unread.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn mark_read(&self, message_id: &str, receiver: &str, now: i64) -> Result<bool, ChatError> {
        let changed: Vec<String> = self
            .db
            .query(
                "UPDATE chat_message SET is_read = true, read_at = $now \
                 WHERE message_id = $id AND receiver = $receiver AND is_read = false RETURN VALUE message_id;",
            )
            .bind(("now", now))
            .bind(("id", message_id.to_owned()))
            .bind(("receiver", receiver.to_owned()))
            .await?
            .take(0)?;
        Ok(!changed.is_empty())
    }

    /// Marks every unread message from `sender` to `receiver` read.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn mark_all_read(&self, sender: &str, receiver: &str, now: i64) -> Result<usize, ChatError> {
        let changed: Vec<String> = self
            .db
            .query(
                "UPDATE chat_message SET is_read = true, read_at = $now \
                 WHERE sender = $sender AND receiver = $receiver AND is_read = false RETURN VALUE message_id;",
            )
            .bind(("now", now))
            .bind(("sender", sender.to_owned()))
            .bind(("receiver", receiver.to_owned()))
            .await?
            .take(0)?;
        Ok(changed.len())
    }

    /// Rewrites the text of a message `sender` wrote; `None` if there is no such message.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn edit(
        &self,
        message_id: &str,
        sender: &str,
        text: String,
        now: i64,
    ) -> Result<Option<MessageRecord>, ChatError> {
        let query = format!(
            "UPDATE chat_message SET message = $text, edited = true, edited_at = $now \
             WHERE message_id = $id AND sender = $sender RETURN {MESSAGE_FIELDS};"
        );
        let rows: Vec<MessageRecord> = self
            .db
            .query(query)
            .bind(("text", text))
            .bind(("now", now))
            .bind(("id", message_id.to_owned()))
            .bind(("sender", sender.to_owned()))
            .await?
            .take(0)?;
        Ok(rows.into_iter().next())
    }

    /// # Errors
    /// Storage failures only.
    pub async fn delete_message(&self, message_id: &str) -> Result<(), ChatError> {
        self.db
            .query("DELETE chat_message WHERE message_id = $id RETURN NONE;")
            .bind(("id", message_id.to_owned()))
            .await?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }

    /// One page of a room as seen by `member`, newest first, plus the room total.
    ///
    /// # Errors
    /// Storage failures only.
    #[instrument(skip(self))]
    pub async fn room_page(
        &self,
        room_id: &str,
        member: &str,
        skip: u64,
        limit: u64,
    ) -> Result<(u64, Vec<MessageRecord>), ChatError> {
        const FILTER: &str = "room_id = $room_id AND (sender = $member OR receiver = $member)";
        let query = format!(
            "SELECT count() AS total FROM chat_message WHERE {FILTER} GROUP ALL;\
             SELECT {MESSAGE_FIELDS} FROM chat_message WHERE {FILTER} \
             ORDER BY timestamp DESC, message_id DESC LIMIT {limit} START {skip};"
        );
        let mut response = self
            .db
            .query(query)
            .bind(("room_id", room_id.to_owned()))
            .bind(("member", member.to_owned()))
            .await?;
        let totals: Vec<Total> = response.take(0)?;
        let messages: Vec<MessageRecord> = response.take(1)?;
        let total = totals.first().map_or(0, |t| u64::try_from(t.total).unwrap_or_default());
        Ok((total, messages))
    }
}

fn is_unique_violation(err: &surrealdb::Error) -> bool {
    unique_index_violation(err).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_ignores_order() {
        assert_eq!(pair_key("b@x.io", "a@x.io"), pair_key("a@x.io", "b@x.io"));
        assert_eq!(pair_key("a@x.io", "b@x.io"), "a@x.io|b@x.io");
    }

    #[test]
    fn peer_of_two_person_room() {
        let room = RoomRecord {
            room_id: "room_1".into(),
            participants: vec!["a@x.io".into(), "b@x.io".into()],
            pair_key: pair_key("a@x.io", "b@x.io"),
            created_at: 0,
            last_message_at: 0,
        };
        assert_eq!(room.peer_of("a@x.io"), Some("b@x.io"));
        assert_eq!(room.peer_of("b@x.io"), Some("a@x.io"));
        assert_eq!(room.peer_of("c@x.io"), None);
    }
}
