use crate::Chat;
use crate::error::ChatError;
use crate::presence::Status;
use crate::protocol::{
    Delivery, Recipient, data_of, error_frame, frame, history_view, incoming_message_id, int_field, iso,
    message_view, now_micros, payload,
};
use crate::repository::{Attachment, MessageRecord};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};
use shortly_domain::constants::PRESENCE_TOPIC;
use shortly_domain::events::Notification;
use shortly_kernel::slug;
use std::collections::HashMap;
use tracing::{debug, error, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
struct SendData {
    room_id: Option<String>,
    sender: Option<String>,
    receiver: Option<String>,
    message: Option<String>,
    file: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditData {
    message_id: Option<String>,
    new_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypingData {
    room_id: Option<String>,
    receiver: Option<String>,
    is_typing: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadAllData {
    sender: Option<String>,
}

/// One authenticated chat connection.
///
/// Returned frames go to this socket only; frames for anybody else (including the
/// caller's other sockets) are published as [`Delivery`] events.
#[derive(Debug, Clone)]
pub struct Session {
    chat: Chat,
    email: String,
}

impl Session {
    pub fn new(chat: Chat, email: impl Into<String>) -> Self {
        Self { chat, email: email.into() }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub const fn chat(&self) -> &Chat {
        &self.chat
    }

    /// Marks the user online and returns the greeting frames: the connection
    /// acknowledgement, every pending message (oldest first) and the unread summary.
    pub async fn open(&self) -> Vec<Value> {
        let now = now_micros();
        self.chat.inner.presence.connected(&self.email, now);

        let mut frames = vec![frame(
            "connection",
            json!({ "message": "connected", "email": self.email, "timestamp": iso(now) }),
        )];

        match self.pending().await {
            Ok(pending) => frames.extend(pending),
            Err(e) => {
                error!(email = %self.email, error = %e, "Failed to deliver pending messages");
                frames.push(error_frame(&e));
            },
        }

        frames.push(self.unread_summary().await.unwrap_or_else(|e| {
            error!(email = %self.email, error = %e, "Unread message aggregation failed");
            error_frame(&ChatError::from("Failed to fetch unread message counts"))
        }));
        frames
    }

    /// Marks the socket closed; when it was the user's last one, tells everybody
    /// the user went offline.
    pub fn close(&self) {
        let now = now_micros();
        if !self.chat.inner.presence.disconnected(&self.email, now) {
            return;
        }

        self.deliver(
            Recipient::Everyone,
            frame(
                "user.status",
                json!({ "email": self.email, "status": Status::Offline.as_str(), "last_seen": iso(now) }),
            ),
        );
        let notice = Notification::new(PRESENCE_TOPIC, format!("{} is offline", self.email));
        if let Err(e) = self.chat.inner.events.publish(notice) {
            warn!(error = %e, "Failed to publish presence notification");
        }
        debug!(email = %self.email, "Chat user went offline");
    }

    /// Parses and dispatches one text frame.
    pub async fn handle_text(&self, text: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) if value.is_object() => self.dispatch(value).await,
            _ => Some(error_frame(&ChatError::InvalidRequest {
                message: "Frames must be JSON objects".into(),
                context: None,
            })),
        }
    }

    /// Routes a client frame by its `source` and returns the reply for this socket, if any.
    pub async fn dispatch(&self, incoming: Value) -> Option<Value> {
        let source = incoming.get("source").and_then(Value::as_str).unwrap_or_default().to_owned();
        let result = match source.as_str() {
            "message.send" => self.send(&incoming).await,
            "message.read" => self.read(&incoming).await,
            "message.edit" => self.edit(&incoming).await,
            "message.delete" => self.delete(&incoming).await,
            "message.type" => self.typing(&incoming),
            "message.list" => self.message_list(&incoming).await,
            "user.status" => self.user_status(&incoming),
            "user.list" => self.user_list(&incoming).await,
            "read.list" => self.read_all(&incoming).await,
            "ping" => Ok(Some(json!({ "source": "pong" }))),
            "" => Err(ChatError::InvalidRequest { message: "Missing message source".into(), context: None }),
            other => Err(ChatError::InvalidRequest {
                message: format!("Unknown message source: {other}").into(),
                context: None,
            }),
        };

        result.unwrap_or_else(|e| {
            match e.error_type() {
                "server_error" => error!(email = %self.email, source = %source, error = %e, "Chat frame failed"),
                _ => debug!(email = %self.email, source = %source, error = %e, "Chat frame rejected"),
            }
            Some(error_frame(&e))
        })
    }

    pub(crate) async fn pending(&self) -> Result<Vec<Value>, ChatError> {
        let pending = self.chat.inner.store.pending_for(&self.email).await?;
        Ok(pending.iter().map(|m| frame("message.send", message_view(m, true))).collect())
    }

    /// Marks the message carried by `frame` delivered once it reached this user's
    /// socket. Anything but an incoming `message.send` is ignored.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn acknowledge(&self, frame: &Value) -> Result<(), ChatError> {
        match incoming_message_id(frame, &self.email) {
            Some(id) => self.chat.inner.store.mark_delivered(vec![id.to_owned()]).await,
            None => Ok(()),
        }
    }

    async fn unread_summary(&self) -> Result<Value, ChatError> {
        let counts = self.chat.inner.store.unread_counts(&self.email).await?;
        let summary: Vec<Value> =
            counts.into_iter().map(|c| json!({ "sender": c.sender, "unread_count": c.unread_count })).collect();
        Ok(frame("message.unread", Value::Array(summary)))
    }

    async fn send(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let data: SendData = payload(incoming)?;
        let (Some(sender), Some(receiver), Some(text)) = (data.sender, data.receiver, data.message) else {
            return Err(ChatError::validation("Missing required fields"));
        };
        if sender != self.email {
            return Err(ChatError::denied("Cannot send messages as another user"));
        }
        let file = self.attachment(data.file, data.filename, data.content_type)?;

        let now = now_micros();
        let store = &self.chat.inner.store;
        let room_id = match data.room_id.filter(|id| !id.is_empty()) {
            Some(room_id) => {
                if store.room_between(&sender, &receiver).await?.as_deref() != Some(room_id.as_str()) {
                    return Err(ChatError::denied("Room does not belong to this conversation"));
                }
                room_id
            },
            None => store.room_or_create(&sender, &receiver, format!("room_{}", slug!(12)), now).await?,
        };

        let record = MessageRecord {
            message_id: format!("msg_{}", slug!(16)),
            room_id,
            sender,
            receiver,
            message: text,
            timestamp: now,
            is_read: false,
            read_at: None,
            delivered: false,
            edited: false,
            edited_at: None,
            file,
        };
        store.insert_message(record.clone()).await?;

        let reply = frame("message.send", message_view(&record, false));
        self.deliver(Recipient::User(record.receiver.clone()), reply.clone());
        store.touch_room(&record.room_id, now).await?;
        self.forget_room_pages(&record.room_id);

        Ok(Some(reply))
    }

    /// Decodes an optional base64 attachment; both `file` and `filename` must be set.
    fn attachment(
        &self,
        file: Option<String>,
        filename: Option<String>,
        content_type: Option<String>,
    ) -> Result<Option<Attachment>, ChatError> {
        let (Some(file), Some(filename)) = (file.filter(|f| !f.is_empty()), filename.filter(|f| !f.is_empty()))
        else {
            return Ok(None);
        };

        let bytes = STANDARD
            .decode(file.trim())
            .map_err(|_| ChatError::File { message: "Invalid file data".into(), context: None })?;
        if bytes.len() > self.chat.inner.config.max_file_bytes {
            return Err(ChatError::File {
                message: format!("File exceeds {} bytes", self.chat.inner.config.max_file_bytes).into(),
                context: None,
            });
        }

        Ok(Some(Attachment {
            filename,
            size: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
            content_type: content_type.filter(|c| !c.is_empty()).unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned()),
            data: STANDARD.encode(&bytes),
        }))
    }

    async fn read(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let Some(message_id) = payload::<MessageRef>(incoming)?.message_id else {
            return Err(ChatError::validation("Missing message_id"));
        };

        let now = now_micros();
        if !self.chat.inner.store.mark_read(&message_id, &self.email, now).await? {
            return Err(ChatError::not_found("Message not found or already read"));
        }

        self.deliver(
            Recipient::User(self.email.clone()),
            frame("message.read", json!({ "message_id": message_id, "status": "read", "read_at": iso(now) })),
        );
        Ok(None)
    }

    async fn edit(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let data: EditData = payload(incoming)?;
        let (Some(message_id), Some(new_message)) = (data.message_id, data.new_message) else {
            return Err(ChatError::validation("Missing required fields"));
        };

        let now = now_micros();
        let Some(updated) = self.chat.inner.store.edit(&message_id, &self.email, new_message, now).await? else {
            return Err(ChatError::not_found("Message not found or not authorized to edit"));
        };

        let notice = frame(
            "message.edit",
            json!({
                "message_id": updated.message_id,
                "room_id": updated.room_id,
                "sender": updated.sender,
                "receiver": updated.receiver,
                "new_message": updated.message,
                "edited_at": iso(updated.edited_at.unwrap_or(now)),
            }),
        );
        self.deliver_to_pair(&updated, notice);
        self.forget_room_pages(&updated.room_id);
        Ok(None)
    }

    async fn delete(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let Some(message_id) = payload::<MessageRef>(incoming)?.message_id else {
            return Err(ChatError::validation("Missing message_id"));
        };

        let store = &self.chat.inner.store;
        let Some(message) = store.find_message(&message_id).await? else {
            return Err(ChatError::not_found("Message not found"));
        };
        if message.sender != self.email {
            return Err(ChatError::denied("Not authorized to delete this message"));
        }
        store.delete_message(&message_id).await?;

        let notice = frame(
            "message.delete",
            json!({
                "message_id": message.message_id,
                "room_id": message.room_id,
                "deleted_by": self.email,
                "deleted_at": iso(now_micros()),
            }),
        );
        self.deliver_to_pair(&message, notice);
        self.forget_room_pages(&message.room_id);
        Ok(None)
    }

    fn typing(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let data: TypingData = payload(incoming)?;
        let (Some(room_id), Some(receiver)) = (data.room_id, data.receiver) else {
            return Err(ChatError::validation("Missing required fields"));
        };

        self.deliver(
            Recipient::User(receiver),
            frame(
                "message.type",
                json!({ "room_id": room_id, "sender": self.email, "is_typing": data.is_typing.unwrap_or(true) }),
            ),
        );
        Ok(None)
    }

    fn user_status(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let Some(email) = payload::<StatusQuery>(incoming)?.email.filter(|e| !e.is_empty()) else {
            return Err(ChatError::validation("Missing email"));
        };

        let presence = &self.chat.inner.presence;
        Ok(Some(frame(
            "user.status",
            json!({
                "email": email,
                "status": presence.status(&email).as_str(),
                "last_seen": presence.last_seen(&email).map(iso),
            }),
        )))
    }

    /// Other users with presence, unread counts and the shared room.
    ///
    /// Paging fields sit at the top level of the frame, not under `data`.
    async fn user_list(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let paginate = incoming.get("is_pagination").and_then(Value::as_bool).unwrap_or(true);
        let page = int_field(incoming.get("page"), "page", 1)?;
        let per_page = int_field(incoming.get("per_page"), "per_page", 10)?;
        if page < 1 || per_page < 1 {
            return Err(ChatError::validation("page and per_page must be positive"));
        }
        let search = incoming.get("search").and_then(Value::as_str).unwrap_or_default().trim().to_owned();

        let key = format!("{}:{paginate}:{page}:{per_page}:{search}", self.email);
        if let Some(cached) = self.chat.inner.user_lists.get(&key) {
            return Ok(Some(cached));
        }

        let response = self
            .build_user_list(paginate, page.unsigned_abs(), per_page.unsigned_abs(), &search)
            .await
            .map_err(|e| {
                error!(email = %self.email, error = %e, "User list failed");
                ChatError::from(format!("Failed to fetch users: {e}"))
            })?;
        self.chat.inner.user_lists.insert(key, response.clone());
        Ok(Some(response))
    }

    async fn build_user_list(
        &self,
        paginate: bool,
        page: u64,
        per_page: u64,
        search: &str,
    ) -> Result<Value, ChatError> {
        let window = paginate.then(|| ((page - 1).saturating_mul(per_page), per_page));
        let (total, users) = self.chat.inner.users.directory(&self.email, search, window).await?;

        let store = &self.chat.inner.store;
        let unread: HashMap<String, i64> =
            store.unread_counts(&self.email).await?.into_iter().map(|c| (c.sender, c.unread_count)).collect();
        let rooms: HashMap<String, String> = store
            .rooms_of(&self.email)
            .await?
            .into_iter()
            .filter_map(|room| room.peer_of(&self.email).map(|peer| (peer.to_owned(), room.room_id.clone())))
            .collect();

        let presence = &self.chat.inner.presence;
        let entries: Vec<Value> = users
            .iter()
            .map(|user| {
                json!({
                    "id": user.user_id,
                    "email": user.email,
                    "role": user.role,
                    "is_status": presence.status(&user.email).as_str(),
                    "last_seen": presence.last_seen(&user.email).map(iso),
                    "unread_count": unread.get(&user.email).copied().unwrap_or(0),
                    "room_id": rooms.get(&user.email),
                })
            })
            .collect();

        let mut response = json!({ "source": "user.list", "data": entries });
        if paginate {
            response["pagination"] = json!({
                "page": page,
                "per_page": per_page,
                "total": total,
                "total_pages": total.div_ceil(per_page),
            });
        }
        Ok(response)
    }

    /// A page of room history, newest page first, messages in chronological order.
    /// Without a `room_id` this answers with the user list instead.
    async fn message_list(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let data = data_of(incoming);
        let Some(room_id) = data.get("room_id").and_then(Value::as_str).filter(|r| !r.is_empty()) else {
            debug!(email = %self.email, "No room_id in message.list; answering with the user list");
            return self.user_list(incoming).await;
        };
        let page = int_field(data.get("page"), "page", 0)?;
        let page_size = int_field(data.get("page_size"), "page_size", 20)?.min(MAX_PAGE_SIZE);
        if page < 0 || page_size < 1 {
            return Err(ChatError::validation("page must be non-negative and page_size positive"));
        }
        let (page, page_size) = (page.unsigned_abs(), page_size.unsigned_abs());
        let skip = page.saturating_mul(page_size);

        let key = format!("{room_id}:{}:{page}:{page_size}", self.email);
        if let Some(cached) = self.chat.inner.message_lists.get(&key) {
            return Ok(Some(cached));
        }

        let (total, mut messages) =
            self.chat.inner.store.room_page(room_id, &self.email, skip, page_size).await.map_err(|e| {
                error!(email = %self.email, room_id, error = %e, "Message list failed");
                ChatError::from("Failed to fetch messages")
            })?;
        messages.reverse();

        let response = frame(
            "message.list",
            json!({
                "messages": messages.iter().map(history_view).collect::<Vec<_>>(),
                "page": page,
                "page_size": page_size,
                "total": total,
                "has_more": skip.saturating_add(page_size) < total,
            }),
        );
        self.chat.inner.message_lists.insert(key, response.clone());
        Ok(Some(response))
    }

    async fn read_all(&self, incoming: &Value) -> Result<Option<Value>, ChatError> {
        let Some(sender) = payload::<ReadAllData>(incoming)?.sender.filter(|s| !s.is_empty()) else {
            return Err(ChatError::validation("Missing sender"));
        };

        let now = now_micros();
        let read_count = self.chat.inner.store.mark_all_read(&sender, &self.email, now).await?;
        if read_count == 0 {
            return Err(ChatError::not_found("No unread messages found from this sender"));
        }

        self.deliver(
            Recipient::User(self.email.clone()),
            frame(
                "read.list",
                json!({ "sender": sender, "status": "read", "read_count": read_count, "read_at": iso(now) }),
            ),
        );
        Ok(None)
    }

    fn deliver_to_pair(&self, message: &MessageRecord, notice: Value) {
        self.deliver(Recipient::User(message.sender.clone()), notice.clone());
        if message.receiver != message.sender {
            self.deliver(Recipient::User(message.receiver.clone()), notice);
        }
    }

    fn deliver(&self, recipient: Recipient, frame: Value) {
        if let Err(e) = self.chat.inner.events.publish(Delivery { recipient, frame }) {
            warn!(error = %e, "Failed to publish chat delivery");
        }
    }

    /// Drops cached history pages of a room after it changed.
    fn forget_room_pages(&self, room_id: &str) {
        let prefix = format!("{room_id}:");
        if let Err(e) = self.chat.inner.message_lists.invalidate_entries_if(move |key, _| key.starts_with(&prefix)) {
            warn!(error = %e, "Failed to invalidate cached message pages");
        }
    }
}

