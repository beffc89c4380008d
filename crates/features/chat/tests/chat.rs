use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use shortly_chat::{Chat, Delivery, Inbox, Recipient, Session};
use shortly_database::Database;
use shortly_domain::config::ChatConfig;
use shortly_event_bus::{DEFAULT_CAPACITY, EventBus};
use shortly_identity::{UserRecord, Users};
use shortly_kernel::domain::config::ApiConfig;
use shortly_kernel::security::Principal;
use shortly_kernel::server::ApiState;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::time::timeout;
use tower::ServiceExt;

fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.security.jwt.secret = "test-secret".into();
    config
}

const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";
const CAROL: &str = "carol@example.com";

struct Fixture {
    chat: Chat,
    events: EventBus,
    users: Users,
    state: ApiState,
}

async fn fixture() -> Fixture {
    let database = Database::builder()
        .url("mem://")
        .session("test", "chat")
        .migrations(shortly_identity::migrations().into_iter().chain(shortly_chat::migrations()))
        .init()
        .await
        .unwrap();
    let events = EventBus::new();
    let chat = shortly_chat::init(&database, &events, &ChatConfig::default()).unwrap();
    let users = Users::new(database.clone());
    for (i, email) in [ALICE, BOB, CAROL].into_iter().enumerate() {
        create_user(&users, &format!("user_{i}"), email, true).await;
    }

    let state = ApiState::builder()
        .config(test_config())
        .db(database)
        .events(events.clone())
        .register_slice(chat.clone().into())
        .build()
        .unwrap();
    Fixture { chat, events, users, state }
}

async fn create_user(users: &Users, id: &str, email: &str, is_active: bool) {
    users
        .create(UserRecord {
            user_id: id.into(),
            email: email.into(),
            password_hash: "unused".into(),
            role: "user".into(),
            org_name: None,
            is_active,
            gmail_token: None,
            outlook_token: None,
            created_at: 0,
        })
        .await
        .unwrap();
}

fn drain(rx: &mut Receiver<Arc<Delivery>>) -> Vec<(Recipient, Value)> {
    let mut out = Vec::new();
    while let Ok(delivery) = rx.try_recv() {
        out.push((delivery.recipient.clone(), delivery.frame.clone()));
    }
    out
}

fn message_ids(frames: &[Value]) -> Vec<String> {
    frames
        .iter()
        .filter(|f| f["source"] == "message.send")
        .map(|f| f["data"]["message_id"].as_str().unwrap().to_owned())
        .collect()
}

fn error_type(frame: &Value) -> &str {
    assert_eq!(frame["source"], "error", "{frame}");
    frame["error"]["type"].as_str().unwrap()
}

async fn send(session: &Session, receiver: &str, text: &str, room_id: &str) -> Value {
    session
        .dispatch(json!({
            "source": "message.send",
            "data": { "room_id": room_id, "sender": session.email(), "receiver": receiver, "message": text },
        }))
        .await
        .unwrap()
}

#[tokio::test]
async fn open_greets_and_redelivers_until_acknowledged() {
    let f = fixture().await;
    let alice = Session::new(f.chat.clone(), ALICE);
    let first = send(&alice, BOB, "are you there?", "").await;
    assert_eq!(first["data"]["delivered"], false);
    send(&alice, BOB, "hello?", "").await;

    let bob = Session::new(f.chat.clone(), BOB);
    let frames = bob.open().await;
    assert_eq!(frames[0]["source"], "connection");
    assert_eq!(frames[0]["data"]["message"], "connected");
    assert_eq!(frames[0]["data"]["email"], BOB);

    let pending: Vec<&Value> = frames.iter().filter(|f| f["source"] == "message.send").collect();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0]["data"]["message"], "are you there?");
    assert_eq!(pending[1]["data"]["message"], "hello?");
    assert!(pending.iter().all(|f| f["data"]["delivered"] == true));

    let unread = frames.last().unwrap();
    assert_eq!(unread["source"], "message.unread");
    assert_eq!(unread["data"], json!([{ "sender": ALICE, "unread_count": 2 }]));
    bob.close();

    // Never written to a socket, so still pending.
    let bob = Session::new(f.chat.clone(), BOB);
    let again = bob.open().await;
    assert_eq!(message_ids(&again).len(), 2);
    for frame in &again {
        bob.acknowledge(frame).await.unwrap();
    }
    bob.close();

    let last = Session::new(f.chat.clone(), BOB).open().await;
    assert!(message_ids(&last).is_empty());
}

#[tokio::test]
async fn send_enforces_sender_and_required_fields() {
    let f = fixture().await;
    let alice = Session::new(f.chat.clone(), ALICE);

    let spoofed = alice
        .dispatch(json!({
            "source": "message.send",
            "data": { "room_id": "", "sender": BOB, "receiver": CAROL, "message": "hi" },
        }))
        .await
        .unwrap();
    assert_eq!(error_type(&spoofed), "permission_denied");
    assert_eq!(spoofed["error"]["message"], "Cannot send messages as another user");

    let incomplete = alice
        .dispatch(json!({ "source": "message.send", "data": { "sender": ALICE, "message": "hi" } }))
        .await
        .unwrap();
    assert_eq!(error_type(&incomplete), "validation_error");
    assert_eq!(incomplete["error"]["message"], "Missing required fields");
}

#[tokio::test]
async fn rooms_are_reused_per_pair() {
    let f = fixture().await;
    let alice = Session::new(f.chat.clone(), ALICE);
    let bob = Session::new(f.chat.clone(), BOB);

    let first = send(&alice, BOB, "one", "").await;
    let room_id = first["data"]["room_id"].as_str().unwrap().to_owned();
    assert!(room_id.starts_with("room_"));

    let reply = send(&bob, ALICE, "two", "").await;
    assert_eq!(reply["data"]["room_id"], room_id.as_str());
    let explicit = send(&alice, BOB, "three", &room_id).await;
    assert_eq!(explicit["data"]["room_id"], room_id.as_str());

    let other = send(&alice, CAROL, "hi carol", "").await;
    assert_ne!(other["data"]["room_id"], room_id.as_str());

    let hijack = send(&Session::new(f.chat.clone(), CAROL), BOB, "let me in", &room_id).await;
    assert_eq!(error_type(&hijack), "permission_denied");
}

#[tokio::test]
async fn send_fans_out_to_the_receiver() {
    let f = fixture().await;
    let mut rx = f.events.subscribe::<Delivery>().unwrap();
    let alice = Session::new(f.chat.clone(), ALICE);

    let echo = send(&alice, BOB, "ping", "").await;
    let delivered = drain(&mut rx);
    assert_eq!(delivered, vec![(Recipient::User(BOB.into()), echo.clone())]);
    assert_eq!(echo["data"]["sender"], ALICE);
    assert_eq!(echo["data"]["receiver"], BOB);
    assert!(echo["data"]["message_id"].as_str().unwrap().starts_with("msg_"));
}

#[tokio::test]
async fn acknowledged_live_messages_are_not_redelivered() {
    let f = fixture().await;
    let (mut inbox, _) = Inbox::open(Session::new(f.chat.clone(), BOB)).await.unwrap();
    let alice = Session::new(f.chat.clone(), ALICE);
    send(&alice, BOB, "written", "").await;
    send(&alice, BOB, "lost with the socket", "").await;

    let live = inbox.next().await.unwrap();
    assert_eq!(live[0]["data"]["message"], "written");
    inbox.session().acknowledge(&live[0]).await.unwrap();
    assert!(!inbox.next().await.unwrap().is_empty());
    inbox.session().close();

    let frames = Session::new(f.chat.clone(), BOB).open().await;
    let pending: Vec<&Value> = frames.iter().filter(|f| f["source"] == "message.send").collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["data"]["message"], "lost with the socket");
}

#[tokio::test]
async fn lagging_inbox_delivers_every_message_exactly_once() {
    let f = fixture().await;
    let (mut inbox, greeting) = Inbox::open(Session::new(f.chat.clone(), BOB)).await.unwrap();
    assert!(message_ids(&greeting).is_empty());

    let total = DEFAULT_CAPACITY + 44;
    let alice = Session::new(f.chat.clone(), ALICE);
    let mut sent = Vec::with_capacity(total);
    for i in 0..total {
        let echo = send(&alice, BOB, &format!("burst {i}"), "").await;
        sent.push(echo["data"]["message_id"].as_str().unwrap().to_owned());
    }

    let mut received = Vec::new();
    while received.len() < total {
        let frames = timeout(Duration::from_secs(10), inbox.next()).await.unwrap().unwrap();
        for frame in &frames {
            inbox.session().acknowledge(frame).await.unwrap();
        }
        received.extend(message_ids(&frames));
    }
    assert!(timeout(Duration::from_millis(100), inbox.next()).await.is_err(), "no duplicates left on the bus");

    let unique: HashSet<&String> = received.iter().collect();
    assert_eq!(received.len(), total);
    assert_eq!(unique, sent.iter().collect::<HashSet<_>>());

    inbox.session().close();
    let reconnect = Session::new(f.chat.clone(), BOB).open().await;
    assert!(message_ids(&reconnect).is_empty());
}

#[tokio::test]
async fn only_the_receiver_marks_read() {
    let f = fixture().await;
    let mut rx = f.events.subscribe::<Delivery>().unwrap();
    let alice = Session::new(f.chat.clone(), ALICE);
    let bob = Session::new(f.chat.clone(), BOB);
    let sent = send(&alice, BOB, "read me", "").await;
    let message_id = sent["data"]["message_id"].clone();
    drain(&mut rx);

    let read = json!({ "source": "message.read", "data": { "message_id": message_id } });
    let by_sender = alice.dispatch(read.clone()).await.unwrap();
    assert_eq!(error_type(&by_sender), "not_found");

    assert!(bob.dispatch(read.clone()).await.is_none());
    let receipts = drain(&mut rx);
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].0, Recipient::User(BOB.into()));
    assert_eq!(receipts[0].1["source"], "message.read");
    assert_eq!(receipts[0].1["data"]["status"], "read");

    let twice = bob.dispatch(read).await.unwrap();
    assert_eq!(twice["error"]["message"], "Message not found or already read");

    let missing = bob.dispatch(json!({ "source": "message.read", "data": {} })).await.unwrap();
    assert_eq!(error_type(&missing), "validation_error");
}

#[tokio::test]
async fn only_the_sender_edits_and_deletes() {
    let f = fixture().await;
    let mut rx = f.events.subscribe::<Delivery>().unwrap();
    let alice = Session::new(f.chat.clone(), ALICE);
    let bob = Session::new(f.chat.clone(), BOB);
    let sent = send(&alice, BOB, "typo", "").await;
    let message_id = sent["data"]["message_id"].clone();
    drain(&mut rx);

    let edit = json!({ "source": "message.edit", "data": { "message_id": message_id, "new_message": "fixed" } });
    let foreign = bob.dispatch(edit.clone()).await.unwrap();
    assert_eq!(error_type(&foreign), "not_found");
    assert!(alice.dispatch(edit).await.is_none());

    let edits = drain(&mut rx);
    let recipients: Vec<&Recipient> = edits.iter().map(|(r, _)| r).collect();
    assert_eq!(recipients, vec![&Recipient::User(ALICE.into()), &Recipient::User(BOB.into())]);
    assert_eq!(edits[0].1["source"], "message.edit");
    assert_eq!(edits[0].1["data"]["new_message"], "fixed");

    let delete = json!({ "source": "message.delete", "data": { "message_id": message_id } });
    let denied = bob.dispatch(delete.clone()).await.unwrap();
    assert_eq!(error_type(&denied), "permission_denied");
    assert!(alice.dispatch(delete.clone()).await.is_none());

    let deletes = drain(&mut rx);
    assert_eq!(deletes.len(), 2);
    assert_eq!(deletes[1].1["data"]["deleted_by"], ALICE);

    let gone = alice.dispatch(delete).await.unwrap();
    assert_eq!(gone["error"]["message"], "Message not found");
}

#[tokio::test]
async fn typing_and_status_frames() {
    let f = fixture().await;
    let mut rx = f.events.subscribe::<Delivery>().unwrap();
    let alice = Session::new(f.chat.clone(), ALICE);

    let typing = json!({ "source": "message.type", "data": { "room_id": "room_x", "receiver": BOB } });
    assert!(alice.dispatch(typing).await.is_none());
    let frames = drain(&mut rx);
    assert_eq!(frames[0].0, Recipient::User(BOB.into()));
    assert_eq!(frames[0].1["data"], json!({ "room_id": "room_x", "sender": ALICE, "is_typing": true }));

    let bob = Session::new(f.chat.clone(), BOB);
    bob.open().await;
    let status = alice.dispatch(json!({ "source": "user.status", "data": { "email": BOB } })).await.unwrap();
    assert_eq!(status["data"]["status"], "online");
    assert!(status["data"]["last_seen"].is_string());

    drain(&mut rx);
    bob.close();
    let offline = drain(&mut rx);
    assert_eq!(offline[0].0, Recipient::Everyone);
    assert_eq!(offline[0].1["source"], "user.status");
    assert_eq!(offline[0].1["data"]["status"], "offline");

    let unknown = alice.dispatch(json!({ "source": "user.status", "data": { "email": "nobody@x.io" } })).await.unwrap();
    assert_eq!(unknown["data"]["status"], "offline");
    assert_eq!(unknown["data"]["last_seen"], Value::Null);
}

#[tokio::test]
async fn message_list_pages_newest_first() {
    let f = fixture().await;
    let alice = Session::new(f.chat.clone(), ALICE);
    let first = send(&alice, BOB, "m0", "").await;
    let room_id = first["data"]["room_id"].as_str().unwrap().to_owned();
    for i in 1..25 {
        send(&alice, BOB, &format!("m{i}"), &room_id).await;
    }

    let list = |page: i64, size: i64| json!({ "source": "message.list", "data": { "room_id": room_id, "page": page, "page_size": size } });

    let newest = alice.dispatch(list(0, 10)).await.unwrap();
    assert_eq!(newest["source"], "message.list");
    let data = &newest["data"];
    assert_eq!(data["total"], 25);
    assert_eq!(data["has_more"], true);
    let texts: Vec<&str> = data["messages"].as_array().unwrap().iter().map(|m| m["message"].as_str().unwrap()).collect();
    assert_eq!(texts, (15..25).map(|i| format!("m{i}")).collect::<Vec<_>>());

    let oldest = Session::new(f.chat.clone(), BOB).dispatch(list(2, 10)).await.unwrap();
    assert_eq!(oldest["data"]["messages"].as_array().unwrap().len(), 5);
    assert_eq!(oldest["data"]["messages"][0]["message"], "m0");
    assert_eq!(oldest["data"]["has_more"], false);

    let clamped = alice.dispatch(list(0, 500)).await.unwrap();
    assert_eq!(clamped["data"]["page_size"], 100);

    let outsider = Session::new(f.chat.clone(), CAROL).dispatch(list(0, 10)).await.unwrap();
    assert_eq!(outsider["data"]["total"], 0);

    let negative = alice.dispatch(list(-1, 10)).await.unwrap();
    assert_eq!(error_type(&negative), "validation_error");
}

#[tokio::test]
async fn message_list_sees_new_messages_despite_cache() {
    let f = fixture().await;
    let alice = Session::new(f.chat.clone(), ALICE);
    let first = send(&alice, BOB, "one", "").await;
    let room_id = first["data"]["room_id"].clone();
    let list = json!({ "source": "message.list", "data": { "room_id": room_id } });

    assert_eq!(alice.dispatch(list.clone()).await.unwrap()["data"]["total"], 1);
    send(&alice, BOB, "two", room_id.as_str().unwrap()).await;
    assert_eq!(alice.dispatch(list).await.unwrap()["data"]["total"], 2);
}

#[tokio::test]
async fn user_list_pages_and_annotates() {
    let f = fixture().await;
    for i in 0..12 {
        create_user(&f.users, &format!("extra_{i}"), &format!("zz{i:02}@example.com"), true).await;
    }
    let bob = Session::new(f.chat.clone(), BOB);
    let sent = send(&bob, ALICE, "hi", "").await;
    let room_id = sent["data"]["room_id"].clone();

    let alice = Session::new(f.chat.clone(), ALICE);
    let page = alice.dispatch(json!({ "source": "user.list", "page": 1, "per_page": 5 })).await.unwrap();
    assert_eq!(page["pagination"], json!({ "page": 1, "per_page": 5, "total": 14, "total_pages": 3 }));
    let entries = page["data"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|u| u["email"] != ALICE));

    let bob_entry = entries.iter().find(|u| u["email"] == BOB).unwrap();
    assert_eq!(bob_entry["unread_count"], 1);
    assert_eq!(bob_entry["room_id"], room_id);
    assert_eq!(bob_entry["is_status"], "offline");

    let last = alice.dispatch(json!({ "source": "user.list", "page": "3", "per_page": "5" })).await.unwrap();
    assert_eq!(last["data"].as_array().unwrap().len(), 4);

    let search = alice
        .dispatch(json!({ "source": "user.list", "search": "CAROL", "is_pagination": false }))
        .await
        .unwrap();
    assert!(search.get("pagination").is_none());
    assert_eq!(search["data"].as_array().unwrap().len(), 1);
    assert_eq!(search["data"][0]["email"], CAROL);

    let via_message_list = alice.dispatch(json!({ "source": "message.list", "data": {} })).await.unwrap();
    assert_eq!(via_message_list["source"], "user.list");

    let bad = alice.dispatch(json!({ "source": "user.list", "page": 0 })).await.unwrap();
    assert_eq!(error_type(&bad), "validation_error");
}

#[tokio::test]
async fn read_list_marks_everything_from_a_sender() {
    let f = fixture().await;
    let mut rx = f.events.subscribe::<Delivery>().unwrap();
    let alice = Session::new(f.chat.clone(), ALICE);
    let bob = Session::new(f.chat.clone(), BOB);
    for text in ["a", "b", "c"] {
        send(&alice, BOB, text, "").await;
    }
    drain(&mut rx);

    let read_all = json!({ "source": "read.list", "data": { "sender": ALICE } });
    assert!(bob.dispatch(read_all.clone()).await.is_none());
    let frames = drain(&mut rx);
    assert_eq!(frames[0].1["source"], "read.list");
    assert_eq!(frames[0].1["data"]["read_count"], 3);

    let again = bob.dispatch(read_all).await.unwrap();
    assert_eq!(again["error"]["message"], "No unread messages found from this sender");

    let missing = bob.dispatch(json!({ "source": "read.list", "data": {} })).await.unwrap();
    assert_eq!(error_type(&missing), "validation_error");
}

#[tokio::test]
async fn attachments_are_validated() {
    let f = fixture().await;
    let alice = Session::new(f.chat.clone(), ALICE);
    let with_file = |file: &str| {
        json!({
            "source": "message.send",
            "data": {
                "room_id": "", "sender": ALICE, "receiver": BOB, "message": "see attached",
                "file": file, "filename": "note.txt",
            },
        })
    };

    let broken = alice.dispatch(with_file("not base64!")).await.unwrap();
    assert_eq!(error_type(&broken), "file_error");
    assert_eq!(broken["error"]["message"], "Invalid file data");

    let ok = alice.dispatch(with_file("aGVsbG8=")).await.unwrap();
    assert_eq!(
        ok["data"]["file"],
        json!({ "filename": "note.txt", "size": 5, "content_type": "application/octet-stream" })
    );
}

#[tokio::test]
async fn malformed_frames_are_invalid_requests() {
    let f = fixture().await;
    let alice = Session::new(f.chat.clone(), ALICE);

    let unknown = alice.dispatch(json!({ "source": "message.teleport" })).await.unwrap();
    assert_eq!(error_type(&unknown), "invalid_request");
    assert_eq!(unknown["error"]["message"], "Unknown message source: message.teleport");

    let missing = alice.dispatch(json!({ "data": {} })).await.unwrap();
    assert_eq!(missing["error"]["message"], "Missing message source");

    let garbage = alice.handle_text("{not json").await.unwrap();
    assert_eq!(error_type(&garbage), "invalid_request");

    let pong = alice.handle_text(r#"{"source":"ping"}"#).await.unwrap();
    assert_eq!(pong, json!({ "source": "pong" }));
}

async fn status_of(router: &Router, uri: &str) -> StatusCode {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn socket_requires_an_active_token() {
    let f = fixture().await;
    let (router, _) = shortly_chat::router().split_for_parts();
    let router = router.with_state(f.state.clone());

    assert_eq!(status_of(&router, "/api/chat/").await, StatusCode::FORBIDDEN);
    assert_eq!(status_of(&router, "/api/chat/?token=garbage").await, StatusCode::FORBIDDEN);

    let inactive = Principal { email: "gone@example.com".into(), role: "user".into(), is_active: false };
    let token = f.state.tokens.issue(inactive).unwrap();
    assert_eq!(status_of(&router, &format!("/api/chat/?token={token}")).await, StatusCode::FORBIDDEN);

    let active = Principal { email: ALICE.into(), role: "user".into(), is_active: true };
    let token = f.state.tokens.issue(active).unwrap();
    let quoted = status_of(&router, &format!("/api/chat/?token=%22{token}%22")).await;
    assert_ne!(quoted, StatusCode::FORBIDDEN);
    assert!(quoted.is_client_error(), "plain GET cannot upgrade: {quoted}");
}
