use shortly_domain::constants::{LINK, MESSAGE, ROLE_ADMIN, ROLE_USER, ROOM, USER};
use shortly_domain::events::Notification;

#[test]
fn constants_match_entity_strings() {
    assert_eq!(USER, "user");
    assert_eq!(LINK, "link");
    assert_eq!(ROOM, "chat_room");
    assert_eq!(MESSAGE, "chat_message");
    assert_eq!(ROLE_USER, "user");
    assert_eq!(ROLE_ADMIN, "admin");
}

#[test]
fn notification_serializes_flat() {
    let value = serde_json::to_value(Notification::new("links", "created")).unwrap();
    assert_eq!(value, serde_json::json!({ "topic": "links", "message": "created" }));
}
