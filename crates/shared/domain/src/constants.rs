//! Names shared across slices: roles, tables, OpenAPI tags and bus topics.

// Roles
pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

// Tables
pub const USER: &str = "user";
pub const LINK: &str = "link";
pub const EMAIL: &str = "email";
pub const ROOM: &str = "chat_room";
pub const MESSAGE: &str = "chat_message";

// OpenAPI tags
pub const AUTH_TAG: &str = "Auth";
pub const USERS_TAG: &str = "Users";
pub const LINKS_TAG: &str = "Links";
pub const EMAILS_TAG: &str = "Emails";
pub const CHAT_TAG: &str = "Chat";
pub const ASSISTANT_TAG: &str = "Assistant";
pub const TASKS_TAG: &str = "Tasks";
pub const SYSTEM_TAG: &str = "System";

// Notification topics
pub const LINKS_TOPIC: &str = "links";
pub const PRESENCE_TOPIC: &str = "presence";

// Mail providers
pub const GMAIL: &str = "gmail";
pub const OUTLOOK: &str = "outlook";
