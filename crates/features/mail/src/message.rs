use serde::Serialize;

/// Fields kept from a provider message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedEmail {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// One message of a fetch run; failures are reported, not stored.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Fetched {
    Parsed(ParsedEmail),
    Failed { message_id: String, error: String },
}
