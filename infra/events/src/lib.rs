//! # Event Bus
//!
//! In-process publish/subscribe keyed by the Rust type of the event.
//!
//! Each event type gets one `tokio::sync::broadcast` channel, created lazily by the
//! first subscriber or publisher. Slices share a single cloned [`EventBus`]: links
//! announce new short URLs, chat fans messages out to every open socket of a user.
//!
//! ```rust
//! use shortly_event_bus::{EventBus, EventBusError, EventReceiverExt};
//!
//! #[derive(Debug)]
//! struct LinkCreated { code: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!     let mut rx = bus.subscribe::<LinkCreated>()?;
//!     bus.publish(LinkCreated { code: "abc123".into() })?;
//!
//!     let event = rx.next_event().await.expect("bus is open");
//!     assert_eq!(event.code, "abc123");
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::{DEFAULT_CAPACITY, Event, EventBus};
pub use error::{EventBusError, EventBusErrorExt};
pub use receiver::EventReceiverExt;
