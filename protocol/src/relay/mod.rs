//! # Relay Pub/Sub
//!
//! Relays are dumb, independent, replaceable servers that store and
//! forward signed events. None of them is trusted: a relay may be down,
//! slow, lying, or dropping frames, and the design treats all of that as
//! normal.
//!
//! ## Architecture
//!
//! ```text
//! message.rs      ClientMessage / RelayMessage wire frames
//! filter.rs       Filter and matching
//! connection.rs   RelayConnector / RelayConnection seam, RelayError
//! websocket.rs    WebSocketConnector (tokio-tungstenite)
//! memory.rs       MemoryRelay / MemoryConnector (in-process)
//! gateway.rs      RelayGateway: fan-out publish, multi-relay subscribe
//! subscription.rs Subscription channel, handle, RelayDelivery
//! ```
//!
//! ## Guarantees
//!
//! - Publishing never fails as a whole. Each relay gets its own
//!   `Result` in the [`PublishReport`].
//! - Subscription delivery is at-least-once and unordered across relays.
//!   The same event typically shows up once per relay; consumers dedup by
//!   event id.
//! - The gateway moves bytes. It does not verify signatures or decrypt.

pub mod connection;
pub mod filter;
pub mod gateway;
pub mod memory;
pub mod message;
pub mod subscription;
pub mod websocket;

pub use connection::{RelayConnection, RelayConnector, RelayError};
pub use filter::Filter;
pub use gateway::{PublishReport, RelayGateway, RelayOutcome};
pub use memory::{Admission, MemoryConnector, MemoryRelay};
pub use message::{ClientMessage, RelayMessage};
pub use subscription::{RelayDelivery, Subscription, SubscriptionHandle};
pub use websocket::WebSocketConnector;
