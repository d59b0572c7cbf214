//! # RealDoc - collaborative document server core
//!
//! Lets multiple clients view and edit a shared text document, with
//! near-real-time updates fanned out over WebSockets.
//!
//! The core is three pieces sharing one [`SubscriberRegistry`]: the registry
//! tracks which connections are subscribed to which document, the
//! [`Broadcaster`] delivers a serialized-once message to a point-in-time
//! snapshot of a document's subscribers, and the [`DocumentService`] commits
//! content to storage before any peer is notified. Conflict resolution is
//! last-write-wins; there is no merge algorithm.

pub mod document;
pub mod error;
pub mod protocol;
pub mod session;
pub mod storage;

#[cfg(feature = "axum")]
pub mod axum;

// Re-exports for convenience
pub use document::DocumentService;
pub use error::{RealdocError, RealdocResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{
    Broadcaster, ConnectionId, ConnectionLifecycle, ConnectionState, SubscriberRegistry,
};
pub use storage::{DocumentRecord, DocumentStorage, MemoryStorage};

#[cfg(feature = "persistence")]
pub use storage::FileStorage;

#[cfg(feature = "axum")]
pub use axum::{router, AppState, WebSocketHandler};
