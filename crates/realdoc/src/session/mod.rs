pub mod broadcast;
pub mod connection;
pub mod registry;

pub use broadcast::Broadcaster;
pub use connection::{ConnectionLifecycle, ConnectionState};
pub use registry::{ConnectionId, PeerSender, SubscriberRegistry};
