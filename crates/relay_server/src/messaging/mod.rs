//! Client messaging: wire types and the broadcast relay.

pub mod relay;
pub mod types;

pub use relay::{ConnectionEvent, Relay, RelayStats};
pub use types::{LifecycleMessage, RelayPayload, PLAYER_ID_FIELD};
