//! Crossroad Runtime - the controller's cooperating machines
//!
//! A controller runs five machines over one shared state record:
//! 1. Supervisor: allocates buffers, opens the radio, starts the others
//! 2. Phase controller: runs this node's own light cycle
//! 3. Receiver: interprets every inbound frame, detects heartbeat loss
//! 4. Sender: transmits the outbound payload periodically or on demand
//! 5. Emergency override: holds emergency mode until the beacon falls silent

pub mod config;
pub mod emergency;
pub mod lamps;
pub mod phase;
pub mod receiver;
pub mod sender;
pub mod shared;
pub mod supervisor;

pub use config::*;
pub use lamps::*;
pub use receiver::Reaction;
pub use shared::*;
pub use supervisor::*;
