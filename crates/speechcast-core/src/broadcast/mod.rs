//! Fan-out of server messages to connected streaming clients

mod clock;
mod hub;
mod session;

pub use clock::{clock_message, spawn_clock};
pub use hub::{ClientChannel, ClientId, Hub, HubHandle};
pub use session::{SessionEvent, StreamSession, END_OF_STREAM_MARKER};
