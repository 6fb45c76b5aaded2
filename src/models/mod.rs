//! Data models: session identity, positions, roster, chat, emergencies, and
//! wire events.

pub mod chat;
pub mod emergency;
pub mod event;
pub mod roster;
pub mod session;

pub use chat::*;
pub use emergency::*;
pub use event::*;
pub use roster::*;
pub use session::*;
