//! In-memory stores fed by REST snapshots and live push events.

pub mod chat;
pub mod roster;

pub use chat::ChatSessionStore;
pub use roster::RosterStore;
