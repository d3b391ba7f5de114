//! Durable per-session state and transcript access.

pub mod state;
pub mod store;
pub mod transcript;

pub use state::SessionState;
pub use store::SessionStore;
