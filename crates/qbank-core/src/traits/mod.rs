//! Traits for the collaborators injected into the client.

mod exchange;
mod store;
mod transport;

pub use exchange::RefreshExchange;
pub use store::KeyValueStore;
pub use transport::Transport;
