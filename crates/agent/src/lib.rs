pub mod runtime;
pub mod store;

pub use runtime::{AgentError, OrderAgent};
pub use store::{InMemorySessionStore, SessionStore, StoreError};
