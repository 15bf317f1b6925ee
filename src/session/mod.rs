//! Session records and their persistence.

pub mod record;
pub mod seal;
pub mod store;

pub use record::{PendingLogin, SessionRecord};
pub use seal::Sealer;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
