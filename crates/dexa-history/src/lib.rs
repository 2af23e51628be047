pub mod error;
pub mod locks;
pub mod sqlite;
pub mod store;

pub use error::HistoryError;
pub use locks::SessionLocks;
pub use sqlite::SqliteHistory;
pub use store::{HistoryStore, SessionHandle};
