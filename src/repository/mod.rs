//! Repository Layer
//!
//! Remote store abstraction and the in-memory implementation.

mod memory_store;
mod traits;


pub use memory_store::{InMemoryStore, StoreOp};
pub use traits::{ChangeFeed, ChildSnapshot, FeedSender, RemoteStore, StoreSnapshot};
