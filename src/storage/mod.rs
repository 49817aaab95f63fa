//! Storage backends for lumen
//!
//! Photos persist through the `PhotoStore` trait. `SqlitePhotoStore` is the
//! durable implementation; `InMemoryPhotoStore` serves tests and embedding.
//! `PhotoSession` groups changes into one atomic write.

mod memory;
mod session;
mod sqlite;
mod traits;

pub use memory::InMemoryPhotoStore;
pub use session::PhotoSession;
pub use sqlite::SqlitePhotoStore;
pub use traits::{EnricherSetting, OpenStore, PhotoStore, PhotoSummary, StorageError, StorageResult};
