pub mod filestore;
pub mod memory;
pub mod traits;

pub use filestore::FileStore;
pub use memory::MemoryStore;
pub use traits::ClientStateStore;

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}
