//! Storage backends for vault persistence
//!
//! This module provides two backends:
//! 1. JSON files in the user's data directory
//! 2. In-memory (tests and throwaway vaults)

mod file;
mod memory;
mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::VaultStore;
