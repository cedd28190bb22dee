//! Local Fallback Adapters
//!
//! Implements the `KeyValueStore` port with atomic JSON files on disk
//! and with a plain in-memory map.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryKeyValueStore;
