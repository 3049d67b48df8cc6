//! Pricegate-Store: object storage for model artifacts
//!
//! This crate provides the persistence layer for versioned model artifacts and
//! the per-model "latest" pointer. Everything above it talks to the
//! [`ObjectStore`] trait; the concrete backend is chosen by the binary.
//!
//! ## Layout
//!
//! - `models/<model_name>/<version>/model.tar.gz`: immutable artifact bytes
//! - `models/<model_name>/latest/version.txt`: mutable pointer, last writer wins
//!
//! ## Key Components
//!
//! - `ObjectStore`: async put/get/exists/list over `/`-delimited keys
//! - `FsObjectStore`: filesystem backend with atomic writes
//! - `fakes`: in-memory and fault-injecting stores for tests

mod error;
pub mod fakes;
pub mod fs;
pub mod storage_traits;

pub use error::StorageError;
pub use fs::FsObjectStore;
pub use storage_traits::{layout, ObjectKey, ObjectStore, StorageResult};
