pub mod app;
pub mod cli;
pub mod commands;
pub mod configuration;
pub mod context;
pub mod error;
pub mod models;
pub mod resolver;
pub mod search;
pub mod storage;
pub mod tracing;

pub use error::{StorageError, StorageResult};
