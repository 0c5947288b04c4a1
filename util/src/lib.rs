#![warn(missing_docs)]

//! Provides generic utilities for basalt: logging setup, the worker thread pool, and fast hashing
//! for integer keys.

/// Contains a fast hasher for integer keys such as packed chunk coordinates.
pub mod hash;
/// Configures log4rs for server processes.
pub mod logging;
/// Contains a thread pool for executing jobs off of the owning thread.
pub mod threadpool;
