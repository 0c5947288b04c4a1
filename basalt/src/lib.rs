#![deny(rust_2018_idioms)]

//! Builds, caches and invalidates the compressed chunk packets sent to clients, and decodes chunks
//! saved in legacy formats.

pub use basalt_net as net;
pub use basalt_util as util;
pub use quartz_nbt as nbt;

/// Contains the pipeline configuration and its loader.
pub mod config;
/// Contains the chunk codec, packet cache and its worker pool.
pub mod network;
/// Contains chunks, chunk listeners and legacy chunk decoding.
pub mod world;
