mod chunk_cache;
mod error;
mod promise;
mod registry;

pub use chunk_cache::*;
pub use error::*;
pub use promise::*;
pub use registry::*;
