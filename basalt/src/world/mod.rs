pub mod chunk {
    mod block_array;
    #[allow(clippy::module_inception)]
    mod chunk;
    mod error;
    pub mod legacy;

    pub use block_array::*;
    pub use chunk::*;
    pub use error::*;
}
mod listener;
pub mod location;
mod memory;
#[allow(clippy::module_inception)]
mod world;

pub use listener::*;
pub use memory::{MemoryWorld, UnloadedChunk};
pub use world::*;
