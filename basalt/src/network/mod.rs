pub mod cache;
pub mod chunk_serializer;
pub mod compression;
pub mod mapping;
pub mod network_nbt;
pub mod pool;
pub mod task;
#[cfg(test)]
pub(crate) mod testing;
