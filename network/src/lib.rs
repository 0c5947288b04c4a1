//! Wire level primitives shared by the chunk serializer and the packet cache: the packet buffer,
//! protocol numbers and variants, and packet framing.

mod buffer;
pub mod packet;
pub mod protocol;

pub use buffer::PacketBuffer;
pub use packet::{write_batch, LevelChunkPacket};
pub use protocol::{EncodingParams, ProtocolVariant, CURRENT_PROTOCOL};
