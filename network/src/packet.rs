use crate::PacketBuffer;

/// The packet id of the level chunk packet.
pub const LEVEL_CHUNK_PACKET_ID: u32 = 0x3a;

/// A full chunk column sent to the client. The payload is the output of the chunk serializer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelChunkPacket<'a> {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub sub_chunk_count: u32,
    pub payload: &'a [u8],
}

impl<'a> LevelChunkPacket<'a> {
    /// Writes this packet, including its id, to the given buffer. Client side blob caching is
    /// never requested.
    pub fn write_to(&self, buffer: &mut PacketBuffer) {
        buffer.write_unsigned_varint(LEVEL_CHUNK_PACKET_ID);
        buffer.write_varint(self.chunk_x);
        buffer.write_varint(self.chunk_z);
        buffer.write_unsigned_varint(self.sub_chunk_count);
        buffer.write_bool(false);
        buffer.write_byte_array(self.payload);
    }
}

/// Frames encoded packets into one uncompressed batch, each packet prefixed by its length.
pub fn write_batch<'p, I>(packets: I) -> PacketBuffer
where I: IntoIterator<Item = &'p [u8]> {
    let mut batch = PacketBuffer::new(256);

    for packet in packets {
        batch.write_byte_array(packet);
    }

    batch
}
