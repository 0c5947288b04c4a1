use crate::{
    network::{
        cache::PacketFuture,
        chunk_serializer::{self, ChunkSerializeError},
        compression::Compressor,
        mapping::RuntimeBlockMapping,
    },
    world::{chunk::Chunk, location::ChunkCoords},
};
use basalt_net::{write_batch, LevelChunkPacket, PacketBuffer, ProtocolVariant};
use bytes::Bytes;
use log::debug;
use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    io,
    sync::{mpsc::Sender, Arc},
};

/// Sent back to the owning cache when producing a packet failed.
#[derive(Debug)]
pub struct FailureReport {
    pub coords: ChunkCoords,
    pub variant: ProtocolVariant,
    pub future: PacketFuture,
}

/// Encodes, frames and compresses one chunk packet off of the owning thread, then resolves the
/// future waiting for it.
pub struct ChunkRequestTask {
    coords: ChunkCoords,
    chunk: Arc<Chunk>,
    variant: ProtocolVariant,
    future: PacketFuture,
    compressor: Arc<dyn Compressor>,
    mapping: Arc<dyn RuntimeBlockMapping>,
    failures: Sender<FailureReport>,
}

impl ChunkRequestTask {
    pub fn new(
        coords: ChunkCoords,
        chunk: Arc<Chunk>,
        variant: ProtocolVariant,
        future: PacketFuture,
        compressor: Arc<dyn Compressor>,
        mapping: Arc<dyn RuntimeBlockMapping>,
        failures: Sender<FailureReport>,
    ) -> Self {
        ChunkRequestTask {
            coords,
            chunk,
            variant,
            future,
            compressor,
            mapping,
            failures,
        }
    }

    #[inline]
    pub fn coords(&self) -> ChunkCoords {
        self.coords
    }

    #[inline]
    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    #[inline]
    pub fn future(&self) -> &PacketFuture {
        &self.future
    }

    /// Runs this task. On failure the owning cache is notified before the error is returned.
    pub fn run(self) -> Result<(), ChunkTaskError> {
        if self.future.is_cancelled() {
            debug!(
                "Skipping cancelled request for chunk {} {}",
                self.coords.x, self.coords.z
            );
            return Ok(());
        }

        match self.encode() {
            Ok(packet) => {
                if !self.future.resolve(packet) {
                    debug!(
                        "Discarding packet for chunk {} {}, request was cancelled",
                        self.coords.x, self.coords.z
                    );
                }
                Ok(())
            }
            Err(error) => {
                // The cache may already be gone, in which case there is no one left to retry
                drop(self.failures.send(FailureReport {
                    coords: self.coords,
                    variant: self.variant,
                    future: self.future,
                }));
                Err(error)
            }
        }
    }

    fn encode(&self) -> Result<Bytes, ChunkTaskError> {
        let payload =
            chunk_serializer::serialize_full_chunk(&self.chunk, &*self.mapping, self.variant, None)?;
        let packet = LevelChunkPacket {
            chunk_x: self.coords.x,
            chunk_z: self.coords.z,
            sub_chunk_count: chunk_serializer::sub_chunk_count(&self.chunk),
            payload: &payload,
        };

        let mut encoded = PacketBuffer::new(payload.len() + 16);
        packet.write_to(&mut encoded);
        let batch = write_batch([encoded.as_slice()]);

        Ok(Bytes::from(self.compressor.compress(batch.as_slice())?))
    }
}

impl Debug for ChunkRequestTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkRequestTask")
            .field("coords", &self.coords)
            .field("variant", &self.variant)
            .field("future", &self.future)
            .finish()
    }
}

#[derive(Debug)]
pub enum ChunkTaskError {
    Serialize(ChunkSerializeError),
    Compression(io::Error),
}

impl Display for ChunkTaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChunkTaskError::Serialize(error) => write!(f, "Failed to encode chunk: {}", error),
            ChunkTaskError::Compression(error) => write!(f, "Failed to compress chunk: {}", error),
        }
    }
}

impl Error for ChunkTaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChunkTaskError::Serialize(error) => Some(error),
            ChunkTaskError::Compression(error) => Some(error),
        }
    }
}

impl From<ChunkSerializeError> for ChunkTaskError {
    fn from(x: ChunkSerializeError) -> Self {
        ChunkTaskError::Serialize(x)
    }
}

impl From<io::Error> for ChunkTaskError {
    fn from(x: io::Error) -> Self {
        ChunkTaskError::Compression(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        compression::{CompressorId, ZlibCompressor},
        mapping::legacy_mapping,
    };
    use basalt_net::CURRENT_PROTOCOL;
    use flate2::read::DeflateDecoder;
    use std::{io::Read, sync::mpsc::channel};

    struct BrokenCompressor;

    impl Compressor for BrokenCompressor {
        fn id(&self) -> CompressorId {
            CompressorId(99)
        }

        fn compress(&self, _payload: &[u8]) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::Other, "broken"))
        }
    }

    fn task(
        compressor: Arc<dyn Compressor>,
        future: PacketFuture,
        failures: Sender<FailureReport>,
    ) -> ChunkRequestTask {
        let coords = ChunkCoords::new(2, -7);
        ChunkRequestTask::new(
            coords,
            Arc::new(Chunk::new(coords)),
            ProtocolVariant::new(CURRENT_PROTOCOL),
            future,
            compressor,
            legacy_mapping(),
            failures,
        )
    }

    #[test]
    fn resolves_with_compressed_batch() {
        let (sender, receiver) = channel();
        let future = PacketFuture::new();
        task(Arc::new(ZlibCompressor::default()), future.clone(), sender)
            .run()
            .expect("Task failed");

        let packet = future.result().expect("Future was not resolved");
        let mut batch = Vec::new();
        DeflateDecoder::new(&packet[..])
            .read_to_end(&mut batch)
            .expect("Packet is not raw deflate");

        let mut reader = PacketBuffer::from(batch);
        let length = reader.read_unsigned_varint().expect("Missing packet length") as usize;
        assert_eq!(length, reader.remaining());
        assert_eq!(reader.read().expect("Missing packet id"), 0x3a);
        assert!(receiver.try_recv().is_err(), "No failure reported");
    }

    #[test]
    fn failures_are_reported() {
        let (sender, receiver) = channel();
        let future = PacketFuture::new();
        let result = task(Arc::new(BrokenCompressor), future.clone(), sender).run();

        assert!(matches!(result, Err(ChunkTaskError::Compression(_))));
        assert!(!future.has_result());

        let report = receiver.try_recv().expect("Failure was not reported");
        assert_eq!(report.coords, ChunkCoords::new(2, -7));
        assert!(report.future.ptr_eq(&future));
    }

    #[test]
    fn cancelled_requests_are_skipped() {
        let (sender, receiver) = channel();
        let future = PacketFuture::new();
        future.cancel();

        task(Arc::new(BrokenCompressor), future, sender)
            .run()
            .expect("Cancelled tasks succeed trivially");
        assert!(receiver.try_recv().is_err());
    }
}
