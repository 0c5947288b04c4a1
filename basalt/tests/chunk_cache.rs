use basalt::{
    config::{Config, WorkerDistribution},
    nbt::{io::Flavor, NbtCompound, NbtList, NbtTag},
    net::{protocol::PROTOCOL_1_16_100, PacketBuffer, CURRENT_PROTOCOL},
    network::{
        cache::CacheRegistry,
        compression::{Compressor, CompressorId, ZlibCompressor},
        mapping::legacy_mapping,
        pool::ChunkWorkerPool,
    },
    world::{
        chunk::legacy::{LegacyAnvilDecoder, PmAnvilSectionReader},
        location::{BlockPosition, ChunkCoords},
        ChunkEvent,
        MemoryWorld,
        World,
        WorldId,
    },
};
use flate2::read::DeflateDecoder;
use std::{
    io::Read,
    sync::{mpsc, Arc},
    time::Duration,
};

const COORDS: ChunkCoords = ChunkCoords::new(5, -3);
const TIMEOUT: Duration = Duration::from_secs(10);

fn saved_chunk() -> Vec<u8> {
    let mut section = NbtCompound::new();
    section.insert("Y", NbtTag::Byte(2));
    section.insert("Blocks", NbtTag::ByteArray(vec![1; 4096]));
    section.insert("Data", NbtTag::ByteArray(vec![0; 2048]));

    let mut level = NbtCompound::new();
    level.insert("Sections", NbtTag::List(NbtList::from(vec![NbtTag::Compound(section)])));
    level.insert("BiomeColors", NbtTag::IntArray(vec![0x0100_0000; 256]));

    let mut root = NbtCompound::new();
    root.insert("Level", NbtTag::Compound(level));

    let mut data = Vec::new();
    basalt::nbt::io::write_nbt(&mut data, None, &root, Flavor::ZlibCompressed)
        .expect("Failed to write chunk");
    data
}

fn setup() -> (Arc<MemoryWorld>, Arc<ChunkWorkerPool>, CacheRegistry) {
    let data = LegacyAnvilDecoder::new(PmAnvilSectionReader)
        .decode(COORDS, &saved_chunk())
        .expect("Failed to decode chunk");
    assert_eq!(data.chunk.biome_id(0, 0), 1);

    let world = Arc::new(MemoryWorld::new(WorldId(3)));
    world.set_chunk(data.into_chunk());

    let config = Config {
        worker_threads: 2,
        distribution_strategy: WorkerDistribution::Fast,
        ..Config::default()
    };
    let pool = Arc::new(ChunkWorkerPool::open(&config).expect("Failed to open worker pool"));
    let registry = CacheRegistry::new(legacy_mapping(), pool.clone());

    (world, pool, registry)
}

fn inflate(packet: &[u8]) -> Vec<u8> {
    let mut batch = Vec::new();
    DeflateDecoder::new(packet)
        .read_to_end(&mut batch)
        .expect("Packet is not raw deflate");
    batch
}

#[test]
fn saved_chunk_is_served_through_workers() {
    let (world, pool, mut registry) = setup();
    let world_dyn: Arc<dyn World> = world.clone();
    let compressor: Arc<dyn Compressor> = Arc::new(ZlibCompressor::new(CompressorId(0), 6));

    let (sender, receiver) = mpsc::channel();
    let cache = registry.cache_for(&world_dyn, &compressor);
    for _ in 0 .. 3 {
        let sender = sender.clone();
        cache
            .request_protocol(COORDS, CURRENT_PROTOCOL)
            .expect("Request failed")
            .on_resolve(move |packet| {
                drop(sender.send(packet.clone()));
            });
    }

    let packets = (0 .. 3)
        .map(|_| receiver.recv_timeout(TIMEOUT).expect("Packet was not produced"))
        .collect::<Vec<_>>();
    assert!(packets.iter().all(|packet| packet == &packets[0]), "Requests share one packet");
    assert!((cache.hit_percentage() - 2.0 / 3.0).abs() < 1e-9);

    let mut batch = PacketBuffer::from(inflate(&packets[0]));
    let length = batch.read_unsigned_varint().expect("Missing length") as usize;
    assert_eq!(length, batch.remaining());
    assert_eq!(batch.read().expect("Missing id"), 0x3a);
    assert_eq!(batch.read_varint().expect("Missing x"), COORDS.x);
    assert_eq!(batch.read_varint().expect("Missing z"), COORDS.z);
    assert_eq!(
        batch.read_unsigned_varint().expect("Missing count"),
        3,
        "Sections up to Y=2 are sent"
    );

    assert_eq!(registry.total_cache_size(), packets[0].len());
    assert_eq!(registry.unload_world(WorldId(3)), 1);
    assert!(world.chunk_listeners(COORDS).is_empty());
    pool.close();
}

#[test]
fn changed_chunk_is_regenerated_for_waiters() {
    let (world, pool, mut registry) = setup();
    let world_dyn: Arc<dyn World> = world.clone();
    let compressor: Arc<dyn Compressor> = Arc::new(ZlibCompressor::default());

    let cache = registry.cache_for(&world_dyn, &compressor);
    let first = cache
        .request_protocol(COORDS, PROTOCOL_1_16_100)
        .expect("Request failed");
    let (sender, receiver) = mpsc::channel();
    first.on_resolve(move |packet| {
        drop(sender.send(packet.len()));
    });
    receiver.recv_timeout(TIMEOUT).expect("Packet was not produced");

    registry.dispatch(WorldId(3), ChunkEvent::ChunkChanged(COORDS));
    let cache = registry
        .cache_mut(WorldId(3), CompressorId(0))
        .expect("Cache exists");
    assert_eq!(cache.cache_size(), 0, "Resolved packets are dropped on change");

    let second = cache
        .request_protocol(COORDS, PROTOCOL_1_16_100)
        .expect("Request failed");
    assert!(!second.ptr_eq(&first));

    let (sender, receiver) = mpsc::channel();
    second.on_resolve(move |packet| {
        drop(sender.send(packet.len()));
    });
    receiver.recv_timeout(TIMEOUT).expect("Packet was not regenerated");

    registry.dispatch(
        WorldId(3),
        ChunkEvent::BlockChanged(BlockPosition::new(COORDS.x * 16, 40, COORDS.z * 16)),
    );
    assert_eq!(registry.total_cache_size(), 0);
    assert_eq!(registry.prune(), 0);
    pool.close();
}
