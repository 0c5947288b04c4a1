use basalt::{
    config::load_config,
    network::{
        cache::CacheRegistry,
        compression::{Compressor, CompressorId, ZlibCompressor},
        mapping::{legacy_mapping, BlockMappingTable, RuntimeBlockMapping},
        pool::ChunkWorkerPool,
    },
    util::logging,
    world::{
        chunk::legacy::{LegacyAnvilDecoder, PmAnvilSectionReader},
        location::ChunkCoords,
        MemoryWorld,
        World,
        WorldId,
    },
};
use log::{error, info};
use std::{
    env,
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    time::{Duration, Instant},
};

const LOG_DIRECTORY: &str = "./logs";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> Result<(), Box<dyn Error>> {
    logging::init_logger("basalt", LOG_DIRECTORY)?;

    let result = inspect();
    if let Err(e) = &result {
        error!("{}", e);
    }

    logging::cleanup(LOG_DIRECTORY);
    result
}

fn inspect() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            error!("Usage: basalt_inspect <chunk-file> [protocol]");
            return Ok(());
        }
    };

    let config = load_config(Path::new("./config.json"))?;
    let protocol = match args.next() {
        Some(protocol) => protocol.parse::<u32>()?,
        None => config.protocol,
    };

    let mapping: Arc<dyn RuntimeBlockMapping> = match &config.block_mapping {
        Some(mapping_path) => Arc::new(BlockMappingTable::load(mapping_path)?),
        None => legacy_mapping(),
    };

    let coords = ChunkCoords::new(0, 0);
    let data = LegacyAnvilDecoder::new(PmAnvilSectionReader).decode(coords, &fs::read(&path)?)?;
    info!(
        "Decoded {} with {} entities and {} block entities",
        path.display(),
        data.entities.len(),
        data.tiles.len()
    );

    let world = Arc::new(MemoryWorld::new(WorldId(0)));
    world.set_chunk(data.into_chunk());
    let world: Arc<dyn World> = world;

    let pool = Arc::new(ChunkWorkerPool::open(&config)?);
    info!("Opened {} chunk workers", pool.size());

    let compressor: Arc<dyn Compressor> = Arc::new(ZlibCompressor::new(
        CompressorId(0),
        config.compression_level,
    ));
    let mut registry = CacheRegistry::new(mapping, pool.clone());

    let (sender, receiver) = mpsc::channel();
    let started = Instant::now();
    registry
        .cache_for(&world, &compressor)
        .request_protocol(coords, protocol)?
        .on_resolve(move |packet| {
            drop(sender.send(packet.len()));
        });

    // Failed requests are only retried once their failures are flushed
    let size = loop {
        match receiver.recv_timeout(Duration::from_millis(50)) {
            Ok(size) => break size,
            Err(RecvTimeoutError::Timeout) if started.elapsed() < REQUEST_TIMEOUT => {
                registry.flush_failures();
            }
            Err(_) => return Err("Timed out waiting for the chunk packet".into()),
        }
    };

    info!(
        "Encoded chunk for protocol {} into {} bytes in {:?}",
        protocol,
        size,
        started.elapsed()
    );

    // The second request is served from the cache
    registry
        .cache_for(&world, &compressor)
        .request_protocol(coords, protocol)?;

    for (world_id, compressor_id, stats) in registry.stats() {
        info!(
            "Cache ({}, {}): {} resolved, {} pending, {} bytes, {:.0}% hits",
            world_id,
            compressor_id,
            stats.resolved,
            stats.pending,
            stats.size_bytes,
            stats.hit_percentage() * 100.0
        );
    }

    registry.unload_world(world.id());
    pool.close();

    Ok(())
}
