use crate::{
    network::{
        cache::{CacheError, PacketFuture},
        compression::Compressor,
        mapping::RuntimeBlockMapping,
        pool::WorkerPool,
        task::{ChunkRequestTask, FailureReport},
    },
    world::{
        chunk::Chunk,
        location::{BlockPosition, ChunkCoords},
        ChunkListener,
        ListenerId,
        World,
    },
};
use basalt_net::ProtocolVariant;
use basalt_util::hash::NumHasher;
use log::{debug, error, warn};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc,
    },
};

type VariantMap = HashMap<ProtocolVariant, PacketFuture, NumHasher>;

/// A snapshot of a cache's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub resolved: usize,
    pub pending: usize,
    pub size_bytes: usize,
}

impl CacheStats {
    pub fn hit_percentage(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Caches compressed chunk packets of one world produced with one compressor.
///
/// At most one future exists per chunk and protocol variant. The cache listens for changes to every
/// chunk it has served, and discards or regenerates the affected packets as the chunk changes.
pub struct ChunkCache {
    listener_id: ListenerId,
    world: Arc<dyn World>,
    compressor: Arc<dyn Compressor>,
    mapping: Arc<dyn RuntimeBlockMapping>,
    pool: Arc<dyn WorkerPool>,
    caches: HashMap<i64, VariantMap, NumHasher>,
    listening: HashSet<ChunkCoords, NumHasher>,
    failure_sender: Sender<FailureReport>,
    failure_receiver: Receiver<FailureReport>,
    hits: u64,
    misses: u64,
}

impl ChunkCache {
    pub fn new(
        listener_id: ListenerId,
        world: Arc<dyn World>,
        compressor: Arc<dyn Compressor>,
        mapping: Arc<dyn RuntimeBlockMapping>,
        pool: Arc<dyn WorkerPool>,
    ) -> Self {
        let (failure_sender, failure_receiver) = mpsc::channel();

        ChunkCache {
            listener_id,
            world,
            compressor,
            mapping,
            pool,
            caches: HashMap::with_hasher(NumHasher),
            listening: HashSet::with_hasher(NumHasher),
            failure_sender,
            failure_receiver,
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    #[inline]
    pub fn world(&self) -> &Arc<dyn World> {
        &self.world
    }

    #[inline]
    pub fn compressor(&self) -> &Arc<dyn Compressor> {
        &self.compressor
    }

    /// Requests the packet of a chunk for clients using the given protocol number.
    pub fn request_protocol(
        &mut self,
        coords: ChunkCoords,
        protocol: u32,
    ) -> Result<PacketFuture, CacheError> {
        let variant = self.mapping.mapping_protocol(protocol);
        self.request(coords, variant)
    }

    /// Requests the packet of a chunk for the given variant. A pending or resolved future for the
    /// same key is shared, otherwise a new packet is scheduled on the worker pool.
    pub fn request(
        &mut self,
        coords: ChunkCoords,
        variant: ProtocolVariant,
    ) -> Result<PacketFuture, CacheError> {
        self.listen(coords);

        let chunk = self
            .world
            .chunk(coords)
            .ok_or(CacheError::ChunkNotLoaded(coords))?;

        if let Some(future) = self.get(coords, variant) {
            let future = future.clone();
            self.hits += 1;
            return Ok(future);
        }

        Ok(self.schedule(coords, variant, chunk))
    }

    // Registers this cache at the chunk unless the world still holds the registration. A
    // registration the world dropped without an unload event means the cached packets may
    // describe a chunk that has since been replaced.
    fn listen(&mut self, coords: ChunkCoords) {
        if self.world.is_chunk_listener(self.listener_id, coords) {
            return;
        }

        if !self.listening.insert(coords) {
            debug!(
                "Listener at chunk {} {} was dropped by {}, discarding its packets",
                coords.x,
                coords.z,
                self.world.id()
            );
            self.destroy_all(coords);
        }

        self.world.register_chunk_listener(self.listener_id, coords);
    }

    fn schedule(
        &mut self,
        coords: ChunkCoords,
        variant: ProtocolVariant,
        chunk: Arc<Chunk>,
    ) -> PacketFuture {
        self.misses += 1;
        let future = PacketFuture::new();
        self.caches
            .entry(coords.chunk_hash())
            .or_default()
            .insert(variant, future.clone());

        self.pool.submit(ChunkRequestTask::new(
            coords,
            chunk,
            variant,
            future.clone(),
            Arc::clone(&self.compressor),
            Arc::clone(&self.mapping),
            self.failure_sender.clone(),
        ));

        future
    }

    /// Returns the future cached at the given key without counting a request.
    pub fn get(&self, coords: ChunkCoords, variant: ProtocolVariant) -> Option<&PacketFuture> {
        self.caches.get(&coords.chunk_hash())?.get(&variant)
    }

    /// Cancels the pending request at the given key and schedules a new one, moving every waiting
    /// callback to the new future.
    ///
    /// If the chunk is no longer loaded the pending request is left untouched and
    /// [`CacheError::ChunkNotLoaded`] is returned.
    pub fn restart(
        &mut self,
        coords: ChunkCoords,
        variant: ProtocolVariant,
    ) -> Result<PacketFuture, CacheError> {
        let not_pending = CacheError::RestartResolved { coords, variant };

        let existing = self.get(coords, variant).cloned().ok_or(not_pending)?;
        if existing.has_result() {
            return Err(not_pending);
        }

        // Looked up before cancelling, so the waiters stay with the old request on failure
        let chunk = self
            .world
            .chunk(coords)
            .ok_or(CacheError::ChunkNotLoaded(coords))?;
        let callbacks = existing.cancel().ok_or(not_pending)?;
        self.remove(coords, variant);

        let future = self.schedule(coords, variant, chunk);
        future.attach(callbacks);
        Ok(future)
    }

    /// Drops the cached future at the given key. Returns whether there was one.
    ///
    /// A pending future is detached rather than cancelled, so its waiters are still served once the
    /// worker finishes.
    pub fn destroy(&mut self, coords: ChunkCoords, variant: ProtocolVariant) -> bool {
        self.remove(coords, variant).is_some()
    }

    fn remove(&mut self, coords: ChunkCoords, variant: ProtocolVariant) -> Option<PacketFuture> {
        let hash = coords.chunk_hash();
        let variants = self.caches.get_mut(&hash)?;
        let removed = variants.remove(&variant);

        if variants.is_empty() {
            self.caches.remove(&hash);
        }

        removed
    }

    /// Drops every cached variant of a chunk. Returns the number dropped.
    pub fn destroy_all(&mut self, coords: ChunkCoords) -> usize {
        self.caches
            .remove(&coords.chunk_hash())
            .map(|variants| variants.len())
            .unwrap_or(0)
    }

    /// Restarts every unresolved variant of a chunk, and drops every resolved one.
    pub fn destroy_or_restart(&mut self, coords: ChunkCoords) {
        let variants = match self.caches.get(&coords.chunk_hash()) {
            Some(variants) => variants
                .iter()
                .map(|(&variant, future)| (variant, future.has_result()))
                .collect::<Vec<_>>(),
            None => return,
        };

        for (variant, resolved) in variants {
            if resolved {
                self.destroy(coords, variant);
                continue;
            }

            match self.restart(coords, variant) {
                Ok(_) => {}
                // Resolved in the meantime
                Err(CacheError::RestartResolved { .. }) => {
                    self.destroy(coords, variant);
                }
                Err(e) => {
                    warn!("Dropping request for chunk {} {}: {}", coords.x, coords.z, e);
                    self.destroy(coords, variant);
                }
            }
        }
    }

    /// Restarts the requests whose workers failed since the last call. Returns the number of
    /// requests restarted.
    pub fn flush_failures(&mut self) -> usize {
        let mut restarted = 0;

        while let Ok(report) = self.failure_receiver.try_recv() {
            let FailureReport {
                coords,
                variant,
                future,
            } = report;

            let current = self
                .get(coords, variant)
                .map(|cached| cached.ptr_eq(&future))
                .unwrap_or(false);
            if !current {
                warn!(
                    "Ignoring stale failure of chunk {} {} for {}",
                    coords.x, coords.z, variant
                );
                continue;
            }

            error!("Failed preparing chunk {} {}, retrying", coords.x, coords.z);
            match self.restart(coords, variant) {
                Ok(_) => restarted += 1,
                // Nothing will resolve the failed request anymore
                Err(e) => {
                    let dropped = future.cancel().map(|callbacks| callbacks.len()).unwrap_or(0);
                    self.destroy(coords, variant);
                    error!(
                        "Failed to restart chunk {} {}, dropping {} waiting callbacks: {}",
                        coords.x, coords.z, dropped, e
                    );
                }
            }
        }

        restarted
    }

    /// Drops every resolved future. Pending futures are kept. Returns the number dropped.
    pub fn prune(&mut self) -> usize {
        let mut pruned = 0;

        self.caches.retain(|_, variants| {
            variants.retain(|_, future| {
                let resolved = future.has_result();
                pruned += resolved as usize;
                !resolved
            });
            !variants.is_empty()
        });

        pruned
    }

    /// Drops every future and stops listening to the world.
    pub fn close(&mut self) {
        for coords in self.listening.drain() {
            self.world.unregister_chunk_listener(self.listener_id, coords);
        }

        self.caches.clear();
    }

    /// Returns whether this cache listens for changes to the given chunk.
    pub fn is_listening(&self, coords: ChunkCoords) -> bool {
        self.listening.contains(&coords)
    }

    fn futures(&self) -> impl Iterator<Item = &PacketFuture> {
        self.caches.values().flat_map(|variants| variants.values())
    }

    /// Returns the total size of every resolved packet in bytes.
    pub fn cache_size(&self) -> usize {
        self.futures()
            .filter_map(PacketFuture::result)
            .map(|packet| packet.len())
            .sum()
    }

    /// Returns the fraction of requests served from the cache, or zero if there were no requests.
    pub fn hit_percentage(&self) -> f64 {
        self.stats().hit_percentage()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            hits: self.hits,
            misses: self.misses,
            ..CacheStats::default()
        };

        // Each future is inspected once, as workers may resolve them concurrently
        for future in self.futures() {
            match future.result() {
                Some(packet) => {
                    stats.resolved += 1;
                    stats.size_bytes += packet.len();
                }
                None => stats.pending += 1,
            }
        }

        stats
    }
}

impl ChunkListener for ChunkCache {
    fn on_chunk_changed(&mut self, coords: ChunkCoords) {
        self.destroy_or_restart(coords);
    }

    fn on_block_changed(&mut self, pos: BlockPosition) {
        // Requests waiting on this chunk get the packet from before the change
        self.destroy_all(pos.chunk());
    }

    fn on_chunk_unloaded(&mut self, coords: ChunkCoords) {
        self.destroy_all(coords);

        if self.listening.remove(&coords) {
            self.world.unregister_chunk_listener(self.listener_id, coords);
        }
    }
}
