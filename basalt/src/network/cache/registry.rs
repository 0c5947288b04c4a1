use crate::{
    network::{
        cache::{CacheStats, ChunkCache},
        compression::{Compressor, CompressorId},
        mapping::RuntimeBlockMapping,
        pool::WorkerPool,
    },
    world::{ChunkEvent, ChunkListener, ListenerId, World, WorldId},
};
use log::debug;
use std::{collections::BTreeMap, sync::Arc};

/// Owns the packet cache of every (world, compressor) pair in use.
pub struct CacheRegistry {
    caches: BTreeMap<(WorldId, CompressorId), ChunkCache>,
    mapping: Arc<dyn RuntimeBlockMapping>,
    pool: Arc<dyn WorkerPool>,
    next_listener_id: u64,
}

impl CacheRegistry {
    pub fn new(mapping: Arc<dyn RuntimeBlockMapping>, pool: Arc<dyn WorkerPool>) -> Self {
        CacheRegistry {
            caches: BTreeMap::new(),
            mapping,
            pool,
            next_listener_id: 0,
        }
    }

    /// Returns the cache of the given world and compressor, creating it if needed.
    pub fn cache_for(
        &mut self,
        world: &Arc<dyn World>,
        compressor: &Arc<dyn Compressor>,
    ) -> &mut ChunkCache {
        let mapping = &self.mapping;
        let pool = &self.pool;
        let next_listener_id = &mut self.next_listener_id;

        self.caches
            .entry((world.id(), compressor.id()))
            .or_insert_with(|| {
                debug!(
                    "Created new chunk packet cache ({}, {})",
                    world.id(),
                    compressor.id()
                );

                *next_listener_id += 1;
                ChunkCache::new(
                    ListenerId(*next_listener_id),
                    Arc::clone(world),
                    Arc::clone(compressor),
                    Arc::clone(mapping),
                    Arc::clone(pool),
                )
            })
    }

    pub fn cache(&self, world: WorldId, compressor: CompressorId) -> Option<&ChunkCache> {
        self.caches.get(&(world, compressor))
    }

    pub fn cache_mut(&mut self, world: WorldId, compressor: CompressorId) -> Option<&mut ChunkCache> {
        self.caches.get_mut(&(world, compressor))
    }

    fn world_caches(&mut self, world: WorldId) -> impl Iterator<Item = &mut ChunkCache> {
        self.caches
            .range_mut((world, CompressorId(u32::MIN)) ..= (world, CompressorId(u32::MAX)))
            .map(|(_, cache)| cache)
    }

    /// Tears down every cache of an unloaded world. Returns the number of caches destroyed.
    pub fn unload_world(&mut self, world: WorldId) -> usize {
        let keys = self
            .caches
            .range((world, CompressorId(u32::MIN)) ..= (world, CompressorId(u32::MAX)))
            .map(|(&key, _)| key)
            .collect::<Vec<_>>();

        for key in &keys {
            if let Some(mut cache) = self.caches.remove(key) {
                cache.close();
                debug!("Destroyed chunk packet cache ({}, {})", key.0, key.1);
            }
        }

        keys.len()
    }

    /// Delivers a mutation event to every cache of the world the world lists as a listener at the
    /// event's chunk.
    pub fn dispatch(&mut self, world: WorldId, event: ChunkEvent) {
        let listeners = match self.world_handle(world) {
            Some(handle) => handle.chunk_listeners(event.coords()),
            None => return,
        };

        self.dispatch_to(world, event, &listeners);
    }

    /// Delivers a mutation event to the given listeners of the world. Used for unloads, after which
    /// the world no longer holds the registrations.
    pub fn dispatch_to(&mut self, world: WorldId, event: ChunkEvent, listeners: &[ListenerId]) {
        for cache in self.world_caches(world) {
            if listeners.contains(&cache.listener_id()) {
                cache.handle_event(event);
            }
        }
    }

    fn world_handle(&self, world: WorldId) -> Option<Arc<dyn World>> {
        self.caches
            .range((world, CompressorId(u32::MIN)) ..= (world, CompressorId(u32::MAX)))
            .next()
            .map(|(_, cache)| Arc::clone(cache.world()))
    }

    /// Restarts failed requests in every cache. Returns the number of requests restarted.
    pub fn flush_failures(&mut self) -> usize {
        self.caches.values_mut().map(ChunkCache::flush_failures).sum()
    }

    /// Drops every resolved packet in every cache. Returns the number of packets dropped.
    pub fn prune(&mut self) -> usize {
        self.caches.values_mut().map(ChunkCache::prune).sum()
    }

    /// Returns the size of every resolved packet in bytes.
    pub fn total_cache_size(&self) -> usize {
        self.caches.values().map(ChunkCache::cache_size).sum()
    }

    pub fn stats(&self) -> Vec<(WorldId, CompressorId, CacheStats)> {
        self.caches
            .iter()
            .map(|(&(world, compressor), cache)| (world, compressor, cache.stats()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        network::{
            compression::ZlibCompressor,
            mapping::legacy_mapping,
            testing::{stone_world, DeferredPool},
        },
        world::{
            chunk::Chunk,
            location::{BlockPosition, ChunkCoords},
            MemoryWorld,
        },
    };
    use basalt_net::{ProtocolVariant, CURRENT_PROTOCOL};

    const ORIGIN: ChunkCoords = ChunkCoords::new(0, 0);

    fn variant() -> ProtocolVariant {
        ProtocolVariant::new(CURRENT_PROTOCOL)
    }

    fn registry() -> (CacheRegistry, Arc<DeferredPool>) {
        let pool = Arc::new(DeferredPool::default());
        (CacheRegistry::new(legacy_mapping(), pool.clone()), pool)
    }

    fn compressor(id: u32) -> Arc<dyn Compressor> {
        Arc::new(ZlibCompressor::new(CompressorId(id), 6))
    }

    #[test]
    fn caches_are_created_once_per_pair() {
        let (mut registry, _pool) = registry();
        let world: Arc<dyn World> = stone_world(&[ORIGIN]);
        let first = compressor(0);
        let second = compressor(1);

        let listener = registry.cache_for(&world, &first).listener_id();
        assert_eq!(registry.cache_for(&world, &first).listener_id(), listener);
        assert_ne!(registry.cache_for(&world, &second).listener_id(), listener);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unloading_a_world_destroys_its_caches() {
        let (mut registry, _pool) = registry();
        let unloaded = stone_world(&[ORIGIN]);
        let unloaded_dyn: Arc<dyn World> = unloaded.clone();
        let kept: Arc<dyn World> = Arc::new(MemoryWorld::new(WorldId(7)));
        let compressor = compressor(0);

        registry
            .cache_for(&unloaded_dyn, &compressor)
            .request(ORIGIN, variant())
            .expect("Request failed");
        registry.cache_for(&kept, &compressor);

        assert_eq!(registry.unload_world(WorldId(0)), 1);
        assert!(registry.cache(WorldId(0), CompressorId(0)).is_none());
        assert!(registry.cache(WorldId(7), CompressorId(0)).is_some());
        assert!(unloaded.chunk_listeners(ORIGIN).is_empty(), "Listeners are released");
        assert_eq!(registry.unload_world(WorldId(0)), 0);
    }

    #[test]
    fn events_reach_listening_caches_only() {
        let (mut registry, pool) = registry();
        let world: Arc<dyn World> = stone_world(&[ORIGIN, ChunkCoords::new(1, 0)]);
        let listening = compressor(0);
        let idle = compressor(1);

        registry
            .cache_for(&world, &listening)
            .request(ORIGIN, variant())
            .expect("Request failed");
        registry
            .cache_for(&world, &idle)
            .request(ChunkCoords::new(1, 0), variant())
            .expect("Request failed");
        pool.run_all();

        registry.dispatch(WorldId(0), ChunkEvent::BlockChanged(BlockPosition::new(3, 10, 3)));
        assert!(registry
            .cache(WorldId(0), CompressorId(0))
            .and_then(|cache| cache.get(ORIGIN, variant()))
            .is_none());
        assert!(registry
            .cache(WorldId(0), CompressorId(1))
            .and_then(|cache| cache.get(ChunkCoords::new(1, 0), variant()))
            .is_some());
    }

    #[test]
    fn prune_spans_every_cache() {
        let (mut registry, pool) = registry();
        let world: Arc<dyn World> = stone_world(&[ORIGIN]);

        for id in 0 .. 3 {
            registry
                .cache_for(&world, &compressor(id))
                .request(ORIGIN, variant())
                .expect("Request failed");
        }
        pool.run_all();
        assert!(registry.total_cache_size() > 0);

        let pending = registry
            .cache_for(&world, &compressor(3))
            .request(ORIGIN, variant())
            .expect("Request failed");
        pending.on_resolve(|_| {});

        assert_eq!(registry.prune(), 3);
        assert_eq!(registry.total_cache_size(), 0);
        assert_eq!(
            registry
                .stats()
                .iter()
                .map(|(_, _, stats)| stats.pending)
                .sum::<usize>(),
            1
        );
    }

    #[test]
    fn unloads_reach_the_listeners_handed_back() {
        let (mut registry, pool) = registry();
        let world = stone_world(&[ORIGIN]);
        let world_dyn: Arc<dyn World> = world.clone();
        let compressor = compressor(0);

        let stale = registry
            .cache_for(&world_dyn, &compressor)
            .request(ORIGIN, variant())
            .expect("Request failed");
        pool.run_all();

        let unloaded = world.remove_chunk(ORIGIN).expect("Chunk was loaded");
        registry.dispatch_to(WorldId(0), ChunkEvent::ChunkUnloaded(ORIGIN), &unloaded.listeners);

        let cache = registry.cache_mut(WorldId(0), CompressorId(0)).expect("Cache exists");
        assert!(cache.get(ORIGIN, variant()).is_none());
        assert!(!cache.is_listening(ORIGIN));

        world.set_chunk(Chunk::new(ORIGIN));
        let fresh = cache.request(ORIGIN, variant()).expect("Request failed");
        assert!(!fresh.ptr_eq(&stale));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn events_follow_the_world_registrations() {
        let (mut registry, pool) = registry();
        let world = stone_world(&[ORIGIN]);
        let world_dyn: Arc<dyn World> = world.clone();
        let compressor = compressor(0);

        let cache = registry.cache_for(&world_dyn, &compressor);
        cache.request(ORIGIN, variant()).expect("Request failed");
        let listener = cache.listener_id();
        pool.run_all();

        world.unregister_chunk_listener(listener, ORIGIN);
        registry.dispatch(WorldId(0), ChunkEvent::ChunkChanged(ORIGIN));
        assert!(
            registry
                .cache(WorldId(0), CompressorId(0))
                .and_then(|cache| cache.get(ORIGIN, variant()))
                .is_some(),
            "Caches the world does not list are not notified"
        );

        world.register_chunk_listener(listener, ORIGIN);
        registry.dispatch(WorldId(0), ChunkEvent::ChunkChanged(ORIGIN));
        assert!(registry
            .cache(WorldId(0), CompressorId(0))
            .and_then(|cache| cache.get(ORIGIN, variant()))
            .is_none());

        // Events of worlds without caches are ignored
        registry.dispatch(WorldId(9), ChunkEvent::ChunkChanged(ORIGIN));
    }
}
