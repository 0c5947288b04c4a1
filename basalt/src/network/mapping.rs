use basalt_net::{
    protocol::{PROTOCOL_1_16_100, PROTOCOL_1_17_10},
    ProtocolVariant,
};
use basalt_util::hash::NumHasher;
use log::{info, warn};
use once_cell::sync::Lazy;
use quartz_nbt::{NbtCompound, NbtTag};
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    error::Error,
    fmt::{self, Display, Formatter},
    fs,
    io,
    path::Path,
    sync::Arc,
};

/// Translates server block states into the runtime ids clients of a protocol variant understand.
pub trait RuntimeBlockMapping: Send + Sync {
    /// Returns the variant whose tables the given protocol uses.
    fn mapping_protocol(&self, protocol: u32) -> ProtocolVariant;

    /// Returns the runtime id of a block state. States unknown to the variant map to its fallback
    /// runtime id.
    fn to_runtime_id(&self, state: u32, variant: ProtocolVariant) -> u32;

    /// Returns the named state record of a runtime id.
    fn known_state(&self, runtime_id: u32, variant: ProtocolVariant) -> Option<&NbtCompound>;
}

/// The block state version stamped on generated state records (1.16.100).
pub const BLOCK_STATE_VERSION: i32 = 17_825_808;
const UPDATE_BLOCK_NAME: &str = "minecraft:info_update";

static LEGACY_MAPPING: Lazy<Arc<BlockMappingTable>> =
    Lazy::new(|| Arc::new(BlockMappingTable::legacy()));

/// Returns a mapping which sends every legacy `id << 4 | meta` state as its own runtime id, for
/// every supported variant.
pub fn legacy_mapping() -> Arc<BlockMappingTable> {
    Arc::clone(&LEGACY_MAPPING)
}

#[derive(Default)]
struct VariantTable {
    runtime_ids: HashMap<u32, u32, NumHasher>,
    known_states: Vec<NbtCompound>,
    fallback: u32,
}

/// A runtime mapping backed by one lookup table per protocol variant.
#[derive(Default)]
pub struct BlockMappingTable {
    variants: BTreeMap<ProtocolVariant, VariantTable>,
}

impl BlockMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn legacy() -> Self {
        let mut table = BlockMappingTable::new();

        for variant in [PROTOCOL_1_16_100, PROTOCOL_1_17_10].map(ProtocolVariant::new) {
            for state in 0 .. 256 * 16 {
                let mut properties = NbtCompound::new();
                properties.insert("id", NbtTag::Int((state >> 4) as i32));
                properties.insert("meta", NbtTag::Int((state & 0xF) as i32));

                let name = if state == 0 {
                    "minecraft:air"
                } else {
                    "minecraft:legacy"
                };
                table.register(variant, state, state_record(name, properties));
            }
        }

        table
    }

    /// Loads a mapping from a JSON file listing, for every variant, the states in runtime id order.
    ///
    /// ```json
    /// { "variants": [ { "protocol": 448, "states": [ { "state": 0, "name": "minecraft:air" } ] } ] }
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MappingLoadError> {
        let json = fs::read_to_string(path)?;
        let file: MappingFile = serde_json::from_str(&json)?;
        let mut table = BlockMappingTable::new();

        for entry in file.variants {
            let variant = ProtocolVariant::new(entry.protocol);
            let mut update_block = None;

            for state in entry.states {
                let mut properties = NbtCompound::new();
                for (key, value) in state.properties {
                    match property_tag(value) {
                        Some(tag) => {
                            properties.insert(key, tag);
                        }
                        None => warn!(
                            "Ignoring property {} of {} with unsupported type",
                            key, state.name
                        ),
                    }
                }

                let runtime_id =
                    table.register(variant, state.state, state_record(&state.name, properties));
                if state.name == UPDATE_BLOCK_NAME && update_block.is_none() {
                    update_block = Some(runtime_id);
                }
            }

            if let Some(runtime_id) = update_block {
                table.set_fallback(variant, runtime_id);
            }

            info!(
                "Loaded {} block states for {}",
                table.state_count(variant),
                variant
            );
        }

        Ok(table)
    }

    /// Registers a state with the next free runtime id of the variant and returns that id. A state
    /// registered twice keeps its first runtime id for lookups.
    pub fn register(&mut self, variant: ProtocolVariant, state: u32, known_state: NbtCompound) -> u32 {
        let table = self.variants.entry(variant).or_default();
        let runtime_id = table.known_states.len() as u32;

        table.known_states.push(known_state);
        table.runtime_ids.entry(state).or_insert(runtime_id);
        runtime_id
    }

    /// Sets the runtime id unknown states of the variant are sent as.
    pub fn set_fallback(&mut self, variant: ProtocolVariant, runtime_id: u32) {
        self.variants.entry(variant).or_default().fallback = runtime_id;
    }

    /// Returns the number of runtime ids registered for the variant.
    pub fn state_count(&self, variant: ProtocolVariant) -> usize {
        self.variants
            .get(&variant)
            .map(|table| table.known_states.len())
            .unwrap_or(0)
    }

    pub fn variants(&self) -> impl Iterator<Item = ProtocolVariant> + '_ {
        self.variants.keys().copied()
    }
}

impl RuntimeBlockMapping for BlockMappingTable {
    fn mapping_protocol(&self, protocol: u32) -> ProtocolVariant {
        self.variants
            .range(..= ProtocolVariant::new(protocol))
            .next_back()
            .or_else(|| self.variants.iter().next())
            .map(|(&variant, _)| variant)
            .unwrap_or_else(|| ProtocolVariant::new(protocol))
    }

    fn to_runtime_id(&self, state: u32, variant: ProtocolVariant) -> u32 {
        match self.variants.get(&variant) {
            Some(table) => table
                .runtime_ids
                .get(&state)
                .copied()
                .unwrap_or(table.fallback),
            None => 0,
        }
    }

    fn known_state(&self, runtime_id: u32, variant: ProtocolVariant) -> Option<&NbtCompound> {
        self.variants
            .get(&variant)?
            .known_states
            .get(runtime_id as usize)
    }
}

fn state_record(name: &str, properties: NbtCompound) -> NbtCompound {
    let mut record = NbtCompound::new();
    record.insert("name", NbtTag::String(name.to_owned()));
    record.insert("states", NbtTag::Compound(properties));
    record.insert("version", NbtTag::Int(BLOCK_STATE_VERSION));
    record
}

fn property_tag(value: Value) -> Option<NbtTag> {
    match value {
        Value::Bool(flag) => Some(NbtTag::Byte(flag as i8)),
        Value::Number(number) => number.as_i64().map(|int| NbtTag::Int(int as i32)),
        Value::String(string) => Some(NbtTag::String(string)),
        _ => None,
    }
}

#[derive(Deserialize)]
struct MappingFile {
    variants: Vec<VariantEntry>,
}

#[derive(Deserialize)]
struct VariantEntry {
    protocol: u32,
    states: Vec<StateEntry>,
}

#[derive(Deserialize)]
struct StateEntry {
    state: u32,
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

#[derive(Debug)]
pub enum MappingLoadError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl Display for MappingLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MappingLoadError::Io(error) => write!(f, "Failed to read block mapping: {}", error),
            MappingLoadError::Json(error) => write!(f, "Invalid block mapping JSON: {}", error),
        }
    }
}

impl Error for MappingLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MappingLoadError::Io(error) => Some(error),
            MappingLoadError::Json(error) => Some(error),
        }
    }
}

impl From<io::Error> for MappingLoadError {
    fn from(x: io::Error) -> Self {
        MappingLoadError::Io(x)
    }
}

impl From<serde_json::Error> for MappingLoadError {
    fn from(x: serde_json::Error) -> Self {
        MappingLoadError::Json(x)
    }
}
