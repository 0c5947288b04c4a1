use crate::network::compression::DEFAULT_COMPRESSION_LEVEL;
use basalt_net::CURRENT_PROTOCOL;
use basalt_util::threadpool::DistributionStrategy;
use log::*;
use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{self, prelude::*, SeekFrom},
    path::{Path, PathBuf},
};

/// The packet pipeline configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The number of chunk encoding workers, defaults to 4.
    pub worker_threads: usize,
    /// How encoding jobs are spread across the workers, defaults to "equal_load".
    pub distribution_strategy: WorkerDistribution,
    /// The deflate level of sent batches, 0 through 9, defaults to 7.
    pub compression_level: u32,
    /// The protocol number packets are encoded for when none is given.
    pub protocol: u32,
    /// A JSON block mapping to load. The legacy identity mapping is used if unset.
    pub block_mapping: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worker_threads: 4,
            distribution_strategy: WorkerDistribution::EqualLoad,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            protocol: CURRENT_PROTOCOL,
            block_mapping: None,
        }
    }
}

/// The serialized form of [`DistributionStrategy`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerDistribution {
    EqualLoad,
    Fast,
}

impl From<WorkerDistribution> for DistributionStrategy {
    fn from(x: WorkerDistribution) -> Self {
        match x {
            WorkerDistribution::EqualLoad => DistributionStrategy::EqualLoad,
            WorkerDistribution::Fast => DistributionStrategy::Fast,
        }
    }
}

/// Attempts to parse the configuration at the given path. The config should be in JSON format. If
/// the file is missing or invalid, it is overwritten with the default configuration.
pub fn load_config(path: &Path) -> io::Result<Config> {
    if path.exists() {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut json = String::new();
        file.read_to_string(&mut json)?;

        match serde_json::from_str(&json) {
            Ok(config) => Ok(config),
            Err(e) => {
                error!("Invalid config JSON: {}", e);
                use_default(&mut file)
            }
        }
    } else {
        info!("Config file not found, creating file");
        use_default(&mut File::create(path)?)
    }
}

fn use_default(file: &mut File) -> io::Result<Config> {
    info!("Using default configurations");

    let default = Config::default();
    let json = serde_json::to_string_pretty(&default)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let bytes = json.as_bytes();

    // Overwrite from the start and drop whatever was left of the old file
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    file.set_len(bytes.len() as u64)?;

    Ok(default)
}
