//! Strategy snapshot persistence — versioned JSON save/load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use sigforge_core::factory::StrategyRecord;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u32 },
}

/// On-disk form of the strategy registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub strategies: BTreeMap<String, StrategyRecord>,
}

impl Snapshot {
    pub fn new(strategies: BTreeMap<String, StrategyRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            strategies,
        }
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

/// Save a snapshot to disk. Creates parent directories if needed.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a snapshot. The version is checked before the body is parsed.
pub fn load(path: &Path) -> Result<Snapshot, PersistenceError> {
    let content = std::fs::read_to_string(path)?;
    let header: VersionHeader = serde_json::from_str(&content)?;
    if header.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: header.version,
        });
    }
    Ok(serde_json::from_str(&content)?)
}
