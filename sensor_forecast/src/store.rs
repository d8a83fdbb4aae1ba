//! Artifact store with all-or-nothing publication of generations
//!
//! A pipeline run writes its artifacts into a private staging area. Only when every
//! stage has succeeded is the staging area promoted to a published generation, in a
//! single step that readers observe either entirely or not at all. Readers always
//! address a generation explicitly, so they never combine artifacts of two runs.

use crate::codec;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifier of one pipeline run's artifact set, increasing over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(pub u64);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

impl std::str::FromStr for GenerationId {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(GenerationId)
            .map_err(|e| ForecastError::InvalidParameter(format!("Bad generation id '{}': {}", s, e)))
    }
}

/// The well-known artifacts of a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    CleanSeries,
    Scaler,
    Model,
    TrainingReport,
    ShortForecast,
    LongForecast,
}

impl ArtifactKind {
    /// Every artifact a complete generation holds
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::CleanSeries,
        ArtifactKind::Scaler,
        ArtifactKind::Model,
        ArtifactKind::TrainingReport,
        ArtifactKind::ShortForecast,
        ArtifactKind::LongForecast,
    ];

    /// File name inside a generation directory
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::CleanSeries => "clean_series.csv",
            ArtifactKind::Scaler => "scaler.json",
            ArtifactKind::Model => "model.json",
            ArtifactKind::TrainingReport => "training_report.json",
            ArtifactKind::ShortForecast => "forecast_short.csv",
            ArtifactKind::LongForecast => "forecast_long.csv",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Description of a published generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub generation: GenerationId,
    pub created_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactKind>,
}

/// Durable key to blob storage addressed by generation and artifact kind
pub trait ArtifactStore: Send + Sync {
    /// Start a new generation and return its id
    fn open_staging(&self) -> Result<GenerationId>;

    /// Write one artifact of a staged generation, replacing any earlier write
    fn write_staged(&self, generation: GenerationId, kind: ArtifactKind, bytes: &[u8]) -> Result<()>;

    /// Read back an artifact of a staged generation
    fn read_staged(&self, generation: GenerationId, kind: ArtifactKind) -> Result<Vec<u8>>;

    /// Promote a staged generation to current.
    ///
    /// Fails with `ArtifactMissing` unless every kind in `ArtifactKind::ALL` was
    /// written; the previous generation then stays current.
    fn publish(&self, generation: GenerationId) -> Result<GenerationManifest>;

    /// Drop a staged generation. Unknown generations are ignored.
    fn discard(&self, generation: GenerationId) -> Result<()>;

    /// Manifest of the current generation, if one was ever published
    fn current(&self) -> Result<Option<GenerationManifest>>;

    /// Read an artifact of a published generation
    fn read_published(&self, generation: GenerationId, kind: ArtifactKind) -> Result<Vec<u8>>;
}

fn missing(generation: GenerationId, kind: ArtifactKind) -> ForecastError {
    ForecastError::ArtifactMissing(format!("{} in generation {}", kind, generation))
}

fn check_complete<F: Fn(ArtifactKind) -> bool>(generation: GenerationId, has: F) -> Result<()> {
    match ArtifactKind::ALL.into_iter().find(|kind| !has(*kind)) {
        Some(kind) => Err(missing(generation, kind)),
        None => Ok(()),
    }
}

const MANIFEST_FILE: &str = "manifest.json";
const CURRENT_FILE: &str = "CURRENT";

/// Artifact store on the local filesystem.
///
/// Layout under the root:
///
/// ```text
/// staging/<generation>/...        written by a running pipeline
/// generations/<generation>/...    published, never modified
/// CURRENT                         id of the current generation
/// ```
///
/// A generation is published by renaming its staging directory into
/// `generations/` and then replacing `CURRENT` through a rename, which is atomic
/// on POSIX filesystems.
#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
    retained: usize,
    next_id: AtomicU64,
    created: Mutex<HashMap<GenerationId, DateTime<Utc>>>,
    publish_lock: Mutex<()>,
}

impl FsArtifactStore {
    /// Open or create a store under `root`, keeping `retained` published generations.
    ///
    /// Staging directories left behind by an earlier process are removed.
    pub fn open<P: AsRef<Path>>(root: P, retained: usize) -> Result<Self> {
        if retained == 0 {
            return Err(ForecastError::InvalidParameter(
                "At least one generation must be retained".to_string(),
            ));
        }

        let root = root.as_ref().to_path_buf();
        let staging = root.join("staging");
        if staging.exists() {
            let mut leftovers = 0;
            for entry in fs::read_dir(&staging)? {
                fs::remove_dir_all(entry?.path())?;
                leftovers += 1;
            }
            if leftovers > 0 {
                warn!(leftovers, root = %root.display(), "removed abandoned staging directories");
            }
        }
        fs::create_dir_all(&staging)?;
        fs::create_dir_all(root.join("generations"))?;

        let store = Self {
            root,
            retained,
            next_id: AtomicU64::new(1),
            created: Mutex::new(HashMap::new()),
            publish_lock: Mutex::new(()),
        };
        let newest = store.published_ids()?.last().map(|g| g.0).unwrap_or(0);
        store.next_id.store(newest + 1, Ordering::SeqCst);

        Ok(store)
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staging_dir(&self, generation: GenerationId) -> PathBuf {
        self.root.join("staging").join(generation.to_string())
    }

    fn generation_dir(&self, generation: GenerationId) -> PathBuf {
        self.root.join("generations").join(generation.to_string())
    }

    /// Published generation ids, oldest first
    pub fn published_ids(&self) -> Result<Vec<GenerationId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join("generations"))? {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_file(path: &Path, generation: GenerationId, kind: ArtifactKind) -> Result<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(missing(generation, kind)),
            Err(e) => Err(e.into()),
        }
    }

    fn prune(&self, current: GenerationId) {
        let ids = match self.published_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "cannot list generations for pruning");
                return;
            }
        };
        let excess = ids.len().saturating_sub(self.retained);
        for id in ids.into_iter().take(excess).filter(|id| *id != current) {
            match fs::remove_dir_all(self.generation_dir(id)) {
                Ok(()) => debug!(generation = %id, "pruned generation"),
                Err(e) => warn!(generation = %id, error = %e, "cannot prune generation"),
            }
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn open_staging(&self) -> Result<GenerationId> {
        let generation = GenerationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        fs::create_dir_all(self.staging_dir(generation))?;
        self.created.lock().insert(generation, Utc::now());
        Ok(generation)
    }

    fn write_staged(&self, generation: GenerationId, kind: ArtifactKind, bytes: &[u8]) -> Result<()> {
        let dir = self.staging_dir(generation);
        if !dir.is_dir() {
            return Err(ForecastError::ArtifactMissing(format!(
                "staging area for generation {}",
                generation
            )));
        }
        Self::write_atomic(&dir.join(kind.file_name()), bytes)
    }

    fn read_staged(&self, generation: GenerationId, kind: ArtifactKind) -> Result<Vec<u8>> {
        Self::read_file(
            &self.staging_dir(generation).join(kind.file_name()),
            generation,
            kind,
        )
    }

    fn publish(&self, generation: GenerationId) -> Result<GenerationManifest> {
        let _guard = self.publish_lock.lock();
        let staged = self.staging_dir(generation);
        check_complete(generation, |kind| staged.join(kind.file_name()).is_file())?;

        let created_at = self
            .created
            .lock()
            .remove(&generation)
            .unwrap_or_else(Utc::now);
        let manifest = GenerationManifest {
            generation,
            created_at,
            published_at: Utc::now(),
            artifacts: ArtifactKind::ALL.to_vec(),
        };
        Self::write_atomic(&staged.join(MANIFEST_FILE), &codec::to_json(&manifest)?)?;

        fs::rename(&staged, self.generation_dir(generation))?;
        Self::write_atomic(
            &self.root.join(CURRENT_FILE),
            generation.to_string().as_bytes(),
        )?;

        info!(generation = %generation, "published generation");
        self.prune(generation);
        Ok(manifest)
    }

    fn discard(&self, generation: GenerationId) -> Result<()> {
        self.created.lock().remove(&generation);
        match fs::remove_dir_all(self.staging_dir(generation)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn current(&self) -> Result<Option<GenerationManifest>> {
        let pointer = match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let generation: GenerationId = pointer.parse()?;
        let bytes = match fs::read(self.generation_dir(generation).join(MANIFEST_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ForecastError::ArtifactMissing(format!(
                    "manifest of generation {}",
                    generation
                )))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(codec::from_json(&bytes)?))
    }

    fn read_published(&self, generation: GenerationId, kind: ArtifactKind) -> Result<Vec<u8>> {
        Self::read_file(
            &self.generation_dir(generation).join(kind.file_name()),
            generation,
            kind,
        )
    }
}

#[derive(Debug)]
struct PublishedGeneration {
    manifest: GenerationManifest,
    artifacts: HashMap<ArtifactKind, Vec<u8>>,
}

#[derive(Debug)]
struct StagedGeneration {
    created_at: DateTime<Utc>,
    artifacts: HashMap<ArtifactKind, Vec<u8>>,
}

/// In-process artifact store.
///
/// Publication swaps a shared pointer, so a reader holds either the old or the new
/// generation in full.
#[derive(Debug)]
pub struct MemoryArtifactStore {
    retained: usize,
    next_id: AtomicU64,
    staging: Mutex<HashMap<GenerationId, StagedGeneration>>,
    published: RwLock<VecDeque<Arc<PublishedGeneration>>>,
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new(3)
    }
}

impl MemoryArtifactStore {
    /// Create a store keeping `retained` published generations
    pub fn new(retained: usize) -> Self {
        Self {
            retained: retained.max(1),
            next_id: AtomicU64::new(1),
            staging: Mutex::new(HashMap::new()),
            published: RwLock::new(VecDeque::new()),
        }
    }

    /// Number of generations currently staged
    pub fn staged_count(&self) -> usize {
        self.staging.lock().len()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn open_staging(&self) -> Result<GenerationId> {
        let generation = GenerationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.staging.lock().insert(
            generation,
            StagedGeneration {
                created_at: Utc::now(),
                artifacts: HashMap::new(),
            },
        );
        Ok(generation)
    }

    fn write_staged(&self, generation: GenerationId, kind: ArtifactKind, bytes: &[u8]) -> Result<()> {
        let mut staging = self.staging.lock();
        let staged = staging.get_mut(&generation).ok_or_else(|| {
            ForecastError::ArtifactMissing(format!("staging area for generation {}", generation))
        })?;
        staged.artifacts.insert(kind, bytes.to_vec());
        Ok(())
    }

    fn read_staged(&self, generation: GenerationId, kind: ArtifactKind) -> Result<Vec<u8>> {
        self.staging
            .lock()
            .get(&generation)
            .and_then(|staged| staged.artifacts.get(&kind).cloned())
            .ok_or_else(|| missing(generation, kind))
    }

    fn publish(&self, generation: GenerationId) -> Result<GenerationManifest> {
        let staged = {
            let mut staging = self.staging.lock();
            let staged = staging.get(&generation).ok_or_else(|| {
                ForecastError::ArtifactMissing(format!("staging area for generation {}", generation))
            })?;
            check_complete(generation, |kind| staged.artifacts.contains_key(&kind))?;
            staging.remove(&generation)
        };
        let Some(staged) = staged else {
            return Err(ForecastError::ArtifactMissing(format!(
                "staging area for generation {}",
                generation
            )));
        };

        let manifest = GenerationManifest {
            generation,
            created_at: staged.created_at,
            published_at: Utc::now(),
            artifacts: ArtifactKind::ALL.to_vec(),
        };
        let entry = Arc::new(PublishedGeneration {
            manifest: manifest.clone(),
            artifacts: staged.artifacts,
        });

        let mut published = self.published.write();
        published.push_back(entry);
        while published.len() > self.retained {
            published.pop_front();
        }
        info!(generation = %generation, "published generation");
        Ok(manifest)
    }

    fn discard(&self, generation: GenerationId) -> Result<()> {
        self.staging.lock().remove(&generation);
        Ok(())
    }

    fn current(&self) -> Result<Option<GenerationManifest>> {
        Ok(self.published.read().back().map(|g| g.manifest.clone()))
    }

    fn read_published(&self, generation: GenerationId, kind: ArtifactKind) -> Result<Vec<u8>> {
        let entry = self
            .published
            .read()
            .iter()
            .find(|g| g.manifest.generation == generation)
            .cloned()
            .ok_or_else(|| {
                ForecastError::ArtifactMissing(format!("generation {} is not published", generation))
            })?;
        entry
            .artifacts
            .get(&kind)
            .cloned()
            .ok_or_else(|| missing(generation, kind))
    }
}
