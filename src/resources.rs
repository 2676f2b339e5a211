//! Registry of externally allocated handles.
//!
//! Everything the reader allocates outside its own memory (conversion
//! artifacts on disk, audio track handles) is acquired here and released
//! through [`ResourceRegistry::release`], which succeeds at most once per id.

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct ResourceId(pub u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// File produced by a converter; deleted on release together with its
    /// scratch directory once that is empty.
    Artifact {
        path: PathBuf,
        scratch_dir: Option<PathBuf>,
    },
    /// Playlist bookkeeping entry for a track. The decoder and sink are
    /// opened per playback and dropped on stop, so nothing is held open
    /// here; releasing only retires the id, once.
    AudioTrack { path: PathBuf },
}

impl Resource {
    pub fn path(&self) -> &Path {
        match self {
            Resource::Artifact { path, .. } | Resource::AudioTrack { path } => path,
        }
    }
}

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    live: HashMap<ResourceId, Resource>,
    next_id: u64,
    released: usize,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, resource: Resource) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        debug!(%id, path = %resource.path().display(), "Acquired resource");
        self.live.insert(id, resource);
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.live.get(&id)
    }

    /// Release one handle. Returns `false` when it was already released or
    /// never existed.
    pub fn release(&mut self, id: ResourceId) -> bool {
        let Some(resource) = self.live.remove(&id) else {
            debug!(%id, "Resource already released");
            return false;
        };
        self.released += 1;
        match &resource {
            Resource::Artifact { path, scratch_dir } => {
                if let Err(err) = remove_artifact(path, scratch_dir.as_deref()) {
                    warn!(%id, path = %path.display(), "Failed to delete artifact: {err}");
                }
            }
            Resource::AudioTrack { path } => {
                debug!(%id, path = %path.display(), "Audio track entry retired");
            }
        }
        true
    }

    pub fn release_all(&mut self) -> usize {
        let mut ids: Vec<ResourceId> = self.live.keys().copied().collect();
        ids.sort();
        ids.into_iter().filter(|id| self.release(*id)).count()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn released_count(&self) -> usize {
        self.released
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            debug!(released, "Released resources on drop");
        }
    }
}

fn remove_artifact(path: &Path, scratch_dir: Option<&Path>) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    if let Some(dir) = scratch_dir {
        let empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if empty {
            fs::remove_dir(dir)?;
        }
    }
    Ok(())
}
