//! # History Trails
//!
//! Ephemeral per-feature trail layers stacked above every base layer. The z
//! stack is separate from the registry's static ordering: the next trail
//! always lands one above the highest live trail, so later trails draw over
//! earlier ones and stopping the top trail frees its slot for the next start.

use std::collections::HashMap;

use crate::core::feature::FeatureId;
use crate::core::render::LayerSource;

/// Default base of the trail stack; the first trail gets `base + 1`.
pub const DEFAULT_HISTORY_BASE_Z: i32 = 30;

/// One active trail.
pub struct TrailLayer {
    owner: FeatureId,
    z_index: i32,
    source: Box<dyn LayerSource>,
}

impl TrailLayer {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn source(&self) -> &dyn LayerSource {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> &mut dyn LayerSource {
        self.source.as_mut()
    }
}

impl std::fmt::Debug for TrailLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrailLayer")
            .field("owner", &self.owner)
            .field("z_index", &self.z_index)
            .field("points", &self.source.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct HistoryManager {
    base_z: i32,
    trails: HashMap<FeatureId, TrailLayer>,
}

impl HistoryManager {
    pub fn new(base_z: i32) -> Self {
        Self {
            base_z,
            trails: HashMap::new(),
        }
    }

    pub fn base_z(&self) -> i32 {
        self.base_z
    }

    /// The z-index the next started trail would get.
    pub fn next_z(&self) -> i32 {
        self.trails
            .values()
            .map(|t| t.z_index)
            .max()
            .unwrap_or(self.base_z)
            + 1
    }

    /// Opens a trail for `owner` and returns its z-index. Starting a trail
    /// that is already open keeps the existing one.
    pub fn start(&mut self, owner: &str, source: Box<dyn LayerSource>) -> i32 {
        if let Some(existing) = self.trails.get(owner) {
            log::debug!("Trail for '{}' already open at z {}", owner, existing.z_index);
            return existing.z_index;
        }
        let z_index = self.next_z();
        self.trails.insert(
            owner.to_string(),
            TrailLayer {
                owner: owner.to_string(),
                z_index,
                source,
            },
        );
        log::debug!("Trail for '{}' opened at z {}", owner, z_index);
        z_index
    }

    /// Closes the trail for `owner`, returning it.
    pub fn stop(&mut self, owner: &str) -> Option<TrailLayer> {
        let trail = self.trails.remove(owner);
        if trail.is_none() {
            log::debug!("No trail open for '{}'", owner);
        }
        trail
    }

    /// Closes every trail. Returns how many were open.
    pub fn clear_all(&mut self) -> usize {
        let closed = self.trails.len();
        self.trails.clear();
        closed
    }

    pub fn trail(&self, owner: &str) -> Option<&TrailLayer> {
        self.trails.get(owner)
    }

    pub fn trail_mut(&mut self, owner: &str) -> Option<&mut TrailLayer> {
        self.trails.get_mut(owner)
    }

    pub fn trails_mut(&mut self) -> impl Iterator<Item = &mut TrailLayer> {
        self.trails.values_mut()
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}
