//! Per-world index holders: the id map, the entity list, chunk slices and
//! the network tracker.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::arena::HandleId;
use crate::entity::{EntityId, Position, WorldId};
use crate::tracker::EntityTracker;

/// Number of vertical slices in a chunk column.
pub const CHUNK_SLICES: usize = 16;

/// Horizontal coordinate of a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// Chunk x coordinate.
    pub x: i32,
    /// Chunk z coordinate.
    pub z: i32,
}

impl ChunkCoord {
    /// Create a chunk coordinate.
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk column containing `position`.
    pub fn containing(position: &Position) -> Self {
        Self {
            x: position.block_x() >> 4,
            z: position.block_z() >> 4,
        }
    }
}

/// Vertical slice index for a position, clamped into the column.
pub fn slice_index(position: &Position) -> usize {
    (position.block_y() >> 4).clamp(0, CHUNK_SLICES as i32 - 1) as usize
}

/// A loaded chunk column.
#[derive(Debug, Clone)]
pub struct Chunk {
    coord: ChunkCoord,
    slices: Vec<Vec<HandleId>>,
    dirty: bool,
}

impl Chunk {
    /// An empty column.
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            slices: vec![Vec::new(); CHUNK_SLICES],
            dirty: false,
        }
    }

    /// Column coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Handles in slice `y`.
    pub fn slice(&self, y: usize) -> &[HandleId] {
        self.slices.get(y).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append `handle` to slice `y`.
    pub fn add(&mut self, y: usize, handle: HandleId) {
        if let Some(slice) = self.slices.get_mut(y) {
            slice.push(handle);
        }
    }

    /// Remove `handle` from whichever slice holds it.
    pub fn remove(&mut self, handle: HandleId) -> bool {
        for slice in &mut self.slices {
            if let Some(position) = slice.iter().position(|h| *h == handle) {
                slice.remove(position);
                return true;
            }
        }
        false
    }

    /// Swap `old` for `new` inside slice `y`, keeping its list position.
    pub fn replace_in_slice(&mut self, y: usize, old: HandleId, new: HandleId) -> bool {
        let Some(slice) = self.slices.get_mut(y) else {
            return false;
        };
        match slice.iter_mut().find(|h| **h == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    /// Slice holding `handle`.
    pub fn slice_of(&self, handle: HandleId) -> Option<usize> {
        self.slices.iter().position(|slice| slice.contains(&handle))
    }

    /// Whether any slice holds `handle`.
    pub fn contains(&self, handle: HandleId) -> bool {
        self.slice_of(handle).is_some()
    }

    /// Flag the column for persistence.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the column changed since it was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// One space of the universe and the indexes it owns.
#[derive(Debug, Clone)]
pub struct World {
    id: WorldId,
    name: String,
    entities_by_id: HashMap<EntityId, HandleId>,
    entity_list: Vec<HandleId>,
    chunks: HashMap<ChunkCoord, Chunk>,
    tracker: EntityTracker,
}

impl World {
    /// An empty world.
    pub fn new(id: WorldId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entities_by_id: HashMap::new(),
            entity_list: Vec::new(),
            chunks: HashMap::new(),
            tracker: EntityTracker::new(),
        }
    }

    /// World id.
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// World name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Id map
    // -----------------------------------------------------------------------

    /// Handle registered under `id`.
    pub fn entry_by_id(&self, id: EntityId) -> Option<HandleId> {
        self.entities_by_id.get(&id).copied()
    }

    /// Register `handle` under `id`, returning the replaced handle.
    pub fn put_entity_id(&mut self, id: EntityId, handle: HandleId) -> Option<HandleId> {
        self.entities_by_id.insert(id, handle)
    }

    /// Drop the mapping for `id`.
    pub fn remove_entity_id(&mut self, id: EntityId) -> Option<HandleId> {
        self.entities_by_id.remove(&id)
    }

    // -----------------------------------------------------------------------
    // Entity list
    // -----------------------------------------------------------------------

    /// Every live handle, in insertion order.
    pub fn entity_list(&self) -> &[HandleId] {
        &self.entity_list
    }

    /// Append `handle` to the entity list.
    pub fn push_entity(&mut self, handle: HandleId) {
        self.entity_list.push(handle);
    }

    /// Remove `handle` from the entity list.
    pub fn remove_from_entity_list(&mut self, handle: HandleId) -> bool {
        match self.entity_list.iter().position(|h| *h == handle) {
            Some(position) => {
                self.entity_list.remove(position);
                true
            }
            None => false,
        }
    }

    /// Swap `old` for `new` in the entity list, keeping its position.
    pub fn replace_in_entity_list(&mut self, old: HandleId, new: HandleId) -> bool {
        match self.entity_list.iter_mut().find(|h| **h == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Chunks
    // -----------------------------------------------------------------------

    /// Loaded chunk at `coord`.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Mutable loaded chunk at `coord`.
    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Chunk at `coord`, loading an empty one if needed.
    pub fn load_chunk(&mut self, coord: ChunkCoord) -> &mut Chunk {
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(coord))
    }

    /// Whether the chunk at `coord` is loaded.
    pub fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Load every chunk within `radius` of `center`. Returns how many were new.
    pub fn load_chunks_around(&mut self, center: ChunkCoord, radius: u32) -> usize {
        let radius = radius as i32;
        let mut loaded = 0;
        for x in center.x - radius..=center.x + radius {
            for z in center.z - radius..=center.z + radius {
                let coord = ChunkCoord::new(x, z);
                if !self.is_chunk_loaded(coord) {
                    self.chunks.insert(coord, Chunk::new(coord));
                    loaded += 1;
                }
            }
        }
        loaded
    }

    /// Number of loaded chunks.
    pub fn loaded_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Whether any loaded chunk holds `handle`.
    pub fn chunks_contain(&self, handle: HandleId) -> bool {
        self.chunks.values().any(|chunk| chunk.contains(handle))
    }

    /// Coordinates of every loaded chunk holding `handle`.
    pub fn chunks_holding(&self, handle: HandleId) -> Vec<ChunkCoord> {
        self.chunks
            .values()
            .filter(|chunk| chunk.contains(handle))
            .map(Chunk::coord)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Network
    // -----------------------------------------------------------------------

    /// The world's tracking entries.
    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    /// Mutable tracking entries.
    pub fn tracker_mut(&mut self) -> &mut EntityTracker {
        &mut self.tracker
    }
}
