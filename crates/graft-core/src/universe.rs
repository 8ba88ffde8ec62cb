//! The universe: every handle, every wrapper, every world and the shared
//! definition tables.

use crate::arena::{HandleArena, HandleId};
use crate::definition::{BlockDefinition, DefinitionTable, ItemDefinition};
use crate::entity::{EntityHandle, EntityId, EntityKind, EntityRef, EntityState, Position, WorldId};
use crate::error::{CoreError, CoreResult};
use crate::fields::{EntityTemplate, TypeStatics};
use crate::tracker::TrackingEntry;
use crate::value::DataWatcherId;
use crate::world::{ChunkCoord, World, slice_index};

/// Owner of all engine state the substitution subsystem touches.
#[derive(Debug, Default)]
pub struct Universe {
    handles: HandleArena<EntityHandle>,
    wrappers: HandleArena<HandleId>,
    worlds: Vec<World>,
    items: DefinitionTable<ItemDefinition>,
    blocks: DefinitionTable<BlockDefinition>,
    statics: TypeStatics,
    next_entity_id: i32,
    next_watcher: u32,
}

impl Universe {
    /// Create an empty universe.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Worlds
    // -----------------------------------------------------------------------

    /// Create a world named `name`.
    pub fn create_world(&mut self, name: impl Into<String>) -> WorldId {
        let id = WorldId(self.worlds.len() as u32);
        self.worlds.push(World::new(id, name));
        id
    }

    /// World with `id`.
    pub fn world(&self, id: WorldId) -> CoreResult<&World> {
        self.worlds
            .get(id.0 as usize)
            .ok_or(CoreError::UnknownWorld(id))
    }

    /// Mutable world with `id`.
    pub fn world_mut(&mut self, id: WorldId) -> CoreResult<&mut World> {
        self.worlds
            .get_mut(id.0 as usize)
            .ok_or(CoreError::UnknownWorld(id))
    }

    /// World named `name`, compared case-insensitively.
    pub fn world_by_name(&self, name: &str) -> Option<&World> {
        self.worlds
            .iter()
            .find(|world| world.name().eq_ignore_ascii_case(name))
    }

    /// All worlds in creation order.
    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    // -----------------------------------------------------------------------
    // Definitions and type statics
    // -----------------------------------------------------------------------

    /// Item definition table.
    pub fn items(&self) -> &DefinitionTable<ItemDefinition> {
        &self.items
    }

    /// Mutable item definition table.
    pub fn items_mut(&mut self) -> &mut DefinitionTable<ItemDefinition> {
        &mut self.items
    }

    /// Block definition table.
    pub fn blocks(&self) -> &DefinitionTable<BlockDefinition> {
        &self.blocks
    }

    /// Mutable block definition table.
    pub fn blocks_mut(&mut self) -> &mut DefinitionTable<BlockDefinition> {
        &mut self.blocks
    }

    /// Type-level state shared by all handles.
    pub fn statics(&self) -> &TypeStatics {
        &self.statics
    }

    /// Mutable type-level state.
    pub fn statics_mut(&mut self) -> &mut TypeStatics {
        &mut self.statics
    }

    /// Next entity id. The running count is mirrored into the base layer's
    /// `entity_count` static.
    pub fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        self.statics
            .record_entity_count(i64::from(self.next_entity_id));
        id
    }

    /// Next metadata watcher id.
    pub fn allocate_watcher(&mut self) -> DataWatcherId {
        self.next_watcher += 1;
        DataWatcherId(self.next_watcher)
    }

    // -----------------------------------------------------------------------
    // Handles and wrappers
    // -----------------------------------------------------------------------

    /// Create an unspawned plain entity of `kind` with a fresh wrapper.
    pub fn create_entity(&mut self, kind: EntityKind) -> EntityRef {
        self.create_with(kind, EntityHandle::plain)
    }

    /// Create an unspawned entity of `kind` that starts out augmented.
    ///
    /// The caller checks that the kind has an augmented handle.
    pub fn create_augmented_entity(&mut self, kind: EntityKind) -> EntityRef {
        self.create_with(kind, EntityHandle::augmented)
    }

    fn create_with(&mut self, kind: EntityKind, make: fn(EntityState) -> EntityHandle) -> EntityRef {
        let mut state = EntityTemplate::of(&kind).new_instance();
        state.id = self.allocate_entity_id();
        state.data_watcher = self.allocate_watcher();
        state.valid = true;
        let handle = self.insert_handle(make(state));
        self.create_wrapper(handle)
    }

    /// Store `handle` in the arena.
    pub fn insert_handle(&mut self, handle: EntityHandle) -> HandleId {
        self.handles.insert(handle)
    }

    /// Handle behind `id`.
    pub fn handle(&self, id: HandleId) -> CoreResult<&EntityHandle> {
        self.handles.get(id).ok_or(CoreError::StaleHandle(id))
    }

    /// Mutable handle behind `id`.
    pub fn handle_mut(&mut self, id: HandleId) -> CoreResult<&mut EntityHandle> {
        self.handles.get_mut(id).ok_or(CoreError::StaleHandle(id))
    }

    /// The handle arena.
    pub fn handles(&self) -> &HandleArena<EntityHandle> {
        &self.handles
    }

    /// Mutable handle arena.
    pub fn handles_mut(&mut self) -> &mut HandleArena<EntityHandle> {
        &mut self.handles
    }

    /// Current handle of `entity`.
    pub fn resolve(&self, entity: EntityRef) -> CoreResult<HandleId> {
        let handle = *self
            .wrappers
            .get(entity.0)
            .ok_or(CoreError::UnknownWrapper(entity))?;
        if !self.handles.contains(handle) {
            return Err(CoreError::StaleHandle(handle));
        }
        Ok(handle)
    }

    /// State of the current handle of `entity`.
    pub fn state(&self, entity: EntityRef) -> CoreResult<&EntityState> {
        let handle = self.resolve(entity)?;
        Ok(&self.handle(handle)?.state)
    }

    /// Mutable state of the current handle of `entity`.
    pub fn state_mut(&mut self, entity: EntityRef) -> CoreResult<&mut EntityState> {
        let handle = self.resolve(entity)?;
        Ok(&mut self.handle_mut(handle)?.state)
    }

    /// Point `entity` at `handle`, returning the handle it pointed at before.
    pub fn relink(&mut self, entity: EntityRef, handle: HandleId) -> CoreResult<HandleId> {
        let slot = self
            .wrappers
            .get_mut(entity.0)
            .ok_or(CoreError::UnknownWrapper(entity))?;
        Ok(std::mem::replace(slot, handle))
    }

    /// Issue a new wrapper for `handle` and set the handle's back-link to it.
    pub fn create_wrapper(&mut self, handle: HandleId) -> EntityRef {
        let entity = EntityRef(self.wrappers.insert(handle));
        if let Some(target) = self.handles.get_mut(handle) {
            target.state.wrapper = Some(entity);
        }
        entity
    }

    /// Wrapper currently representing `handle`.
    pub fn wrapper_of(&self, handle: HandleId) -> CoreResult<EntityRef> {
        self.handle(handle)?
            .state
            .wrapper
            .ok_or(CoreError::StaleHandle(handle))
    }

    /// Number of issued wrappers.
    pub fn wrapper_count(&self) -> usize {
        self.wrappers.len()
    }

    // -----------------------------------------------------------------------
    // Live collections
    // -----------------------------------------------------------------------

    /// Insert `handle` into its world's live collections.
    ///
    /// The handle is placed in the chunk slice of its position, appended to the
    /// entity list, registered in the id map and given a tracking entry from
    /// its kind's parameters unless one exists.
    pub fn add_entity_to_world(&mut self, handle: HandleId) -> CoreResult<()> {
        let state = &self.handle(handle)?.state;
        let world_id = state.world.ok_or(CoreError::NoWorld(handle))?;
        let id = state.id;
        let position = state.position;
        let params = state.kind.tracking();

        let world = self.world_mut(world_id)?;
        world
            .load_chunk(ChunkCoord::containing(&position))
            .add(slice_index(&position), handle);
        world.push_entity(handle);
        world.put_entity_id(id, handle);
        if !world.tracker().is_tracking(id) {
            world
                .tracker_mut()
                .set_entry(id, TrackingEntry::with_params(handle, params));
        }
        self.handle_mut(handle)?.state.added_to_world = true;
        Ok(())
    }

    /// Remove `handle` from its world's live collections and stop tracking it.
    pub fn remove_entity_from_world(&mut self, handle: HandleId) -> CoreResult<()> {
        let state = &self.handle(handle)?.state;
        let world_id = state.world.ok_or(CoreError::NoWorld(handle))?;
        let id = state.id;
        let coord = ChunkCoord::containing(&state.position);

        let world = self.world_mut(world_id)?;
        let removed = world.chunk_mut(coord).is_some_and(|chunk| chunk.remove(handle));
        if !removed {
            // Position drifted across a chunk border since the last index update.
            for coord in world.chunks_holding(handle) {
                world.load_chunk(coord).remove(handle);
            }
        }
        world.remove_from_entity_list(handle);
        if world.entry_by_id(id) == Some(handle) {
            world.remove_entity_id(id);
        }
        if world
            .tracker()
            .entry(id)
            .is_some_and(|entry| entry.tracked == handle)
        {
            world.tracker_mut().stop_tracking(id);
        }
        self.handle_mut(handle)?.state.added_to_world = false;
        Ok(())
    }

    /// Move `handle` to `position` inside its current world, moving it between
    /// chunk slices when it is live.
    pub fn move_entity(&mut self, handle: HandleId, position: Position) -> CoreResult<()> {
        let state = &self.handle(handle)?.state;
        let from = state.position;
        let live = state.added_to_world;
        let world_id = state.world;

        if live {
            let world_id = world_id.ok_or(CoreError::NoWorld(handle))?;
            let old_coord = ChunkCoord::containing(&from);
            let new_coord = ChunkCoord::containing(&position);
            let (old_slice, new_slice) = (slice_index(&from), slice_index(&position));
            if old_coord != new_coord || old_slice != new_slice {
                let world = self.world_mut(world_id)?;
                if let Some(chunk) = world.chunk_mut(old_coord) {
                    chunk.remove(handle);
                }
                world.load_chunk(new_coord).add(new_slice, handle);
            }
        }
        self.handle_mut(handle)?.state.position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldValue;

    fn spawned(universe: &mut Universe, world: WorldId, x: f64, y: f64, z: f64) -> EntityRef {
        let entity = universe.create_entity(EntityKind::Pig);
        let state = universe.state_mut(entity).unwrap();
        state.world = Some(world);
        state.position = Position::new(x, y, z);
        let handle = universe.resolve(entity).unwrap();
        universe.add_entity_to_world(handle).unwrap();
        entity
    }

    #[test]
    fn create_entity_links_wrapper_both_ways() {
        let mut universe = Universe::new();
        let entity = universe.create_entity(EntityKind::Zombie);
        let handle = universe.resolve(entity).unwrap();
        assert_eq!(universe.wrapper_of(handle).unwrap(), entity);
        assert!(universe.state(entity).unwrap().valid);
    }

    #[test]
    fn augmented_entities_are_created_directly() {
        let mut universe = Universe::new();
        let plain = universe.create_entity(EntityKind::Minecart);
        let cart = universe.create_augmented_entity(EntityKind::Minecart);
        let handle = universe.resolve(cart).unwrap();
        assert!(universe.handle(handle).unwrap().is_augmented());
        assert_eq!(universe.wrapper_of(handle).unwrap(), cart);
        assert_ne!(
            universe.state(plain).unwrap().id,
            universe.state(cart).unwrap().id
        );
    }

    #[test]
    fn entity_ids_are_unique_and_counted() {
        let mut universe = Universe::new();
        let a = universe.create_entity(EntityKind::Pig);
        let b = universe.create_entity(EntityKind::Pig);
        assert_ne!(
            universe.state(a).unwrap().id,
            universe.state(b).unwrap().id
        );
        let template = EntityTemplate::of(&EntityKind::Pig);
        assert_eq!(
            template.static_value(universe.statics(), "entity_count"),
            Some(FieldValue::Int(2))
        );
    }

    #[test]
    fn add_entity_fills_every_index() {
        let mut universe = Universe::new();
        let world = universe.create_world("overworld");
        let entity = spawned(&mut universe, world, 40.0, 70.0, 56.0);
        let handle = universe.resolve(entity).unwrap();
        let id = universe.state(entity).unwrap().id;

        let w = universe.world(world).unwrap();
        assert_eq!(w.entry_by_id(id), Some(handle));
        assert_eq!(w.entity_list(), &[handle]);
        assert_eq!(w.chunk(ChunkCoord::new(2, 3)).unwrap().slice(4), &[handle]);
        assert_eq!(w.tracker().entry(id).unwrap().tracked, handle);
    }

    #[test]
    fn remove_entity_clears_every_index() {
        let mut universe = Universe::new();
        let world = universe.create_world("overworld");
        let entity = spawned(&mut universe, world, 1.0, 1.0, 1.0);
        let handle = universe.resolve(entity).unwrap();
        let id = universe.state(entity).unwrap().id;

        universe.remove_entity_from_world(handle).unwrap();
        let w = universe.world(world).unwrap();
        assert!(w.entry_by_id(id).is_none());
        assert!(w.entity_list().is_empty());
        assert!(!w.chunks_contain(handle));
        assert!(!w.tracker().is_tracking(id));
        assert!(!universe.state(entity).unwrap().added_to_world);
    }

    #[test]
    fn move_entity_changes_chunk() {
        let mut universe = Universe::new();
        let world = universe.create_world("overworld");
        let entity = spawned(&mut universe, world, 1.0, 1.0, 1.0);
        let handle = universe.resolve(entity).unwrap();

        universe
            .move_entity(handle, Position::new(33.0, 1.0, 1.0))
            .unwrap();
        let w = universe.world(world).unwrap();
        assert!(!w.chunk(ChunkCoord::new(0, 0)).unwrap().contains(handle));
        assert!(w.chunk(ChunkCoord::new(2, 0)).unwrap().contains(handle));
    }

    #[test]
    fn relink_returns_previous_handle() {
        let mut universe = Universe::new();
        let a = universe.create_entity(EntityKind::Pig);
        let b = universe.create_entity(EntityKind::Pig);
        let ha = universe.resolve(a).unwrap();
        let hb = universe.resolve(b).unwrap();
        assert_eq!(universe.relink(a, hb).unwrap(), ha);
        assert_eq!(universe.resolve(a).unwrap(), hb);
    }

    #[test]
    fn unknown_world_is_an_error() {
        let universe = Universe::new();
        assert!(matches!(
            universe.world(WorldId(3)),
            Err(CoreError::UnknownWorld(WorldId(3)))
        ));
    }
}
