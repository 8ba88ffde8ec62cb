//! Plain to augmented handle substitution.
//!
//! Augmentation fabricates a new handle, copies every instance field into it,
//! moves the public wrapper over and then repairs every index that still
//! names the old handle. The transition is one-way; augmenting an augmented
//! entity returns its current handle.

use graft_core::world::{CHUNK_SLICES, slice_index};
use graft_core::{ChunkCoord, CoreError, EntityHandle, EntityKind, EntityRef, EntityTemplate, HandleId};
use tracing::{debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult, SubstitutionError};
use crate::runtime::Runtime;
use crate::scheduler::DeferredAction;

impl Runtime {
    /// Whether `entity`'s kind has an augmented handle.
    pub fn has_controller_support(&self, entity: EntityRef) -> RuntimeResult<bool> {
        let handle = self.resolve(entity)?;
        Ok(self.universe.handle(handle)?.state.kind.supports_augmentation())
    }

    /// Whether `entity` is currently backed by an augmented handle.
    pub fn is_augmented(&self, entity: EntityRef) -> RuntimeResult<bool> {
        let handle = self.resolve(entity)?;
        Ok(self.universe.handle(handle)?.is_augmented())
    }

    /// Make sure `entity` is backed by an augmented handle and return it.
    ///
    /// Wrappers left behind on replaced handles are rejected with
    /// [`RuntimeError::Retired`].
    pub fn augment(&mut self, entity: EntityRef) -> RuntimeResult<HandleId> {
        let old = self.resolve_current(entity)?;
        let handle = self.universe.handle(old)?;
        if handle.is_augmented() {
            return Ok(old);
        }
        let kind = handle.state.kind.clone();
        if !kind.is_native() {
            return Err(RuntimeError::CustomEntityType { entity, kind });
        }
        if !kind.supports_augmentation() {
            return Err(RuntimeError::NoControllerSupport { entity, kind });
        }

        let new = self
            .substitute(entity, old, &kind)
            .map_err(|source| RuntimeError::substitution(entity, source))?;
        info!(entity = %entity, old = %old, new = %new, kind = %kind, "entity_augmented");
        Ok(new)
    }

    fn substitute(
        &mut self,
        entity: EntityRef,
        old: HandleId,
        kind: &EntityKind,
    ) -> Result<HandleId, SubstitutionError> {
        let template = EntityTemplate::of(kind);
        let mut replacement = template.new_instance();
        template.transfer(&self.universe.handle(old)?.state, &mut replacement)?;

        // The old handle goes dead before the new one becomes valid, and lets
        // go of everything that would make it look live.
        let previous = &mut self.universe.handle_mut(old)?.state;
        previous.dead = true;
        previous.valid = false;
        previous.added_to_world = false;
        previous.vehicle = None;
        previous.passenger = None;
        replacement.dead = false;
        replacement.valid = true;
        let new = self.universe.insert_handle(EntityHandle::augmented(replacement));

        self.universe.relink(entity, new)?;
        let orphan = self.universe.create_wrapper(old);
        debug!(entity = %entity, orphan = %orphan, "old_handle_rewrapped");

        let state = &self.universe.handle(new)?.state;
        let (vehicle, passenger) = (state.vehicle, state.passenger);
        if let Some(vehicle) = vehicle {
            let peer = self
                .universe
                .handle_mut(vehicle)
                .map_err(|_| SubstitutionError::DanglingPeer(vehicle))?;
            if peer.state.passenger == Some(old) {
                peer.state.passenger = Some(new);
            }
        }
        if let Some(passenger) = passenger {
            let peer = self
                .universe
                .handle_mut(passenger)
                .map_err(|_| SubstitutionError::DanglingPeer(passenger))?;
            if peer.state.vehicle == Some(old) {
                peer.state.vehicle = Some(new);
            }
        }

        if self.universe.handle(new)?.state.added_to_world {
            self.repair_indexes(entity, old, new, passenger)?;
        }
        Ok(new)
    }

    fn repair_indexes(
        &mut self,
        entity: EntityRef,
        old: HandleId,
        new: HandleId,
        passenger: Option<HandleId>,
    ) -> Result<(), SubstitutionError> {
        let state = &self.universe.handle(new)?.state;
        let world_id = state.world.ok_or(CoreError::NoWorld(new))?;
        let id = state.id;
        let coord = ChunkCoord::containing(&state.position);
        let expected = slice_index(&state.position);
        let passenger_id = match passenger {
            Some(passenger) => Some(self.universe.handle(passenger)?.state.id),
            None => None,
        };

        let world = self.universe.world_mut(world_id)?;
        let chunk = world.load_chunk(coord);
        let mut found = None;
        for y in std::iter::once(expected).chain((0..CHUNK_SLICES).filter(|y| *y != expected)) {
            if chunk.replace_in_slice(y, old, new) {
                found = Some(y);
                break;
            }
        }
        match found {
            Some(y) => {
                chunk.mark_dirty();
                if y != expected {
                    debug!(entity = %entity, expected, found = y, "chunk_slice_mismatch");
                }
            }
            None => {
                warn!(entity = %entity, chunk_x = coord.x, chunk_z = coord.z, "handle_missing_from_chunk");
            }
        }

        if !world.replace_in_entity_list(old, new) {
            debug!(entity = %entity, "handle_missing_from_entity_list");
        }
        match world.entry_by_id(id) {
            Some(current) if current == old => {
                world.put_entity_id(id, new);
            }
            None => {
                self.scheduler.run_next_tick(DeferredAction::MapEntityId {
                    world: world_id,
                    id,
                    handle: new,
                });
                debug!(entity = %entity, entity_id = %id, "id_mapping_deferred");
            }
            Some(current) => {
                warn!(entity = %entity, entity_id = %id, holder = %current, "id_mapping_held_elsewhere");
            }
        }

        let tracker = self.universe.world_mut(world_id)?.tracker_mut();
        if let Some(entry) = tracker.entry_mut(id).filter(|entry| entry.tracked == old) {
            entry.tracked = new;
        }
        if let Some(entry) = passenger_id
            .and_then(|pid| tracker.entry_mut(pid))
            .filter(|entry| entry.vehicle == Some(old))
        {
            entry.vehicle = Some(new);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::entity::KindData;
    use graft_core::{Location, Position, WorldId};

    fn runtime_with_world() -> (Runtime, WorldId) {
        let mut runtime = Runtime::default();
        let world = runtime.universe_mut().create_world("overworld");
        (runtime, world)
    }

    #[test]
    fn unspawned_entity_swaps_without_index_repair() {
        let (mut runtime, _) = runtime_with_world();
        let entity = runtime.create_entity(EntityKind::Minecart);
        let old = runtime.resolve(entity).unwrap();
        let new = runtime.augment(entity).unwrap();
        assert_ne!(old, new);
        assert!(runtime.is_augmented(entity).unwrap());
        assert_eq!(runtime.scheduler().pending(), 0);

        let stale = &runtime.universe().handle(old).unwrap().state;
        assert!(stale.dead && !stale.valid);
        let orphan = stale.wrapper.unwrap();
        assert_ne!(orphan, entity);
        assert_eq!(runtime.resolve(orphan).unwrap(), old);
    }

    #[test]
    fn replaced_handle_cannot_be_augmented_again() {
        let (mut runtime, world) = runtime_with_world();
        let pig = runtime.create_entity(EntityKind::Pig);
        runtime
            .spawn(pig, Location::new(world, 8.0, 64.0, 8.0))
            .unwrap();
        let old = runtime.resolve(pig).unwrap();
        let new = runtime.augment(pig).unwrap();
        let orphan = runtime.universe().handle(old).unwrap().state.wrapper.unwrap();

        assert!(matches!(
            runtime.augment(orphan),
            Err(RuntimeError::Retired(_))
        ));
        assert!(matches!(
            runtime.set_controller(orphan, None),
            Err(RuntimeError::Retired(_))
        ));

        let stale = &runtime.universe().handle(old).unwrap().state;
        assert!(!stale.added_to_world);
        let id = stale.id;
        let world = runtime.universe().world(world).unwrap();
        assert_eq!(world.entry_by_id(id), Some(new));
        assert_eq!(world.tracker().entry(id).unwrap().tracked, new);
        assert_eq!(world.entity_list(), &[new]);
    }

    #[test]
    fn foreign_id_mapping_is_left_alone() {
        let (mut runtime, world) = runtime_with_world();
        let pig = runtime.create_entity(EntityKind::Pig);
        let other = runtime.create_entity(EntityKind::Pig);
        runtime
            .spawn(pig, Location::new(world, 0.0, 64.0, 0.0))
            .unwrap();
        let id = runtime.universe().state(pig).unwrap().id;
        let holder = runtime.resolve(other).unwrap();
        runtime
            .universe_mut()
            .world_mut(world)
            .unwrap()
            .put_entity_id(id, holder);

        runtime.augment(pig).unwrap();
        let world = runtime.universe().world(world).unwrap();
        assert_eq!(world.entry_by_id(id), Some(holder));
        assert_eq!(runtime.scheduler().pending(), 0);
    }

    #[test]
    fn arrows_keep_their_shooter_across_substitution() {
        let (mut runtime, world) = runtime_with_world();
        let zombie = runtime.create_entity(EntityKind::Zombie);
        let arrow = runtime.create_entity(EntityKind::Arrow);
        runtime
            .spawn(zombie, Location::new(world, 0.0, 64.0, 0.0))
            .unwrap();
        runtime
            .spawn(arrow, Location::new(world, 2.0, 65.0, 0.0))
            .unwrap();
        if let KindData::Arrow { shooter, .. } =
            &mut runtime.universe_mut().state_mut(arrow).unwrap().data
        {
            *shooter = Some(zombie);
        }

        let new = runtime.augment(zombie).unwrap();
        let KindData::Arrow { shooter, .. } = runtime.universe().state(arrow).unwrap().data else {
            panic!("expected arrow data");
        };
        assert_eq!(runtime.resolve(shooter.unwrap()).unwrap(), new);
    }

    #[test]
    fn custom_kinds_are_rejected() {
        let (mut runtime, _) = runtime_with_world();
        let entity = runtime.create_entity(EntityKind::Custom("golem".into()));
        let err = runtime.augment(entity).unwrap_err();
        assert!(matches!(err, RuntimeError::CustomEntityType { .. }));
        assert!(!runtime.has_controller_support(entity).unwrap());
    }

    #[test]
    fn players_have_no_controller_support() {
        let (mut runtime, _) = runtime_with_world();
        let entity = runtime.create_entity(EntityKind::Player);
        let err = runtime.augment(entity).unwrap_err();
        assert!(matches!(err, RuntimeError::NoControllerSupport { .. }));
    }

    #[test]
    fn slice_mismatch_is_tolerated() {
        let (mut runtime, world) = runtime_with_world();
        let entity = runtime.create_entity(EntityKind::Pig);
        runtime
            .spawn(entity, Location::new(world, 4.0, 70.0, 4.0))
            .unwrap();
        let old = runtime.resolve(entity).unwrap();
        // Drift the position without updating the chunk slice.
        runtime.universe_mut().handle_mut(old).unwrap().state.position = Position::new(4.0, 10.0, 4.0);

        let new = runtime.augment(entity).unwrap();
        let chunk = runtime
            .universe()
            .world(world)
            .unwrap()
            .chunk(ChunkCoord::new(0, 0))
            .unwrap();
        assert_eq!(chunk.slice(4), &[new]);
        assert!(chunk.is_dirty());
    }

    #[test]
    fn dangling_passenger_fails_with_cause() {
        let (mut runtime, _) = runtime_with_world();
        let vehicle = runtime.create_entity(EntityKind::Minecart);
        let rider = runtime.create_entity(EntityKind::Zombie);
        let vehicle_handle = runtime.resolve(vehicle).unwrap();
        let rider_handle = runtime.resolve(rider).unwrap();
        runtime
            .universe_mut()
            .handle_mut(vehicle_handle)
            .unwrap()
            .state
            .passenger = Some(rider_handle);
        runtime.universe_mut().handles_mut().remove(rider_handle);

        let err = runtime.augment(vehicle).unwrap_err();
        let RuntimeError::Substitution { source, .. } = err else {
            panic!("expected a substitution error");
        };
        assert!(matches!(source, SubstitutionError::DanglingPeer(h) if h == rider_handle));
    }
}
