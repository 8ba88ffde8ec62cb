//! Spawn, teleport, despawn and mount protocols.

use std::fmt;

use graft_core::{ChunkCoord, EntityRef, Location, NetworkControllerRef, Packet, PacketSink};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::Runtime;
use crate::scheduler::DeferredAction;

/// Why an entity is being teleported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeleportCause {
    /// Requested through the API.
    #[default]
    Plugin,
    /// Issued by a command.
    Command,
    /// Following the vehicle it rode.
    Passenger,
    /// A spawn request for an entity that was already live.
    Respawn,
}

impl fmt::Display for TeleportCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin => write!(f, "plugin"),
            Self::Command => write!(f, "command"),
            Self::Passenger => write!(f, "passenger"),
            Self::Respawn => write!(f, "respawn"),
        }
    }
}

impl Runtime {
    // -----------------------------------------------------------------------
    // Spawning
    // -----------------------------------------------------------------------

    /// Spawn `entity` at `location`.
    ///
    /// An entity that is already live is teleported instead and `false` is
    /// returned. A despawned entity is revived.
    pub fn spawn(&mut self, entity: EntityRef, location: Location) -> RuntimeResult<bool> {
        self.spawn_inner(entity, location, None)
    }

    /// Spawn `entity` at `location` with `controller` governing its network
    /// presence.
    pub fn spawn_with(
        &mut self,
        entity: EntityRef,
        location: Location,
        controller: NetworkControllerRef,
    ) -> RuntimeResult<bool> {
        self.spawn_inner(entity, location, Some(controller))
    }

    fn spawn_inner(
        &mut self,
        entity: EntityRef,
        location: Location,
        network: Option<NetworkControllerRef>,
    ) -> RuntimeResult<bool> {
        let handle = self.resolve_current(entity)?;
        if self.universe.handle(handle)?.state.added_to_world {
            self.teleport(entity, location, TeleportCause::Respawn)?;
            if network.is_some() {
                self.set_network_controller(entity, network)?;
            }
            return Ok(false);
        }

        self.universe.world(location.world)?;
        let state = &mut self.universe.handle_mut(handle)?.state;
        state.dead = false;
        state.world = Some(location.world);
        state.position = location.position;
        state.last_position = location.position;
        self.universe.add_entity_to_world(handle)?;
        if network.is_some() {
            self.set_network_controller(entity, network)?;
        }

        self.controller(entity)?.on_attached();
        if let Some(network) = self.network_controller(entity)? {
            network.on_attached();
        }
        info!(entity = %entity, world = %location.world, "entity_spawned");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Teleporting
    // -----------------------------------------------------------------------

    /// Move `entity` to `location`, possibly into another world.
    ///
    /// Vehicle and passenger are detached first. The passenger follows: in the
    /// same world it is re-attached right away; across worlds it is teleported
    /// too and remounted `passenger_remount_delay` ticks later. Dead entities
    /// are not moved and `false` is returned.
    pub fn teleport(
        &mut self,
        entity: EntityRef,
        location: Location,
        cause: TeleportCause,
    ) -> RuntimeResult<bool> {
        let handle = self.resolve(entity)?;
        let state = &self.universe.handle(handle)?.state;
        if state.dead {
            debug!(entity = %entity, "teleport_rejected_dead");
            return Ok(false);
        }
        let spawned = state.added_to_world;
        let changed_world = state.world != Some(location.world);
        let (vehicle, passenger) = (state.vehicle, state.passenger);

        let radius = self.config.chunk_preload_radius;
        let loaded = self
            .universe
            .world_mut(location.world)?
            .load_chunks_around(ChunkCoord::containing(&location.position), radius);
        debug!(entity = %entity, loaded, "destination_chunks_loaded");

        let custom = self
            .network_controller(entity)?
            .filter(|controller| !controller.is_default());
        let rider = passenger
            .map(|passenger| self.universe.wrapper_of(passenger))
            .transpose()?;
        if vehicle.is_some() {
            self.detach(handle)?;
        }
        if let Some(passenger) = passenger {
            self.detach(passenger)?;
        }

        if !spawned {
            let state = &mut self.universe.handle_mut(handle)?.state;
            state.world = Some(location.world);
            state.position = location.position;
        } else if !changed_world {
            self.universe.move_entity(handle, location.position)?;
        } else {
            self.universe.remove_entity_from_world(handle)?;
            let state = &mut self.universe.handle_mut(handle)?.state;
            state.dead = false;
            state.world = Some(location.world);
            state.position = location.position;
            state.last_position = location.position;
            self.universe.add_entity_to_world(handle)?;
            if custom.is_some() {
                self.set_network_controller(entity, custom)?;
            }
        }
        info!(
            entity = %entity,
            world = %location.world,
            cause = %cause,
            changed_world,
            "entity_teleported"
        );

        if let Some(rider) = rider {
            if changed_world {
                self.teleport(rider, location, TeleportCause::Passenger)?;
                self.scheduler.run_later(
                    self.config.passenger_remount_delay,
                    DeferredAction::RemountPassenger {
                        vehicle: entity,
                        passenger: rider,
                    },
                );
                debug!(vehicle = %entity, passenger = %rider, "passenger_remount_scheduled");
            } else {
                let rider_handle = self.resolve(rider)?;
                self.universe.move_entity(rider_handle, location.position)?;
                self.attach(rider_handle, handle)?;
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Despawning and mounting
    // -----------------------------------------------------------------------

    /// Remove `entity` from its world.
    ///
    /// Both controllers are unbound, attachments are broken and viewers are
    /// told to destroy the entity. Returns `false` when it was not live.
    pub fn despawn(&mut self, entity: EntityRef) -> RuntimeResult<bool> {
        let handle = self.resolve(entity)?;
        if !self.universe.handle(handle)?.state.added_to_world {
            return Ok(false);
        }

        if let Ok(Some(previous)) = self.universe.handle_mut(handle)?.set_controller(None) {
            previous.binding().bind(None);
            previous.on_detached();
        }
        if let Some(network) = self.network_controller(entity)? {
            network.binding().bind(None);
        }

        let state = &self.universe.handle(handle)?.state;
        let (vehicle, passenger) = (state.vehicle, state.passenger);
        if vehicle.is_some() {
            self.detach(handle)?;
        }
        if let Some(passenger) = passenger {
            self.detach(passenger)?;
        }

        let state = &self.universe.handle(handle)?.state;
        let id = state.id;
        let world_id = state.world.ok_or(RuntimeError::NoWorld(entity))?;
        let viewers: Vec<_> = self
            .universe
            .world(world_id)?
            .tracker()
            .entry(id)
            .map(|entry| entry.viewers().collect())
            .unwrap_or_default();
        self.universe.remove_entity_from_world(handle)?;
        self.universe.world_mut(world_id)?.tracker_mut().stop_tracking(id);
        self.universe.handle_mut(handle)?.state.dead = true;

        for viewer in viewers {
            self.packets
                .send_packet(viewer, Packet::DestroyEntity { entity: id });
        }
        info!(entity = %entity, "entity_despawned");
        Ok(true)
    }

    /// Make `passenger` ride `vehicle`.
    ///
    /// Existing attachments of either side are broken first. Mounting onto
    /// oneself, or onto anything already riding `passenger`, is rejected.
    pub fn mount(&mut self, passenger: EntityRef, vehicle: EntityRef) -> RuntimeResult<()> {
        let rider = self.resolve_current(passenger)?;
        let ridden = self.resolve_current(vehicle)?;

        let mut cursor = Some(ridden);
        while let Some(current) = cursor {
            if current == rider {
                return Err(RuntimeError::AttachmentCycle { passenger, vehicle });
            }
            cursor = self.universe.handle(current)?.state.vehicle;
        }

        if self.universe.handle(rider)?.state.vehicle.is_some() {
            self.detach(rider)?;
        }
        if let Some(previous) = self.universe.handle(ridden)?.state.passenger {
            self.detach(previous)?;
        }
        self.attach(rider, ridden)?;
        debug!(passenger = %passenger, vehicle = %vehicle, "entity_mounted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use graft_core::controller::{ControllerBinding, NetworkBinding};
    use graft_core::{
        ControllerRef, EntityController, EntityId, EntityKind, NetworkController, WorldId,
    };

    type Journal = Rc<RefCell<Vec<&'static str>>>;

    #[derive(Debug, Default)]
    struct Behavior {
        binding: ControllerBinding,
        journal: Journal,
    }

    impl EntityController for Behavior {
        fn binding(&self) -> &ControllerBinding {
            &self.binding
        }

        fn on_attached(&self) {
            self.journal.borrow_mut().push("behavior_attached");
        }

        fn on_detached(&self) {
            self.journal.borrow_mut().push("behavior_detached");
        }
    }

    #[derive(Debug, Default)]
    struct Network {
        binding: NetworkBinding,
        journal: Journal,
    }

    impl NetworkController for Network {
        fn binding(&self) -> &NetworkBinding {
            &self.binding
        }

        fn on_attached(&self) {
            self.journal.borrow_mut().push("network_attached");
        }
    }

    fn two_worlds() -> (Runtime, WorldId, WorldId) {
        let mut runtime = Runtime::default();
        let overworld = runtime.universe_mut().create_world("overworld");
        let nether = runtime.universe_mut().create_world("nether");
        (runtime, overworld, nether)
    }

    #[test]
    fn spawn_records_location_and_indexes() {
        let (mut runtime, world, _) = two_worlds();
        let entity = runtime.create_entity(EntityKind::Pig);
        assert!(runtime.spawn(entity, Location::new(world, 20.0, 64.0, -3.0)).unwrap());

        let handle = runtime.resolve(entity).unwrap();
        let state = runtime.universe().state(entity).unwrap();
        assert!(state.added_to_world);
        assert_eq!(state.last_position, state.position);
        let world = runtime.universe().world(world).unwrap();
        assert_eq!(world.entry_by_id(state.id), Some(handle));
        assert_eq!(world.entity_list(), &[handle]);
        assert!(world.chunk(ChunkCoord::new(1, -1)).unwrap().contains(handle));
        assert!(world.tracker().is_tracking(state.id));
    }

    #[test]
    fn spawning_twice_teleports() {
        let (mut runtime, world, _) = two_worlds();
        let entity = runtime.create_entity(EntityKind::Zombie);
        runtime.spawn(entity, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        let again = runtime.spawn(entity, Location::new(world, 40.0, 64.0, 0.0)).unwrap();
        assert!(!again);
        assert_eq!(runtime.universe().state(entity).unwrap().position.x, 40.0);
    }

    #[test]
    fn spawn_runs_attach_hooks_in_order() {
        let (mut runtime, world, _) = two_worlds();
        let journal = Journal::default();
        let entity = runtime.create_entity(EntityKind::Minecart);
        let behavior: ControllerRef = Rc::new(Behavior {
            journal: journal.clone(),
            ..Behavior::default()
        });
        runtime.set_controller(entity, Some(behavior)).unwrap();
        let network: NetworkControllerRef = Rc::new(Network {
            journal: journal.clone(),
            ..Network::default()
        });

        runtime
            .spawn_with(entity, Location::new(world, 0.0, 64.0, 0.0), network.clone())
            .unwrap();
        assert_eq!(*journal.borrow(), vec!["behavior_attached", "network_attached"]);
        assert_eq!(network.entity(), Some(entity));
    }

    #[test]
    fn despawned_entity_respawns_alive() {
        let (mut runtime, world, _) = two_worlds();
        let entity = runtime.create_entity(EntityKind::Pig);
        runtime.spawn(entity, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        runtime.despawn(entity).unwrap();
        assert!(runtime.spawn(entity, Location::new(world, 5.0, 64.0, 5.0)).unwrap());

        runtime.run(3).unwrap();
        let state = runtime.universe().state(entity).unwrap();
        assert!(!state.dead);
        assert_eq!(state.ticks_lived, 3);
        let moved = runtime
            .teleport(entity, Location::new(world, 50.0, 64.0, 5.0), TeleportCause::default())
            .unwrap();
        assert!(moved);
    }

    #[test]
    fn replaced_handles_cannot_spawn_or_mount() {
        let (mut runtime, world, _) = two_worlds();
        let cart = runtime.create_entity(EntityKind::Minecart);
        let pig = runtime.create_entity(EntityKind::Pig);
        let old = runtime.resolve(cart).unwrap();
        runtime.augment(cart).unwrap();
        let orphan = runtime.universe().handle(old).unwrap().state.wrapper.unwrap();

        assert!(matches!(
            runtime.spawn(orphan, Location::new(world, 0.0, 64.0, 0.0)),
            Err(RuntimeError::Retired(_))
        ));
        assert!(matches!(
            runtime.mount(pig, orphan),
            Err(RuntimeError::Retired(_))
        ));
    }

    #[test]
    fn dead_entities_do_not_teleport() {
        let (mut runtime, world, _) = two_worlds();
        let entity = runtime.create_entity(EntityKind::Arrow);
        runtime.spawn(entity, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        runtime.universe_mut().state_mut(entity).unwrap().dead = true;
        let moved = runtime
            .teleport(entity, Location::new(world, 90.0, 64.0, 0.0), TeleportCause::Command)
            .unwrap();
        assert!(!moved);
        assert_eq!(runtime.universe().state(entity).unwrap().position.x, 0.0);
    }

    #[test]
    fn same_world_teleport_moves_between_chunks_and_preloads() {
        let (mut runtime, world, _) = two_worlds();
        let entity = runtime.create_entity(EntityKind::Pig);
        runtime.spawn(entity, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        runtime
            .teleport(entity, Location::new(world, 160.0, 64.0, 0.0), TeleportCause::default())
            .unwrap();

        let handle = runtime.resolve(entity).unwrap();
        let world = runtime.universe().world(world).unwrap();
        assert!(!world.chunk(ChunkCoord::new(0, 0)).unwrap().contains(handle));
        assert!(world.chunk(ChunkCoord::new(10, 0)).unwrap().contains(handle));
        assert!(world.is_chunk_loaded(ChunkCoord::new(13, 3)));
    }

    #[test]
    fn same_world_teleport_keeps_passenger() {
        let (mut runtime, world, _) = two_worlds();
        let cart = runtime.create_entity(EntityKind::Minecart);
        let rider = runtime.create_entity(EntityKind::Zombie);
        runtime.spawn(cart, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        runtime.spawn(rider, Location::new(world, 0.0, 65.0, 0.0)).unwrap();
        runtime.mount(rider, cart).unwrap();

        runtime
            .teleport(cart, Location::new(world, 30.0, 64.0, 30.0), TeleportCause::default())
            .unwrap();
        let cart_handle = runtime.resolve(cart).unwrap();
        let rider_state = runtime.universe().state(rider).unwrap();
        assert_eq!(rider_state.vehicle, Some(cart_handle));
        assert_eq!(rider_state.position.x, 30.0);
        assert_eq!(runtime.scheduler().pending(), 0);
    }

    #[test]
    fn cross_world_teleport_moves_between_worlds() {
        let (mut runtime, overworld, nether) = two_worlds();
        let entity = runtime.create_entity(EntityKind::Item);
        runtime.spawn(entity, Location::new(overworld, 0.0, 64.0, 0.0)).unwrap();
        runtime
            .teleport(entity, Location::new(nether, 0.0, 70.0, 0.0), TeleportCause::default())
            .unwrap();

        let handle = runtime.resolve(entity).unwrap();
        let state = runtime.universe().state(entity).unwrap();
        assert_eq!(state.world, Some(nether));
        assert!(state.added_to_world && !state.dead);
        assert!(runtime.universe().world(overworld).unwrap().entity_list().is_empty());
        let nether = runtime.universe().world(nether).unwrap();
        assert_eq!(nether.entry_by_id(state.id), Some(handle));
        assert!(nether.tracker().is_tracking(state.id));
    }

    #[test]
    fn mount_rejects_cycles() {
        let (mut runtime, world, _) = two_worlds();
        let cart = runtime.create_entity(EntityKind::Minecart);
        let pig = runtime.create_entity(EntityKind::Pig);
        runtime.spawn(cart, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        runtime.spawn(pig, Location::new(world, 0.0, 64.0, 0.0)).unwrap();

        assert!(matches!(
            runtime.mount(pig, pig),
            Err(RuntimeError::AttachmentCycle { .. })
        ));
        runtime.mount(pig, cart).unwrap();
        assert!(matches!(
            runtime.mount(cart, pig),
            Err(RuntimeError::AttachmentCycle { .. })
        ));
    }

    #[test]
    fn mount_notifies_player_passenger() {
        let (mut runtime, world, _) = two_worlds();
        let pig = runtime.create_entity(EntityKind::Pig);
        let player = runtime.create_entity(EntityKind::Player);
        runtime.spawn(pig, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        runtime.spawn(player, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        runtime.mount(player, pig).unwrap();

        let player_id = runtime.universe().state(player).unwrap().id;
        let pig_id = runtime.universe().state(pig).unwrap().id;
        let sent = runtime.packets().sent_to(player_id);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].packet,
            Packet::AttachEntity {
                passenger: player_id,
                vehicle: Some(pig_id),
            }
        );
    }

    #[test]
    fn despawn_unbinds_and_destroys() {
        let (mut runtime, world, _) = two_worlds();
        let journal = Journal::default();
        let entity = runtime.create_entity(EntityKind::Zombie);
        runtime.spawn(entity, Location::new(world, 0.0, 64.0, 0.0)).unwrap();
        let behavior: ControllerRef = Rc::new(Behavior {
            journal: journal.clone(),
            ..Behavior::default()
        });
        runtime.set_controller(entity, Some(behavior.clone())).unwrap();
        runtime.add_viewer(entity, EntityId(900)).unwrap();

        assert!(runtime.despawn(entity).unwrap());
        assert_eq!(behavior.entity(), None);
        assert_eq!(*journal.borrow(), vec!["behavior_detached"]);

        let state = runtime.universe().state(entity).unwrap();
        assert!(state.dead && !state.added_to_world);
        let world = runtime.universe().world(world).unwrap();
        assert!(!world.tracker().is_tracking(state.id));
        assert_eq!(
            runtime.packets().sent_to(EntityId(900))[1].packet,
            Packet::DestroyEntity { entity: state.id }
        );
        assert!(!runtime.despawn(entity).unwrap());
    }
}
