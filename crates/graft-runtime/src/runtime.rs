use std::collections::BTreeSet;

use graft_core::controller::default_sync_packets;
use graft_core::{
    ControllerRef, ConversionRegistry, CoreError, EntityId, EntityKind, EntityRef, Handle,
    HandleId, HandleType, PacketSink, Universe, Value,
};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::scheduler::{DeferredAction, Scheduler};
use crate::session::PacketLog;

/// The top-level tick orchestrator.
///
/// Owns the universe, the deferred-action queue, the packet log and the
/// conversion registry. All substitution, binding and lifecycle operations
/// are methods on the runtime so they can reach every index they repair.
pub struct Runtime {
    pub(crate) universe: Universe,
    pub(crate) scheduler: Scheduler,
    pub(crate) packets: PacketLog,
    pub(crate) conversions: ConversionRegistry,
    pub(crate) config: RuntimeConfig,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("tick", &self.scheduler.current_tick())
            .field("handles", &self.universe.handles().len())
            .field("pending", &self.scheduler.pending())
            .field("packets", &self.packets.len())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Universe::new(), RuntimeConfig::default())
    }
}

impl Runtime {
    /// Create a runtime over `universe`.
    pub fn new(universe: Universe, config: RuntimeConfig) -> Self {
        Self {
            universe,
            scheduler: Scheduler::new(),
            packets: PacketLog::new(),
            conversions: ConversionRegistry::with_defaults(),
            config,
        }
    }

    /// The universe.
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Mutable universe.
    pub fn universe_mut(&mut self) -> &mut Universe {
        &mut self.universe
    }

    /// The deferred-action queue.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable deferred-action queue.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Every packet sent so far.
    pub fn packets(&self) -> &PacketLog {
        &self.packets
    }

    /// Mutable packet log.
    pub fn packets_mut(&mut self) -> &mut PacketLog {
        &mut self.packets
    }

    /// The conversion registry.
    pub fn conversions(&self) -> &ConversionRegistry {
        &self.conversions
    }

    /// Mutable conversion registry.
    pub fn conversions_mut(&mut self) -> &mut ConversionRegistry {
        &mut self.conversions
    }

    /// Runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The current tick.
    pub fn current_tick(&self) -> u64 {
        self.scheduler.current_tick()
    }

    /// Convert `value` into a handle of `target`, or return `default`.
    pub fn convert(&self, target: HandleType, value: &Value, default: Option<Handle>) -> Option<Handle> {
        self.conversions.convert(target, value, &self.universe, default)
    }

    /// Current handle of `entity`, resolved through the conversion registry.
    pub fn resolve(&self, entity: EntityRef) -> RuntimeResult<HandleId> {
        self.conversions
            .convert_as::<HandleId>(&Value::Entity(entity), &self.universe, None)
            .ok_or(RuntimeError::EntityNotFound(entity))
    }

    /// Current handle of `entity`, rejecting wrappers of replaced handles.
    pub(crate) fn resolve_current(&self, entity: EntityRef) -> RuntimeResult<HandleId> {
        let handle = self.resolve(entity)?;
        if !self.universe.handle(handle)?.state.valid {
            return Err(RuntimeError::Retired(entity));
        }
        Ok(handle)
    }

    /// Create an unspawned plain entity of `kind`.
    pub fn create_entity(&mut self, kind: EntityKind) -> EntityRef {
        let entity = self.universe.create_entity(kind);
        debug!(entity = %entity, "entity_created");
        entity
    }

    /// Create an unspawned entity of `kind` that is augmented from the start.
    ///
    /// Custom kinds and kinds without controller support are rejected with
    /// [`RuntimeError::UnsupportedKind`].
    pub fn create_augmented_entity(&mut self, kind: EntityKind) -> RuntimeResult<EntityRef> {
        if !kind.supports_augmentation() {
            return Err(RuntimeError::UnsupportedKind(kind));
        }
        let entity = self.universe.create_augmented_entity(kind);
        debug!(entity = %entity, "augmented_entity_created");
        Ok(entity)
    }

    /// Start sending `entity`'s updates to `observer`, announcing the entity
    /// with a spawn packet.
    ///
    /// Returns `false` when the entity is untracked or already viewed.
    pub fn add_viewer(&mut self, entity: EntityRef, observer: EntityId) -> RuntimeResult<bool> {
        let state = self.universe.state(entity)?;
        let (Some(world), id, kind) = (state.world, state.id, state.kind.clone()) else {
            return Ok(false);
        };
        let added = self
            .universe
            .world_mut(world)?
            .tracker_mut()
            .entry_mut(id)
            .is_some_and(|entry| entry.add_viewer(observer));
        if added {
            self.packets
                .send_packet(observer, graft_core::Packet::SpawnEntity { entity: id, kind });
        }
        Ok(added)
    }

    /// Advance the runtime by one tick.
    ///
    /// Deferred actions due on the tick run first, then behavior controllers,
    /// engine bookkeeping and network sync.
    pub fn tick(&mut self) -> RuntimeResult<()> {
        let tick = self.scheduler.advance();
        self.packets.set_tick(tick);

        for action in self.scheduler.drain_due() {
            self.apply_deferred(action)?;
        }

        let live = self.live_handles();
        let controlled: Vec<(HandleId, ControllerRef)> = live
            .iter()
            .filter_map(|id| {
                let handle = self.universe.handle(*id).ok()?;
                handle.controller().map(|c| (*id, c.clone()))
            })
            .collect();
        for (id, controller) in controlled {
            controller.on_tick(&mut self.universe.handle_mut(id)?.state);
        }

        for id in &live {
            self.universe.handle_mut(*id)?.state.ticks_lived += 1;
        }

        if self.config.network_sync {
            self.sync_network(tick);
        }

        for id in &live {
            let state = &mut self.universe.handle_mut(*id)?.state;
            state.last_position = state.position;
        }
        Ok(())
    }

    /// Advance the runtime by `n` ticks.
    pub fn run(&mut self, n: u64) -> RuntimeResult<()> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }

    /// Handles in every world's entity list that are neither dead nor invalid.
    fn live_handles(&self) -> Vec<HandleId> {
        self.universe
            .worlds()
            .iter()
            .flat_map(|world| world.entity_list().iter().copied())
            .filter(|id| {
                self.universe
                    .handle(*id)
                    .is_ok_and(|handle| handle.state.valid && !handle.state.dead)
            })
            .collect()
    }

    fn sync_network(&mut self, tick: u64) {
        for world in self.universe.worlds() {
            for (_, entry) in world.tracker().iter() {
                let interval = u64::from(entry.params().update_interval.max(1));
                if tick % interval != 0 {
                    continue;
                }
                let Ok(handle) = self.universe.handle(entry.tracked) else {
                    continue;
                };
                let packets = match entry.controller() {
                    Some(controller) => controller.sync_packets(&handle.state, entry),
                    None => default_sync_packets(&handle.state, entry),
                };
                for packet in packets {
                    for viewer in entry.viewers() {
                        self.packets.send_packet(viewer, packet.clone());
                    }
                }
            }
        }
    }

    fn apply_deferred(&mut self, action: DeferredAction) -> RuntimeResult<()> {
        match action {
            DeferredAction::MapEntityId { world, id, handle } => {
                let live = self.universe.handle(handle).is_ok_and(|h| {
                    h.state.valid && h.state.added_to_world && h.state.world == Some(world)
                });
                if live {
                    self.universe.world_mut(world)?.put_entity_id(id, handle);
                    debug!(entity_id = %id, handle = %handle, "deferred_id_mapped");
                } else {
                    debug!(entity_id = %id, handle = %handle, "deferred_id_mapping_dropped");
                }
            }
            DeferredAction::RemountPassenger { vehicle, passenger } => {
                self.remount(vehicle, passenger)?;
            }
        }
        Ok(())
    }

    fn remount(&mut self, vehicle: EntityRef, passenger: EntityRef) -> RuntimeResult<()> {
        let (Ok(vehicle_handle), Ok(passenger_handle)) =
            (self.resolve(vehicle), self.resolve(passenger))
        else {
            debug!(vehicle = %vehicle, passenger = %passenger, "remount_skipped");
            return Ok(());
        };
        let vehicle_state = &self.universe.handle(vehicle_handle)?.state;
        let passenger_state = &self.universe.handle(passenger_handle)?.state;
        if vehicle_state.dead || passenger_state.dead {
            debug!(vehicle = %vehicle, passenger = %passenger, "remount_skipped");
            return Ok(());
        }
        if vehicle_state.world != passenger_state.world {
            warn!(vehicle = %vehicle, passenger = %passenger, "remount_world_mismatch");
            return Ok(());
        }
        if vehicle_state.passenger.is_some() || passenger_state.vehicle.is_some() {
            debug!(vehicle = %vehicle, passenger = %passenger, "remount_slot_taken");
            return Ok(());
        }
        self.attach(passenger_handle, vehicle_handle)?;
        debug!(vehicle = %vehicle, passenger = %passenger, "passenger_remounted");
        Ok(())
    }

    /// Link `passenger` and `vehicle` both ways and notify observers.
    pub(crate) fn attach(&mut self, passenger: HandleId, vehicle: HandleId) -> RuntimeResult<()> {
        let (rider, ridden) = self
            .universe
            .handles_mut()
            .get_pair_mut(passenger, vehicle)
            .ok_or(CoreError::StaleHandle(passenger))?;
        rider.state.vehicle = Some(vehicle);
        ridden.state.passenger = Some(passenger);
        self.set_tracked_vehicle(passenger, Some(vehicle))?;
        self.notify_attach(passenger, Some(vehicle))
    }

    /// Clear `passenger`'s vehicle link and the vehicle's passenger link.
    pub(crate) fn detach(&mut self, passenger: HandleId) -> RuntimeResult<()> {
        let vehicle = self.universe.handle_mut(passenger)?.state.vehicle.take();
        if let Some(vehicle) = vehicle {
            if let Ok(ridden) = self.universe.handle_mut(vehicle) {
                if ridden.state.passenger == Some(passenger) {
                    ridden.state.passenger = None;
                }
            }
        }
        self.set_tracked_vehicle(passenger, None)?;
        self.notify_attach(passenger, None)
    }

    fn set_tracked_vehicle(
        &mut self,
        passenger: HandleId,
        vehicle: Option<HandleId>,
    ) -> RuntimeResult<()> {
        let state = &self.universe.handle(passenger)?.state;
        let (Some(world), id) = (state.world, state.id) else {
            return Ok(());
        };
        if let Some(entry) = self.universe.world_mut(world)?.tracker_mut().entry_mut(id) {
            entry.vehicle = vehicle;
        }
        Ok(())
    }

    /// Tell observers that `passenger` now rides `vehicle`, or nothing.
    ///
    /// A player passenger always hears about its own attachment; viewers of
    /// the passenger's tracking entry are told as well.
    pub(crate) fn notify_attach(
        &mut self,
        passenger: HandleId,
        vehicle: Option<HandleId>,
    ) -> RuntimeResult<()> {
        let state = &self.universe.handle(passenger)?.state;
        let passenger_id = state.id;
        let mut recipients = BTreeSet::new();
        if state.kind == EntityKind::Player {
            recipients.insert(passenger_id);
        }
        if let Some(world) = state.world {
            if let Some(entry) = self.universe.world(world)?.tracker().entry(passenger_id) {
                recipients.extend(entry.viewers());
            }
        }
        let vehicle_id = match vehicle {
            Some(vehicle) => Some(self.universe.handle(vehicle)?.state.id),
            None => None,
        };
        for observer in recipients {
            self.packets.send_packet(
                observer,
                graft_core::Packet::AttachEntity {
                    passenger: passenger_id,
                    vehicle: vehicle_id,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::{EntityController, Position, controller::ControllerBinding};
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Spinner {
        binding: ControllerBinding,
    }

    impl EntityController for Spinner {
        fn binding(&self) -> &ControllerBinding {
            &self.binding
        }

        fn on_tick(&self, state: &mut graft_core::EntityState) {
            state.position.yaw += 10.0;
        }
    }

    fn spawned(runtime: &mut Runtime, kind: EntityKind) -> EntityRef {
        let world = match runtime.universe().world_by_name("overworld") {
            Some(world) => world.id(),
            None => runtime.universe_mut().create_world("overworld"),
        };
        let entity = runtime.create_entity(kind);
        let location = graft_core::Location::new(world, 8.0, 64.0, 8.0);
        runtime.spawn(entity, location).unwrap();
        entity
    }

    #[test]
    fn resolve_unknown_wrapper_is_not_found() {
        let mut runtime = Runtime::default();
        let entity = runtime.create_entity(EntityKind::Pig);
        let handle = runtime.resolve(entity).unwrap();
        runtime.universe_mut().handles_mut().remove(handle);
        assert!(matches!(
            runtime.resolve(entity),
            Err(RuntimeError::EntityNotFound(_))
        ));
    }

    #[test]
    fn augmented_entities_can_be_created_directly() {
        let mut runtime = Runtime::default();
        let cart = runtime.create_augmented_entity(EntityKind::Minecart).unwrap();
        assert!(runtime.is_augmented(cart).unwrap());
        let handle = runtime.resolve(cart).unwrap();
        assert_eq!(runtime.augment(cart).unwrap(), handle);

        assert!(matches!(
            runtime.create_augmented_entity(EntityKind::Player),
            Err(RuntimeError::UnsupportedKind(EntityKind::Player))
        ));
        assert!(matches!(
            runtime.create_augmented_entity(EntityKind::Custom("golem".into())),
            Err(RuntimeError::UnsupportedKind(_))
        ));
    }

    #[test]
    fn tick_runs_controllers_and_ages_entities() {
        let mut runtime = Runtime::default();
        let entity = spawned(&mut runtime, EntityKind::Pig);
        let spinner: ControllerRef = Rc::new(Spinner::default());
        runtime.set_controller(entity, Some(spinner)).unwrap();

        runtime.run(3).unwrap();
        let state = runtime.universe().state(entity).unwrap();
        assert_eq!(state.ticks_lived, 3);
        assert_eq!(state.position.yaw, 30.0);
        assert_eq!(runtime.current_tick(), 3);
    }

    #[test]
    fn moving_entities_sync_to_viewers() {
        let mut runtime = Runtime::default();
        let entity = spawned(&mut runtime, EntityKind::Pig);
        runtime.run(2).unwrap();
        assert!(runtime.add_viewer(entity, EntityId(500)).unwrap());
        assert!(!runtime.add_viewer(entity, EntityId(500)).unwrap());

        let handle = runtime.resolve(entity).unwrap();
        runtime
            .universe_mut()
            .move_entity(handle, Position::new(9.0, 64.0, 8.0))
            .unwrap();
        // Pigs sync every third tick.
        runtime.tick().unwrap();
        let sent = runtime.packets().sent_to(EntityId(500));
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            sent[0].packet,
            graft_core::Packet::SpawnEntity {
                kind: EntityKind::Pig,
                ..
            }
        ));
        assert!(matches!(
            sent[1].packet,
            graft_core::Packet::EntityTeleport { .. }
        ));
    }

    #[test]
    fn network_sync_can_be_disabled() {
        let mut runtime = Runtime::new(
            Universe::new(),
            RuntimeConfig::default().with_network_sync(false),
        );
        let entity = spawned(&mut runtime, EntityKind::Pig);
        runtime.add_viewer(entity, EntityId(500)).unwrap();
        let handle = runtime.resolve(entity).unwrap();
        runtime
            .universe_mut()
            .move_entity(handle, Position::new(9.0, 64.0, 8.0))
            .unwrap();
        runtime.run(3).unwrap();
        assert!(runtime.packets().sent_at_tick(3).is_empty());
        assert_eq!(runtime.packets().len(), 1);
    }
}
