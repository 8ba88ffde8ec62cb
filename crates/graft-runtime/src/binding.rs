//! Behavior and network controller binding.

use std::rc::Rc;

use graft_core::{
    ControllerRef, DefaultEntityController, DefaultNetworkController, EntityRef,
    NetworkControllerRef, TrackingEntry,
};
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::Runtime;

impl Runtime {
    /// The behavior controller of `entity`.
    ///
    /// Entities without a bound controller get a fresh default controller
    /// bound to them; the entity itself does not hold it.
    pub fn controller(&self, entity: EntityRef) -> RuntimeResult<ControllerRef> {
        let handle = self.resolve(entity)?;
        if let Some(controller) = self.universe.handle(handle)?.controller() {
            return Ok(controller.clone());
        }
        let controller = DefaultEntityController::shared();
        controller.binding().bind(Some(entity));
        Ok(controller)
    }

    /// Bind `controller` to `entity`, augmenting the entity first.
    ///
    /// `None` binds a default controller. The previous controller is unbound;
    /// a controller still bound to another entity is taken away from it.
    pub fn set_controller(
        &mut self,
        entity: EntityRef,
        controller: Option<ControllerRef>,
    ) -> RuntimeResult<()> {
        let handle = self.augment(entity)?;
        let controller = controller.unwrap_or_else(DefaultEntityController::shared);
        let target = self.universe.handle(handle)?;
        let kind = target.state.kind.clone();
        let current = target.controller().cloned();
        if current.as_ref().is_some_and(|c| Rc::ptr_eq(c, &controller)) {
            return Ok(());
        }

        if let Some(other) = controller.entity().filter(|other| *other != entity) {
            self.release_controller(other, &controller)?;
        }
        if let Some(current) = current {
            current.binding().bind(None);
            current.on_detached();
        }
        self.universe
            .handle_mut(handle)?
            .set_controller(Some(controller.clone()))
            .map_err(|_| RuntimeError::NoControllerSupport { entity, kind })?;
        controller.binding().bind(Some(entity));
        debug!(entity = %entity, default = controller.is_default(), "controller_bound");
        Ok(())
    }

    /// Clear `other`'s handle slot if it still holds `controller`.
    fn release_controller(
        &mut self,
        other: EntityRef,
        controller: &ControllerRef,
    ) -> RuntimeResult<()> {
        let Ok(handle) = self.resolve(other) else {
            return Ok(());
        };
        let target = self.universe.handle_mut(handle)?;
        if target.controller().is_some_and(|c| Rc::ptr_eq(c, controller))
            && target.set_controller(None).is_ok()
        {
            controller.binding().bind(None);
            controller.on_detached();
            debug!(entity = %other, "controller_released");
        }
        Ok(())
    }

    /// The network controller of `entity`.
    ///
    /// A custom tracking entry yields its controller; a plain entry yields a
    /// fresh default bound to the entity and entry. Untracked entities, and
    /// entities without a world, have none.
    pub fn network_controller(
        &self,
        entity: EntityRef,
    ) -> RuntimeResult<Option<NetworkControllerRef>> {
        let handle = self.resolve(entity)?;
        let state = &self.universe.handle(handle)?.state;
        let Some(world) = state.world else {
            return Ok(None);
        };
        let id = state.id;
        let Some(entry) = self.universe.world(world)?.tracker().entry(id) else {
            return Ok(None);
        };
        if let Some(controller) = entry.controller() {
            return Ok(Some(controller.clone()));
        }
        let controller = DefaultNetworkController::shared();
        controller.binding().bind(Some((entity, id)));
        Ok(Some(controller))
    }

    /// Bind `controller` to `entity`'s tracking entry.
    ///
    /// `None` stops tracking. A default controller keeps (or creates) a plain
    /// entry; a custom controller gets a new entry that inherits the viewers
    /// and vehicle of the old one.
    pub fn set_network_controller(
        &mut self,
        entity: EntityRef,
        controller: Option<NetworkControllerRef>,
    ) -> RuntimeResult<()> {
        let handle = self.resolve(entity)?;
        let state = &self.universe.handle(handle)?.state;
        let world = state.world.ok_or(RuntimeError::NoWorld(entity))?;
        let id = state.id;
        let params = state.kind.tracking();

        let old = self.network_controller(entity)?;
        match (&old, &controller) {
            (Some(old), Some(new)) if Rc::ptr_eq(old, new) => return Ok(()),
            (None, None) => return Ok(()),
            _ => {}
        }
        if let Some(old) = old {
            old.binding().bind(None);
        }

        let tracker = self.universe.world_mut(world)?.tracker_mut();
        let Some(controller) = controller else {
            tracker.stop_tracking(id);
            info!(entity = %entity, "tracking_stopped");
            return Ok(());
        };
        if controller.is_default() {
            match tracker.entry_mut(id) {
                Some(entry) => {
                    entry.take_controller();
                }
                None => {
                    tracker.set_entry(id, TrackingEntry::with_params(handle, params));
                }
            }
        } else {
            let previous = tracker.entry(id);
            let params = previous.map_or(params, |entry| entry.params());
            let entry = TrackingEntry::wrapping(handle, params, controller.clone(), previous);
            tracker.set_entry(id, entry);
        }
        controller.binding().bind(Some((entity, id)));
        debug!(entity = %entity, default = controller.is_default(), "network_controller_bound");
        Ok(())
    }
}
