//! Pluggable behavior and network controllers.
//!
//! A controller is bound to at most one entity at a time. The binding is a
//! two-way link: the entity's handle (or tracking entry) holds the controller,
//! and the controller's binding cell holds the entity. Both sides are cleared
//! together by the runtime.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::entity::{EntityId, EntityRef, EntityState};
use crate::packet::Packet;
use crate::tracker::TrackingEntry;

/// Controller side of a behavior binding.
#[derive(Debug, Default)]
pub struct ControllerBinding {
    entity: Cell<Option<EntityRef>>,
}

impl ControllerBinding {
    /// An unbound cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity the controller is bound to.
    pub fn entity(&self) -> Option<EntityRef> {
        self.entity.get()
    }

    /// Point the binding at `entity`, returning the previous entity.
    pub fn bind(&self, entity: Option<EntityRef>) -> Option<EntityRef> {
        self.entity.replace(entity)
    }
}

/// Strategy governing an entity's per-tick logic.
pub trait EntityController: fmt::Debug {
    /// The controller's binding cell.
    fn binding(&self) -> &ControllerBinding;

    /// Entity the controller is bound to.
    fn entity(&self) -> Option<EntityRef> {
        self.binding().entity()
    }

    /// The entity became live in its world.
    fn on_attached(&self) {}

    /// The controller was unbound from its entity.
    fn on_detached(&self) {}

    /// Per-tick logic, run with exclusive access to the entity's state.
    fn on_tick(&self, _state: &mut EntityState) {}

    /// Whether this is the pass-through controller.
    fn is_default(&self) -> bool {
        false
    }
}

/// Shared behavior controller.
pub type ControllerRef = Rc<dyn EntityController>;

/// Pass-through behavior: the engine's own logic runs unchanged.
#[derive(Debug, Default)]
pub struct DefaultEntityController {
    binding: ControllerBinding,
}

impl DefaultEntityController {
    /// An unbound pass-through controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// An unbound pass-through controller, ready to share.
    pub fn shared() -> ControllerRef {
        Rc::new(Self::new())
    }
}

impl EntityController for DefaultEntityController {
    fn binding(&self) -> &ControllerBinding {
        &self.binding
    }

    fn is_default(&self) -> bool {
        true
    }
}

/// Controller side of a network binding.
#[derive(Debug, Default)]
pub struct NetworkBinding {
    entity: Cell<Option<EntityRef>>,
    entry: Cell<Option<EntityId>>,
}

impl NetworkBinding {
    /// An unbound cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity the controller is bound to.
    pub fn entity(&self) -> Option<EntityRef> {
        self.entity.get()
    }

    /// Key of the tracking entry the controller is bound to.
    pub fn entry(&self) -> Option<EntityId> {
        self.entry.get()
    }

    /// Bind to `entity` and its tracking entry, or clear both with `None`.
    pub fn bind(&self, target: Option<(EntityRef, EntityId)>) {
        self.entity.set(target.map(|(entity, _)| entity));
        self.entry.set(target.map(|(_, entry)| entry));
    }
}

/// Strategy governing what remote observers learn about an entity.
pub trait NetworkController: fmt::Debug {
    /// The controller's binding cell.
    fn binding(&self) -> &NetworkBinding;

    /// Entity the controller is bound to.
    fn entity(&self) -> Option<EntityRef> {
        self.binding().entity()
    }

    /// The entity became visible to the network layer.
    fn on_attached(&self) {}

    /// Packets sent to every viewer on a sync tick.
    fn sync_packets(&self, state: &EntityState, entry: &TrackingEntry) -> Vec<Packet> {
        default_sync_packets(state, entry)
    }

    /// Whether this is the pass-through controller.
    fn is_default(&self) -> bool {
        false
    }
}

/// Shared network controller.
pub type NetworkControllerRef = Rc<dyn NetworkController>;

/// What the engine sends on its own: the position of mobile entities.
pub fn default_sync_packets(state: &EntityState, entry: &TrackingEntry) -> Vec<Packet> {
    if !entry.params().is_mobile || state.position == state.last_position {
        return Vec::new();
    }
    vec![Packet::EntityTeleport {
        entity: state.id,
        position: state.position,
    }]
}

/// Pass-through network behavior.
#[derive(Debug, Default)]
pub struct DefaultNetworkController {
    binding: NetworkBinding,
}

impl DefaultNetworkController {
    /// An unbound pass-through controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// An unbound pass-through controller, ready to share.
    pub fn shared() -> NetworkControllerRef {
        Rc::new(Self::new())
    }
}

impl NetworkController for DefaultNetworkController {
    fn binding(&self) -> &NetworkBinding {
        &self.binding
    }

    fn is_default(&self) -> bool {
        true
    }
}
