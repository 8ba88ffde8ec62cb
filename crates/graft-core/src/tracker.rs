use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::arena::HandleId;
use crate::controller::NetworkControllerRef;
use crate::entity::EntityId;

/// How far and how often an entity is synchronised to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingParams {
    /// Block distance within which observers see the entity.
    pub view_distance: u32,
    /// Ticks between position updates.
    pub update_interval: u32,
    /// Whether velocity updates are sent.
    pub is_mobile: bool,
}

impl TrackingParams {
    /// Bundle the three tracking parameters.
    pub fn new(view_distance: u32, update_interval: u32, is_mobile: bool) -> Self {
        Self {
            view_distance,
            update_interval,
            is_mobile,
        }
    }
}

/// The network layer's per-entity bookkeeping record.
#[derive(Debug, Clone)]
pub struct TrackingEntry {
    /// Handle the entry reports on.
    pub tracked: HandleId,
    /// Handle of the entity's vehicle as last sent to observers.
    pub vehicle: Option<HandleId>,
    params: TrackingParams,
    controller: Option<NetworkControllerRef>,
    viewers: BTreeSet<EntityId>,
}

impl TrackingEntry {
    /// A plain entry driven by the engine's own network logic.
    pub fn create(
        tracked: HandleId,
        view_distance: u32,
        update_interval: u32,
        is_mobile: bool,
    ) -> Self {
        Self::with_params(
            tracked,
            TrackingParams::new(view_distance, update_interval, is_mobile),
        )
    }

    /// A plain entry with bundled parameters.
    pub fn with_params(tracked: HandleId, params: TrackingParams) -> Self {
        Self {
            tracked,
            vehicle: None,
            params,
            controller: None,
            viewers: BTreeSet::new(),
        }
    }

    /// An entry that delegates to a custom controller.
    ///
    /// Viewers and the vehicle reference carry over from `previous` so
    /// observers do not see the entity vanish and reappear.
    pub fn wrapping(
        tracked: HandleId,
        params: TrackingParams,
        controller: NetworkControllerRef,
        previous: Option<&TrackingEntry>,
    ) -> Self {
        let mut entry = Self::with_params(tracked, params);
        if let Some(previous) = previous {
            entry.vehicle = previous.vehicle;
            entry.viewers = previous.viewers.clone();
        }
        entry.controller = Some(controller);
        entry
    }

    /// Tracking parameters.
    pub fn params(&self) -> TrackingParams {
        self.params
    }

    /// Custom controller, `None` for plain entries.
    pub fn controller(&self) -> Option<&NetworkControllerRef> {
        self.controller.as_ref()
    }

    /// Strip the custom controller, turning this into a plain entry.
    pub fn take_controller(&mut self) -> Option<NetworkControllerRef> {
        self.controller.take()
    }

    /// Whether the entry delegates to a custom controller.
    pub fn is_custom(&self) -> bool {
        self.controller.is_some()
    }

    /// Observers currently receiving updates.
    pub fn viewers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.viewers.iter().copied()
    }

    /// Start sending updates to `observer`.
    pub fn add_viewer(&mut self, observer: EntityId) -> bool {
        self.viewers.insert(observer)
    }

    /// Stop sending updates to `observer`.
    pub fn remove_viewer(&mut self, observer: EntityId) -> bool {
        self.viewers.remove(&observer)
    }
}

/// Tracking entries of one world, keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct EntityTracker {
    entries: HashMap<EntityId, TrackingEntry>,
}

impl EntityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `id`.
    pub fn entry(&self, id: EntityId) -> Option<&TrackingEntry> {
        self.entries.get(&id)
    }

    /// Mutable entry for `id`.
    pub fn entry_mut(&mut self, id: EntityId) -> Option<&mut TrackingEntry> {
        self.entries.get_mut(&id)
    }

    /// Install `entry` for `id`, returning the replaced one.
    pub fn set_entry(&mut self, id: EntityId, entry: TrackingEntry) -> Option<TrackingEntry> {
        self.entries.insert(id, entry)
    }

    /// Drop the entry for `id`.
    pub fn stop_tracking(&mut self, id: EntityId) -> Option<TrackingEntry> {
        self.entries.remove(&id)
    }

    /// Whether `id` has an entry.
    pub fn is_tracking(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// All entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &TrackingEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::HandleArena;
    use crate::controller::DefaultNetworkController;

    #[test]
    fn wrapping_inherits_viewers_and_vehicle() {
        let mut arena = HandleArena::new();
        let tracked = arena.insert(());
        let vehicle = arena.insert(());

        let mut plain = TrackingEntry::create(tracked, 80, 3, true);
        plain.vehicle = Some(vehicle);
        plain.add_viewer(EntityId(9));

        let custom = TrackingEntry::wrapping(
            tracked,
            plain.params(),
            DefaultNetworkController::shared(),
            Some(&plain),
        );
        assert!(custom.is_custom());
        assert_eq!(custom.vehicle, Some(vehicle));
        assert_eq!(custom.viewers().collect::<Vec<_>>(), vec![EntityId(9)]);
    }

    #[test]
    fn set_entry_replaces_and_stop_removes() {
        let mut arena = HandleArena::new();
        let tracked = arena.insert(());
        let mut tracker = EntityTracker::new();
        assert!(
            tracker
                .set_entry(EntityId(1), TrackingEntry::create(tracked, 64, 20, false))
                .is_none()
        );
        assert!(
            tracker
                .set_entry(EntityId(1), TrackingEntry::create(tracked, 80, 3, true))
                .is_some()
        );
        assert_eq!(tracker.entry(EntityId(1)).unwrap().params().view_distance, 80);
        assert!(tracker.stop_tracking(EntityId(1)).is_some());
        assert!(!tracker.is_tracking(EntityId(1)));
    }
}
