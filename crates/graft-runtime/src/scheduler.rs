use std::collections::BTreeMap;

use graft_core::{EntityId, EntityRef, HandleId, WorldId};

/// Work handed off to a later tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Register `handle` under `id` in the world's id map.
    MapEntityId {
        /// World owning the id map.
        world: WorldId,
        /// Entity id to map.
        id: EntityId,
        /// Handle the id should resolve to.
        handle: HandleId,
    },
    /// Put `passenger` back on `vehicle` after a cross-world teleport.
    RemountPassenger {
        /// Entity to be ridden.
        vehicle: EntityRef,
        /// Entity to ride.
        passenger: EntityRef,
    },
}

/// Deferred-action queue keyed by the tick the action is due on.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tick: u64,
    queue: BTreeMap<u64, Vec<DeferredAction>>,
}

impl Scheduler {
    /// An empty queue at tick zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current tick.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Run `action` at the start of the next tick.
    pub fn run_next_tick(&mut self, action: DeferredAction) {
        self.run_later(1, action);
    }

    /// Run `action` `delay` ticks from now. A zero delay means the next tick.
    pub fn run_later(&mut self, delay: u64, action: DeferredAction) {
        let due = self.tick + delay.max(1);
        self.queue.entry(due).or_default().push(action);
    }

    /// Move to the next tick and return its number.
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Take every action due on or before the current tick, in scheduling order.
    pub fn drain_due(&mut self) -> Vec<DeferredAction> {
        let later = self.queue.split_off(&(self.tick + 1));
        let due = std::mem::replace(&mut self.queue, later);
        due.into_values().flatten().collect()
    }

    /// Number of queued actions.
    pub fn pending(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }

    /// Queued actions, earliest first.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &DeferredAction)> {
        self.queue
            .iter()
            .flat_map(|(due, actions)| actions.iter().map(move |action| (*due, action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::{EntityKind, Universe};

    fn remount(universe: &mut Universe) -> DeferredAction {
        DeferredAction::RemountPassenger {
            vehicle: universe.create_entity(EntityKind::Pig),
            passenger: universe.create_entity(EntityKind::Player),
        }
    }

    #[test]
    fn next_tick_actions_drain_after_one_advance() {
        let mut universe = Universe::new();
        let mut scheduler = Scheduler::new();
        let action = remount(&mut universe);
        scheduler.run_next_tick(action.clone());
        assert!(scheduler.drain_due().is_empty());
        scheduler.advance();
        assert_eq!(scheduler.drain_due(), vec![action]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn delayed_actions_wait_their_turn() {
        let mut universe = Universe::new();
        let mut scheduler = Scheduler::new();
        scheduler.run_later(2, remount(&mut universe));
        scheduler.advance();
        assert!(scheduler.drain_due().is_empty());
        scheduler.advance();
        assert_eq!(scheduler.drain_due().len(), 1);
    }

    #[test]
    fn same_tick_actions_keep_fifo_order() {
        let mut universe = Universe::new();
        let mut scheduler = Scheduler::new();
        let first = remount(&mut universe);
        let second = remount(&mut universe);
        scheduler.run_later(0, first.clone());
        scheduler.run_next_tick(second.clone());
        scheduler.advance();
        assert_eq!(scheduler.drain_due(), vec![first, second]);
    }
}
