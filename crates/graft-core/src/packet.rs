use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind, Position};

/// Outbound notification sent to a remote observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    /// `passenger` now rides `vehicle`; `None` means it dismounted.
    AttachEntity {
        /// Riding entity.
        passenger: EntityId,
        /// Ridden entity.
        vehicle: Option<EntityId>,
    },
    /// Absolute position update.
    EntityTeleport {
        /// Moved entity.
        entity: EntityId,
        /// New position.
        position: Position,
    },
    /// The entity became visible.
    SpawnEntity {
        /// Spawned entity.
        entity: EntityId,
        /// Its kind.
        kind: EntityKind,
    },
    /// The entity is no longer visible.
    DestroyEntity {
        /// Removed entity.
        entity: EntityId,
    },
}

/// Where packets for remote observers end up.
pub trait PacketSink {
    /// Queue `packet` for delivery to `observer`.
    fn send_packet(&mut self, observer: EntityId, packet: Packet);
}
