//! Core types for Graft: entity handles, their indexes, and conversion.
//!
//! This crate holds the engine side of the substitution subsystem. Every
//! public [`EntityRef`] resolves through the [`Universe`] to exactly one
//! current [`HandleId`]; the world indexes store handle ids, never wrappers.

/// Generational handle arena.
pub mod arena;
/// Pluggable behavior and network controllers.
pub mod controller;
/// Conversion rules from public values to internal handles.
pub mod conversion;
/// Dense, append-only item and block definition tables.
pub mod definition;
/// Entity kinds, state records and the plain/augmented handle.
pub mod entity;
/// Error types used throughout the crate.
pub mod error;
/// Compile-time field schema and bulk state transfer.
pub mod fields;
/// Outbound packets and the packet sink seam.
pub mod packet;
/// Network tracking entries and the per-world tracker.
pub mod tracker;
/// The owner of all handles, wrappers and worlds.
pub mod universe;
/// Public wrapper values and small internal value handles.
pub mod value;
/// Per-world index holders: id map, entity list, chunks.
pub mod world;

/// Re-export arena types.
pub use arena::{HandleArena, HandleId};
/// Re-export controller types.
pub use controller::{
    ControllerRef, DefaultEntityController, DefaultNetworkController, EntityController,
    NetworkController, NetworkControllerRef,
};
/// Re-export conversion types.
pub use conversion::{ConversionRegistry, Handle, HandleConverter, HandleType};
/// Re-export core entity types.
pub use entity::{EntityHandle, EntityId, EntityKind, EntityRef, EntityState, Location, Position, WorldId};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export field schema types.
pub use fields::{EntityTemplate, FieldError, FieldValue};
/// Re-export packet types.
pub use packet::{Packet, PacketSink};
/// Re-export tracking types.
pub use tracker::{EntityTracker, TrackingEntry, TrackingParams};
/// Re-export the universe.
pub use universe::Universe;
/// Re-export value types.
pub use value::Value;
/// Re-export world types.
pub use world::{Chunk, ChunkCoord, World};
