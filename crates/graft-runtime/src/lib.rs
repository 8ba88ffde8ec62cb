//! Tick-driven entity substitution and controller binding for Graft.
//!
//! Wraps a [`graft_core::Universe`] in a [`Runtime`] that can swap a live plain
//! handle for an augmented one while repairing every index that names it,
//! bind behavior and network controllers, and carry entities through spawn,
//! teleport and despawn. Work that must wait a tick goes through the
//! [`Scheduler`]; outbound packets land in a [`PacketLog`].

/// Behavior and network controller binding.
pub mod binding;
/// Configuration types for a runtime.
pub mod config;
/// Error types for the runtime crate.
pub mod error;
/// Spawn, teleport, despawn and mount protocols.
pub mod lifecycle;
/// Top-level tick orchestrator.
pub mod runtime;
/// Deferred-action queue keyed by due tick.
pub mod scheduler;
/// In-memory packet sink.
pub mod session;
/// Plain to augmented handle substitution.
pub mod substitution;

/// Re-export of [`config::RuntimeConfig`].
pub use config::RuntimeConfig;
/// Re-exports of [`error::RuntimeError`], [`error::RuntimeResult`], and [`error::SubstitutionError`].
pub use error::{RuntimeError, RuntimeResult, SubstitutionError};
/// Re-export of [`lifecycle::TeleportCause`].
pub use lifecycle::TeleportCause;
/// Re-export of [`runtime::Runtime`].
pub use runtime::Runtime;
/// Re-exports of [`scheduler::DeferredAction`] and [`scheduler::Scheduler`].
pub use scheduler::{DeferredAction, Scheduler};
/// Re-exports of [`session::PacketLog`] and [`session::SentPacket`].
pub use session::{PacketLog, SentPacket};
