use graft_core::{CoreError, EntityKind, EntityRef, FieldError, HandleId};

/// Alias for `Result<T, RuntimeError>`.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced by runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The wrapper does not resolve to a live handle.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityRef),

    /// The entity's representation is not provided by the engine.
    #[error("cannot augment {entity}: {kind} is a custom entity type")]
    CustomEntityType {
        /// The rejected entity.
        entity: EntityRef,
        /// Its kind.
        kind: EntityKind,
    },

    /// The kind has no augmented handle.
    #[error("cannot augment {entity}: {kind} has no controller support")]
    NoControllerSupport {
        /// The rejected entity.
        entity: EntityRef,
        /// Its kind.
        kind: EntityKind,
    },

    /// The kind cannot be created augmented.
    #[error("{0} cannot be created augmented")]
    UnsupportedKind(EntityKind),

    /// The wrapper was left behind on a handle that has since been replaced.
    #[error("{0} refers to a replaced handle")]
    Retired(EntityRef),

    /// The operation needs the entity to be associated with a world.
    #[error("{0} is not associated with a world")]
    NoWorld(EntityRef),

    /// Mounting would make the attachment chain cyclic.
    #[error("mounting {passenger} on {vehicle} would create an attachment cycle")]
    AttachmentCycle {
        /// Entity that would ride.
        passenger: EntityRef,
        /// Entity that would be ridden.
        vehicle: EntityRef,
    },

    /// Substitution failed part-way; indexes may be inconsistent.
    #[error("substitution of {entity} failed")]
    Substitution {
        /// Entity being augmented.
        entity: EntityRef,
        /// What went wrong.
        #[source]
        source: SubstitutionError,
    },

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// An engine-level error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RuntimeError {
    pub(crate) fn substitution(entity: EntityRef, source: impl Into<SubstitutionError>) -> Self {
        Self::Substitution {
            entity,
            source: source.into(),
        }
    }
}

/// Cause of a failed substitution.
#[derive(Debug, thiserror::Error)]
pub enum SubstitutionError {
    /// A vehicle or passenger reference points at a handle that is gone.
    #[error("peer handle {0} is dangling")]
    DanglingPeer(HandleId),

    /// A field could not be copied to the augmented handle.
    #[error("field transfer failed")]
    Transfer(#[from] FieldError),

    /// The entity claims to be live but its world does not exist.
    #[error("index repair failed")]
    Index(#[from] CoreError),
}
