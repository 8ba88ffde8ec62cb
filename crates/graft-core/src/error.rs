use crate::arena::HandleId;
use crate::entity::{EntityRef, WorldId};
use crate::fields::FieldError;

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the universe and its indexes.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The world id does not name a world of this universe.
    #[error("unknown world: {0}")]
    UnknownWorld(WorldId),

    /// The entity is not associated with any world.
    #[error("{0} is not associated with a world")]
    NoWorld(HandleId),

    /// The wrapper reference was never issued or has been released.
    #[error("unknown wrapper: {0}")]
    UnknownWrapper(EntityRef),

    /// The handle id no longer addresses a live handle.
    #[error("stale handle: {0}")]
    StaleHandle(HandleId),

    /// A field accessor refused a read or write.
    #[error(transparent)]
    Field(#[from] FieldError),
}
