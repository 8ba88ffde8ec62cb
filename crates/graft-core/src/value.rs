//! Public wrapper values and the small internal value handles they map to.

use serde::{Deserialize, Serialize};

use crate::conversion::Handle;
use crate::definition::ItemDefId;
use crate::entity::EntityRef;

/// Id of an entity's metadata watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataWatcherId(pub u32);

/// Id of an engine-side container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub u32);

/// Id of an engine-side tag tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagHandle(pub u32);

/// Engine-side item stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStackHandle {
    /// Item definition the stack is made of.
    pub item: ItemDefId,
    /// Stack size.
    pub amount: u8,
    /// Damage or data value.
    pub damage: i16,
}

/// Public reference to a world, by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorldRef(pub String);

/// Public reference to a chunk column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    /// World name.
    pub world: String,
    /// Chunk x coordinate.
    pub x: i32,
    /// Chunk z coordinate.
    pub z: i32,
}

/// Public reference to a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockRef {
    /// World name.
    pub world: String,
    /// Block x coordinate.
    pub x: i32,
    /// Block y coordinate.
    pub y: i32,
    /// Block z coordinate.
    pub z: i32,
    /// Block type id.
    pub type_id: u32,
}

/// Public item stack: either backed by an engine stack or a detached copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemStack {
    /// Wraps an engine-side stack.
    Backed(ItemStackHandle),
    /// Plain data not yet known to the engine.
    Detached {
        /// Item type id.
        type_id: u32,
        /// Stack size.
        amount: u8,
        /// Damage or data value.
        damage: i16,
    },
}

impl ItemStack {
    /// Item type id of the stack.
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Backed(handle) => handle.item.0,
            Self::Detached { type_id, .. } => *type_id,
        }
    }
}

/// Public inventory view. May have lost its backing container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InventoryRef {
    /// Backing container, if still present.
    pub handle: Option<ContainerId>,
}

/// Public tag tree wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommonTag {
    /// Backing tag node.
    pub handle: TagHandle,
}

/// Public metadata watcher wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataWatcherRef {
    /// Backing watcher.
    pub handle: DataWatcherId,
}

/// Any value handed to the conversion registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An already-internal handle.
    Handle(Handle),
    /// Public entity reference.
    Entity(EntityRef),
    /// Public world reference.
    World(WorldRef),
    /// Public chunk reference.
    Chunk(ChunkRef),
    /// Public block reference.
    Block(BlockRef),
    /// Public item stack.
    ItemStack(ItemStack),
    /// Public inventory.
    Inventory(InventoryRef),
    /// Public tag tree.
    Tag(CommonTag),
    /// Public metadata watcher.
    DataWatcher(DataWatcherRef),
    /// Material name, resolved against the definition tables.
    Material(String),
    /// Bare integer.
    Int(i64),
    /// Free text.
    Text(String),
    /// No value.
    Unit,
}

impl Value {
    /// The internal handle, if the value already is one.
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Self::Handle(handle)
    }
}

impl From<EntityRef> for Value {
    fn from(entity: EntityRef) -> Self {
        Self::Entity(entity)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}
