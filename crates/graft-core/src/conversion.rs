//! Best-effort conversion of public values into internal handles.
//!
//! Every conversion is total: a value that cannot be converted yields the
//! caller's default instead of an error.

use std::collections::HashMap;
use std::fmt;

use crate::arena::HandleId;
use crate::definition::{BlockDefId, ItemDefId};
use crate::entity::WorldId;
use crate::universe::Universe;
use crate::value::{ContainerId, DataWatcherId, ItemStack, ItemStackHandle, TagHandle, Value};
use crate::world::ChunkCoord;

/// Internal handle of a loaded chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    /// Owning world.
    pub world: WorldId,
    /// Column coordinate.
    pub coord: ChunkCoord,
}

/// Tag naming a conversion target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandleType {
    /// Entity handle.
    Entity,
    /// World handle.
    World,
    /// Chunk handle.
    Chunk,
    /// Item stack.
    ItemStack,
    /// Container.
    Container,
    /// Tag tree node.
    Tag,
    /// Metadata watcher.
    DataWatcher,
    /// Item definition.
    ItemDefinition,
    /// Block definition.
    BlockDefinition,
}

impl HandleType {
    /// Every target, in declaration order.
    pub const ALL: [HandleType; 9] = [
        Self::Entity,
        Self::World,
        Self::Chunk,
        Self::ItemStack,
        Self::Container,
        Self::Tag,
        Self::DataWatcher,
        Self::ItemDefinition,
        Self::BlockDefinition,
    ];
}

impl fmt::Display for HandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entity => "entity",
            Self::World => "world",
            Self::Chunk => "chunk",
            Self::ItemStack => "item_stack",
            Self::Container => "container",
            Self::Tag => "tag",
            Self::DataWatcher => "data_watcher",
            Self::ItemDefinition => "item_definition",
            Self::BlockDefinition => "block_definition",
        };
        f.write_str(name)
    }
}

/// An internal engine handle of any target type.
#[derive(Debug, Clone, PartialEq)]
pub enum Handle {
    /// Entity handle.
    Entity(HandleId),
    /// World handle.
    World(WorldId),
    /// Chunk handle.
    Chunk(ChunkHandle),
    /// Item stack.
    ItemStack(ItemStackHandle),
    /// Container.
    Container(ContainerId),
    /// Tag tree node.
    Tag(TagHandle),
    /// Metadata watcher.
    DataWatcher(DataWatcherId),
    /// Item definition.
    ItemDefinition(ItemDefId),
    /// Block definition.
    BlockDefinition(BlockDefId),
}

impl Handle {
    /// The handle's type tag.
    pub fn handle_type(&self) -> HandleType {
        match self {
            Self::Entity(_) => HandleType::Entity,
            Self::World(_) => HandleType::World,
            Self::Chunk(_) => HandleType::Chunk,
            Self::ItemStack(_) => HandleType::ItemStack,
            Self::Container(_) => HandleType::Container,
            Self::Tag(_) => HandleType::Tag,
            Self::DataWatcher(_) => HandleType::DataWatcher,
            Self::ItemDefinition(_) => HandleType::ItemDefinition,
            Self::BlockDefinition(_) => HandleType::BlockDefinition,
        }
    }
}

/// A concrete handle type usable with [`ConversionRegistry::convert_as`].
pub trait HandleTarget: Sized {
    /// Tag of the target.
    const TYPE: HandleType;

    /// Unwrap `handle` if it has this type.
    fn from_handle(handle: Handle) -> Option<Self>;
}

macro_rules! handle_target {
    ($ty:ty, $variant:ident) => {
        impl HandleTarget for $ty {
            const TYPE: HandleType = HandleType::$variant;

            fn from_handle(handle: Handle) -> Option<Self> {
                match handle {
                    Handle::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

handle_target!(HandleId, Entity);
handle_target!(WorldId, World);
handle_target!(ChunkHandle, Chunk);
handle_target!(ItemStackHandle, ItemStack);
handle_target!(ContainerId, Container);
handle_target!(TagHandle, Tag);
handle_target!(DataWatcherId, DataWatcher);
handle_target!(ItemDefId, ItemDefinition);
handle_target!(BlockDefId, BlockDefinition);

/// A single conversion rule for one target type.
pub trait HandleConverter {
    /// Target the rule produces.
    fn target(&self) -> HandleType;

    /// Convert `value`, or `None` when the rule does not apply.
    fn convert(&self, value: &Value, universe: &Universe) -> Option<Handle>;

    /// Whether an already-internal handle of the target type may skip the rule.
    fn is_casting_supported(&self) -> bool {
        false
    }
}

/// Entity wrapper to its current handle.
#[derive(Debug, Default)]
pub struct EntityConverter;

impl HandleConverter for EntityConverter {
    fn target(&self) -> HandleType {
        HandleType::Entity
    }

    fn convert(&self, value: &Value, universe: &Universe) -> Option<Handle> {
        match value {
            Value::Handle(handle @ Handle::Entity(_)) => Some(handle.clone()),
            Value::Entity(entity) => universe.resolve(*entity).ok().map(Handle::Entity),
            _ => None,
        }
    }

    fn is_casting_supported(&self) -> bool {
        true
    }
}

/// World wrapper or world name to the world.
#[derive(Debug, Default)]
pub struct WorldConverter;

impl HandleConverter for WorldConverter {
    fn target(&self) -> HandleType {
        HandleType::World
    }

    fn convert(&self, value: &Value, universe: &Universe) -> Option<Handle> {
        let name = match value {
            Value::Handle(handle @ Handle::World(_)) => return Some(handle.clone()),
            Value::World(world) => &world.0,
            Value::Text(name) => name,
            _ => return None,
        };
        universe
            .world_by_name(name)
            .map(|world| Handle::World(world.id()))
    }

    fn is_casting_supported(&self) -> bool {
        true
    }
}

/// Chunk wrapper to the loaded chunk it names.
#[derive(Debug, Default)]
pub struct ChunkConverter;

impl HandleConverter for ChunkConverter {
    fn target(&self) -> HandleType {
        HandleType::Chunk
    }

    fn convert(&self, value: &Value, universe: &Universe) -> Option<Handle> {
        match value {
            Value::Handle(handle @ Handle::Chunk(_)) => Some(handle.clone()),
            Value::Chunk(chunk) => {
                let world = universe.world_by_name(&chunk.world)?;
                let coord = ChunkCoord::new(chunk.x, chunk.z);
                world.is_chunk_loaded(coord).then(|| {
                    Handle::Chunk(ChunkHandle {
                        world: world.id(),
                        coord,
                    })
                })
            }
            _ => None,
        }
    }
}

/// Item stack wrapper to its backing stack, or a fresh copy when detached.
#[derive(Debug, Default)]
pub struct ItemStackConverter;

impl HandleConverter for ItemStackConverter {
    fn target(&self) -> HandleType {
        HandleType::ItemStack
    }

    fn convert(&self, value: &Value, _universe: &Universe) -> Option<Handle> {
        match value {
            Value::Handle(handle @ Handle::ItemStack(_)) => Some(handle.clone()),
            Value::ItemStack(ItemStack::Backed(stack)) => Some(Handle::ItemStack(*stack)),
            Value::ItemStack(ItemStack::Detached {
                type_id,
                amount,
                damage,
            }) => Some(Handle::ItemStack(ItemStackHandle {
                item: ItemDefId(*type_id),
                amount: *amount,
                damage: *damage,
            })),
            _ => None,
        }
    }
}

/// Inventory wrapper to its container, if it still has one.
#[derive(Debug, Default)]
pub struct ContainerConverter;

impl HandleConverter for ContainerConverter {
    fn target(&self) -> HandleType {
        HandleType::Container
    }

    fn convert(&self, value: &Value, _universe: &Universe) -> Option<Handle> {
        match value {
            Value::Handle(handle @ Handle::Container(_)) => Some(handle.clone()),
            Value::Inventory(inventory) => inventory.handle.map(Handle::Container),
            _ => None,
        }
    }
}

/// Tag wrapper to its node.
#[derive(Debug, Default)]
pub struct TagConverter;

impl HandleConverter for TagConverter {
    fn target(&self) -> HandleType {
        HandleType::Tag
    }

    fn convert(&self, value: &Value, _universe: &Universe) -> Option<Handle> {
        match value {
            Value::Handle(handle @ Handle::Tag(_)) => Some(handle.clone()),
            Value::Tag(tag) => Some(Handle::Tag(tag.handle)),
            _ => None,
        }
    }

    fn is_casting_supported(&self) -> bool {
        true
    }
}

/// Watcher wrapper, or the watcher owned by an entity.
#[derive(Debug, Default)]
pub struct DataWatcherConverter;

impl HandleConverter for DataWatcherConverter {
    fn target(&self) -> HandleType {
        HandleType::DataWatcher
    }

    fn convert(&self, value: &Value, universe: &Universe) -> Option<Handle> {
        match value {
            Value::Handle(handle @ Handle::DataWatcher(_)) => Some(handle.clone()),
            Value::DataWatcher(watcher) => Some(Handle::DataWatcher(watcher.handle)),
            Value::Handle(Handle::Entity(id)) => universe
                .handle(*id)
                .ok()
                .map(|handle| Handle::DataWatcher(handle.state.data_watcher)),
            Value::Entity(entity) => universe
                .state(*entity)
                .ok()
                .map(|state| Handle::DataWatcher(state.data_watcher)),
            _ => None,
        }
    }
}

/// Type id of an item-like value, resolving material names with `lookup`.
pub fn item_id(value: &Value, lookup: impl Fn(&str) -> Option<u32>) -> Option<i64> {
    match value {
        Value::Int(id) => Some(*id),
        Value::Material(name) => lookup(name).map(i64::from),
        Value::Text(text) => text
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| lookup(text.trim()).map(i64::from)),
        Value::ItemStack(stack) => Some(i64::from(stack.type_id())),
        Value::Block(block) => Some(i64::from(block.type_id)),
        _ => None,
    }
}

/// Item id or material name to an item definition.
#[derive(Debug, Default)]
pub struct ItemDefinitionConverter;

impl HandleConverter for ItemDefinitionConverter {
    fn target(&self) -> HandleType {
        HandleType::ItemDefinition
    }

    fn convert(&self, value: &Value, universe: &Universe) -> Option<Handle> {
        if let Value::Handle(handle @ Handle::ItemDefinition(_)) = value {
            return Some(handle.clone());
        }
        let items = universe.items();
        let id = item_id(value, |name| items.id_of(name))?;
        items.get(id)?;
        Some(Handle::ItemDefinition(ItemDefId(id as u32)))
    }

    fn is_casting_supported(&self) -> bool {
        true
    }
}

/// Block id or material name to a block definition.
#[derive(Debug, Default)]
pub struct BlockDefinitionConverter;

impl HandleConverter for BlockDefinitionConverter {
    fn target(&self) -> HandleType {
        HandleType::BlockDefinition
    }

    fn convert(&self, value: &Value, universe: &Universe) -> Option<Handle> {
        if let Value::Handle(handle @ Handle::BlockDefinition(_)) = value {
            return Some(handle.clone());
        }
        let blocks = universe.blocks();
        let id = item_id(value, |name| blocks.id_of(name))?;
        blocks.get(id)?;
        Some(Handle::BlockDefinition(BlockDefId(id as u32)))
    }

    fn is_casting_supported(&self) -> bool {
        true
    }
}

/// One rule per target type.
pub struct ConversionRegistry {
    rules: HashMap<HandleType, Box<dyn HandleConverter>>,
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut targets: Vec<_> = self.rules.keys().collect();
        targets.sort();
        f.debug_struct("ConversionRegistry")
            .field("targets", &targets)
            .finish()
    }
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ConversionRegistry {
    /// A registry without any rules; every conversion yields the default.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// A registry with the built-in rule for every target.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(EntityConverter);
        registry.register(WorldConverter);
        registry.register(ChunkConverter);
        registry.register(ItemStackConverter);
        registry.register(ContainerConverter);
        registry.register(TagConverter);
        registry.register(DataWatcherConverter);
        registry.register(ItemDefinitionConverter);
        registry.register(BlockDefinitionConverter);
        registry
    }

    /// Install `rule` for its target, returning the rule it replaced.
    pub fn register(
        &mut self,
        rule: impl HandleConverter + 'static,
    ) -> Option<Box<dyn HandleConverter>> {
        self.rules.insert(rule.target(), Box::new(rule))
    }

    /// Whether a rule exists for `target`.
    pub fn supports(&self, target: HandleType) -> bool {
        self.rules.contains_key(&target)
    }

    /// Convert `value` into a handle of `target`, or return `default`.
    pub fn convert(
        &self,
        target: HandleType,
        value: &Value,
        universe: &Universe,
        default: Option<Handle>,
    ) -> Option<Handle> {
        let Some(rule) = self.rules.get(&target) else {
            return default;
        };
        let cast = value
            .as_handle()
            .filter(|handle| rule.is_casting_supported() && handle.handle_type() == target);
        if let Some(handle) = cast {
            return Some(handle.clone());
        }
        rule.convert(value, universe)
            .filter(|handle| handle.handle_type() == target)
            .or(default)
    }

    /// Typed form of [`convert`](Self::convert).
    pub fn convert_as<T: HandleTarget>(
        &self,
        value: &Value,
        universe: &Universe,
        default: Option<T>,
    ) -> Option<T> {
        self.convert(T::TYPE, value, universe, None)
            .and_then(T::from_handle)
            .or(default)
    }
}
