use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arena::HandleId;
use crate::controller::ControllerRef;
use crate::tracker::TrackingParams;
use crate::value::{DataWatcherId, ItemStackHandle};

/// Integer entity id, unique for the lifetime of the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable public-facing reference to an entity.
///
/// The handle backing an `EntityRef` can change at runtime; resolve it through
/// the [`Universe`](crate::universe::Universe) every time instead of caching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef(pub(crate) HandleId);

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity{}", self.0)
    }
}

/// Index of a world inside the universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// Position and orientation inside a world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// East-west coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
    /// Horizontal rotation in degrees.
    pub yaw: f32,
    /// Vertical rotation in degrees.
    pub pitch: f32,
}

impl Position {
    /// Position without rotation.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Block coordinate of `x`, floored.
    pub fn block_x(&self) -> i32 {
        self.x.floor() as i32
    }

    /// Block coordinate of `y`, floored.
    pub fn block_y(&self) -> i32 {
        self.y.floor() as i32
    }

    /// Block coordinate of `z`, floored.
    pub fn block_z(&self) -> i32 {
        self.z.floor() as i32
    }
}

/// A position bound to a world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// World the position lives in.
    pub world: WorldId,
    /// Coordinates and rotation.
    pub position: Position,
}

impl Location {
    /// Create a location without rotation.
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self {
            world,
            position: Position::new(x, y, z),
        }
    }
}

/// The kind of an entity.
///
/// `Custom` covers representations supplied from outside the engine; they
/// have no native layout and can never be augmented.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A connected player; also a network observer.
    Player,
    /// A dropped item stack.
    Item,
    /// A fired projectile.
    Arrow,
    /// A rideable cart.
    Minecart,
    /// A passive rideable animal.
    Pig,
    /// A hostile living entity.
    Zombie,
    /// A short-lived weather effect.
    LightningStrike,
    /// A representation not provided by the engine.
    Custom(String),
}

impl EntityKind {
    /// Whether the engine provides the representation for this kind.
    pub fn is_native(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Whether an augmented handle exists for this kind.
    pub fn supports_augmentation(&self) -> bool {
        matches!(
            self,
            Self::Item | Self::Arrow | Self::Minecart | Self::Pig | Self::Zombie
        )
    }

    /// Whether handles of this kind carry the living layer.
    pub fn is_living(&self) -> bool {
        matches!(self, Self::Player | Self::Pig | Self::Zombie)
    }

    /// Network tracking parameters used when a tracking entry is created.
    pub fn tracking(&self) -> TrackingParams {
        match self {
            Self::Player => TrackingParams::new(512, 2, false),
            Self::Item => TrackingParams::new(64, 20, true),
            Self::Arrow => TrackingParams::new(64, 20, false),
            Self::Minecart | Self::Pig | Self::Zombie | Self::Custom(_) => {
                TrackingParams::new(80, 3, true)
            }
            Self::LightningStrike => TrackingParams::new(256, 20, false),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Item => write!(f, "item"),
            Self::Arrow => write!(f, "arrow"),
            Self::Minecart => write!(f, "minecart"),
            Self::Pig => write!(f, "pig"),
            Self::Zombie => write!(f, "zombie"),
            Self::LightningStrike => write!(f, "lightning_strike"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// State shared by every living entity.
#[derive(Debug, Clone, PartialEq)]
pub struct LivingState {
    /// Current health points.
    pub health: f64,
    /// Health cap.
    pub max_health: f64,
    /// Remaining air while submerged.
    pub air_ticks: i32,
    /// Per-slot equipment drop chances.
    pub drop_chances: Vec<f64>,
}

impl Default for LivingState {
    fn default() -> Self {
        Self {
            health: 20.0,
            max_health: 20.0,
            air_ticks: 300,
            drop_chances: vec![0.085; 5],
        }
    }
}

/// Kind-specific state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum KindData {
    /// Kinds without extra state.
    #[default]
    None,
    /// Player session state.
    Player {
        /// Account name.
        name: String,
        /// Experience level.
        level: i32,
    },
    /// Dropped item state.
    Item {
        /// The carried stack.
        stack: ItemStackHandle,
        /// Ticks since the drop.
        age: i32,
        /// Ticks until the item can be picked up.
        pickup_delay: i32,
    },
    /// Projectile state.
    Arrow {
        /// Entity that fired the arrow.
        shooter: Option<EntityRef>,
        /// Whether the arrow is stuck in a block.
        in_ground: bool,
        /// Base damage.
        damage: f64,
    },
    /// Cart state.
    Minecart {
        /// Cart variant: 0 ride, 1 storage, 2 powered.
        cart_type: i32,
        /// Accumulated damage.
        damage: f64,
        /// Remaining fuel ticks for powered carts.
        fuel: i32,
    },
    /// Pig state.
    Pig {
        /// Whether the pig wears a saddle.
        saddled: bool,
    },
    /// Zombie state.
    Zombie {
        /// Whether the zombie is a villager.
        villager: bool,
        /// Whether the zombie is a child.
        baby: bool,
    },
}

impl KindData {
    /// Blank data for a freshly constructed entity of `kind`.
    pub fn blank(kind: &EntityKind) -> Self {
        match kind {
            EntityKind::Player => Self::Player {
                name: String::new(),
                level: 0,
            },
            EntityKind::Item => Self::Item {
                stack: ItemStackHandle::default(),
                age: 0,
                pickup_delay: 0,
            },
            EntityKind::Arrow => Self::Arrow {
                shooter: None,
                in_ground: false,
                damage: 2.0,
            },
            EntityKind::Minecart => Self::Minecart {
                cart_type: 0,
                damage: 0.0,
                fuel: 0,
            },
            EntityKind::Pig => Self::Pig { saddled: false },
            EntityKind::Zombie => Self::Zombie {
                villager: false,
                baby: false,
            },
            EntityKind::LightningStrike | EntityKind::Custom(_) => Self::None,
        }
    }
}

/// Every instance-level field of an entity handle.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    /// Kind the state was constructed for. Not a transferable field.
    pub kind: EntityKind,
    /// Integer id.
    pub id: EntityId,
    /// World the entity is associated with, spawned or not.
    pub world: Option<WorldId>,
    /// Whether the entity sits in its world's live collections.
    pub added_to_world: bool,
    /// Current position.
    pub position: Position,
    /// Position at the end of the previous tick.
    pub last_position: Position,
    /// Velocity per tick.
    pub motion: [f64; 3],
    /// Liveness flag; dead handles are skipped by the tick loop.
    pub dead: bool,
    /// Validity flag; invalid handles no longer back any live entity.
    pub valid: bool,
    /// Entity this one rides.
    pub vehicle: Option<HandleId>,
    /// Entity riding this one.
    pub passenger: Option<HandleId>,
    /// Remaining burn ticks.
    pub fire_ticks: i32,
    /// Age in ticks.
    pub ticks_lived: i32,
    /// Metadata watcher owned by the entity.
    pub data_watcher: DataWatcherId,
    /// Back-link to the public reference currently representing this handle.
    pub wrapper: Option<EntityRef>,
    /// Living layer, present for living kinds.
    pub living: Option<LivingState>,
    /// Kind layer.
    pub data: KindData,
}

impl EntityState {
    /// Zero-argument construction of a blank state for `kind`.
    pub fn blank(kind: EntityKind) -> Self {
        let living = kind.is_living().then(LivingState::default);
        let data = KindData::blank(&kind);
        Self {
            kind,
            id: EntityId(0),
            world: None,
            added_to_world: false,
            position: Position::default(),
            last_position: Position::default(),
            motion: [0.0; 3],
            dead: false,
            valid: false,
            vehicle: None,
            passenger: None,
            fire_ticks: 0,
            ticks_lived: 0,
            data_watcher: DataWatcherId::default(),
            wrapper: None,
            living,
            data,
        }
    }

    /// Current location, if the entity is associated with a world.
    pub fn location(&self) -> Option<Location> {
        self.world.map(|world| Location {
            world,
            position: self.position,
        })
    }
}

/// Plain or augmented representation of a handle.
#[derive(Debug, Clone, Default)]
pub enum HandleVariant {
    /// Ordinary engine handle.
    #[default]
    Plain,
    /// Handle that dispatches to a pluggable behavior controller.
    Augmented {
        /// The bound controller, if any.
        controller: Option<ControllerRef>,
    },
}

/// The engine's live representation of an entity.
#[derive(Debug, Clone)]
pub struct EntityHandle {
    /// Instance state.
    pub state: EntityState,
    variant: HandleVariant,
}

impl EntityHandle {
    /// Wrap `state` in an ordinary handle.
    pub fn plain(state: EntityState) -> Self {
        Self {
            state,
            variant: HandleVariant::Plain,
        }
    }

    /// Wrap `state` in an augmented handle with no controller yet.
    pub fn augmented(state: EntityState) -> Self {
        Self {
            state,
            variant: HandleVariant::Augmented { controller: None },
        }
    }

    /// Whether this handle is the augmented variant.
    pub fn is_augmented(&self) -> bool {
        matches!(self.variant, HandleVariant::Augmented { .. })
    }

    /// The representation tag.
    pub fn variant(&self) -> &HandleVariant {
        &self.variant
    }

    /// The bound behavior controller. Always `None` for plain handles.
    pub fn controller(&self) -> Option<&ControllerRef> {
        match &self.variant {
            HandleVariant::Augmented { controller } => controller.as_ref(),
            HandleVariant::Plain => None,
        }
    }

    /// Replace the bound controller, returning the previous one.
    ///
    /// Plain handles cannot hold a controller; `controller` is handed back
    /// untouched in the error.
    pub fn set_controller(
        &mut self,
        controller: Option<ControllerRef>,
    ) -> Result<Option<ControllerRef>, Option<ControllerRef>> {
        match &mut self.variant {
            HandleVariant::Augmented { controller: slot } => {
                Ok(std::mem::replace(slot, controller))
            }
            HandleVariant::Plain => Err(controller),
        }
    }
}
