//! Compile-time field schema of entity handles and bulk state transfer.
//!
//! Each entity kind is described by a chain of [`Layer`]s, most-derived first,
//! ending at the base `Entity` layer. Layers declare instance fields through
//! uniform accessors, plus type-level statics and named behaviors.

use std::collections::HashMap;
use std::fmt;

use crate::arena::HandleId;
use crate::entity::{EntityKind, EntityRef, EntityState, KindData, Position, WorldId};
use crate::value::{DataWatcherId, ItemStackHandle};

/// Errors raised by field accessors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// The state lacks the layer that declares the field.
    #[error("field `{field}` does not exist on a {kind} handle")]
    Incompatible {
        /// Field name.
        field: &'static str,
        /// Kind of the state that was accessed.
        kind: EntityKind,
    },

    /// The value has the wrong storage type for the field.
    #[error("field `{field}` expects {expected}, got {actual}")]
    TypeMismatch {
        /// Field name.
        field: &'static str,
        /// Expected value type.
        expected: &'static str,
        /// Supplied value type.
        actual: &'static str,
    },

    /// No field or static with that name is declared for the kind.
    #[error("{kind} declares no field named `{name}`")]
    UnknownField {
        /// Requested name.
        name: String,
        /// Kind whose schema was searched.
        kind: EntityKind,
    },
}

/// How a field's value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Scalar stored inline.
    Primitive,
    /// Reference to another engine object.
    Reference,
    /// Fixed-length sequence.
    Array,
}

/// A field value read through the uniform accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Optional reference to another handle.
    Handle(Option<HandleId>),
    /// Optional reference to a public wrapper.
    Wrapper(Option<EntityRef>),
    /// Optional world reference.
    World(Option<WorldId>),
    /// Metadata watcher reference.
    Watcher(DataWatcherId),
    /// Embedded item stack.
    Item(ItemStackHandle),
    /// Sequence of numbers.
    Array(Vec<f64>),
}

impl FieldValue {
    /// Name of the value's storage type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Handle(_) => "handle",
            Self::Wrapper(_) => "wrapper",
            Self::World(_) => "world",
            Self::Watcher(_) => "watcher",
            Self::Item(_) => "item",
            Self::Array(_) => "array",
        }
    }

    fn into_bool(self) -> Result<bool, Rejection> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(Rejection::mismatch("bool", &other)),
        }
    }

    fn into_int(self) -> Result<i64, Rejection> {
        match self {
            Self::Int(value) => Ok(value),
            other => Err(Rejection::mismatch("int", &other)),
        }
    }

    fn into_float(self) -> Result<f64, Rejection> {
        match self {
            Self::Float(value) => Ok(value),
            other => Err(Rejection::mismatch("float", &other)),
        }
    }

    fn into_text(self) -> Result<String, Rejection> {
        match self {
            Self::Text(value) => Ok(value),
            other => Err(Rejection::mismatch("text", &other)),
        }
    }

    fn into_handle(self) -> Result<Option<HandleId>, Rejection> {
        match self {
            Self::Handle(value) => Ok(value),
            other => Err(Rejection::mismatch("handle", &other)),
        }
    }

    fn into_wrapper(self) -> Result<Option<EntityRef>, Rejection> {
        match self {
            Self::Wrapper(value) => Ok(value),
            other => Err(Rejection::mismatch("wrapper", &other)),
        }
    }

    fn into_array<const N: usize>(self) -> Result<[f64; N], Rejection> {
        match self {
            Self::Array(values) => {
                <[f64; N]>::try_from(values).map_err(|_| Rejection::Mismatch {
                    expected: "array",
                    actual: "array of wrong length",
                })
            }
            other => Err(Rejection::mismatch("array", &other)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
            Self::Handle(Some(id)) => write!(f, "{id}"),
            Self::Wrapper(Some(entity)) => write!(f, "{entity}"),
            Self::World(Some(world)) => write!(f, "{world}"),
            Self::Handle(None) | Self::Wrapper(None) | Self::World(None) => write!(f, "null"),
            Self::Watcher(id) => write!(f, "watcher#{}", id.0),
            Self::Item(stack) => write!(f, "{}x{}:{}", stack.amount, stack.item.0, stack.damage),
            Self::Array(values) => write!(f, "{values:?}"),
        }
    }
}

/// Why a setter refused a value. Turned into a [`FieldError`] by the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingLayer,
    Mismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl Rejection {
    fn mismatch(expected: &'static str, actual: &FieldValue) -> Self {
        Self::Mismatch {
            expected,
            actual: actual.type_name(),
        }
    }
}

type Getter = fn(&EntityState) -> Option<FieldValue>;
type Setter = fn(&mut EntityState, FieldValue) -> Result<(), Rejection>;

/// One instance field of a layer.
#[derive(Debug)]
pub struct FieldDescriptor {
    name: &'static str,
    storage: StorageKind,
    get: Getter,
    set: Setter,
}

impl FieldDescriptor {
    /// Field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Storage kind.
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    /// Read the field from `state`.
    pub fn read(&self, state: &EntityState) -> Result<FieldValue, FieldError> {
        (self.get)(state).ok_or_else(|| FieldError::Incompatible {
            field: self.name,
            kind: state.kind.clone(),
        })
    }

    /// Write `value` into `state`.
    pub fn write(&self, state: &mut EntityState, value: FieldValue) -> Result<(), FieldError> {
        (self.set)(state, value).map_err(|rejection| match rejection {
            Rejection::MissingLayer => FieldError::Incompatible {
                field: self.name,
                kind: state.kind.clone(),
            },
            Rejection::Mismatch { expected, actual } => FieldError::TypeMismatch {
                field: self.name,
                expected,
                actual,
            },
        })
    }
}

/// A named operation declared by a layer.
#[derive(Debug)]
pub struct Behavior {
    name: &'static str,
    run: fn(&mut EntityState),
}

impl Behavior {
    /// Behavior name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply the behavior to `state`.
    pub fn run(&self, state: &mut EntityState) {
        (self.run)(state)
    }
}

/// One level of the entity type hierarchy.
#[derive(Debug)]
pub struct Layer {
    name: &'static str,
    parent: Option<&'static Layer>,
    fields: &'static [FieldDescriptor],
    statics: &'static [&'static str],
    behaviors: &'static [Behavior],
}

impl Layer {
    /// Layer name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The layer this one extends.
    pub fn parent(&self) -> Option<&'static Layer> {
        self.parent
    }
}

fn living(state: &EntityState) -> Option<&crate::entity::LivingState> {
    state.living.as_ref()
}

fn living_mut(state: &mut EntityState) -> Result<&mut crate::entity::LivingState, Rejection> {
    state.living.as_mut().ok_or(Rejection::MissingLayer)
}

fn position_array(position: &Position) -> Vec<f64> {
    vec![
        position.x,
        position.y,
        position.z,
        f64::from(position.yaw),
        f64::from(position.pitch),
    ]
}

static ENTITY_FIELDS: [FieldDescriptor; 18] = [
    FieldDescriptor {
        name: "id",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Int(i64::from(s.id.0))),
        set: |s, v| {
            s.id = crate::entity::EntityId(v.into_int()? as i32);
            Ok(())
        },
    },
    FieldDescriptor {
        name: "world",
        storage: StorageKind::Reference,
        get: |s| Some(FieldValue::World(s.world)),
        set: |s, v| match v {
            FieldValue::World(world) => {
                s.world = world;
                Ok(())
            }
            other => Err(Rejection::mismatch("world", &other)),
        },
    },
    FieldDescriptor {
        name: "added_to_world",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Bool(s.added_to_world)),
        set: |s, v| {
            s.added_to_world = v.into_bool()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "loc_x",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Float(s.position.x)),
        set: |s, v| {
            s.position.x = v.into_float()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "loc_y",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Float(s.position.y)),
        set: |s, v| {
            s.position.y = v.into_float()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "loc_z",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Float(s.position.z)),
        set: |s, v| {
            s.position.z = v.into_float()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "yaw",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Float(f64::from(s.position.yaw))),
        set: |s, v| {
            s.position.yaw = v.into_float()? as f32;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "pitch",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Float(f64::from(s.position.pitch))),
        set: |s, v| {
            s.position.pitch = v.into_float()? as f32;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "last_position",
        storage: StorageKind::Array,
        get: |s| Some(FieldValue::Array(position_array(&s.last_position))),
        set: |s, v| {
            let [x, y, z, yaw, pitch] = v.into_array::<5>()?;
            s.last_position = Position {
                x,
                y,
                z,
                yaw: yaw as f32,
                pitch: pitch as f32,
            };
            Ok(())
        },
    },
    FieldDescriptor {
        name: "motion",
        storage: StorageKind::Array,
        get: |s| Some(FieldValue::Array(s.motion.to_vec())),
        set: |s, v| {
            s.motion = v.into_array::<3>()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "dead",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Bool(s.dead)),
        set: |s, v| {
            s.dead = v.into_bool()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "valid",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Bool(s.valid)),
        set: |s, v| {
            s.valid = v.into_bool()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "vehicle",
        storage: StorageKind::Reference,
        get: |s| Some(FieldValue::Handle(s.vehicle)),
        set: |s, v| {
            s.vehicle = v.into_handle()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "passenger",
        storage: StorageKind::Reference,
        get: |s| Some(FieldValue::Handle(s.passenger)),
        set: |s, v| {
            s.passenger = v.into_handle()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "fire_ticks",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Int(i64::from(s.fire_ticks))),
        set: |s, v| {
            s.fire_ticks = v.into_int()? as i32;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "ticks_lived",
        storage: StorageKind::Primitive,
        get: |s| Some(FieldValue::Int(i64::from(s.ticks_lived))),
        set: |s, v| {
            s.ticks_lived = v.into_int()? as i32;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "data_watcher",
        storage: StorageKind::Reference,
        get: |s| Some(FieldValue::Watcher(s.data_watcher)),
        set: |s, v| match v {
            FieldValue::Watcher(watcher) => {
                s.data_watcher = watcher;
                Ok(())
            }
            other => Err(Rejection::mismatch("watcher", &other)),
        },
    },
    FieldDescriptor {
        name: "wrapper",
        storage: StorageKind::Reference,
        get: |s| Some(FieldValue::Wrapper(s.wrapper)),
        set: |s, v| match v {
            FieldValue::Wrapper(wrapper) => {
                s.wrapper = wrapper;
                Ok(())
            }
            other => Err(Rejection::mismatch("wrapper", &other)),
        },
    },
];

static ENTITY_BEHAVIORS: [Behavior; 2] = [
    Behavior {
        name: "extinguish",
        run: |s| s.fire_ticks = 0,
    },
    Behavior {
        name: "halt",
        run: |s| s.motion = [0.0; 3],
    },
];

static ENTITY_LAYER: Layer = Layer {
    name: "Entity",
    parent: None,
    fields: &ENTITY_FIELDS,
    statics: &["entity_count"],
    behaviors: &ENTITY_BEHAVIORS,
};

static LIVING_FIELDS: [FieldDescriptor; 4] = [
    FieldDescriptor {
        name: "health",
        storage: StorageKind::Primitive,
        get: |s| living(s).map(|l| FieldValue::Float(l.health)),
        set: |s, v| {
            living_mut(s)?.health = v.into_float()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "max_health",
        storage: StorageKind::Primitive,
        get: |s| living(s).map(|l| FieldValue::Float(l.max_health)),
        set: |s, v| {
            living_mut(s)?.max_health = v.into_float()?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "air_ticks",
        storage: StorageKind::Primitive,
        get: |s| living(s).map(|l| FieldValue::Int(i64::from(l.air_ticks))),
        set: |s, v| {
            living_mut(s)?.air_ticks = v.into_int()? as i32;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "drop_chances",
        storage: StorageKind::Array,
        get: |s| living(s).map(|l| FieldValue::Array(l.drop_chances.clone())),
        set: |s, v| match v {
            FieldValue::Array(values) => {
                living_mut(s)?.drop_chances = values;
                Ok(())
            }
            other => Err(Rejection::mismatch("array", &other)),
        },
    },
];

static LIVING_BEHAVIORS: [Behavior; 1] = [Behavior {
    name: "heal",
    run: |s| {
        if let Some(l) = s.living.as_mut() {
            l.health = l.max_health;
        }
    },
}];

static LIVING_LAYER: Layer = Layer {
    name: "Living",
    parent: Some(&ENTITY_LAYER),
    fields: &LIVING_FIELDS,
    statics: &[],
    behaviors: &LIVING_BEHAVIORS,
};

static PLAYER_FIELDS: [FieldDescriptor; 2] = [
    FieldDescriptor {
        name: "name",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Player { name, .. } => Some(FieldValue::Text(name.clone())),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Player { name, .. } => {
                *name = v.into_text()?;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "level",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Player { level, .. } => Some(FieldValue::Int(i64::from(*level))),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Player { level, .. } => {
                *level = v.into_int()? as i32;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
];

static PLAYER_LAYER: Layer = Layer {
    name: "Player",
    parent: Some(&LIVING_LAYER),
    fields: &PLAYER_FIELDS,
    statics: &[],
    behaviors: &[],
};

static ITEM_FIELDS: [FieldDescriptor; 3] = [
    FieldDescriptor {
        name: "stack",
        storage: StorageKind::Reference,
        get: |s| match &s.data {
            KindData::Item { stack, .. } => Some(FieldValue::Item(*stack)),
            _ => None,
        },
        set: |s, v| match (&mut s.data, v) {
            (KindData::Item { stack, .. }, FieldValue::Item(value)) => {
                *stack = value;
                Ok(())
            }
            (KindData::Item { .. }, other) => Err(Rejection::mismatch("item", &other)),
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "age",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Item { age, .. } => Some(FieldValue::Int(i64::from(*age))),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Item { age, .. } => {
                *age = v.into_int()? as i32;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "pickup_delay",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Item { pickup_delay, .. } => Some(FieldValue::Int(i64::from(*pickup_delay))),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Item { pickup_delay, .. } => {
                *pickup_delay = v.into_int()? as i32;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
];

static ITEM_LAYER: Layer = Layer {
    name: "Item",
    parent: Some(&ENTITY_LAYER),
    fields: &ITEM_FIELDS,
    statics: &[],
    behaviors: &[],
};

static ARROW_FIELDS: [FieldDescriptor; 3] = [
    FieldDescriptor {
        name: "shooter",
        storage: StorageKind::Reference,
        get: |s| match &s.data {
            KindData::Arrow { shooter, .. } => Some(FieldValue::Wrapper(*shooter)),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Arrow { shooter, .. } => {
                *shooter = v.into_wrapper()?;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "in_ground",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Arrow { in_ground, .. } => Some(FieldValue::Bool(*in_ground)),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Arrow { in_ground, .. } => {
                *in_ground = v.into_bool()?;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "damage",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Arrow { damage, .. } => Some(FieldValue::Float(*damage)),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Arrow { damage, .. } => {
                *damage = v.into_float()?;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
];

static ARROW_LAYER: Layer = Layer {
    name: "Arrow",
    parent: Some(&ENTITY_LAYER),
    fields: &ARROW_FIELDS,
    statics: &[],
    behaviors: &[],
};

static MINECART_FIELDS: [FieldDescriptor; 3] = [
    FieldDescriptor {
        name: "cart_type",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Minecart { cart_type, .. } => Some(FieldValue::Int(i64::from(*cart_type))),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Minecart { cart_type, .. } => {
                *cart_type = v.into_int()? as i32;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "damage",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Minecart { damage, .. } => Some(FieldValue::Float(*damage)),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Minecart { damage, .. } => {
                *damage = v.into_float()?;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "fuel",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Minecart { fuel, .. } => Some(FieldValue::Int(i64::from(*fuel))),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Minecart { fuel, .. } => {
                *fuel = v.into_int()? as i32;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
];

static MINECART_LAYER: Layer = Layer {
    name: "Minecart",
    parent: Some(&ENTITY_LAYER),
    fields: &MINECART_FIELDS,
    statics: &[],
    behaviors: &[],
};

static PIG_FIELDS: [FieldDescriptor; 1] = [FieldDescriptor {
    name: "saddled",
    storage: StorageKind::Primitive,
    get: |s| match &s.data {
        KindData::Pig { saddled } => Some(FieldValue::Bool(*saddled)),
        _ => None,
    },
    set: |s, v| match &mut s.data {
        KindData::Pig { saddled } => {
            *saddled = v.into_bool()?;
            Ok(())
        }
        _ => Err(Rejection::MissingLayer),
    },
}];

static PIG_LAYER: Layer = Layer {
    name: "Pig",
    parent: Some(&LIVING_LAYER),
    fields: &PIG_FIELDS,
    statics: &[],
    behaviors: &[],
};

static ZOMBIE_FIELDS: [FieldDescriptor; 2] = [
    FieldDescriptor {
        name: "villager",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Zombie { villager, .. } => Some(FieldValue::Bool(*villager)),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Zombie { villager, .. } => {
                *villager = v.into_bool()?;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
    FieldDescriptor {
        name: "baby",
        storage: StorageKind::Primitive,
        get: |s| match &s.data {
            KindData::Zombie { baby, .. } => Some(FieldValue::Bool(*baby)),
            _ => None,
        },
        set: |s, v| match &mut s.data {
            KindData::Zombie { baby, .. } => {
                *baby = v.into_bool()?;
                Ok(())
            }
            _ => Err(Rejection::MissingLayer),
        },
    },
];

static ZOMBIE_LAYER: Layer = Layer {
    name: "Zombie",
    parent: Some(&LIVING_LAYER),
    fields: &ZOMBIE_FIELDS,
    statics: &["baby_speed_boost"],
    behaviors: &[],
};

/// Most-derived layer for `kind`. Custom kinds only know the base layer.
pub fn layer_for(kind: &EntityKind) -> &'static Layer {
    match kind {
        EntityKind::Player => &PLAYER_LAYER,
        EntityKind::Item => &ITEM_LAYER,
        EntityKind::Arrow => &ARROW_LAYER,
        EntityKind::Minecart => &MINECART_LAYER,
        EntityKind::Pig => &PIG_LAYER,
        EntityKind::Zombie => &ZOMBIE_LAYER,
        EntityKind::LightningStrike | EntityKind::Custom(_) => &ENTITY_LAYER,
    }
}

/// Type-level state shared by all handles, keyed by declaring layer and name.
#[derive(Debug, Clone, Default)]
pub struct TypeStatics {
    values: HashMap<(&'static str, &'static str), FieldValue>,
}

impl TypeStatics {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the base layer's running entity count.
    pub(crate) fn record_entity_count(&mut self, count: i64) {
        self.values
            .insert((ENTITY_LAYER.name, "entity_count"), FieldValue::Int(count));
    }
}

/// The field schema of one entity kind.
#[derive(Debug, Clone)]
pub struct EntityTemplate {
    kind: EntityKind,
    layers: Vec<&'static Layer>,
    fields: Vec<&'static FieldDescriptor>,
}

impl EntityTemplate {
    /// Discover the schema of `kind`, base-layer fields first.
    pub fn of(kind: &EntityKind) -> Self {
        let mut layers = Vec::new();
        let mut fields: Vec<&'static FieldDescriptor> = Vec::new();
        let mut current = Some(layer_for(kind));
        while let Some(layer) = current {
            layers.insert(0, layer);
            let mut level: Vec<&'static FieldDescriptor> = layer.fields.iter().collect();
            level.append(&mut fields);
            fields = level;
            current = layer.parent;
        }
        Self {
            kind: kind.clone(),
            layers,
            fields,
        }
    }

    /// Kind the schema describes.
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Layers from base to most-derived.
    pub fn layers(&self) -> &[&'static Layer] {
        &self.layers
    }

    /// All instance fields, base-layer fields first.
    pub fn fields(&self) -> &[&'static FieldDescriptor] {
        &self.fields
    }

    /// Field names in schema order.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.name).collect()
    }

    /// Look up an instance field; the most-derived declaration wins.
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().rev().find(|field| field.name == name).copied()
    }

    /// Look up a named behavior; the most-derived declaration wins.
    pub fn behavior(&self, name: &str) -> Option<&'static Behavior> {
        self.layers
            .iter()
            .rev()
            .flat_map(|layer| layer.behaviors.iter())
            .find(|behavior| behavior.name == name)
    }

    /// Construct a blank instance of the kind.
    pub fn new_instance(&self) -> EntityState {
        EntityState::blank(self.kind.clone())
    }

    /// Whether `state` was constructed for this kind.
    pub fn is_instance(&self, state: &EntityState) -> bool {
        state.kind == self.kind
    }

    /// Copy every instance field from `from` to `to`.
    ///
    /// Compatibility of `to` is not checked up front; the first accessor that
    /// cannot write reports the error and the copy stops there.
    pub fn transfer(&self, from: &EntityState, to: &mut EntityState) -> Result<(), FieldError> {
        for field in &self.fields {
            let value = field.read(from)?;
            field.write(to, value)?;
        }
        Ok(())
    }

    /// Read a static declared anywhere in the chain.
    pub fn static_value(&self, statics: &TypeStatics, name: &str) -> Option<FieldValue> {
        let (layer, name) = self.static_key(name)?;
        statics.values.get(&(layer, name)).cloned()
    }

    /// Write a static declared anywhere in the chain.
    pub fn set_static_value(
        &self,
        statics: &mut TypeStatics,
        name: &str,
        value: FieldValue,
    ) -> Result<Option<FieldValue>, FieldError> {
        let key = self.static_key(name).ok_or_else(|| FieldError::UnknownField {
            name: name.to_string(),
            kind: self.kind.clone(),
        })?;
        Ok(statics.values.insert(key, value))
    }

    fn static_key(&self, name: &str) -> Option<(&'static str, &'static str)> {
        self.layers.iter().rev().find_map(|layer| {
            layer
                .statics
                .iter()
                .find(|declared| **declared == name)
                .map(|declared| (layer.name, *declared))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::HandleArena;
    use crate::entity::EntityId;
    use proptest::prelude::*;

    #[test]
    fn base_fields_come_first() {
        let template = EntityTemplate::of(&EntityKind::Pig);
        let names = template.field_names();
        assert_eq!(names.first(), Some(&"id"));
        assert_eq!(names.last(), Some(&"saddled"));
        let health = names.iter().position(|n| *n == "health").unwrap();
        let wrapper = names.iter().position(|n| *n == "wrapper").unwrap();
        assert!(wrapper < health);
    }

    #[test]
    fn zombie_schema_order_is_stable() {
        let names = EntityTemplate::of(&EntityKind::Zombie).field_names().join(",");
        insta::assert_snapshot!(names, @"id,world,added_to_world,loc_x,loc_y,loc_z,yaw,pitch,last_position,motion,dead,valid,vehicle,passenger,fire_ticks,ticks_lived,data_watcher,wrapper,health,max_health,air_ticks,drop_chances,villager,baby");
    }

    #[test]
    fn statics_are_not_instance_fields() {
        let template = EntityTemplate::of(&EntityKind::Zombie);
        assert!(template.field("entity_count").is_none());
        assert!(template.field("baby_speed_boost").is_none());

        let mut statics = TypeStatics::new();
        template
            .set_static_value(&mut statics, "baby_speed_boost", FieldValue::Float(0.5))
            .unwrap();
        assert_eq!(
            template.static_value(&statics, "baby_speed_boost"),
            Some(FieldValue::Float(0.5))
        );
        // Inherited statics resolve through the chain and are shared by every kind.
        template
            .set_static_value(&mut statics, "entity_count", FieldValue::Int(3))
            .unwrap();
        let pig = EntityTemplate::of(&EntityKind::Pig);
        assert_eq!(
            pig.static_value(&statics, "entity_count"),
            Some(FieldValue::Int(3))
        );
        assert!(
            pig.set_static_value(&mut statics, "baby_speed_boost", FieldValue::Int(1))
                .is_err()
        );
    }

    #[test]
    fn transfer_into_incompatible_destination_fails_at_write() {
        let template = EntityTemplate::of(&EntityKind::Pig);
        let source = template.new_instance();
        let mut destination = EntityState::blank(EntityKind::Minecart);
        let err = template.transfer(&source, &mut destination).unwrap_err();
        assert_eq!(
            err,
            FieldError::Incompatible {
                field: "health",
                kind: EntityKind::Minecart,
            }
        );
        // Base-layer fields were already written before the failure.
        assert_eq!(destination.fire_ticks, source.fire_ticks);
    }

    #[test]
    fn writes_check_value_type() {
        let template = EntityTemplate::of(&EntityKind::Minecart);
        let mut state = template.new_instance();
        let fuel = template.field("fuel").unwrap();
        let err = fuel.write(&mut state, FieldValue::Bool(true)).unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { field: "fuel", .. }));
        let motion = template.field("motion").unwrap();
        assert!(motion.write(&mut state, FieldValue::Array(vec![1.0])).is_err());
    }

    #[test]
    fn behaviors_resolve_through_chain() {
        let template = EntityTemplate::of(&EntityKind::Zombie);
        let mut state = template.new_instance();
        state.fire_ticks = 40;
        state.living.as_mut().unwrap().health = 3.0;
        template.behavior("extinguish").unwrap().run(&mut state);
        template.behavior("heal").unwrap().run(&mut state);
        assert_eq!(state.fire_ticks, 0);
        assert_eq!(state.living.as_ref().unwrap().health, 20.0);
        assert!(EntityTemplate::of(&EntityKind::Minecart).behavior("heal").is_none());
    }

    #[test]
    fn custom_kinds_use_base_layer() {
        let template = EntityTemplate::of(&EntityKind::Custom("golem".into()));
        assert_eq!(template.layers().len(), 1);
        assert_eq!(template.layers()[0].name(), "Entity");
    }

    fn kind_strategy() -> impl Strategy<Value = EntityKind> {
        prop_oneof![
            Just(EntityKind::Player),
            Just(EntityKind::Item),
            Just(EntityKind::Arrow),
            Just(EntityKind::Minecart),
            Just(EntityKind::Pig),
            Just(EntityKind::Zombie),
        ]
    }

    proptest! {
        #[test]
        fn transfer_preserves_every_field(
            kind in kind_strategy(),
            id in any::<i32>(),
            x in -1.0e6f64..1.0e6,
            y in 0.0f64..256.0,
            z in -1.0e6f64..1.0e6,
            fire in any::<i32>(),
            with_vehicle in any::<bool>(),
        ) {
            let mut arena = HandleArena::new();
            let peer = arena.insert(());
            let template = EntityTemplate::of(&kind);
            let mut source = template.new_instance();
            source.id = EntityId(id);
            source.position = Position::new(x, y, z);
            source.fire_ticks = fire;
            source.vehicle = with_vehicle.then_some(peer);
            source.passenger = (!with_vehicle).then_some(peer);

            let mut destination = template.new_instance();
            template.transfer(&source, &mut destination).unwrap();
            prop_assert_eq!(destination, source);
        }
    }
}
