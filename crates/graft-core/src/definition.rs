use serde::{Deserialize, Serialize};

/// Index into the item definition table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemDefId(pub u32);

/// Index into the block definition table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDefId(pub u32);

/// An item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Material name, lowercase.
    pub name: String,
    /// Largest stack size.
    pub max_stack: u8,
}

/// A block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// Material name, lowercase.
    pub name: String,
    /// Mining resistance.
    pub hardness: f32,
}

/// Something stored in a [`DefinitionTable`] under a material name.
pub trait Named {
    /// Material name.
    fn name(&self) -> &str;
}

impl Named for ItemDefinition {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for BlockDefinition {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Densely packed, append-only table indexed by small integer ids.
///
/// Slots between registered ids stay empty. The table grows at runtime; a
/// lookup is only valid inside the current bounds.
#[derive(Debug, Clone)]
pub struct DefinitionTable<T> {
    entries: Vec<Option<T>>,
}

impl<T> Default for DefinitionTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Named> DefinitionTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `definition` at `id`, growing the table when needed.
    ///
    /// Returns `false` without storing anything if the slot is taken.
    pub fn register(&mut self, id: u32, definition: T) -> bool {
        let index = id as usize;
        if index >= self.entries.len() {
            self.entries.resize_with(index + 1, || None);
        }
        let slot = &mut self.entries[index];
        if slot.is_some() {
            return false;
        }
        *slot = Some(definition);
        true
    }

    /// Definition at `id`; `None` when out of bounds or empty.
    pub fn get(&self, id: i64) -> Option<&T> {
        let index = usize::try_from(id).ok()?;
        self.entries.get(index)?.as_ref()
    }

    /// Id of the definition named `name`, compared case-insensitively.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .position(|entry| {
                entry
                    .as_ref()
                    .is_some_and(|def| def.name().eq_ignore_ascii_case(name))
            })
            .map(|index| index as u32)
    }

    /// Current bound: one past the highest registered id.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
