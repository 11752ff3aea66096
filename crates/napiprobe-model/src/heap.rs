//! Value storage for the model environment.

use std::collections::BTreeMap;

use napiprobe_abi::{ErrorKind, TypeTag, ValueType};

/// Handle to a value in the model heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub(crate) u32);

impl Handle {
    pub const UNDEFINED: Self = Self(0);
    pub const NULL: Self = Self(1);
    pub const TRUE: Self = Self(2);
    pub const FALSE: Self = Self(3);

    /// Handles below this index are permanent.
    pub(crate) const PERMANENT: u32 = 4;

    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// What calling a model function does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callable {
    /// Throw the given value.
    Throws(Handle),
    /// Return the given value.
    Returns(Handle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Property {
    Data(Handle),
    /// Accessor whose getter throws the given value.
    ThrowingGetter(Handle),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ObjectKind {
    Plain,
    Array {
        length: u32,
        elements: BTreeMap<u32, Handle>,
    },
    Function(Callable),
    Error(ErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Object {
    pub kind: ObjectKind,
    pub properties: Vec<(String, Property)>,
    pub type_tag: Option<TypeTag>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: Vec::new(),
            type_tag: None,
        }
    }

    pub fn own(&self, key: &str) -> Option<Property> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, property)| *property)
    }

    pub fn define(&mut self, key: &str, property: Property) {
        match self.properties.iter_mut().find(|(name, _)| name == key) {
            Some(slot) => slot.1 = property,
            None => self.properties.push((key.to_string(), property)),
        }
    }

    /// Handles directly reachable from this object.
    pub fn children(&self) -> Vec<Handle> {
        let mut out: Vec<Handle> = self
            .properties
            .iter()
            .map(|(_, property)| match property {
                Property::Data(handle) | Property::ThrowingGetter(handle) => *handle,
            })
            .collect();
        match &self.kind {
            ObjectKind::Array { elements, .. } => out.extend(elements.values().copied()),
            ObjectKind::Function(Callable::Throws(handle) | Callable::Returns(handle)) => {
                out.push(*handle);
            }
            ObjectKind::Plain | ObjectKind::Error(_) => {}
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Object),
}

impl Slot {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Undefined => ValueType::Undefined,
            Self::Null => ValueType::Null,
            Self::Bool(_) => ValueType::Boolean,
            Self::Number(_) => ValueType::Number,
            Self::String(_) => ValueType::String,
            Self::Object(object) => match object.kind {
                ObjectKind::Function(_) => ValueType::Function,
                _ => ValueType::Object,
            },
        }
    }
}

/// Append-only slot storage; reclaimed slots become `None` and are never reused.
#[derive(Debug)]
pub(crate) struct Heap {
    slots: Vec<Option<Slot>>,
    limit: usize,
}

impl Heap {
    /// A heap holding at most `limit` slots, the permanent ones included.
    pub fn new(limit: u32) -> Self {
        Self {
            slots: vec![
                Some(Slot::Undefined),
                Some(Slot::Null),
                Some(Slot::Bool(true)),
                Some(Slot::Bool(false)),
            ],
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
        }
    }

    /// Store `slot`, or `None` once the heap is full.
    pub fn alloc(&mut self, slot: Slot) -> Option<Handle> {
        if self.slots.len() >= self.limit {
            return None;
        }
        let index = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(Some(slot));
        Some(Handle(index))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn get(&self, handle: Handle) -> Option<&Slot> {
        self.slots.get(handle.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        self.slots.get_mut(handle.0 as usize).and_then(Option::as_mut)
    }

    pub fn object(&self, handle: Handle) -> Option<&Object> {
        match self.get(handle) {
            Some(Slot::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn object_mut(&mut self, handle: Handle) -> Option<&mut Object> {
        match self.get_mut(handle) {
            Some(Slot::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn free(&mut self, handle: Handle) {
        if handle.0 >= Handle::PERMANENT
            && let Some(slot) = self.slots.get_mut(handle.0 as usize)
        {
            *slot = None;
        }
    }

    pub fn live_handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .filter_map(|(index, _)| u32::try_from(index).ok().map(Handle))
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
