//! The model environment: heap, scopes, exception slot and collector.

use std::collections::{BTreeMap, BTreeSet};

use napiprobe_abi::{
    AbiCall, AbiResult, ErrorKind, FinalizeError, Finalizer, Status, TypeTag, ValueType,
};

use crate::config::ModelConfig;
use crate::heap::{Callable, Handle, Heap, Object, ObjectKind, Property, Slot};

/// Token for an open model handle scope.
#[derive(Debug, PartialEq, Eq)]
pub struct ModelScope {
    pub(crate) id: u64,
}

/// Weak reference produced by `wrap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelRef {
    pub target: Handle,
}

/// Result of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct GcStats {
    /// Values reclaimed.
    pub collected: usize,
    /// Finalizers run (successfully or not).
    pub finalized: usize,
}

#[derive(Debug)]
pub(crate) struct ScopeFrame {
    pub id: u64,
    pub handles: Vec<Handle>,
}

pub(crate) fn error_slot(kind: ErrorKind, message: Handle, code: Option<Handle>) -> Slot {
    let mut object = Object::new(ObjectKind::Error(kind));
    object.define("message", Property::Data(message));
    if let Some(code) = code {
        object.define("code", Property::Data(code));
    }
    Slot::Object(object)
}

/// In-memory reference implementation of the consumed Node-API surface.
///
/// Managed-side helpers (`string`, `object`, `thrower`, ...) play the role of
/// the calling JavaScript; the [`napiprobe_abi::Env`] impl is what probes see.
pub struct ModelEnv {
    pub(crate) config: ModelConfig,
    pub(crate) heap: Heap,
    pub(crate) scopes: Vec<ScopeFrame>,
    pub(crate) next_scope_id: u64,
    pub(crate) roots: BTreeSet<Handle>,
    pub(crate) pending: Option<Handle>,
    pub(crate) finalizers: BTreeMap<Handle, Finalizer<ModelEnv>>,
    pub(crate) finalizing: bool,
    pub(crate) fatal_errors: Vec<FinalizeError>,
    pub(crate) faults: BTreeMap<AbiCall, Status>,
    pub(crate) call_log: Vec<AbiCall>,
}

impl std::fmt::Debug for ModelEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEnv")
            .field("config", &self.config)
            .field("live", &self.heap.live_count())
            .field("scopes", &self.scopes.len())
            .field("pending", &self.pending)
            .field("finalizers", &self.finalizers.len())
            .finish_non_exhaustive()
    }
}

impl Default for ModelEnv {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl ModelEnv {
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            heap: Heap::new(config.heap_slots),
            scopes: Vec::new(),
            next_scope_id: 1,
            roots: BTreeSet::new(),
            pending: None,
            finalizers: BTreeMap::new(),
            finalizing: false,
            fatal_errors: Vec::new(),
            faults: BTreeMap::new(),
            call_log: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> ModelConfig {
        self.config
    }

    // -- allocation ---------------------------------------------------------

    /// Allocate for an ABI call; a full heap is `napi_generic_failure`.
    pub(crate) fn try_alloc(&mut self, slot: Slot) -> AbiResult<Handle> {
        let handle = self.heap.alloc(slot).ok_or(Status::GenericFailure)?;
        if let Some(scope) = self.scopes.last_mut() {
            scope.handles.push(handle);
        }
        Ok(handle)
    }

    /// Allocate for a managed-side helper.
    ///
    /// # Panics
    /// When the heap is full. Managed code has no status to report it
    /// through, so this is the model's out-of-memory abort.
    fn alloc(&mut self, slot: Slot) -> Handle {
        match self.try_alloc(slot) {
            Ok(handle) => handle,
            Err(_) => panic!("model heap exhausted at {} slots", self.heap.limit()),
        }
    }

    #[must_use]
    pub fn undefined(&self) -> Handle {
        Handle::UNDEFINED
    }

    #[must_use]
    pub fn null(&self) -> Handle {
        Handle::NULL
    }

    #[must_use]
    pub fn boolean(&self, value: bool) -> Handle {
        if value { Handle::TRUE } else { Handle::FALSE }
    }

    pub fn number(&mut self, value: f64) -> Handle {
        self.alloc(Slot::Number(value))
    }

    pub fn string(&mut self, value: &str) -> Handle {
        self.alloc(Slot::String(value.to_string()))
    }

    /// A plain empty object.
    pub fn object(&mut self) -> Handle {
        self.alloc(Slot::Object(Object::new(ObjectKind::Plain)))
    }

    /// A plain object with the given data properties, in order.
    pub fn object_with(&mut self, properties: &[(&str, Handle)]) -> Handle {
        let object = self.object();
        for (key, value) in properties {
            self.set_property(object, key, *value);
        }
        object
    }

    /// A function that throws `thrown` when called.
    pub fn thrower(&mut self, thrown: Handle) -> Handle {
        self.alloc(Slot::Object(Object::new(ObjectKind::Function(
            Callable::Throws(thrown),
        ))))
    }

    /// A function that returns `value` when called.
    pub fn returner(&mut self, value: Handle) -> Handle {
        self.alloc(Slot::Object(Object::new(ObjectKind::Function(
            Callable::Returns(value),
        ))))
    }

    /// An array of `length` slots with the given elements filled in.
    pub fn array(&mut self, length: u32, elements: &[(u32, Handle)]) -> Handle {
        let elements = elements
            .iter()
            .filter(|(index, _)| *index < length)
            .copied()
            .collect();
        self.alloc(Slot::Object(Object::new(ObjectKind::Array {
            length,
            elements,
        })))
    }

    /// An error object of `kind` carrying `message` and an optional `code`.
    pub fn error_value(&mut self, kind: ErrorKind, message: &str, code: Option<&str>) -> Handle {
        let message = self.string(message);
        let code = code.map(|code| self.string(code));
        self.alloc(error_slot(kind, message, code))
    }

    /// [`ModelEnv::error_value`] for ABI calls.
    pub(crate) fn try_error_value(
        &mut self,
        kind: ErrorKind,
        message: &str,
        code: Option<&str>,
    ) -> AbiResult<Handle> {
        let message = self.try_alloc(Slot::String(message.to_string()))?;
        let code = code
            .map(|code| self.try_alloc(Slot::String(code.to_string())))
            .transpose()?;
        self.try_alloc(error_slot(kind, message, code))
    }

    /// Set a data property. Ignored when `object` is not an object.
    pub fn set_property(&mut self, object: Handle, key: &str, value: Handle) {
        if let Some(object) = self.heap.object_mut(object) {
            object.define(key, Property::Data(value));
        }
    }

    /// Define an accessor whose getter throws `thrown`.
    pub fn define_throwing_getter(&mut self, object: Handle, key: &str, thrown: Handle) {
        if let Some(object) = self.heap.object_mut(object) {
            object.define(key, Property::ThrowingGetter(thrown));
        }
    }

    // -- inspection ---------------------------------------------------------

    #[must_use]
    pub fn value_type(&self, handle: Handle) -> Option<ValueType> {
        self.heap.get(handle).map(Slot::value_type)
    }

    #[must_use]
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.heap.get(handle).is_some()
    }

    #[must_use]
    pub fn string_value(&self, handle: Handle) -> Option<&str> {
        match self.heap.get(handle) {
            Some(Slot::String(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn number_value(&self, handle: Handle) -> Option<f64> {
        match self.heap.get(handle) {
            Some(Slot::Number(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool_value(&self, handle: Handle) -> Option<bool> {
        match self.heap.get(handle) {
            Some(Slot::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error_kind(&self, handle: Handle) -> Option<ErrorKind> {
        match self.heap.object(handle)?.kind {
            ObjectKind::Error(kind) => Some(kind),
            _ => None,
        }
    }

    /// Own data property, without running getters.
    #[must_use]
    pub fn property(&self, handle: Handle, key: &str) -> Option<Handle> {
        match self.heap.object(handle)?.own(key)? {
            Property::Data(value) => Some(value),
            Property::ThrowingGetter(_) => None,
        }
    }

    #[must_use]
    pub fn array_length(&self, handle: Handle) -> Option<u32> {
        match &self.heap.object(handle)?.kind {
            ObjectKind::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    /// Whether `index` is an empty slot inside the array's length.
    #[must_use]
    pub fn is_hole(&self, handle: Handle, index: u32) -> bool {
        match self.heap.object(handle).map(|object| &object.kind) {
            Some(ObjectKind::Array { length, elements }) => {
                index < *length && !elements.contains_key(&index)
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn array_element_count(&self, handle: Handle) -> Option<usize> {
        match &self.heap.object(handle)?.kind {
            ObjectKind::Array { elements, .. } => Some(elements.len()),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_tag(&self, handle: Handle) -> Option<TypeTag> {
        self.heap.object(handle)?.type_tag
    }

    /// `===` on model values: identity for objects, value for primitives.
    #[must_use]
    pub fn strict_equals(&self, a: Handle, b: Handle) -> bool {
        match (self.heap.get(a), self.heap.get(b)) {
            (Some(Slot::Object(_)), Some(Slot::Object(_))) => a == b,
            (Some(Slot::Number(x)), Some(Slot::Number(y))) => x == y,
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    #[must_use]
    pub fn live_values(&self) -> usize {
        self.heap.live_count()
    }

    // -- exception state ----------------------------------------------------

    #[must_use]
    pub fn pending_exception(&self) -> Option<Handle> {
        self.pending
    }

    /// Catch the pending exception, as the managed caller would.
    pub fn take_exception(&mut self) -> Option<Handle> {
        self.pending.take()
    }

    // -- rooting and scopes -------------------------------------------------

    /// Keep `handle` alive across collections (a managed-side variable).
    pub fn root(&mut self, handle: Handle) {
        self.roots.insert(handle);
    }

    pub fn unroot(&mut self, handle: Handle) {
        self.roots.remove(&handle);
    }

    #[must_use]
    pub fn open_scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Run `f` inside a fresh handle scope, as a native call from managed
    /// code does. Values created inside become collectable afterwards unless
    /// rooted.
    pub fn with_call_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let id = self.push_scope();
        let out = f(self);
        // Probes balance their own scopes; drop anything left above ours.
        while let Some(frame) = self.scopes.pop() {
            if frame.id == id {
                break;
            }
        }
        out
    }

    pub(crate) fn push_scope(&mut self) -> u64 {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        self.scopes.push(ScopeFrame {
            id,
            handles: Vec::new(),
        });
        id
    }

    // -- fault injection and call log --------------------------------------

    /// Make the next call to `call` fail with `status`.
    pub fn inject_fault(&mut self, call: AbiCall, status: Status) {
        self.faults.insert(call, status);
    }

    /// ABI calls made through the `Env` impl, in order.
    #[must_use]
    pub fn call_log(&self) -> &[AbiCall] {
        &self.call_log
    }

    pub fn clear_call_log(&mut self) {
        self.call_log.clear();
    }

    /// Log `call` and apply an injected fault, if any.
    pub(crate) fn enter(&mut self, call: AbiCall) -> Result<(), Status> {
        self.call_log.push(call);
        match self.faults.remove(&call) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    // -- collection ---------------------------------------------------------

    #[must_use]
    pub fn fatal_errors(&self) -> &[FinalizeError] {
        &self.fatal_errors
    }

    #[must_use]
    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    #[must_use]
    pub fn pending_finalizers(&self) -> usize {
        self.finalizers.len()
    }

    /// Mark from roots, reclaim everything else, then run the finalizers of
    /// reclaimed wrapped objects. Each finalizer runs at most once.
    pub fn collect_garbage(&mut self) -> GcStats {
        let marked = self.mark();
        let dead: Vec<Handle> = self
            .heap
            .live_handles()
            .filter(|handle| handle.0 >= Handle::PERMANENT && !marked.contains(handle))
            .collect();

        let mut ready = Vec::new();
        for handle in &dead {
            if let Some(finalizer) = self.finalizers.remove(handle) {
                ready.push(finalizer);
            }
            self.heap.free(*handle);
        }

        let finalized = ready.len();
        self.finalizing = true;
        for finalizer in ready {
            let id = self.push_scope();
            let result = finalizer(self);
            while let Some(frame) = self.scopes.pop() {
                if frame.id == id {
                    break;
                }
            }
            if let Err(err) = result {
                self.fatal_errors.push(err);
            }
        }
        self.finalizing = false;

        GcStats {
            collected: dead.len(),
            finalized,
        }
    }

    fn mark(&self) -> BTreeSet<Handle> {
        let mut stack: Vec<Handle> = self.roots.iter().copied().collect();
        stack.extend(self.scopes.iter().flat_map(|frame| frame.handles.iter().copied()));
        stack.extend(self.pending);

        let mut marked = BTreeSet::new();
        while let Some(handle) = stack.pop() {
            if !marked.insert(handle) {
                continue;
            }
            if let Some(object) = self.heap.object(handle) {
                stack.extend(object.children());
            }
        }
        marked
    }
}
