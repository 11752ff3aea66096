//! `Env` implementation for the model.
//!
//! Calls that may run managed code (function calls, property reads, throws,
//! wraps and tagging) refuse to start while an exception is pending and
//! return `napi_pending_exception`. Value accessors and constructors do not.

use std::collections::BTreeMap;

use napiprobe_abi::{
    AbiCall, AbiResult, Env, ErrorKind, Finalizer, Status, TypeTag, ValueType,
};

use crate::config::ModelProfile;
use crate::env::{ModelEnv, ModelRef, ModelScope, error_slot};
use crate::heap::{Callable, Handle, Object, ObjectKind, Property, Slot};

/// Outcome of a property lookup, computed before any allocation.
enum Lookup {
    Value(Handle),
    Throws(Handle),
    Length(u32),
    Name(ErrorKind),
    Missing,
}

impl ModelEnv {
    fn preamble(&mut self, call: AbiCall) -> AbiResult<()> {
        self.enter(call)?;
        if self.pending.is_some() {
            return Err(Status::PendingException);
        }
        Ok(())
    }

    fn slot(&self, handle: Handle) -> AbiResult<&Slot> {
        self.heap.get(handle).ok_or(Status::InvalidArg)
    }

    fn require_object(&self, handle: Handle) -> AbiResult<()> {
        match self.slot(handle)? {
            Slot::Object(_) => Ok(()),
            _ => Err(Status::ObjectExpected),
        }
    }

    fn lookup(&mut self, object: Handle, key: &str) -> AbiResult<Handle> {
        let found = {
            let Some(target) = self.heap.object(object) else {
                return Err(Status::ObjectExpected);
            };
            match target.own(key) {
                Some(Property::Data(value)) => Lookup::Value(value),
                Some(Property::ThrowingGetter(thrown)) => Lookup::Throws(thrown),
                None => match &target.kind {
                    ObjectKind::Array { length, .. } if key == "length" => Lookup::Length(*length),
                    ObjectKind::Array { elements, .. } => key
                        .parse::<u32>()
                        .ok()
                        .and_then(|index| elements.get(&index).copied())
                        .map_or(Lookup::Missing, Lookup::Value),
                    ObjectKind::Error(kind) if key == "name" => Lookup::Name(*kind),
                    _ => Lookup::Missing,
                },
            }
        };
        match found {
            Lookup::Value(value) => Ok(value),
            Lookup::Throws(thrown) => {
                self.pending = Some(thrown);
                Err(Status::PendingException)
            }
            Lookup::Length(length) => self.try_alloc(Slot::Number(f64::from(length))),
            Lookup::Name(kind) => self.try_alloc(Slot::String(kind.class_name().to_string())),
            Lookup::Missing => Ok(Handle::UNDEFINED),
        }
    }

    fn throw_kind(
        &mut self,
        call: AbiCall,
        kind: ErrorKind,
        code: Option<&str>,
        msg: Option<&str>,
    ) -> AbiResult<()> {
        self.preamble(call)?;
        let msg = msg.ok_or(Status::InvalidArg)?;
        let error = self.try_error_value(kind, msg, code)?;
        self.pending = Some(error);
        Ok(())
    }

    fn create_kind(
        &mut self,
        call: AbiCall,
        kind: ErrorKind,
        code: Option<Handle>,
        msg: Option<Handle>,
    ) -> AbiResult<Handle> {
        self.enter(call)?;
        let code_ok = |env: &Self| -> AbiResult<()> {
            match code {
                Some(code) if env.slot(code)?.value_type() != ValueType::String => {
                    Err(Status::StringExpected)
                }
                _ => Ok(()),
            }
        };
        let msg_ok = |env: &Self| -> AbiResult<Handle> {
            let msg = msg.ok_or(Status::InvalidArg)?;
            if env.slot(msg)?.value_type() != ValueType::String {
                return Err(Status::StringExpected);
            }
            Ok(msg)
        };
        let msg = match self.config.profile {
            ModelProfile::Node => {
                let msg = msg_ok(self)?;
                code_ok(self)?;
                msg
            }
            ModelProfile::Bun => {
                code_ok(self)?;
                msg_ok(self)?
            }
        };
        self.try_alloc(error_slot(kind, msg, code))
    }
}

/// `ToUint32`: truncate, then wrap modulo 2^32. Non-finite values map to 0.
fn to_uint32(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    let wrapped = value.trunc().rem_euclid(4_294_967_296.0);
    // In range [0, 2^32) after rem_euclid.
    wrapped as u32
}

/// Longest prefix of `value` that fits in `capacity - 1` bytes without
/// splitting a character.
fn truncate_utf8(value: &str, capacity: usize) -> &str {
    let limit = capacity.saturating_sub(1);
    if value.len() <= limit {
        return value;
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

impl Env for ModelEnv {
    type Value = Handle;
    type Scope = ModelScope;
    type Reference = ModelRef;

    fn get_undefined(&mut self) -> AbiResult<Handle> {
        self.enter(AbiCall::GetUndefined)?;
        Ok(Handle::UNDEFINED)
    }

    fn get_boolean(&mut self, value: bool) -> AbiResult<Handle> {
        self.enter(AbiCall::GetBoolean)?;
        Ok(self.boolean(value))
    }

    fn type_of(&mut self, value: Handle) -> AbiResult<ValueType> {
        self.enter(AbiCall::Typeof)?;
        Ok(self.slot(value)?.value_type())
    }

    fn get_value_bool(&mut self, value: Handle) -> AbiResult<bool> {
        self.enter(AbiCall::GetValueBool)?;
        match self.slot(value)? {
            Slot::Bool(value) => Ok(*value),
            _ => Err(Status::BooleanExpected),
        }
    }

    fn get_value_uint32(&mut self, value: Handle) -> AbiResult<u32> {
        self.enter(AbiCall::GetValueUint32)?;
        match self.slot(value)? {
            Slot::Number(value) => Ok(to_uint32(*value)),
            _ => Err(Status::NumberExpected),
        }
    }

    fn get_value_string_utf8(&mut self, value: Handle, capacity: usize) -> AbiResult<String> {
        self.enter(AbiCall::GetValueStringUtf8)?;
        match self.slot(value)? {
            Slot::String(value) => Ok(truncate_utf8(value, capacity).to_string()),
            _ => Err(Status::StringExpected),
        }
    }

    fn create_object(&mut self) -> AbiResult<Handle> {
        self.enter(AbiCall::CreateObject)?;
        self.try_alloc(Slot::Object(Object::new(ObjectKind::Plain)))
    }

    fn create_array_with_length(&mut self, length: u32) -> AbiResult<Handle> {
        self.enter(AbiCall::CreateArrayWithLength)?;
        self.try_alloc(Slot::Object(Object::new(ObjectKind::Array {
            length,
            elements: BTreeMap::new(),
        })))
    }

    fn wrap(&mut self, object: Handle, finalizer: Finalizer<Self>) -> AbiResult<ModelRef> {
        self.preamble(AbiCall::Wrap)?;
        self.require_object(object)?;
        if self.finalizers.contains_key(&object) {
            return Err(Status::InvalidArg);
        }
        self.finalizers.insert(object, finalizer);
        Ok(ModelRef { target: object })
    }

    fn open_handle_scope(&mut self) -> AbiResult<ModelScope> {
        self.enter(AbiCall::OpenHandleScope)?;
        if self.finalizing && !self.config.scopes_in_finalizer {
            return Err(Status::GenericFailure);
        }
        Ok(ModelScope {
            id: self.push_scope(),
        })
    }

    fn close_handle_scope(&mut self, scope: ModelScope) -> AbiResult<()> {
        self.enter(AbiCall::CloseHandleScope)?;
        match self.scopes.last() {
            Some(frame) if frame.id == scope.id => {
                self.scopes.pop();
                Ok(())
            }
            _ => Err(Status::HandleScopeMismatch),
        }
    }

    fn call_function(&mut self, _recv: Handle, func: Handle, args: &[Handle]) -> AbiResult<Handle> {
        self.preamble(AbiCall::CallFunction)?;
        for arg in args {
            self.slot(*arg)?;
        }
        let callable = match self.slot(func)? {
            Slot::Object(object) => match object.kind {
                ObjectKind::Function(callable) => callable,
                _ => return Err(Status::FunctionExpected),
            },
            _ => return Err(Status::FunctionExpected),
        };
        match callable {
            Callable::Returns(value) => Ok(value),
            Callable::Throws(thrown) => {
                self.pending = Some(thrown);
                Err(Status::PendingException)
            }
        }
    }

    fn is_exception_pending(&mut self) -> AbiResult<bool> {
        self.enter(AbiCall::IsExceptionPending)?;
        Ok(self.pending.is_some())
    }

    fn get_and_clear_last_exception(&mut self) -> AbiResult<Handle> {
        self.enter(AbiCall::GetAndClearLastException)?;
        Ok(self.pending.take().unwrap_or(Handle::UNDEFINED))
    }

    fn throw(&mut self, error: Handle) -> AbiResult<()> {
        self.preamble(AbiCall::Throw)?;
        self.slot(error)?;
        self.pending = Some(error);
        Ok(())
    }

    fn throw_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_kind(AbiCall::ThrowError, ErrorKind::Error, code, msg)
    }

    fn throw_type_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_kind(AbiCall::ThrowTypeError, ErrorKind::TypeError, code, msg)
    }

    fn throw_range_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_kind(AbiCall::ThrowRangeError, ErrorKind::RangeError, code, msg)
    }

    fn throw_syntax_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_kind(AbiCall::ThrowSyntaxError, ErrorKind::SyntaxError, code, msg)
    }

    fn create_error(&mut self, code: Option<Handle>, msg: Option<Handle>) -> AbiResult<Handle> {
        self.create_kind(AbiCall::CreateError, ErrorKind::Error, code, msg)
    }

    fn create_type_error(
        &mut self,
        code: Option<Handle>,
        msg: Option<Handle>,
    ) -> AbiResult<Handle> {
        self.create_kind(AbiCall::CreateTypeError, ErrorKind::TypeError, code, msg)
    }

    fn create_range_error(
        &mut self,
        code: Option<Handle>,
        msg: Option<Handle>,
    ) -> AbiResult<Handle> {
        self.create_kind(AbiCall::CreateRangeError, ErrorKind::RangeError, code, msg)
    }

    fn create_syntax_error(
        &mut self,
        code: Option<Handle>,
        msg: Option<Handle>,
    ) -> AbiResult<Handle> {
        self.create_kind(AbiCall::CreateSyntaxError, ErrorKind::SyntaxError, code, msg)
    }

    fn get_named_property(&mut self, object: Handle, name: &str) -> AbiResult<Handle> {
        self.preamble(AbiCall::GetNamedProperty)?;
        self.require_object(object)?;
        self.lookup(object, name)
    }

    fn get_property(&mut self, object: Handle, key: Handle) -> AbiResult<Handle> {
        self.preamble(AbiCall::GetProperty)?;
        self.require_object(object)?;
        let key = self.key_string(key).ok_or(Status::InvalidArg)?;
        self.lookup(object, &key)
    }

    fn type_tag_object(&mut self, object: Handle, tag: &TypeTag) -> AbiResult<()> {
        self.preamble(AbiCall::TypeTagObject)?;
        let target = self.heap.object_mut(object).ok_or(Status::ObjectExpected)?;
        if target.type_tag.is_some() {
            return Err(Status::InvalidArg);
        }
        target.type_tag = Some(*tag);
        Ok(())
    }

    fn check_object_type_tag(&mut self, object: Handle, tag: &TypeTag) -> AbiResult<bool> {
        self.preamble(AbiCall::CheckObjectTypeTag)?;
        let target = self.heap.object(object).ok_or(Status::ObjectExpected)?;
        Ok(target.type_tag.as_ref() == Some(tag))
    }
}
