//! Human-readable rendering of model values for reports and diffs.

use crate::env::ModelEnv;
use crate::heap::{Callable, Handle, ObjectKind, Slot};

/// Format a number the way `String(n)` does for the values the model produces.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }
    format!("{value}")
}

impl ModelEnv {
    /// Property-key string for a primitive or object value.
    pub(crate) fn key_string(&self, key: Handle) -> Option<String> {
        Some(match self.heap.get(key)? {
            Slot::Undefined => "undefined".to_string(),
            Slot::Null => "null".to_string(),
            Slot::Bool(value) => value.to_string(),
            Slot::Number(value) => format_number(*value),
            Slot::String(value) => value.clone(),
            Slot::Object(_) => "[object Object]".to_string(),
        })
    }

    /// One-line description of a value, e.g. `"abc"`, `[TypeError: bad]`,
    /// `Array(3)`.
    #[must_use]
    pub fn describe(&self, handle: Handle) -> String {
        let Some(slot) = self.heap.get(handle) else {
            return format!("<collected #{}>", handle.index());
        };
        match slot {
            Slot::Undefined => "undefined".to_string(),
            Slot::Null => "null".to_string(),
            Slot::Bool(value) => value.to_string(),
            Slot::Number(value) => format_number(*value),
            Slot::String(value) => format!("{value:?}"),
            Slot::Object(object) => match &object.kind {
                ObjectKind::Plain => {
                    if object.properties.is_empty() {
                        "{}".to_string()
                    } else {
                        let keys: Vec<&str> =
                            object.properties.iter().map(|(key, _)| key.as_str()).collect();
                        format!("{{{}}}", keys.join(", "))
                    }
                }
                ObjectKind::Array { length, .. } => format!("Array({length})"),
                ObjectKind::Function(Callable::Throws(_)) => "[Function: thrower]".to_string(),
                ObjectKind::Function(Callable::Returns(_)) => "[Function: returner]".to_string(),
                ObjectKind::Error(kind) => {
                    let message = self
                        .property(handle, "message")
                        .and_then(|message| self.string_value(message))
                        .unwrap_or_default();
                    format!("[{}: {message}]", kind.class_name())
                }
            },
        }
    }
}
