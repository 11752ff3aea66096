//! Building fixture values in the model and matching probe results.

use std::collections::BTreeMap;
use std::fmt;

use napiprobe_abi::ValueType;
use napiprobe_model::{Handle, ModelEnv};

use crate::fixtures::{Expectation, JsShape, Matcher};

/// Handles of a case's named bindings.
pub type Bindings = BTreeMap<String, Handle>;

/// Create the value described by `shape`. Unknown bindings read as
/// `undefined`; fixture validation rejects them before a run.
pub fn materialize(env: &mut ModelEnv, bindings: &Bindings, shape: &JsShape) -> Handle {
    match shape {
        JsShape::Undefined => env.undefined(),
        JsShape::Null => env.null(),
        JsShape::Bool { value } => env.boolean(*value),
        JsShape::Number { value } => env.number(*value),
        JsShape::String { value } => env.string(value),
        JsShape::Object {
            properties,
            throwing_getters,
        } => {
            let object = env.object();
            for (key, value) in properties {
                let value = materialize(env, bindings, value);
                env.set_property(object, key, value);
            }
            for (key, thrown) in throwing_getters {
                let thrown = materialize(env, bindings, thrown);
                env.define_throwing_getter(object, key, thrown);
            }
            object
        }
        JsShape::Array { length, elements } => {
            let elements: Vec<(u32, Handle)> = elements
                .iter()
                .map(|(index, value)| (*index, materialize(env, bindings, value)))
                .collect();
            env.array(*length, &elements)
        }
        JsShape::Error {
            kind,
            message,
            code,
        } => env.error_value(*kind, message, code.as_deref()),
        JsShape::Thrower { throws } => {
            let thrown = materialize(env, bindings, throws);
            env.thrower(thrown)
        }
        JsShape::Returner { returns } => {
            let value = materialize(env, bindings, returns);
            env.returner(value)
        }
        JsShape::Binding { name } => bindings.get(name).copied().unwrap_or(Handle::UNDEFINED),
    }
}

/// Whether `handle` satisfies `matcher`.
#[must_use]
pub fn matches(env: &ModelEnv, bindings: &Bindings, matcher: &Matcher, handle: Handle) -> bool {
    match matcher {
        Matcher::Any => true,
        Matcher::Same { binding } => bindings
            .get(binding)
            .is_some_and(|bound| env.strict_equals(*bound, handle)),
        Matcher::Type { value_type } => env.value_type(handle) == Some(*value_type),
        Matcher::Equals { value } => match value {
            serde_json::Value::Null => env.value_type(handle) == Some(ValueType::Null),
            serde_json::Value::Bool(expected) => env.bool_value(handle) == Some(*expected),
            serde_json::Value::Number(expected) => {
                expected.as_f64().is_some_and(|expected| env.number_value(handle) == Some(expected))
            }
            serde_json::Value::String(expected) => {
                env.string_value(handle) == Some(expected.as_str())
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => false,
        },
        Matcher::Error {
            kind,
            message,
            code,
        } => {
            let field = |name: &str| {
                env.property(handle, name)
                    .and_then(|value| env.string_value(value))
            };
            env.error_kind(handle) == Some(*kind)
                && message
                    .as_deref()
                    .is_none_or(|message| field("message") == Some(message))
                && code.as_deref().is_none_or(|code| field("code") == Some(code))
        }
        Matcher::EmptyArray { length } => {
            env.array_length(handle) == Some(*length) && env.array_element_count(handle) == Some(0)
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Same { binding } => write!(f, "=== {binding}"),
            Self::Type { value_type } => write!(f, "typeof {value_type}"),
            Self::Equals { value } => write!(f, "{value}"),
            Self::Error {
                kind,
                message,
                code,
            } => {
                write!(f, "[{}", kind.class_name())?;
                if let Some(message) = message {
                    write!(f, ": {message}")?;
                }
                f.write_str("]")?;
                if let Some(code) = code {
                    write!(f, " code={code}")?;
                }
                Ok(())
            }
            Self::EmptyArray { length } => write!(f, "Array({length}) of holes"),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returns { value } => write!(f, "returns {value}"),
            Self::Success { pending: None } => f.write_str("success"),
            Self::Success {
                pending: Some(pending),
            } => write!(f, "success (pending {pending})"),
            Self::Throws { error } => write!(f, "throws {error}"),
        }
    }
}

/// Render a value the way [`Matcher`]'s display renders expectations.
#[must_use]
pub fn render_value(env: &ModelEnv, handle: Handle) -> String {
    let mut out = env.describe(handle);
    if env.error_kind(handle).is_some()
        && let Some(code) = env
            .property(handle, "code")
            .and_then(|code| env.string_value(code))
    {
        out.push_str(&format!(" code={code}"));
    }
    if env.array_length(handle).is_some() && env.array_element_count(handle) == Some(0) {
        out.push_str(" of holes");
    }
    out
}

#[cfg(test)]
mod tests {
    use napiprobe_abi::ErrorKind;

    use super::*;

    #[test]
    fn materialize_nested_shapes() {
        let mut env = ModelEnv::default();
        let mut bindings = Bindings::new();
        let shared = env.string("shared");
        bindings.insert("s".into(), shared);

        let shape = JsShape::Object {
            properties: BTreeMap::from([
                ("ref".into(), JsShape::Binding { name: "s".into() }),
                (
                    "list".into(),
                    JsShape::Array {
                        length: 4,
                        elements: BTreeMap::from([(1, JsShape::Bool { value: true })]),
                    },
                ),
            ]),
            throwing_getters: BTreeMap::from([("boom".into(), JsShape::Null)]),
        };
        let object = materialize(&mut env, &bindings, &shape);
        assert_eq!(env.property(object, "ref"), Some(shared));
        let list = env.property(object, "list").expect("list");
        assert_eq!(env.array_length(list), Some(4));
        assert!(env.is_hole(list, 0));
        assert!(!env.is_hole(list, 1));
        assert_eq!(env.property(object, "boom"), None);
    }

    #[test]
    fn matchers_compare_values() {
        let mut env = ModelEnv::default();
        let bindings = Bindings::new();
        let one = env.number(1.0);
        let text = env.string("a");
        let error = env.error_value(ErrorKind::RangeError, "msg", Some("E_R"));
        let holes = env.array(3, &[]);

        let equals = |value| Matcher::Equals { value };
        assert!(matches(&env, &bindings, &equals(serde_json::json!(1)), one));
        assert!(!matches(&env, &bindings, &equals(serde_json::json!(2)), one));
        assert!(matches(&env, &bindings, &equals(serde_json::json!("a")), text));
        assert!(matches(&env, &bindings, &equals(serde_json::Value::Null), Handle::NULL));
        assert!(matches(
            &env,
            &bindings,
            &Matcher::Error {
                kind: ErrorKind::RangeError,
                message: Some("msg".into()),
                code: Some("E_R".into()),
            },
            error
        ));
        assert!(!matches(
            &env,
            &bindings,
            &Matcher::Error {
                kind: ErrorKind::TypeError,
                message: None,
                code: None,
            },
            error
        ));
        assert!(matches(&env, &bindings, &Matcher::EmptyArray { length: 3 }, holes));
        assert!(matches(
            &env,
            &bindings,
            &Matcher::Type {
                value_type: ValueType::String
            },
            text
        ));
    }

    #[test]
    fn expectation_text_mirrors_rendered_values() {
        let mut env = ModelEnv::default();
        let error = env.error_value(ErrorKind::SyntaxError, "m", None);
        let expected = Expectation::Throws {
            error: Matcher::Error {
                kind: ErrorKind::SyntaxError,
                message: Some("m".into()),
                code: None,
            },
        };
        assert_eq!(expected.to_string(), format!("throws {}", render_value(&env, error)));

        let holes = env.array(2, &[]);
        let expected = Expectation::Returns {
            value: Matcher::EmptyArray { length: 2 },
        };
        assert_eq!(expected.to_string(), format!("returns {}", render_value(&env, holes)));
    }
}
