//! Fixture loading and management.
//!
//! A fixture case binds named managed values, then runs a list of steps
//! against a fresh model environment: probe calls with an expected outcome,
//! forced collections, and latch resets.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use napiprobe_abi::{ErrorKind, ValueType};
use napiprobe_core::ProbeName;
use napiprobe_model::ModelProfile;
use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FixtureError, HarnessError};

/// Which model profiles a case runs under.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSelection {
    Node,
    Bun,
    #[default]
    Both,
}

impl ProfileSelection {
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        if s.trim().eq_ignore_ascii_case("both") {
            return Some(Self::Both);
        }
        ModelProfile::from_str_loose(s).map(Self::from)
    }

    #[must_use]
    pub fn includes(self, profile: ModelProfile) -> bool {
        match self {
            Self::Both => true,
            Self::Node => profile == ModelProfile::Node,
            Self::Bun => profile == ModelProfile::Bun,
        }
    }

    #[must_use]
    pub fn profiles(self) -> Vec<ModelProfile> {
        ModelProfile::ALL
            .into_iter()
            .filter(|profile| self.includes(*profile))
            .collect()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Bun => "bun",
            Self::Both => "both",
        }
    }
}

impl From<ModelProfile> for ProfileSelection {
    fn from(profile: ModelProfile) -> Self {
        match profile {
            ModelProfile::Node => Self::Node,
            ModelProfile::Bun => Self::Bun,
        }
    }
}

/// Description of a managed value to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsShape {
    Undefined,
    Null,
    Bool {
        value: bool,
    },
    Number {
        value: f64,
    },
    String {
        value: String,
    },
    Object {
        #[serde(default)]
        properties: BTreeMap<String, JsShape>,
        /// Accessors whose getter throws the given value.
        #[serde(default)]
        throwing_getters: BTreeMap<String, JsShape>,
    },
    Array {
        length: u32,
        /// Set slots by index; every other slot is a hole.
        #[serde(default, deserialize_with = "element_indices")]
        elements: BTreeMap<u32, JsShape>,
    },
    Error {
        kind: ErrorKind,
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
    /// A function that throws `throws` when called.
    Thrower {
        throws: Box<JsShape>,
    },
    /// A function that returns `returns` when called.
    Returner {
        returns: Box<JsShape>,
    },
    /// The value bound earlier under `name`.
    Binding {
        name: String,
    },
}

impl JsShape {
    /// Binding names this shape refers to, including nested ones.
    pub fn referenced_bindings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Binding { name } => out.push(name),
            Self::Object {
                properties,
                throwing_getters,
            } => {
                for shape in properties.values().chain(throwing_getters.values()) {
                    shape.referenced_bindings(out);
                }
            }
            Self::Array { elements, .. } => {
                for shape in elements.values() {
                    shape.referenced_bindings(out);
                }
            }
            Self::Thrower { throws: inner } | Self::Returner { returns: inner } => {
                inner.referenced_bindings(out);
            }
            Self::Undefined
            | Self::Null
            | Self::Bool { .. }
            | Self::Number { .. }
            | Self::String { .. }
            | Self::Error { .. } => {}
        }
    }
}

/// Read an element map keyed by index text.
///
/// `JsShape` is internally tagged, so serde buffers its fields and the JSON
/// object keys arrive as strings rather than through the integer key path.
fn element_indices<'de, D>(deserializer: D) -> Result<BTreeMap<u32, JsShape>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, JsShape>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, shape)| match key.parse::<u32>() {
            Ok(index) => Ok((index, shape)),
            Err(_) => Err(D::Error::invalid_value(
                Unexpected::Str(&key),
                &"an array index in 0..=4294967295",
            )),
        })
        .collect()
}

/// A named managed value kept alive for the whole case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub value: JsShape,
}

/// Predicate over a managed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum Matcher {
    Any,
    /// `===` with a bound value.
    Same { binding: String },
    /// `napi_typeof` classification.
    Type { value_type: ValueType },
    /// Primitive equality with a JSON scalar (`null`, bool, number, string).
    Equals { value: serde_json::Value },
    Error {
        kind: ErrorKind,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    /// An array of `length` slots, all empty.
    EmptyArray { length: u32 },
}

/// Expected outcome of a probe call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Expectation {
    /// The probe returned a value.
    Returns { value: Matcher },
    /// The success marker. `pending` describes an exception the probe left
    /// for the caller; without it no exception may be pending.
    Success {
        #[serde(default)]
        pending: Option<Matcher>,
    },
    /// The probe threw.
    Throws { error: Matcher },
}

/// One step of a fixture case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Call {
        probe: String,
        #[serde(default)]
        args: Vec<JsShape>,
        expect: Expectation,
    },
    /// Force a collection. Optionally require a number of finalizers to run.
    CollectGarbage {
        #[serde(default)]
        expect_finalized: Option<usize>,
    },
    ResetLatch,
}

/// A single fixture test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureCase {
    /// Case identifier.
    pub name: String,
    /// Contract clause the case exercises (e.g. `4.3 throw_error`).
    pub contract: String,
    #[serde(default)]
    pub profile: ProfileSelection,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    pub steps: Vec<Step>,
}

impl FixtureCase {
    /// Probe names called by this case, in step order.
    pub fn probes(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::Call { probe, .. } => Some(probe.as_str()),
            Step::CollectGarbage { .. } | Step::ResetLatch => None,
        })
    }

    /// Check probe names, arities and binding references.
    pub fn validate(&self) -> Result<(), FixtureError> {
        let mut bound = BTreeSet::new();
        for binding in &self.bindings {
            self.check_references(&binding.value, &bound)?;
            if !bound.insert(binding.name.as_str()) {
                return Err(FixtureError::DuplicateBinding {
                    case: self.name.clone(),
                    name: binding.name.clone(),
                });
            }
        }

        for step in &self.steps {
            let Step::Call { probe, args, expect } = step else {
                continue;
            };
            let name = ProbeName::parse(probe).ok_or_else(|| FixtureError::UnknownProbe {
                case: self.name.clone(),
                probe: probe.clone(),
            })?;
            if args.len() > name.arity() {
                return Err(FixtureError::TooManyArguments {
                    case: self.name.clone(),
                    probe: probe.clone(),
                    arity: name.arity(),
                    got: args.len(),
                });
            }
            for arg in args {
                self.check_references(arg, &bound)?;
            }
            for matcher in expect.matchers() {
                if let Matcher::Same { binding } = matcher
                    && !bound.contains(binding.as_str())
                {
                    return Err(self.unknown_binding(binding));
                }
            }
        }
        Ok(())
    }

    fn check_references(&self, shape: &JsShape, bound: &BTreeSet<&str>) -> Result<(), FixtureError> {
        let mut refs = Vec::new();
        shape.referenced_bindings(&mut refs);
        match refs.into_iter().find(|name| !bound.contains(name)) {
            Some(name) => Err(self.unknown_binding(name)),
            None => Ok(()),
        }
    }

    fn unknown_binding(&self, name: &str) -> FixtureError {
        FixtureError::UnknownBinding {
            case: self.name.clone(),
            name: name.to_string(),
        }
    }
}

impl Expectation {
    fn matchers(&self) -> impl Iterator<Item = &Matcher> {
        let matcher = match self {
            Self::Returns { value } => Some(value),
            Self::Throws { error } => Some(error),
            Self::Success { pending } => pending.as_ref(),
        };
        matcher.into_iter()
    }
}

/// A collection of fixture cases for one probe family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Schema version.
    pub version: String,
    /// Probe family name.
    pub family: String,
    /// UTC timestamp of capture.
    pub captured_at: String,
    /// Individual test cases.
    pub cases: Vec<FixtureCase>,
}

impl FixtureSet {
    /// Load fixture set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize fixture set to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load and validate a fixture set from a file path.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|err| HarnessError::io(path, err))?;
        let set = Self::from_json(&content).map_err(|source| HarnessError::Json {
            path: path.display().to_string(),
            source,
        })?;
        set.validate().map_err(|source| HarnessError::Fixture {
            path: path.display().to_string(),
            source,
        })?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), FixtureError> {
        self.cases.iter().try_for_each(FixtureCase::validate)
    }
}

/// Load every `*.json` fixture set in `dir`, sorted by path.
pub fn load_dir(dir: &Path) -> Result<Vec<(PathBuf, FixtureSet)>, HarnessError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|err| HarnessError::io(dir, err))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(HarnessError::NoFixtures(dir.display().to_string()));
    }
    paths
        .into_iter()
        .map(|path| FixtureSet::from_file(&path).map(|set| (path, set)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "v1",
        "family": "property",
        "captured_at": "2026-10-19T00:00:00Z",
        "cases": [{
            "name": "named_read",
            "contract": "4.4 perform_get",
            "bindings": [
                {"name": "obj", "value": {"type": "object", "properties": {"a": {"type": "number", "value": 1}}}}
            ],
            "steps": [
                {"op": "call", "probe": "perform_get",
                 "args": [{"type": "binding", "name": "obj"}, {"type": "string", "value": "a"}],
                 "expect": {"outcome": "returns", "value": {"match": "equals", "value": 1}}},
                {"op": "collect_garbage"},
                {"op": "reset_latch"}
            ]
        }]
    }"#;

    #[test]
    fn parses_sample_fixture() {
        let set = FixtureSet::from_json(SAMPLE).expect("valid fixture json");
        assert_eq!(set.cases.len(), 1);
        let case = &set.cases[0];
        assert_eq!(case.profile, ProfileSelection::Both);
        assert_eq!(case.steps.len(), 3);
        assert_eq!(case.probes().collect::<Vec<_>>(), ["perform_get"]);
        set.validate().expect("valid references");
    }

    #[test]
    fn array_elements_parse_from_index_keys() {
        let shape: JsShape = serde_json::from_str(
            r#"{"type": "array", "length": 3,
                "elements": {"1": {"type": "string", "value": "b"}, "0": {"type": "null"}}}"#,
        )
        .expect("array shape");
        let JsShape::Array { length, elements } = shape else {
            panic!("expected an array shape");
        };
        assert_eq!(length, 3);
        assert_eq!(elements.keys().copied().collect::<Vec<_>>(), [0, 1]);
        assert_eq!(
            elements[&1],
            JsShape::String {
                value: "b".into()
            }
        );

        // Nested inside another tagged value as well.
        let nested: JsShape = serde_json::from_str(
            r#"{"type": "returner", "returns":
                {"type": "array", "length": 2, "elements": {"1": {"type": "bool", "value": true}}}}"#,
        )
        .expect("nested array shape");
        let JsShape::Returner { returns } = nested else {
            panic!("expected a returner shape");
        };
        assert!(matches!(*returns, JsShape::Array { ref elements, .. } if elements.contains_key(&1)));
    }

    #[test]
    fn array_elements_reject_non_index_keys() {
        for key in ["x", "-1", "4294967296"] {
            let json = format!(
                r#"{{"type": "array", "length": 1, "elements": {{"{key}": {{"type": "null"}}}}}}"#
            );
            let err = serde_json::from_str::<JsShape>(&json).expect_err("bad index key");
            assert!(err.to_string().contains("array index"), "{key}: {err}");
        }
    }

    #[test]
    fn rejects_unknown_probe_and_binding() {
        let mut set = FixtureSet::from_json(SAMPLE).expect("valid fixture json");
        let mut case = set.cases[0].clone();
        case.steps[0] = Step::Call {
            probe: "perform_set".into(),
            args: vec![],
            expect: Expectation::Success { pending: None },
        };
        assert!(matches!(case.validate(), Err(FixtureError::UnknownProbe { .. })));

        set.cases[0].steps[0] = Step::Call {
            probe: "perform_get".into(),
            args: vec![JsShape::Binding { name: "nope".into() }],
            expect: Expectation::Success { pending: None },
        };
        assert_eq!(
            set.validate(),
            Err(FixtureError::UnknownBinding {
                case: "named_read".into(),
                name: "nope".into()
            })
        );
    }

    #[test]
    fn rejects_extra_arguments() {
        let mut set = FixtureSet::from_json(SAMPLE).expect("valid fixture json");
        set.cases[0].steps[0] = Step::Call {
            probe: "was_finalize_called".into(),
            args: vec![JsShape::Undefined],
            expect: Expectation::Success { pending: None },
        };
        assert!(matches!(
            set.validate(),
            Err(FixtureError::TooManyArguments { arity: 0, got: 1, .. })
        ));
    }

    #[test]
    fn bindings_may_only_reference_earlier_bindings() {
        let case = FixtureCase {
            name: "order".into(),
            contract: "4.2".into(),
            profile: ProfileSelection::Node,
            bindings: vec![
                Binding {
                    name: "f".into(),
                    value: JsShape::Thrower {
                        throws: Box::new(JsShape::Binding { name: "e".into() }),
                    },
                },
                Binding {
                    name: "e".into(),
                    value: JsShape::Null,
                },
            ],
            steps: vec![],
        };
        assert!(matches!(case.validate(), Err(FixtureError::UnknownBinding { .. })));
    }

    #[test]
    fn profile_selection_parsing() {
        assert_eq!(ProfileSelection::from_str_loose("BOTH"), Some(ProfileSelection::Both));
        assert_eq!(ProfileSelection::from_str_loose("jsc"), Some(ProfileSelection::Bun));
        assert_eq!(ProfileSelection::from_str_loose("deno"), None);
        assert_eq!(ProfileSelection::Both.profiles(), ModelProfile::ALL.to_vec());
        assert_eq!(ProfileSelection::Node.profiles(), vec![ModelProfile::Node]);
    }
}
