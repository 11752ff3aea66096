//! Probe to contract traceability.
//!
//! Maps every exported probe to its contract clause, its managed signature,
//! the Node-API symbols it consumes, and the fixture cases that call it.

use std::collections::BTreeSet;

use napiprobe_core::ProbeName;
use serde::{Deserialize, Serialize};

use crate::fixtures::FixtureSet;

/// A traceability entry for one probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceabilityEntry {
    pub probe: ProbeName,
    /// Contract clause, e.g. `4.3 Error construction`.
    pub contract: String,
    pub signature: String,
    /// Consumed C symbols, in call order.
    pub abi_symbols: Vec<String>,
    /// Fixture cases calling the probe, as `family/case`.
    pub fixture_cases: Vec<String>,
}

/// Contract clause a probe implements.
#[must_use]
pub const fn contract_section(probe: ProbeName) -> &'static str {
    match probe {
        ProbeName::CreateRefWithFinalizer | ProbeName::WasFinalizeCalled => "4.1 Finalizer",
        ProbeName::CallAndGetException => "4.2 Exception capture",
        ProbeName::ThrowError | ProbeName::CreateAndThrowError => "4.3 Error construction",
        ProbeName::PerformGet => "4.4 Property access",
        ProbeName::AddTag | ProbeName::CheckTag => "4.5 Type tags",
        ProbeName::MakeEmptyArray => "4.6 Array construction",
    }
}

/// Traceability matrix builder.
#[derive(Debug, Default, Serialize)]
pub struct TraceabilityMatrix {
    entries: Vec<TraceabilityEntry>,
}

impl TraceabilityMatrix {
    /// Create a new empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per exported probe, with coverage taken from `sets`.
    #[must_use]
    pub fn from_fixtures(sets: &[FixtureSet]) -> Self {
        let mut matrix = Self::new();
        for probe in ProbeName::ALL {
            let fixture_cases: BTreeSet<String> = sets
                .iter()
                .flat_map(|set| {
                    set.cases
                        .iter()
                        .filter(move |case| case.probes().any(|name| name == probe.as_str()))
                        .map(move |case| format!("{}/{}", set.family, case.name))
                })
                .collect();
            matrix.add(TraceabilityEntry {
                probe,
                contract: contract_section(probe).to_string(),
                signature: probe.signature().to_string(),
                abi_symbols: probe
                    .abi_calls()
                    .iter()
                    .map(|call| call.symbol().to_string())
                    .collect(),
                fixture_cases: fixture_cases.into_iter().collect(),
            });
        }
        matrix
    }

    /// Add a traceability entry.
    pub fn add(&mut self, entry: TraceabilityEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Probes no fixture case calls.
    pub fn uncovered(&self) -> impl Iterator<Item = ProbeName> + '_ {
        self.entries
            .iter()
            .filter(|e| e.fixture_cases.is_empty())
            .map(|e| e.probe)
    }

    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Traceability Matrix\n\n");
        out.push_str("| Probe | Contract | Signature | ABI symbols | Cases |\n");
        out.push_str("|-------|----------|-----------|-------------|-------|\n");
        for e in &self.entries {
            out.push_str(&format!(
                "| {} | {} | `{}` | {} | {} |\n",
                e.probe,
                e.contract,
                e.signature.replace('|', "\\|"),
                e.abi_symbols.join(", "),
                e.fixture_cases.len()
            ));
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Entries count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the matrix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
