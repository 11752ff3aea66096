//! Per-run probe state: the finalize latch and diagnostic records.

use std::collections::VecDeque;
use std::fmt;

use napiprobe_abi::ValueType;
use serde::{Deserialize, Serialize};

use crate::latch::FinalizeLatch;
use crate::name::ProbeName;

/// Retained diagnostics before the oldest are dropped.
const MAX_DIAGNOSTICS: usize = 256;

/// What a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Runtime type of an exception captured by `call_and_get_exception`.
    ThrownExceptionType,
    /// Runtime type of a value resolved by `perform_get`.
    ResolvedValueType,
}

/// One diagnostic emitted by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub probe: ProbeName,
    pub event: DiagnosticEvent,
    pub value_type: ValueType,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.event {
            DiagnosticEvent::ThrownExceptionType => {
                write!(f, "typeof thrown exception = {}", self.value_type)
            }
            DiagnosticEvent::ResolvedValueType => write!(f, "value type = {}", self.value_type),
        }
    }
}

/// State injected into every probe call.
#[derive(Debug, Default)]
pub struct ProbeContext {
    latch: FinalizeLatch,
    diagnostics: VecDeque<Diagnostic>,
}

impl ProbeContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context sharing `latch` with its owner but keeping its own
    /// diagnostics, for one call that may re-enter the owner.
    #[must_use]
    pub fn with_latch(latch: FinalizeLatch) -> Self {
        Self {
            latch,
            diagnostics: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn latch(&self) -> &FinalizeLatch {
        &self.latch
    }

    #[must_use]
    pub fn was_finalize_called(&self) -> bool {
        self.latch.is_set()
    }

    /// Clear the latch and pending diagnostics before an independent run.
    pub fn reset(&mut self) {
        self.latch.reset();
        self.diagnostics.clear();
    }

    pub fn record(&mut self, probe: ProbeName, event: DiagnosticEvent, value_type: ValueType) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(Diagnostic {
            probe,
            event,
            value_type,
        });
    }

    /// Append the diagnostics of a finished call context, keeping the bound.
    pub fn absorb(&mut self, mut call: Self) {
        for diagnostic in call.diagnostics.drain(..) {
            self.record(diagnostic.probe, diagnostic.event, diagnostic.value_type);
        }
    }

    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_render_probe_lines() {
        let mut ctx = ProbeContext::new();
        ctx.record(
            ProbeName::CallAndGetException,
            DiagnosticEvent::ThrownExceptionType,
            ValueType::Object,
        );
        ctx.record(
            ProbeName::PerformGet,
            DiagnosticEvent::ResolvedValueType,
            ValueType::Number,
        );
        let lines: Vec<String> = ctx
            .drain_diagnostics()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            lines,
            ["typeof thrown exception = object", "value type = number"]
        );
        assert!(ctx.drain_diagnostics().is_empty());
    }

    #[test]
    fn diagnostics_are_bounded() {
        let mut ctx = ProbeContext::new();
        for _ in 0..(MAX_DIAGNOSTICS + 10) {
            ctx.record(
                ProbeName::PerformGet,
                DiagnosticEvent::ResolvedValueType,
                ValueType::String,
            );
        }
        assert_eq!(ctx.drain_diagnostics().len(), MAX_DIAGNOSTICS);
    }

    #[test]
    fn call_context_shares_latch_and_merges_diagnostics() {
        let mut owner = ProbeContext::new();
        owner.record(
            ProbeName::PerformGet,
            DiagnosticEvent::ResolvedValueType,
            ValueType::Number,
        );

        let mut outer = ProbeContext::with_latch(owner.latch().clone());
        // A nested call finishes and merges before the outer one does.
        let mut inner = ProbeContext::with_latch(owner.latch().clone());
        inner.latch().fire();
        inner.record(
            ProbeName::PerformGet,
            DiagnosticEvent::ResolvedValueType,
            ValueType::String,
        );
        owner.absorb(inner);
        outer.record(
            ProbeName::CallAndGetException,
            DiagnosticEvent::ThrownExceptionType,
            ValueType::Object,
        );
        assert!(outer.was_finalize_called());
        owner.absorb(outer);

        assert!(owner.was_finalize_called());
        let types: Vec<ValueType> = owner
            .drain_diagnostics()
            .iter()
            .map(|d| d.value_type)
            .collect();
        assert_eq!(
            types,
            [ValueType::Number, ValueType::String, ValueType::Object]
        );
    }

    #[test]
    fn absorb_respects_the_bound() {
        let mut owner = ProbeContext::new();
        let mut call = ProbeContext::with_latch(owner.latch().clone());
        for _ in 0..MAX_DIAGNOSTICS {
            owner.record(
                ProbeName::PerformGet,
                DiagnosticEvent::ResolvedValueType,
                ValueType::Null,
            );
            call.record(
                ProbeName::PerformGet,
                DiagnosticEvent::ResolvedValueType,
                ValueType::Boolean,
            );
        }
        owner.absorb(call);
        let drained = owner.drain_diagnostics();
        assert_eq!(drained.len(), MAX_DIAGNOSTICS);
        assert!(drained.iter().all(|d| d.value_type == ValueType::Boolean));
    }

    #[test]
    fn reset_clears_latch_and_diagnostics() {
        let mut ctx = ProbeContext::new();
        ctx.latch().fire();
        ctx.record(
            ProbeName::PerformGet,
            DiagnosticEvent::ResolvedValueType,
            ValueType::Undefined,
        );
        ctx.reset();
        assert!(!ctx.was_finalize_called());
        assert!(ctx.drain_diagnostics().is_empty());
    }
}
