//! Model environment configuration.
//!
//! The validation profile is set via the `NAPIPROBE_PROFILE` environment variable:
//! - `node` (default): error constructors check `msg` presence, then `msg`
//!   type, then `code` type.
//! - `bun`: error constructors check `code` type before looking at `msg`.
//!
//! Both orders are conforming; the probes accept either resulting status.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Argument-validation order emulated by the model.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProfile {
    #[default]
    Node,
    Bun,
}

impl ModelProfile {
    pub const ALL: [Self; 2] = [Self::Node, Self::Bun];

    /// Parse from string (case-insensitive). Unknown names yield `None`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "node" | "nodejs" | "v8" => Some(Self::Node),
            "bun" | "jsc" => Some(Self::Bun),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Bun => "bun",
        }
    }
}

/// Settings for one [`crate::ModelEnv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    pub profile: ModelProfile,
    /// Whether handle scopes may be opened while finalizers run. Turning this
    /// off models an ABI that violates the finalizer-safety contract.
    pub scopes_in_finalizer: bool,
    /// Heap slots the environment may ever hold, permanent values included.
    /// Reclaimed slots are not reused, so this bounds lifetime allocations.
    pub heap_slots: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            profile: ModelProfile::Node,
            scopes_in_finalizer: true,
            heap_slots: u32::MAX,
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn with_profile(profile: ModelProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    /// Configuration with the profile taken from `NAPIPROBE_PROFILE`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_profile(configured_profile())
    }
}

// 0 = unresolved, otherwise 1 + profile index.
static CACHED_PROFILE: AtomicU8 = AtomicU8::new(0);

const PROFILE_UNRESOLVED: u8 = 0;
const PROFILE_NODE: u8 = 1;
const PROFILE_BUN: u8 = 2;

fn profile_to_u8(profile: ModelProfile) -> u8 {
    match profile {
        ModelProfile::Node => PROFILE_NODE,
        ModelProfile::Bun => PROFILE_BUN,
    }
}

fn u8_to_profile(v: u8) -> ModelProfile {
    match v {
        PROFILE_BUN => ModelProfile::Bun,
        _ => ModelProfile::Node,
    }
}

/// The configured profile (reads the env var on first call, cached thereafter).
#[must_use]
pub fn configured_profile() -> ModelProfile {
    let cached = CACHED_PROFILE.load(Ordering::Acquire);
    if cached != PROFILE_UNRESOLVED {
        return u8_to_profile(cached);
    }
    let profile = std::env::var("NAPIPROBE_PROFILE")
        .ok()
        .and_then(|raw| ModelProfile::from_str_loose(&raw))
        .unwrap_or_default();
    CACHED_PROFILE.store(profile_to_u8(profile), Ordering::Release);
    profile
}
