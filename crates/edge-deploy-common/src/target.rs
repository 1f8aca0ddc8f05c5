//! Build targets and compiler profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Deployment layout produced by a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildTarget {
    /// Cloudflare Pages Functions in Advanced Mode: one combined `_worker.js`.
    PagesAdvancedMode,
    /// Cloudflare Workers: script plus a separate Wasm binary.
    Workers,
}

impl BuildTarget {
    /// Short human label used in progress messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::PagesAdvancedMode => "Pages",
            Self::Workers => "Workers",
        }
    }

    /// Description shown next to the shortcut in an interactive host.
    pub fn description(self) -> &'static str {
        match self {
            Self::PagesAdvancedMode => "Build Cloudflare Pages Files",
            Self::Workers => "Build Cloudflare Workers Files",
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compiler optimization profile.
///
/// Identified by a single letter on the command line and in configuration
/// files: `L` (fast/debug), `M` (minimal), `S` (small/production).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerMode {
    /// Standard Go toolchain; fastest turnaround, largest binary.
    Fast,
    /// TinyGo with light optimization and debug info kept.
    Minimal,
    /// TinyGo optimized for size, debug info stripped.
    Production,
}

impl CompilerMode {
    /// All profiles, in identifier order.
    pub const ALL: [CompilerMode; 3] = [Self::Fast, Self::Minimal, Self::Production];

    /// The single-letter identifier of this profile.
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Fast => "L",
            Self::Minimal => "M",
            Self::Production => "S",
        }
    }

    /// Human-readable profile name.
    pub fn profile(self) -> &'static str {
        match self {
            Self::Fast => "fast/debug",
            Self::Minimal => "minimal",
            Self::Production => "production",
        }
    }
}

impl FromStr for CompilerMode {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "L" | "l" => Ok(Self::Fast),
            "M" | "m" => Ok(Self::Minimal),
            "S" | "s" => Ok(Self::Production),
            other => Err(DeployError::invalid_mode(other)),
        }
    }
}

impl fmt::Display for CompilerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}
