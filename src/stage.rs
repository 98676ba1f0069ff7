//! Pipeline Stages
//!
//! The deployment pipeline runs the same five stages, in order, for every
//! instance. Each stage is a separate invocation of the stage driver; the
//! stage code is what auxiliary scripts name in `executionStage` and what the
//! status record persists.
//!
//! # Stage Flow
//!
//! ```text
//! pre-host-prepare
//!     ↓
//! host-prepare
//!     ↓
//! start-instance
//!     ↓
//! post-start
//!     ↓
//! startup-monitoring
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, EnumString, IntoStaticStr};

/// Pipeline stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(EnumString, EnumIter, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum Stage {
    /// Fetch artifacts on the pipeline agent
    PreHostPrepare = 0,

    /// Prepare the instance's directory on the target host
    HostPrepare = 1,

    /// (Re)create the instance's container
    StartInstance = 2,

    /// Link mounted folders inside the running container
    PostStart = 3,

    /// Watch the instance come up
    StartupMonitoring = 4,
}

impl Stage {
    /// Returns the numeric order of this stage (0-4)
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns the stage code, as written in instance definitions and status records
    pub fn code(self) -> &'static str {
        self.into()
    }

    /// Returns a human-readable description of this stage
    pub const fn description(self) -> &'static str {
        match self {
            Self::PreHostPrepare => "instance pre-host preparation",
            Self::HostPrepare => "instance host preparation",
            Self::StartInstance => "instance start",
            Self::PostStart => "instance post-start",
            Self::StartupMonitoring => "instance startup monitoring",
        }
    }

    /// Header comment written below the shebang of the stage's script
    pub fn head_comment(self) -> String {
        format!("# Autogenerated script for the {}...", self.description())
    }

    /// Returns all stages in pipeline order
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::PreHostPrepare,
            Self::HostPrepare,
            Self::StartInstance,
            Self::PostStart,
            Self::StartupMonitoring,
        ]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
