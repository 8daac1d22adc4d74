//! Boot State Machine
//!
//! Decides between a full cold boot and a fast resume, and lays out the
//! ordered phases the boot overlay walks through.
//!
//! ```text
//! cold:   power_on → self_check → workspace_restore → ready
//! resume: power_on →              workspace_restore → ready
//! ```
//!
//! The plan is linear: no branches, no retries. The overlay advances a
//! [`BootSequence`] on its own completion signals. `ready` is always last.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_RESUME_WINDOW_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootMode {
    Cold,
    Resume,
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Cold => f.write_str("cold"),
            BootMode::Resume => f.write_str("resume"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootPhase {
    PowerOn,
    SelfCheck,
    WorkspaceRestore,
    Ready,
}

impl BootPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootPhase::PowerOn => "power_on",
            BootPhase::SelfCheck => "self_check",
            BootPhase::WorkspaceRestore => "workspace_restore",
            BootPhase::Ready => "ready",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BootPhase::PowerOn => "Powering on",
            BootPhase::SelfCheck => "Running self-check",
            BootPhase::WorkspaceRestore => "Restoring workspace",
            BootPhase::Ready => "Ready",
        }
    }

    /// Animated transition length into this phase.
    fn transition_ms(&self) -> u32 {
        match self {
            BootPhase::PowerOn => 450,
            BootPhase::SelfCheck => 900,
            BootPhase::WorkspaceRestore => 650,
            BootPhase::Ready => 250,
        }
    }
}

impl fmt::Display for BootPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootStep {
    pub phase: BootPhase,
    pub label: String,
    /// Zero when reduced motion is requested.
    pub transition_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootPlan {
    pub mode: BootMode,
    pub reduced_motion: bool,
    pub steps: Vec<BootStep>,
}

impl BootPlan {
    pub fn phases(&self) -> Vec<BootPhase> {
        self.steps.iter().map(|step| step.phase).collect()
    }

    pub fn total_transition_ms(&self) -> u32 {
        self.steps.iter().map(|step| step.transition_ms).sum()
    }
}

/// `cold` for a missing, unparseable or stale timestamp; `resume` otherwise.
///
/// Uses [`DEFAULT_RESUME_WINDOW_SECS`]; see [`resolve_boot_mode_within`] to
/// supply the window from configuration.
pub fn resolve_boot_mode(last_session: Option<&str>, now: DateTime<Utc>) -> BootMode {
    resolve_boot_mode_within(last_session, now, DEFAULT_RESUME_WINDOW_SECS)
}

pub fn resolve_boot_mode_within(
    last_session: Option<&str>,
    now: DateTime<Utc>,
    resume_window_secs: i64,
) -> BootMode {
    let Some(last) = last_session.and_then(parse_timestamp) else {
        return BootMode::Cold;
    };

    // Future timestamps (clock skew) count as zero elapsed.
    let elapsed = now.signed_duration_since(last).max(Duration::zero());
    let window = Duration::try_seconds(resume_window_secs.max(0)).unwrap_or(Duration::MAX);
    if elapsed > window {
        BootMode::Cold
    } else {
        BootMode::Resume
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Pure: the same `(mode, reduced_motion)` always yields the same plan.
pub fn build_boot_plan(mode: BootMode, reduced_motion: bool) -> BootPlan {
    let phases: &[BootPhase] = match mode {
        BootMode::Cold => &[
            BootPhase::PowerOn,
            BootPhase::SelfCheck,
            BootPhase::WorkspaceRestore,
            BootPhase::Ready,
        ],
        BootMode::Resume => &[
            BootPhase::PowerOn,
            BootPhase::WorkspaceRestore,
            BootPhase::Ready,
        ],
    };

    let steps = phases
        .iter()
        .map(|phase| BootStep {
            phase: *phase,
            label: phase.label().to_string(),
            transition_ms: if reduced_motion {
                0
            } else {
                phase.transition_ms()
            },
        })
        .collect();

    BootPlan {
        mode,
        reduced_motion,
        steps,
    }
}

/// Cursor over a [`BootPlan`] driven by the overlay's completion signals.
#[derive(Debug, Clone)]
pub struct BootSequence {
    plan: BootPlan,
    completed: usize,
}

impl BootSequence {
    pub fn new(plan: BootPlan) -> Self {
        Self { plan, completed: 0 }
    }

    pub fn plan(&self) -> &BootPlan {
        &self.plan
    }

    /// The step currently running, or `None` once every step completed.
    pub fn current(&self) -> Option<&BootStep> {
        self.plan.steps.get(self.completed)
    }

    pub fn current_phase(&self) -> Option<BootPhase> {
        self.current().map(|step| step.phase)
    }

    /// Marks the current step complete. Returns the next step, if any.
    pub fn advance(&mut self) -> Option<&BootStep> {
        if self.completed < self.plan.steps.len() {
            self.completed += 1;
        }
        self.current()
    }

    pub fn completed_steps(&self) -> usize {
        self.completed
    }

    /// Completed steps over total steps, clamped to `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let total = self.plan.steps.len();
        if total == 0 {
            return 1.0;
        }
        (self.completed as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// True once the terminal `ready` step has completed.
    pub fn is_ready(&self) -> bool {
        self.completed >= self.plan.steps.len()
    }
}
