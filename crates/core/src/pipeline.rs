//! Lead pipeline state machine.
//!
//! A lead moves forward one stage at a time through the funnel:
//!
//! ```text
//! NOUVEAU -> CONTACTE -> QUALIFIE -> RDV_PLANIFIE -> RDV_EFFECTUE
//!         -> PROPOSITION -> NEGOCIE -> CLOSE
//! ```
//!
//! Any non-terminal stage may also jump straight to `CLOSE` (won) or
//! `PERDU` (lost). Both are terminal: nothing leaves them.
//!
//! This module is pure. Persisting the outcome (and bumping `updated_at`) is
//! the store's job; a rejected transition never reaches the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// One of the nine lifecycle stages a lead occupies.
///
/// The derived `Ord` follows declaration order and is only used for stable
/// map ordering. Use [`LeadStage::has_reached`] for funnel depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStage {
    Nouveau,
    Contacte,
    Qualifie,
    RdvPlanifie,
    RdvEffectue,
    Proposition,
    Negocie,
    Close,
    Perdu,
}

/// Every stage, in declaration order.
pub const ALL_STAGES: [LeadStage; 9] = [
    LeadStage::Nouveau,
    LeadStage::Contacte,
    LeadStage::Qualifie,
    LeadStage::RdvPlanifie,
    LeadStage::RdvEffectue,
    LeadStage::Proposition,
    LeadStage::Negocie,
    LeadStage::Close,
    LeadStage::Perdu,
];

/// The forward funnel. `PERDU` is a side branch and has no position here.
const FUNNEL: [LeadStage; 8] = [
    LeadStage::Nouveau,
    LeadStage::Contacte,
    LeadStage::Qualifie,
    LeadStage::RdvPlanifie,
    LeadStage::RdvEffectue,
    LeadStage::Proposition,
    LeadStage::Negocie,
    LeadStage::Close,
];

impl LeadStage {
    /// Stage assigned to every newly created lead.
    pub const INITIAL: LeadStage = LeadStage::Nouveau;

    /// Database / wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            LeadStage::Nouveau => "NOUVEAU",
            LeadStage::Contacte => "CONTACTE",
            LeadStage::Qualifie => "QUALIFIE",
            LeadStage::RdvPlanifie => "RDV_PLANIFIE",
            LeadStage::RdvEffectue => "RDV_EFFECTUE",
            LeadStage::Proposition => "PROPOSITION",
            LeadStage::Negocie => "NEGOCIE",
            LeadStage::Close => "CLOSE",
            LeadStage::Perdu => "PERDU",
        }
    }

    /// `CLOSE` and `PERDU` accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, LeadStage::Close | LeadStage::Perdu)
    }

    /// The stage an `advance` moves to, or `None` for terminal stages.
    pub fn next(self) -> Option<LeadStage> {
        if self.is_terminal() {
            return None;
        }
        let idx = self.funnel_index()?;
        FUNNEL.get(idx + 1).copied()
    }

    /// Whether this stage is at or past `milestone` on the forward funnel.
    ///
    /// `PERDU` has no funnel position and never counts as having reached
    /// anything but itself.
    pub fn has_reached(self, milestone: LeadStage) -> bool {
        if self == milestone {
            return true;
        }
        match (self.funnel_index(), milestone.funnel_index()) {
            (Some(current), Some(target)) => current >= target,
            _ => false,
        }
    }

    /// Stages reachable in one transition, in the order a UI should offer
    /// them (next stage first, then the short-circuits).
    pub fn next_stages(self) -> Vec<LeadStage> {
        if self.is_terminal() {
            return Vec::new();
        }
        let mut stages = Vec::with_capacity(3);
        if let Some(next) = self.next() {
            stages.push(next);
        }
        for shortcut in [LeadStage::Close, LeadStage::Perdu] {
            if !stages.contains(&shortcut) {
                stages.push(shortcut);
            }
        }
        stages
    }

    fn funnel_index(self) -> Option<usize> {
        FUNNEL.iter().position(|s| *s == self)
    }
}

impl fmt::Display for LeadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStage {
    type Err = CoreError;

    /// Unknown stage names are an [`CoreError::InvalidTransition`]: a lead
    /// can never be put into a stage that does not exist.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_STAGES
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| {
                CoreError::InvalidTransition(format!("Unknown pipeline stage '{s}'"))
            })
    }
}

impl TryFrom<String> for LeadStage {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// A requested change to a lead's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Transition {
    /// Move to the next funnel stage.
    Advance,
    /// Jump to `CLOSE` from any non-terminal stage.
    MarkClosed,
    /// Jump to `PERDU` from any non-terminal stage.
    MarkLost,
    /// Record whether the scheduled appointment was attended.
    RecordShowUp { attended: bool },
}

impl Transition {
    /// Short name used in logs and event payloads.
    pub const fn name(self) -> &'static str {
        match self {
            Transition::Advance => "advance",
            Transition::MarkClosed => "mark_closed",
            Transition::MarkLost => "mark_lost",
            Transition::RecordShowUp { .. } => "record_show_up",
        }
    }
}

/// The lifecycle fields of a lead that transitions read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadState {
    pub stage: LeadStage,
    pub show_up: Option<bool>,
}

/// Result of a validated transition, ready to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub from: LeadStage,
    pub to: LeadStage,
    pub show_up: Option<bool>,
}

impl TransitionOutcome {
    /// Whether the lead's stage actually changes.
    pub fn changes_stage(&self) -> bool {
        self.from != self.to
    }
}

/// Validate `transition` against `state` and compute the new state.
///
/// Returns [`CoreError::InvalidTransition`] when the state machine forbids
/// the move. The caller must not write anything in that case.
pub fn apply(state: LeadState, transition: Transition) -> Result<TransitionOutcome, CoreError> {
    let from = state.stage;

    if from.is_terminal() {
        return Err(CoreError::InvalidTransition(format!(
            "Lead is already {from}; no further transitions are allowed"
        )));
    }

    match transition {
        Transition::Advance => {
            let to = from.next().ok_or_else(|| {
                CoreError::InvalidTransition(format!("Stage {from} has no next stage"))
            })?;

            let show_up = if from == LeadStage::RdvPlanifie {
                if state.show_up == Some(false) {
                    return Err(CoreError::InvalidTransition(
                        "Appointment was recorded as a no-show; record attendance or mark the lead lost"
                            .to_string(),
                    ));
                }
                Some(true)
            } else {
                state.show_up
            };

            Ok(TransitionOutcome { from, to, show_up })
        }
        Transition::MarkClosed => Ok(TransitionOutcome {
            from,
            to: LeadStage::Close,
            show_up: state.show_up,
        }),
        Transition::MarkLost => Ok(TransitionOutcome {
            from,
            to: LeadStage::Perdu,
            show_up: state.show_up,
        }),
        Transition::RecordShowUp { attended } => {
            if !from.has_reached(LeadStage::RdvPlanifie) {
                return Err(CoreError::InvalidTransition(format!(
                    "Cannot record an appointment outcome before {}; lead is {from}",
                    LeadStage::RdvPlanifie
                )));
            }
            if !attended && from.has_reached(LeadStage::RdvEffectue) {
                return Err(CoreError::InvalidTransition(format!(
                    "Lead is {from}; its appointment already took place and cannot be a no-show"
                )));
            }
            Ok(TransitionOutcome {
                from,
                to: from,
                show_up: Some(attended),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
