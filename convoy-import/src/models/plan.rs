//! Subscription plan limits
//!
//! The target website's plan caps how many participants a conversation may
//! carry and whether private notes can be posted. Both caps are enforced
//! locally before any call is issued.

use serde::Serialize;

/// Enforceable limits of one plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub name: &'static str,
    /// Maximum participants per conversation (0 = no clipping)
    pub max_participants: usize,
    pub notes_allowed: bool,
}

pub const BASIC: PlanLimits = PlanLimits {
    name: "basic",
    max_participants: 1,
    notes_allowed: false,
};

pub const PRO: PlanLimits = PlanLimits {
    name: "pro",
    max_participants: 3,
    notes_allowed: true,
};

pub const UNLIMITED: PlanLimits = PlanLimits {
    name: "unlimited",
    max_participants: 10,
    notes_allowed: true,
};

const PLANS: [PlanLimits; 3] = [BASIC, PRO, UNLIMITED];

impl PlanLimits {
    /// Case-insensitive lookup; unspecified or unknown plans get the most
    /// permissive limits
    pub fn for_plan(name: Option<&str>) -> Self {
        let Some(raw) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return UNLIMITED;
        };

        let wanted = raw.to_lowercase();
        match PLANS.iter().find(|plan| plan.name == wanted) {
            Some(plan) => *plan,
            None => {
                tracing::warn!(plan = %raw, "Unknown website plan, assuming {}", UNLIMITED.name);
                UNLIMITED
            }
        }
    }

    /// Split `items` into (kept, dropped count) according to the participant cap
    pub fn clip_participants<T>(&self, mut items: Vec<T>) -> (Vec<T>, usize) {
        if self.max_participants == 0 || items.len() <= self.max_participants {
            return (items, 0);
        }
        let dropped = items.len() - self.max_participants;
        items.truncate(self.max_participants);
        (items, dropped)
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        UNLIMITED
    }
}
