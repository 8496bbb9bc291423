//! Subscription tier classification and multiplier lookup.

use serde::{Deserialize, Serialize};

/// Discrete subscription support level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Prime,
    T3,
    T2,
    T1,
}

impl Tier {
    /// Classify a subscription from its prime flag and plan/tier string.
    ///
    /// First match wins: prime, then 3000/tier3, 2000/tier2, 1000/tier1.
    /// A payload without tier information is treated as tier 1.
    pub fn resolve(is_prime: bool, plan: Option<&str>) -> Self {
        let plan = plan.map(|p| p.trim().to_ascii_lowercase()).unwrap_or_default();
        if is_prime || plan.contains("prime") {
            Tier::Prime
        } else if plan.contains("3000") || plan.contains("tier3") {
            Tier::T3
        } else if plan.contains("2000") || plan.contains("tier2") {
            Tier::T2
        } else {
            // "1000" / "tier1" and unknown plans alike.
            Tier::T1
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Prime => "prime",
            Tier::T3 => "t3",
            Tier::T2 => "t2",
            Tier::T1 => "t1",
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::T1
    }
}

/// Per-tier time multipliers plus the switches deciding where they apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierMultipliers {
    #[serde(default = "default_t1")]
    pub t1: f64,
    #[serde(default = "default_t2")]
    pub t2: f64,
    #[serde(default = "default_t3")]
    pub t3: f64,
    #[serde(default = "default_prime")]
    pub prime: f64,
    /// Multiply gifted-sub grants by the gifter's tier.
    #[serde(default = "default_true")]
    pub apply_to_gifts: bool,
    /// Multiply the extra-month resub bonus by the tier.
    #[serde(default = "default_true")]
    pub apply_to_resub_months: bool,
}

fn default_t1() -> f64 {
    1.0
}
fn default_t2() -> f64 {
    2.0
}
fn default_t3() -> f64 {
    6.0
}
fn default_prime() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self {
            t1: default_t1(),
            t2: default_t2(),
            t3: default_t3(),
            prime: default_prime(),
            apply_to_gifts: true,
            apply_to_resub_months: true,
        }
    }
}

impl TierMultipliers {
    /// Multiplier for `tier`, falling back to the built-in default when the
    /// configured value is not a finite number.
    pub fn multiplier_for(&self, tier: Tier) -> f64 {
        let (configured, fallback) = match tier {
            Tier::T1 => (self.t1, default_t1()),
            Tier::T2 => (self.t2, default_t2()),
            Tier::T3 => (self.t3, default_t3()),
            Tier::Prime => (self.prime, default_prime()),
        };
        if configured.is_finite() {
            configured
        } else {
            fallback
        }
    }
}
