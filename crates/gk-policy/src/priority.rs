// priority.rs — Priority compiler.
//
// Maps a rule's declared priority into one global ordering segmented by
// trust tier:
//
//     compiled = tier + declared / 1000
//
// With declared priorities confined to [0, 1000), every Admin rule (>= 3.0)
// outranks every User rule (2.0..3.0), which outranks every Default rule
// (1.0..2.0). The bound is enforced here, not assumed.
//
// Inside the User band, everything from 2.95 up belongs to interactive
// "always allow" answers, so User rules must declare less than 950.

use crate::error::PolicyError;
use crate::rule::{RuleSource, TrustTier};

/// Exclusive upper bound for declared priorities.
pub const MAX_DECLARED_PRIORITY: f64 = 1000.0;

/// Exclusive upper bound for declared User-tier priorities; the rest of the
/// User band is held by `ALWAYS_ALLOW_PRIORITY`.
pub const MAX_USER_DECLARED_PRIORITY: f64 = 950.0;

/// Declared priorities of the settings-derived rules (User tier).
pub const MCP_ALLOWED_PRIORITY: f64 = 85.0;
pub const MCP_TRUSTED_PRIORITY: f64 = 90.0;
pub const TOOL_ALLOWED_PRIORITY: f64 = 100.0;
pub const MCP_EXCLUDED_PRIORITY: f64 = 195.0;
pub const TOOL_EXCLUDED_PRIORITY: f64 = 200.0;

/// Absolute priority of a runtime "always allow" rule: above every other
/// User-tier rule, below every Admin-tier rule.
pub const ALWAYS_ALLOW_PRIORITY: f64 = 2.95;

/// Compile a declared priority into the global space.
pub fn compile_priority(declared: f64, tier: TrustTier) -> Result<f64, PolicyError> {
    if !declared.is_finite() || declared < 0.0 || declared >= MAX_DECLARED_PRIORITY {
        return Err(PolicyError::PriorityOutOfRange { priority: declared });
    }
    if tier == TrustTier::User && declared >= MAX_USER_DECLARED_PRIORITY {
        return Err(PolicyError::ReservedPriority { priority: declared });
    }
    Ok(tier.base() + declared / MAX_DECLARED_PRIORITY)
}

/// The tier whose band contains a compiled priority, if any.
pub fn tier_of(compiled: f64) -> Option<TrustTier> {
    TrustTier::ALL
        .into_iter()
        .find(|tier| compiled >= tier.base() && compiled < tier.base() + 1.0)
}

/// Check the compiled priority of a rule appended after publish.
///
/// Any rule must sit inside one of the tier bands. Runtime rules must also
/// stay below the Admin band.
pub fn check_appended_priority(priority: f64, source: &RuleSource) -> Result<(), PolicyError> {
    let min = TrustTier::Default.base();
    let max = match source {
        RuleSource::Runtime => TrustTier::Admin.base(),
        _ => TrustTier::Admin.base() + 1.0,
    };
    if tier_of(priority).is_some() && priority < max {
        Ok(())
    } else {
        Err(PolicyError::RulePriorityOutOfBand { priority, min, max })
    }
}
