//! Operating rules and thresholds for admission decisions.

use serde::{Deserialize, Serialize};

/// Configuration for admission rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRules {
    /// Below this visibility only one operation may hold an authorization
    /// at a time.
    pub low_visibility_km: f64,
    /// With no reading at or before the decision time, fall back to the
    /// earliest reading on file instead of leaving the field unrestricted.
    pub metar_wraparound: bool,
}

impl Default for OperationRules {
    fn default() -> Self {
        Self {
            low_visibility_km: 6.0,
            metar_wraparound: true,
        }
    }
}

impl OperationRules {
    /// Whether a reported visibility puts the field under low-visibility
    /// procedures. An unknown visibility does not.
    pub fn is_low_visibility(&self, visibility_km: Option<f64>) -> bool {
        matches!(visibility_km, Some(v) if v < self.low_visibility_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_visibility_is_unrestricted() {
        let rules = OperationRules::default();
        assert!(!rules.is_low_visibility(None));
        assert!(!rules.is_low_visibility(Some(6.0)));
        assert!(rules.is_low_visibility(Some(4.0)));
    }
}
