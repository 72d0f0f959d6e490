//! Analysis options

use crate::error::{Error, Result};
use crate::report::UnknownPolicy;
use serde::{Deserialize, Serialize};

/// Integer overflow semantics of the host language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowModel {
    /// Overflow aborts execution; results are clamped to the type range
    #[default]
    Trapping,
    /// Two's-complement wrap-around; an overflowing result may be any value of the type
    Wrapping,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Visits of one loop header before the iteration safeguard forces `⊤`
    pub max_widening_iterations: usize,
    /// Header visits that use plain join before widening kicks in
    pub widening_delay: usize,
    /// Descending passes after the ascending iteration stabilizes
    pub narrowing_passes: usize,
    /// Widen to region constants before jumping to infinity
    pub widening_thresholds: bool,
    /// Integer overflow model
    pub overflow: OverflowModel,
    /// Diagnostic emitted for construction sites that are neither proved nor refuted
    pub unknown_policy: UnknownPolicy,
    /// Emit erasure directives for proved sites
    pub erase_proved_checks: bool,
    /// Maximum number of bodies analyzed in parallel (default: num_cpus)
    pub max_parallelism: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_widening_iterations: 64,
            widening_delay: 1,
            narrowing_passes: 1,
            widening_thresholds: true,
            overflow: OverflowModel::Trapping,
            unknown_policy: UnknownPolicy::Info,
            erase_proved_checks: true,
            max_parallelism: num_cpus::get(),
        }
    }
}

impl AnalysisOptions {
    /// Parse options from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json).map_err(|e| Error::options(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_widening_iterations == 0 {
            return Err(Error::options("max_widening_iterations must be at least 1"));
        }
        if self.widening_delay >= self.max_widening_iterations {
            return Err(Error::options(format!(
                "widening_delay ({}) must be below max_widening_iterations ({})",
                self.widening_delay, self.max_widening_iterations
            )));
        }
        if self.max_parallelism == 0 {
            return Err(Error::options("max_parallelism must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = AnalysisOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.max_widening_iterations, 64);
        assert_eq!(options.overflow, OverflowModel::Trapping);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let options = AnalysisOptions::from_json(r#"{"narrowing_passes": 3, "overflow": "wrapping"}"#)
            .unwrap();
        assert_eq!(options.narrowing_passes, 3);
        assert_eq!(options.overflow, OverflowModel::Wrapping);
        assert_eq!(options.widening_delay, 1);
    }

    #[test]
    fn test_zero_bounds_rejected() {
        assert!(AnalysisOptions::from_json(r#"{"max_widening_iterations": 0}"#).is_err());
        let options = AnalysisOptions {
            max_parallelism: 0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            AnalysisOptions::from_json("{not json"),
            Err(Error::InvalidOptions(_))
        ));
    }
}
