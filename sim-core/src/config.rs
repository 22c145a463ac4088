use crate::error::{GrowthError, Result};

/// Tunables for one growth simulation.
///
/// Angles are in degrees. Every field may be changed between steps;
/// the new values only steer future growth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Maximum length of a freshly grown or reoriented segment.
    pub growth_length: f32,
    /// Attractors closer than this to any tip are consumed.
    pub kill_distance: f32,
    /// Reach of the perception cone.
    pub perception_length: f32,
    /// Radius of the perception cone at full reach.
    pub perception_radius: f32,
    /// Weight of the random unit vector mixed into each reorientation.
    pub random_growth_weight: f32,
    /// Tilt of the perception cone around the branch's forward axis.
    pub branching_angle: f32,
    pub branching_probability: f32,
    /// Shape coefficient of the depth-dependent branching curve.
    pub branching_distribution: f32,
    /// Blend between the deterministic curve (0) and pure noise (1).
    pub branching_randomness: f32,
    pub max_children: usize,
    pub trunk_diameter: f32,
    /// Per-generation diameter decay.
    pub diameter_coeff: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            growth_length: 0.4,
            kill_distance: 1.0,
            perception_length: 1.8,
            perception_radius: 1.8,
            random_growth_weight: 0.1,
            branching_angle: 30.0,
            branching_probability: 0.6,
            branching_distribution: 0.25,
            branching_randomness: 0.3,
            max_children: 4,
            trunk_diameter: 1.0,
            diameter_coeff: 0.82,
        }
    }
}

impl Config {
    /// Checks that every tunable is finite and within its usable range.
    pub fn validate(&self) -> Result<()> {
        positive("growth_length", self.growth_length)?;
        positive("perception_length", self.perception_length)?;
        non_negative("kill_distance", self.kill_distance)?;
        non_negative("perception_radius", self.perception_radius)?;
        non_negative("random_growth_weight", self.random_growth_weight)?;
        non_negative("branching_distribution", self.branching_distribution)?;
        positive("trunk_diameter", self.trunk_diameter)?;
        non_negative("diameter_coeff", self.diameter_coeff)?;
        finite("branching_angle", self.branching_angle)?;

        if !(self.branching_probability > 0.0 && self.branching_probability <= 1.0) {
            return Err(invalid("branching_probability", self.branching_probability));
        }
        if !(0.0..=1.0).contains(&self.branching_randomness) {
            return Err(invalid("branching_randomness", self.branching_randomness));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, value: f32) -> GrowthError {
    GrowthError::InvalidConfig { field, value }
}

fn finite(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<()> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(invalid(field, value));
    }
    Ok(())
}

fn positive(field: &'static str, value: f32) -> Result<()> {
    finite(field, value)?;
    if value <= 0.0 {
        return Err(invalid(field, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_finite_and_out_of_range_values() {
        let cfg = Config {
            perception_length: 0.0,
            ..Config::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(GrowthError::InvalidConfig {
                field: "perception_length",
                value: 0.0
            })
        );

        let cfg = Config {
            kill_distance: f32::NAN,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            branching_probability: 1.5,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            branching_randomness: -0.1,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn probability_of_one_is_allowed() {
        let cfg = Config {
            branching_probability: 1.0,
            branching_randomness: 1.0,
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
