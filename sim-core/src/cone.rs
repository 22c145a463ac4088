//! Conical perception volume anchored at a branch tip.

use glam::Vec3;

/// A bounded cone opening along `axis` from `apex`.
///
/// `slope` is the cone radius per unit of depth along the axis, so the
/// half-angle is `atan(slope)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerceptionCone {
    pub apex: Vec3,
    /// Unit vector.
    pub axis: Vec3,
    pub reach: f32,
    pub slope: f32,
}

impl PerceptionCone {
    pub fn new(apex: Vec3, axis: Vec3, reach: f32, slope: f32) -> Self {
        Self {
            apex,
            axis,
            reach,
            slope,
        }
    }

    /// Same cone with a different reach; the opening angle is unchanged.
    pub fn with_reach(self, reach: f32) -> Self {
        Self { reach, ..self }
    }

    /// Returns the straight-line distance from the apex to `point` if the
    /// point lies inside the cone, `None` otherwise.
    ///
    /// A point is inside when all of the following hold:
    /// - its distance to the apex is at most `reach`,
    /// - its projection onto the axis lies in `[0, reach]`,
    /// - its distance from the axis at that depth is at most
    ///   `depth * slope`.
    pub fn contains(&self, point: Vec3) -> Option<f32> {
        let offset = point - self.apex;
        let dist = offset.length();
        if dist > self.reach {
            return None;
        }

        let depth = offset.dot(self.axis);
        if depth < 0.0 || depth > self.reach {
            return None;
        }

        let orth = (offset - self.axis * depth).length();
        if orth > depth * self.slope {
            return None;
        }

        Some(dist)
    }
}
