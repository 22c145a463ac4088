use crate::{
    cone::PerceptionCone,
    error::{Result, geometry},
    tree::Tree,
    types::{AttractorId, AttractorIndex, NodeId},
};
use glam::Vec3;
use rand::Rng;
use rand_distr::{Distribution, UnitBall};

/// One target sample the tree grows toward.
#[derive(Clone, Debug, PartialEq)]
pub struct AttractorPoint {
    pub id: AttractorId,
    pub pos: Vec3,
    /// Distance to `owner`'s tip, `f32::INFINITY` while unassigned.
    pub nearest_dist: f32,
    pub owner: Option<NodeId>,
    pub removed: bool,
}

impl AttractorPoint {
    /// Creates an unassigned, live point.
    ///
    /// ### Errors
    /// [`crate::error::GrowthError::InvalidGeometry`] if `pos` has a
    /// non-finite component.
    pub fn new(id: AttractorId, pos: Vec3) -> Result<Self> {
        if !pos.is_finite() {
            return Err(geometry(format!("attractor position {pos} is not finite")));
        }
        Ok(Self {
            id,
            pos,
            nearest_dist: f32::INFINITY,
            owner: None,
            removed: false,
        })
    }

    pub fn reset_assignment(&mut self) {
        self.owner = None;
        self.nearest_dist = f32::INFINITY;
    }

    /// Offers `branch` at distance `dist` as this point's nearest tip.
    ///
    /// Accepted only if strictly closer than the current assignment, so on
    /// a tie the earlier proposer keeps the point.
    ///
    /// ### Returns
    /// `true` if the proposal replaced the current assignment.
    pub fn propose(&mut self, branch: NodeId, dist: f32) -> bool {
        if dist < self.nearest_dist {
            self.owner = Some(branch);
            self.nearest_dist = dist;
            true
        } else {
            false
        }
    }

    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        !self.removed
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Distance from `p` to the nearest vertical wall of the box, measured
    /// in the horizontal (x/z) plane.
    pub fn horizontal_wall_distance(&self, p: Vec3) -> f32 {
        let dx = (p.x - self.min.x).abs().min((p.x - self.max.x).abs());
        let dz = (p.z - self.min.z).abs().min((p.z - self.max.z).abs());
        dx.min(dz)
    }
}

/// Ordered collection of attractor points with deferred removal.
///
/// Points are tombstoned during a growth step and physically dropped by
/// [`AttractorCloud::compact`] once the step is over, so indices stay valid
/// for the whole step. Ids outlive compaction; points stay sorted by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttractorCloud {
    points: Vec<AttractorPoint>,
    bounds: Option<Aabb>,
    next_id: AttractorId,
}

impl AttractorCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: Vec<Vec3>) -> Result<Self> {
        let mut cloud = Self::new();
        cloud.add_all(positions)?;
        Ok(cloud)
    }

    /// Samples `count` points uniformly in the box `center ± half_extents`.
    ///
    /// ### Errors
    /// [`crate::error::GrowthError::InvalidGeometry`] if `center` or
    /// `half_extents` is not finite.
    pub fn random_in_box(
        center: Vec3,
        half_extents: Vec3,
        count: usize,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        check_volume(center, half_extents)?;
        let h = half_extents.abs();
        let positions = (0..count)
            .map(|_| {
                let x = rng.random_range(-h.x..=h.x);
                let y = rng.random_range(-h.y..=h.y);
                let z = rng.random_range(-h.z..=h.z);
                center + Vec3::new(x, y, z)
            })
            .collect();

        Self::from_positions(positions)
    }

    /// Samples `count` points uniformly inside the ellipsoid with the given
    /// semi-axes.
    pub fn random_in_ellipsoid(
        center: Vec3,
        radii: Vec3,
        count: usize,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        check_volume(center, radii)?;
        let positions = (0..count)
            .map(|_| center + unit_ball_sample(rng) * radii)
            .collect();

        Self::from_positions(positions)
    }

    /// Appends one point and returns the id it was given.
    pub fn add(&mut self, pos: Vec3) -> Result<AttractorId> {
        let id = self.next_id;
        let point = AttractorPoint::new(id, pos)?;
        self.next_id += 1;

        match &mut self.bounds {
            Some(b) => b.include(pos),
            None => self.bounds = Some(Aabb::from_point(pos)),
        }
        self.points.push(point);
        Ok(id)
    }

    /// Appends all positions, or none of them if any is malformed.
    pub fn add_all(&mut self, positions: impl IntoIterator<Item = Vec3>) -> Result<()> {
        let positions: Vec<Vec3> = positions.into_iter().collect();
        if let Some(bad) = positions.iter().find(|p| !p.is_finite()) {
            return Err(geometry(format!("attractor position {bad} is not finite")));
        }

        self.points.reserve(positions.len());
        for pos in positions {
            self.add(pos)?;
        }
        Ok(())
    }

    pub fn points(&self) -> &[AttractorPoint] {
        &self.points
    }

    pub fn point(&self, idx: AttractorIndex) -> Option<&AttractorPoint> {
        self.points.get(idx)
    }

    /// Looks a point up by the id [`AttractorCloud::add`] handed out.
    /// `None` once compaction has dropped it.
    pub fn get(&self, id: AttractorId) -> Option<&AttractorPoint> {
        self.points
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|idx| &self.points[idx])
    }

    /// Points that have not been tombstoned.
    pub fn live(&self) -> impl Iterator<Item = &AttractorPoint> + '_ {
        self.points.iter().filter(|p| p.is_live())
    }

    /// Number of stored points, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// `true` if no live point is left.
    pub fn is_empty(&self) -> bool {
        self.live().next().is_none()
    }

    /// Bounding box of every point ever added.
    ///
    /// Grows with [`AttractorCloud::add`] and is never shrunk by removals;
    /// only the perception-length fallback reads it.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Tombstones the point at `idx`. Storage and indices are untouched.
    pub fn remove_logical(&mut self, idx: AttractorIndex) {
        if let Some(p) = self.points.get_mut(idx) {
            p.mark_removed();
        }
    }

    /// Tombstones every live point strictly closer than `radius` to
    /// `center`.
    ///
    /// ### Returns
    /// The number of points newly tombstoned.
    pub fn remove_within(&mut self, center: Vec3, radius: f32) -> usize {
        let mut removed = 0;
        for p in self.points.iter_mut().filter(|p| p.is_live()) {
            if p.pos.distance(center) < radius {
                p.mark_removed();
                removed += 1;
            }
        }
        removed
    }

    /// Drops tombstoned points. Must only run between growth steps.
    ///
    /// ### Returns
    /// The number of points dropped.
    pub fn compact(&mut self) -> usize {
        let before = self.points.len();
        self.points.retain(|p| p.is_live());
        before - self.points.len()
    }

    pub fn reset_assignments(&mut self) {
        for p in self.points.iter_mut().filter(|p| p.is_live()) {
            p.reset_assignment();
        }
    }

    /// Proposes `branch` to every live point inside `cone`.
    ///
    /// ### Returns
    /// The number of points found inside the cone, whether or not the
    /// proposal won.
    pub fn propose_in_cone(&mut self, cone: &PerceptionCone, branch: NodeId) -> usize {
        let mut found = 0;
        for p in self.points.iter_mut().filter(|p| p.is_live()) {
            if let Some(dist) = cone.contains(p.pos) {
                p.propose(branch, dist);
                found += 1;
            }
        }
        found
    }

    /// Hands each live, assigned point to its owner's per-step list.
    pub fn collect_assignments(&self, tree: &mut Tree) {
        for p in self.points.iter().filter(|p| p.is_live()) {
            if let Some(owner) = p.owner
                && let Some(branch) = tree.nodes.get_mut(owner)
            {
                branch.attractors.push(p.id);
            }
        }
    }
}

fn check_volume(center: Vec3, extents: Vec3) -> Result<()> {
    if !center.is_finite() || !extents.is_finite() {
        return Err(geometry(format!(
            "sampling volume is not finite (center {center}, extents {extents})"
        )));
    }
    Ok(())
}

/// Uniform sample inside the unit ball.
fn unit_ball_sample(rng: &mut impl Rng) -> Vec3 {
    Vec3::from_array(UnitBall.sample(rng))
}
