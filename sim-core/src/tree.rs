use crate::{
    attractor::AttractorCloud,
    config::Config,
    cone::PerceptionCone,
    error::{GrowthError, Result, geometry},
    types::{AttractorId, NodeId},
};
use glam::{Quat, Vec3};
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};

/// Maturation stage of a branch.
///
/// `LateralBud -> ApicalBud -> Metamer -> Internode`, where an apical bud
/// turning into a metamer lays a new apical bud and so keeps the axis
/// growing. `Internode` is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchKind {
    Metamer,
    Internode,
    ApicalBud,
    LateralBud,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub id: NodeId,
    /// Anchor point. Equals the parent's tip for every non-root branch.
    pub pos: Vec3,
    /// Unit growth direction.
    pub orientation: Vec3,
    pub right: Vec3,
    /// `orientation × right`, the axis the perception cone is tilted about.
    pub forward: Vec3,
    pub length: f32,
    pub diameter: f32,
    /// Depth from the root.
    pub degree: u32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: BranchKind,
    /// Ids of the attractors assigned to this branch in the latest step.
    /// Consumed ones no longer resolve through [`AttractorCloud::get`].
    pub attractors: Vec<AttractorId>,
    pub dormant: bool,
}

impl Branch {
    /// Creates a detached branch anchored at `pos`.
    ///
    /// `orientation` is normalized. If `right` is parallel to it, any
    /// vector orthogonal to `orientation` is used for the frame instead.
    ///
    /// ### Errors
    /// [`GrowthError::InvalidGeometry`] for non-finite input, a zero-length
    /// orientation, or a negative or non-finite length.
    pub fn new(
        pos: Vec3,
        orientation: Vec3,
        right: Vec3,
        kind: BranchKind,
        length: f32,
    ) -> Result<Self> {
        if !pos.is_finite() || !right.is_finite() {
            return Err(geometry(format!(
                "branch frame is not finite (pos {pos}, right {right})"
            )));
        }
        let Some(orientation) = orientation.try_normalize() else {
            return Err(geometry(format!(
                "branch orientation {orientation} has no direction"
            )));
        };
        if !length.is_finite() || length < 0.0 {
            return Err(geometry(format!("branch length {length} is invalid")));
        }

        let (right, forward) = frame(orientation, right);
        Ok(Self {
            id: 0,
            pos,
            orientation,
            right,
            forward,
            length,
            diameter: 0.0,
            degree: 0,
            parent: None,
            children: Vec::with_capacity(4),
            kind,
            attractors: Vec::new(),
            dormant: false,
        })
    }

    /// End point of the segment.
    #[inline]
    pub fn tip(&self) -> Vec3 {
        self.pos + self.orientation * self.length
    }
}

/// Completes `orientation` and a hint `right` into an orthonormal frame.
/// `right` is re-projected so it stays perpendicular to `orientation`.
fn frame(orientation: Vec3, right: Vec3) -> (Vec3, Vec3) {
    let forward = orientation.cross(right).try_normalize().unwrap_or_else(|| {
        let right = orientation.any_orthonormal_vector();
        orientation.cross(right).normalize()
    });
    (forward.cross(orientation).normalize(), forward)
}

/// Branch arena. Node 0 is the root.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Branch>,
}

impl Tree {
    pub const ROOT: NodeId = 0;

    /// Creates a tree from a detached root branch.
    pub fn new(mut root: Branch) -> Self {
        root.id = Self::ROOT;
        root.parent = None;
        root.degree = 0;
        root.children.clear();
        Self { nodes: vec![root] }
    }

    /// A single metamer at the origin growing along +Y.
    pub fn seedling(cfg: &Config) -> Result<Self> {
        let root = Branch::new(
            Vec3::ZERO,
            Vec3::Y,
            Vec3::X,
            BranchKind::Metamer,
            cfg.growth_length,
        )?;
        let mut tree = Self::new(root);
        tree.recompute_diameters(cfg);
        Ok(tree)
    }

    pub fn root(&self) -> &Branch {
        &self.nodes[Self::ROOT]
    }

    pub fn get(&self, id: NodeId) -> Option<&Branch> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attaches a new branch at `parent`'s tip.
    ///
    /// The child inherits the parent's `right` vector as its frame hint.
    pub fn attach(
        &mut self,
        parent: NodeId,
        kind: BranchKind,
        orientation: Vec3,
        length: f32,
        cfg: &Config,
    ) -> Result<NodeId> {
        let p = self
            .nodes
            .get(parent)
            .ok_or(GrowthError::UnknownBranch(parent))?;
        let child = Branch::new(p.tip(), orientation, p.right, kind, length)?;
        Ok(self.push_child(parent, child, cfg))
    }

    /// Lays a bud at `parent`'s tip with the parent's current frame.
    fn sprout(&mut self, parent: NodeId, kind: BranchKind, cfg: &Config) -> NodeId {
        let p = &self.nodes[parent];
        let (right, forward) = frame(p.orientation, p.right);
        let bud = Branch {
            id: 0,
            pos: p.tip(),
            orientation: p.orientation,
            right,
            forward,
            length: cfg.growth_length,
            diameter: 0.0,
            degree: 0,
            parent: None,
            children: Vec::with_capacity(4),
            kind,
            attractors: Vec::new(),
            dormant: false,
        };
        self.push_child(parent, bud, cfg)
    }

    fn push_child(&mut self, parent: NodeId, mut child: Branch, cfg: &Config) -> NodeId {
        let id = self.nodes.len();
        let p = &self.nodes[parent];
        child.id = id;
        child.parent = Some(parent);
        child.degree = p.degree + 1;
        child.diameter = cfg.diameter_coeff * p.diameter;
        self.nodes.push(child);
        self.nodes[parent].children.push(id);
        id
    }

    /// Recomputes every diameter from the root down:
    /// the trunk gets `trunk_diameter`, every other branch
    /// `diameter_coeff * parent.diameter`.
    pub fn recompute_diameters(&mut self, cfg: &Config) {
        for id in self.subtree_ids(Self::ROOT) {
            self.nodes[id].diameter = match self.nodes[id].parent {
                None => cfg.trunk_diameter,
                Some(p) => cfg.diameter_coeff * self.nodes[p].diameter,
            };
        }
    }

    /// Branch ids with every child listed before its parent and siblings
    /// in insertion order. All growth phases visit the tree in this order,
    /// which also fixes the tie-break for equidistant tips.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return order;
        }

        let mut stack = vec![(Self::ROOT, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &c in self.nodes[id].children.iter().rev() {
                stack.push((c, false));
            }
        }
        order
    }

    /// Lazily walks the subtree rooted at `id` depth-first, `id` first.
    pub fn subtree(&self, id: NodeId) -> Subtree<'_> {
        let stack = if id < self.nodes.len() { vec![id] } else { Vec::new() };
        Subtree { tree: self, stack }
    }

    fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.subtree(id).map(|b| b.id).collect()
    }

    pub fn clear_attractors(&mut self) {
        for b in &mut self.nodes {
            b.attractors.clear();
        }
    }

    /// Moves every anchor below `id` onto its parent's tip.
    pub fn resync_anchors(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(pid) = stack.pop() {
            let tip = self.nodes[pid].tip();
            for i in 0..self.nodes[pid].children.len() {
                let c = self.nodes[pid].children[i];
                self.nodes[c].pos = tip;
                stack.push(c);
            }
        }
    }

    /// Offers branch `id` as nearest tip to every attractor in its
    /// perception cone.
    ///
    /// The cone axis is the branch orientation tilted by
    /// `±branching_angle` about its forward axis, the sign picked at random.
    /// If the cone is empty, the search is repeated once with the reach
    /// extended to the horizontal distance from the tip to the cloud's
    /// bounding walls, provided that is longer than `perception_length`.
    ///
    /// ### Returns
    /// The number of attractors found inside the cone.
    pub fn find_attractors(
        &self,
        id: NodeId,
        cloud: &mut AttractorCloud,
        cfg: &Config,
        rng: &mut impl Rng,
    ) -> usize {
        let b = &self.nodes[id];
        let tip = b.tip();

        let angle = if rng.random_bool(0.5) {
            cfg.branching_angle
        } else {
            -cfg.branching_angle
        };
        let axis = (Quat::from_axis_angle(b.forward, angle.to_radians()) * b.orientation)
            .try_normalize()
            .unwrap_or(b.orientation);

        let cone = PerceptionCone::new(
            tip,
            axis,
            cfg.perception_length,
            cfg.perception_radius / cfg.perception_length,
        );
        let found = cloud.propose_in_cone(&cone, id);
        if found > 0 {
            return found;
        }

        let Some(bounds) = cloud.bounds() else {
            return 0;
        };
        let reach = bounds.horizontal_wall_distance(tip);
        if reach <= cfg.perception_length {
            return 0;
        }
        cloud.propose_in_cone(&cone.with_reach(reach), id)
    }

    /// Consumes attractors near branch `id` and steers it toward the ones
    /// assigned to it this step.
    ///
    /// Every live attractor closer than `kill_distance` to the tip is
    /// tombstoned. With assigned attractors, the branch turns toward the
    /// mean of the unit vectors pointing at them (plus a random unit vector
    /// scaled by `random_growth_weight`) and its length becomes
    /// `min(growth_length, |tip - centroid|)`; the subtree is then moved to
    /// stay attached. Without any, the branch goes dormant.
    ///
    /// ### Returns
    /// The number of attractors tombstoned.
    pub fn colonize(
        &mut self,
        id: NodeId,
        cloud: &mut AttractorCloud,
        cfg: &Config,
        rng: &mut impl Rng,
    ) -> usize {
        let tip = self.nodes[id].tip();
        let consumed = cloud.remove_within(tip, cfg.kill_distance);

        let assigned = &self.nodes[id].attractors;
        if assigned.is_empty() {
            self.nodes[id].dormant = true;
            return consumed;
        }

        let mut heading = Vec3::ZERO;
        let mut centroid = Vec3::ZERO;
        let mut n = 0usize;
        for p in assigned.iter().filter_map(|&pid| cloud.get(pid)) {
            heading += (p.pos - tip).normalize_or_zero();
            centroid += p.pos;
            n += 1;
        }
        if n == 0 {
            self.nodes[id].dormant = true;
            return consumed;
        }
        heading /= n as f32;
        centroid /= n as f32;
        heading += random_unit_vector(rng) * cfg.random_growth_weight;

        let b = &mut self.nodes[id];
        if let Some(dir) = heading.try_normalize() {
            let (right, forward) = frame(dir, b.right);
            b.orientation = dir;
            b.right = right;
            b.forward = forward;
        }
        b.length = cfg.growth_length.min(tip.distance(centroid));
        b.dormant = false;

        self.resync_anchors(id);
        consumed
    }

    /// Advances branch `id` by one maturation stage.
    ///
    /// ### Returns
    /// The id of the bud laid in this transition, if any.
    pub fn mature(&mut self, id: NodeId, cfg: &Config, rng: &mut impl Rng) -> Option<NodeId> {
        let bud = match self.nodes[id].kind {
            BranchKind::Metamer => {
                self.nodes[id].kind = BranchKind::Internode;
                BranchKind::LateralBud
            }
            BranchKind::LateralBud => {
                self.nodes[id].kind = BranchKind::ApicalBud;
                return None;
            }
            BranchKind::ApicalBud => {
                self.nodes[id].kind = BranchKind::Metamer;
                BranchKind::ApicalBud
            }
            BranchKind::Internode => return None,
        };

        if !self.should_sprout(id, cfg, rng) {
            return None;
        }
        Some(self.sprout(id, bud, cfg))
    }

    /// A childless branch always lays a bud. Otherwise the branch must be
    /// awake, below `max_children`, and pass [`will_branch`].
    fn should_sprout(&self, id: NodeId, cfg: &Config, rng: &mut impl Rng) -> bool {
        let b = &self.nodes[id];
        let n = b.children.len();
        if n >= cfg.max_children {
            return false;
        }
        if n == 0 {
            return true;
        }
        !b.dormant && will_branch(b.degree, cfg, rng)
    }
}

/// Stochastic branching test.
///
/// Blends the depth curve `1 - 0.9 * 2^(-distribution * depth)` with a
/// uniform draw and fires when the blend exceeds
/// `1 - branching_probability`. Deeper branches fire more often.
pub fn will_branch(depth: u32, cfg: &Config, rng: &mut impl Rng) -> bool {
    const K: f32 = 0.9;
    let deterministic = 1.0 - K * 2f32.powf(-cfg.branching_distribution * depth as f32);
    let u: f32 = rng.random();
    let score = (1.0 - cfg.branching_randomness) * deterministic + cfg.branching_randomness * u;
    score > 1.0 - cfg.branching_probability
}

/// Uniformly distributed direction.
pub fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    Vec3::from_array(UnitSphere.sample(rng))
}

/// Preorder iterator over a subtree, see [`Tree::subtree`].
pub struct Subtree<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Subtree<'a> {
    type Item = &'a Branch;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let b = &self.tree.nodes[id];
        self.stack.extend(b.children.iter().rev());
        Some(b)
    }
}
