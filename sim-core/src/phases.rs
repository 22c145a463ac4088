//! Phases of one space-colonization growth step.
//!
//! A step runs, in this order and each over the whole tree before the
//! next begins:
//! 1. [`clear_phase`] — drop last step's per-branch attractor lists and
//!    every point's assignment.
//! 2. [`search_phase`] — every branch proposes itself to the attractors in
//!    its perception cone; the strictly nearest tip wins each point.
//! 3. [`assign_phase`] — winners are copied into their branch's list.
//! 4. [`colonize_phase`] — attractors within the kill distance of any tip
//!    are tombstoned, and branches with attractors turn toward them.
//! 5. [`maturation_phase`] — every branch advances one maturation stage,
//!    possibly laying a bud along its new orientation.
//! 6. The cloud is compacted.
//!
//! Every tree-wide pass uses [`Tree::post_order`], so a branch's children
//! are always handled before the branch itself.

use crate::{attractor::AttractorCloud, config::Config, tree::Tree, types::NodeId};
use rand::Rng;
use tracing::trace;

/// Summary of one completed growth step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Plant age after the step.
    pub age: u32,
    /// Buds laid during maturation, in creation order.
    pub sprouted: Vec<NodeId>,
    /// Attractors consumed by the kill-distance check.
    pub consumed: usize,
    /// Branches that received no attractors this step.
    pub dormant: usize,
}

pub fn clear_phase(tree: &mut Tree, cloud: &mut AttractorCloud) {
    tree.clear_attractors();
    cloud.reset_assignments();
}

/// Runs [`Tree::find_attractors`] for every branch.
///
/// ### Returns
/// The number of branches that found at least one attractor.
pub fn search_phase(
    tree: &Tree,
    cloud: &mut AttractorCloud,
    cfg: &Config,
    rng: &mut impl Rng,
) -> usize {
    let mut sensing = 0;
    for id in tree.post_order() {
        if tree.find_attractors(id, cloud, cfg, rng) > 0 {
            sensing += 1;
        }
    }
    trace!(sensing, branches = tree.len(), "search phase");
    sensing
}

pub fn assign_phase(tree: &mut Tree, cloud: &AttractorCloud) {
    cloud.collect_assignments(tree);
}

/// Tombstones attractors within the kill distance of any tip, without
/// reorienting anything.
///
/// ### Returns
/// The number of attractors tombstoned.
pub fn kill_phase(tree: &Tree, cloud: &mut AttractorCloud, cfg: &Config) -> usize {
    tree.post_order()
        .into_iter()
        .map(|id| cloud.remove_within(tree.nodes[id].tip(), cfg.kill_distance))
        .sum()
}

/// Runs [`Tree::colonize`] for every branch.
///
/// ### Returns
/// `(consumed, dormant)`: attractors tombstoned and branches left without
/// attractors.
pub fn colonize_phase(
    tree: &mut Tree,
    cloud: &mut AttractorCloud,
    cfg: &Config,
    rng: &mut impl Rng,
) -> (usize, usize) {
    let mut consumed = 0;
    for id in tree.post_order() {
        consumed += tree.colonize(id, cloud, cfg, rng);
    }
    let dormant = tree.nodes.iter().filter(|b| b.dormant).count();
    trace!(consumed, dormant, "colonize phase");
    (consumed, dormant)
}

/// Runs [`Tree::mature`] once for every branch that existed when the phase
/// started; buds laid here are first visited next step.
///
/// ### Returns
/// The ids of the new buds.
pub fn maturation_phase(tree: &mut Tree, cfg: &Config, rng: &mut impl Rng) -> Vec<NodeId> {
    let mut sprouted = Vec::with_capacity(16);
    for id in tree.post_order() {
        if let Some(bud) = tree.mature(id, cfg, rng) {
            sprouted.push(bud);
        }
    }
    trace!(sprouted = sprouted.len(), "maturation phase");
    sprouted
}

/// Runs one full growth step; `age` is the plant age the step brings the
/// tree to and is copied into the report.
pub fn run_step(
    tree: &mut Tree,
    cloud: &mut AttractorCloud,
    cfg: &Config,
    rng: &mut impl Rng,
    age: u32,
) -> StepReport {
    clear_phase(tree, cloud);
    search_phase(tree, cloud, cfg, rng);
    assign_phase(tree, cloud);
    let (consumed, dormant) = colonize_phase(tree, cloud, cfg, rng);
    let sprouted = maturation_phase(tree, cfg, rng);
    let dropped = cloud.compact();
    trace!(dropped, "compacted attractor cloud");

    StepReport {
        age,
        sprouted,
        consumed,
        dormant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::BranchKind;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(3)
    }

    fn grown_tree(cfg: &Config, cloud: &mut AttractorCloud, steps: usize) -> Tree {
        let mut tree = Tree::seedling(cfg).unwrap();
        let mut rng = rng();
        for age in 1..=steps as u32 {
            run_step(&mut tree, cloud, cfg, &mut rng, age);
        }
        tree
    }

    fn crown(seed: u64, count: usize) -> AttractorCloud {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        AttractorCloud::random_in_ellipsoid(
            Vec3::new(0.0, 4.0, 0.0),
            Vec3::new(3.0, 2.5, 3.0),
            count,
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn equidistant_tips_tie_break_on_visit_order() {
        let cfg = Config {
            branching_angle: 0.0,
            ..Config::default()
        };
        let mut tree = Tree::seedling(&cfg).unwrap();
        tree.nodes[Tree::ROOT].length = 1.0;

        // Two identical siblings: both tips sit at (0, 2, 0).
        let a = tree
            .attach(Tree::ROOT, BranchKind::ApicalBud, Vec3::Y, 1.0, &cfg)
            .unwrap();
        let b = tree
            .attach(Tree::ROOT, BranchKind::ApicalBud, Vec3::Y, 1.0, &cfg)
            .unwrap();
        assert_eq!(tree.nodes[a].tip(), tree.nodes[b].tip());

        let mut cloud = AttractorCloud::from_positions(vec![Vec3::new(0.0, 3.0, 0.0)]).unwrap();
        clear_phase(&mut tree, &mut cloud);
        search_phase(&tree, &mut cloud, &cfg, &mut rng());
        assign_phase(&mut tree, &cloud);

        // `a` is visited first and keeps the point on the tie.
        assert_eq!(tree.post_order(), vec![a, b, Tree::ROOT]);
        assert_eq!(cloud.points()[0].owner, Some(a));
        assert_eq!(cloud.points()[0].nearest_dist, 1.0);
        assert_eq!(tree.nodes[a].attractors, vec![0]);
        assert!(tree.nodes[b].attractors.is_empty());
    }

    #[test]
    fn nearer_tip_wins_regardless_of_order() {
        let cfg = Config {
            branching_angle: 0.0,
            ..Config::default()
        };
        let mut tree = Tree::seedling(&cfg).unwrap();
        let a = tree
            .attach(Tree::ROOT, BranchKind::ApicalBud, Vec3::Y, 0.2, &cfg)
            .unwrap();
        let b = tree
            .attach(Tree::ROOT, BranchKind::ApicalBud, Vec3::Y, 0.6, &cfg)
            .unwrap();

        let mut cloud = AttractorCloud::from_positions(vec![Vec3::new(0.0, 1.5, 0.0)]).unwrap();
        clear_phase(&mut tree, &mut cloud);
        search_phase(&tree, &mut cloud, &cfg, &mut rng());

        assert_eq!(cloud.points()[0].owner, Some(b));
        assert_ne!(cloud.points()[0].owner, Some(a));
    }

    #[test]
    fn nearest_dist_matches_owner_tip_after_search() {
        let cfg = Config::default();
        let mut cloud = crown(21, 300);
        let mut tree = grown_tree(&cfg, &mut cloud, 12);

        clear_phase(&mut tree, &mut cloud);
        search_phase(&tree, &mut cloud, &cfg, &mut rng());

        let mut assigned = 0;
        for p in cloud.live() {
            match p.owner {
                None => assert_eq!(p.nearest_dist, f32::INFINITY),
                Some(id) => {
                    assigned += 1;
                    assert_eq!(p.nearest_dist, tree.nodes[id].tip().distance(p.pos));
                }
            }
        }
        assert!(assigned > 0);
    }

    #[test]
    fn assign_phase_skips_removed_points() {
        let cfg = Config {
            branching_angle: 0.0,
            ..Config::default()
        };
        let mut tree = Tree::seedling(&cfg).unwrap();
        let mut cloud = AttractorCloud::from_positions(vec![
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.2, 0.0),
        ])
        .unwrap();

        clear_phase(&mut tree, &mut cloud);
        search_phase(&tree, &mut cloud, &cfg, &mut rng());
        cloud.remove_logical(0);
        assign_phase(&mut tree, &cloud);

        assert_eq!(tree.root().attractors, vec![1]);
    }

    #[test]
    fn kill_phase_is_idempotent() {
        let cfg = Config {
            kill_distance: 1.2,
            ..Config::default()
        };
        let mut cloud = crown(5, 400);
        let tree = grown_tree(&cfg, &mut cloud, 10);

        kill_phase(&tree, &mut cloud, &cfg);
        let first: Vec<bool> = cloud.points().iter().map(|p| p.is_live()).collect();

        assert_eq!(kill_phase(&tree, &mut cloud, &cfg), 0);
        let second: Vec<bool> = cloud.points().iter().map(|p| p.is_live()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn anchors_stay_on_parent_tips() {
        let cfg = Config::default();
        let mut cloud = crown(8, 500);
        let tree = grown_tree(&cfg, &mut cloud, 20);

        assert!(tree.len() > 5);
        for b in &tree.nodes {
            if let Some(p) = b.parent {
                assert_eq!(b.pos, tree.nodes[p].tip(), "branch {} detached", b.id);
                assert_eq!(b.degree, tree.nodes[p].degree + 1);
            }
        }
    }

    #[test]
    fn run_step_compacts_consumed_points() {
        let cfg = Config {
            kill_distance: 0.5,
            ..Config::default()
        };
        let mut tree = Tree::seedling(&cfg).unwrap();
        let mut cloud = AttractorCloud::from_positions(vec![
            Vec3::new(0.0, 0.6, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ])
        .unwrap();

        let report = run_step(&mut tree, &mut cloud, &cfg, &mut rng(), 7);

        assert_eq!(report.age, 7);
        assert_eq!(report.consumed, 1);
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud.points()[0].pos, Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn maturation_visits_only_existing_branches() {
        let cfg = Config::default();
        let mut tree = Tree::seedling(&cfg).unwrap();
        tree.nodes[Tree::ROOT].kind = BranchKind::ApicalBud;

        let sprouted = maturation_phase(&mut tree, &cfg, &mut rng());

        // The new apical bud is not matured in the same pass.
        assert_eq!(sprouted.len(), 1);
        assert_eq!(tree.nodes[sprouted[0]].kind, BranchKind::ApicalBud);
        assert_eq!(tree.root().kind, BranchKind::Metamer);
    }
}
