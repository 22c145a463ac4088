//! A growing tree bound to the attractor cloud it colonizes.

use crate::{
    attractor::AttractorCloud,
    config::Config,
    error::Result,
    phases::{self, StepReport},
    tree::{Branch, Subtree, Tree},
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

pub const DEFAULT_MAX_AGE: u32 = 40;

/// Drives discrete growth steps of one [`Tree`] toward an
/// [`AttractorCloud`].
///
/// The plant owns both the tree and the active cloud. The cloud can be
/// swapped wholesale between steps with
/// [`TreePlant::set_attractor_cloud`], for example when a new set of
/// sample points becomes available.
#[derive(Clone, Debug)]
pub struct TreePlant {
    tree: Tree,
    cloud: AttractorCloud,
    cfg: Config,
    age: u32,
    max_age: u32,
    rng: ChaCha8Rng,
}

impl TreePlant {
    /// Creates a plant of age 0 with a freshly seeded generator.
    ///
    /// Diameters are recomputed from `cfg` so the tree starts consistent.
    pub fn new(mut tree: Tree, cloud: AttractorCloud, cfg: Config) -> Result<Self> {
        cfg.validate()?;
        tree.recompute_diameters(&cfg);
        Ok(Self {
            tree,
            cloud,
            cfg,
            age: 0,
            max_age: DEFAULT_MAX_AGE,
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
        })
    }

    /// A seedling with default configuration and an empty cloud.
    pub fn with_defaults() -> Result<Self> {
        let cfg = Config::default();
        Self::new(Tree::seedling(&cfg)?, AttractorCloud::new(), cfg)
    }

    /// Reseeds the generator; plants built from equal inputs and seeds
    /// grow identically.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_max_age(mut self, max_age: u32) -> Self {
        self.max_age = max_age;
        self
    }

    /// Advances the simulation by one step.
    ///
    /// Does nothing while the cloud has no live points or the plant is
    /// older than its max age. The bound is checked on every call, so
    /// raising it with [`TreePlant::set_max_age`] resumes growth.
    ///
    /// ### Returns
    /// The step report, or `None` if the call was a no-op.
    pub fn grow(&mut self) -> Option<StepReport> {
        if self.cloud.is_empty() {
            debug!(age = self.age, "no attractors left, skipping growth");
            return None;
        }
        if self.is_terminal() {
            debug!(age = self.age, max_age = self.max_age, "plant reached max age");
            return None;
        }

        let age = self.age + 1;
        let report = phases::run_step(
            &mut self.tree,
            &mut self.cloud,
            &self.cfg,
            &mut self.rng,
            age,
        );
        self.age = age;

        debug!(
            age = self.age,
            branches = self.tree.len(),
            sprouted = report.sprouted.len(),
            consumed = report.consumed,
            dormant = report.dormant,
            attractors = self.cloud.len(),
            "grew one step"
        );
        Some(report)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> &Branch {
        self.tree.root()
    }

    /// Every branch, depth-first from the root.
    pub fn branches(&self) -> Subtree<'_> {
        self.tree.subtree(Tree::ROOT)
    }

    pub fn cloud(&self) -> &AttractorCloud {
        &self.cloud
    }

    /// Mutable access for injecting points between steps.
    pub fn cloud_mut(&mut self) -> &mut AttractorCloud {
        &mut self.cloud
    }

    /// Replaces the active cloud and returns the previous one.
    pub fn set_attractor_cloud(&mut self, cloud: AttractorCloud) -> AttractorCloud {
        std::mem::replace(&mut self.cloud, cloud)
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    pub fn set_max_age(&mut self, max_age: u32) {
        self.max_age = max_age;
    }

    pub fn is_terminal(&self) -> bool {
        self.age > self.max_age
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Replaces the tunables for future steps. Existing geometry is kept.
    pub fn set_config(&mut self, cfg: Config) -> Result<()> {
        cfg.validate()?;
        self.cfg = cfg;
        Ok(())
    }

    /// Recomputes every diameter top-down from the current config.
    pub fn recompute_diameters(&mut self) {
        self.tree.recompute_diameters(&self.cfg);
    }
}
