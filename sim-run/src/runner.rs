//! Headless driver around a [`TreePlant`].
//!
//! [`Runner`] owns the plant, builds the initial attractor cloud from the
//! command-line options, and formats status lines for each step.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sim_core::{AttractorCloud, BranchKind, Config, Tree, TreePlant, phases::StepReport};
use std::collections::BTreeMap;
use tracing::info;

/// Shape of the generated attractor cloud.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shape {
    Box,
    Ellipsoid,
}

/// Grow a space-colonization tree toward a generated attractor cloud.
#[derive(Clone, Debug, Parser)]
#[command(name = "sim-run", version)]
pub struct Args {
    /// Seed for both the cloud and the growth generator.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Upper bound on the number of growth steps.
    #[arg(long, default_value_t = 60)]
    pub steps: u32,

    /// Number of attractor points.
    #[arg(long, default_value_t = 1000)]
    pub attractors: usize,

    #[arg(long, value_enum, default_value_t = Shape::Ellipsoid)]
    pub shape: Shape,

    /// Height of the cloud center above the root.
    #[arg(long, default_value_t = 6.0)]
    pub center_height: f32,

    /// Horizontal half-size of the cloud; the vertical one is 3/4 of it.
    #[arg(long, default_value_t = 4.0)]
    pub radius: f32,

    #[arg(long, default_value_t = sim_core::plant::DEFAULT_MAX_AGE)]
    pub max_age: u32,

    #[arg(long)]
    pub growth_length: Option<f32>,

    #[arg(long)]
    pub kill_distance: Option<f32>,

    #[arg(long)]
    pub perception_length: Option<f32>,
}

impl Args {
    /// Default tunables with any overrides from the command line.
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        if let Some(v) = self.growth_length {
            cfg.growth_length = v;
        }
        if let Some(v) = self.kill_distance {
            cfg.kill_distance = v;
        }
        if let Some(v) = self.perception_length {
            cfg.perception_length = v;
        }
        cfg
    }
}

pub struct Runner {
    args: Args,
    plant: TreePlant,
    last: Option<StepReport>,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        let plant = Self::build_plant(&args)?;
        Ok(Self {
            args,
            plant,
            last: None,
        })
    }

    fn build_plant(args: &Args) -> Result<TreePlant> {
        let cfg = args.config();
        cfg.validate().context("invalid growth parameters")?;

        let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
        let center = Vec3::new(0.0, args.center_height, 0.0);
        let extents = Vec3::new(args.radius, args.radius * 0.75, args.radius);
        let cloud = match args.shape {
            Shape::Box => {
                AttractorCloud::random_in_box(center, extents, args.attractors, &mut rng)
            }
            Shape::Ellipsoid => {
                AttractorCloud::random_in_ellipsoid(center, extents, args.attractors, &mut rng)
            }
        }
        .context("failed to generate attractor cloud")?;

        let tree = Tree::seedling(&cfg)?;
        let plant = TreePlant::new(tree, cloud, cfg)?
            .with_seed(args.seed)
            .with_max_age(args.max_age);
        Ok(plant)
    }

    /// Restores the initial plant and cloud.
    pub fn reset(&mut self) -> Result<()> {
        self.plant = Self::build_plant(&self.args)?;
        self.last = None;
        Ok(())
    }

    pub fn plant(&self) -> &TreePlant {
        &self.plant
    }

    /// Advances the plant by one step.
    ///
    /// ### Returns
    /// `false` once the plant has stopped growing.
    pub fn step_once(&mut self) -> bool {
        self.last = self.plant.grow();
        self.last.is_some()
    }

    /// Steps until the budget is spent or growth stops.
    ///
    /// ### Returns
    /// The number of steps that actually grew.
    pub fn run(&mut self) -> u32 {
        let mut grown = 0;
        for _ in 0..self.args.steps {
            if !self.step_once() {
                info!(age = self.plant.age(), "growth stopped");
                break;
            }
            grown += 1;
            println!("{}", self.status_line());
        }
        grown
    }

    pub fn status_line(&self) -> String {
        let sprouted = self.last.as_ref().map_or(0, |r| r.sprouted.len());
        let consumed = self.last.as_ref().map_or(0, |r| r.consumed);
        format!(
            "age = {:>3}  branches = {:>5}  new = {:>3}  consumed = {:>4}  live attractors = {:>5}",
            self.plant.age(),
            self.plant.tree().len(),
            sprouted,
            consumed,
            self.plant.cloud().live_count(),
        )
    }

    /// Branch counts per kind, deepest degree, and trunk/twig diameters.
    pub fn summary(&self) -> String {
        let mut kinds: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut max_degree = 0;
        let mut min_diameter = f32::INFINITY;
        for b in self.plant.branches() {
            *kinds.entry(kind_name(b.kind)).or_default() += 1;
            max_degree = max_degree.max(b.degree);
            min_diameter = min_diameter.min(b.diameter);
        }

        let mut out = format!(
            "age {} | {} branches | max degree {} | trunk {:.3} | thinnest {:.3}\n",
            self.plant.age(),
            self.plant.tree().len(),
            max_degree,
            self.plant.root().diameter,
            min_diameter,
        );
        for (kind, n) in kinds {
            out.push_str(&format!("  {kind:<12} {n}\n"));
        }
        out.push_str(&format!(
            "  attractors left: {}\n",
            self.plant.cloud().live_count()
        ));
        out
    }
}

fn kind_name(kind: BranchKind) -> &'static str {
    match kind {
        BranchKind::Metamer => "metamer",
        BranchKind::Internode => "internode",
        BranchKind::ApicalBud => "apical bud",
        BranchKind::LateralBud => "lateral bud",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["sim-run"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn parses_defaults_and_overrides() {
        let a = args(&[]);
        assert_eq!(a.seed, 42);
        assert_eq!(a.shape, Shape::Ellipsoid);
        assert_eq!(a.config(), Config::default());

        let a = args(&["--shape", "box", "--growth-length", "0.25", "--max-age", "5"]);
        assert_eq!(a.shape, Shape::Box);
        assert_eq!(a.max_age, 5);
        assert_eq!(a.config().growth_length, 0.25);
    }

    #[test]
    fn rejects_invalid_tunables() {
        assert!(Runner::new(args(&["--growth-length", "0"])).is_err());
    }

    #[test]
    fn rejects_non_finite_cloud_size() {
        assert!(Runner::new(args(&["--shape", "box", "--radius", "nan"])).is_err());
        assert!(Runner::new(args(&["--radius", "inf"])).is_err());
    }

    #[test]
    fn run_stops_at_max_age() {
        let mut runner = Runner::new(args(&["--steps", "50", "--max-age", "4"])).unwrap();
        let grown = runner.run();
        assert_eq!(grown, 5);
        assert_eq!(runner.plant().age(), 5);
        assert!(!runner.step_once());
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut runner = Runner::new(args(&["--attractors", "200"])).unwrap();
        for _ in 0..5 {
            runner.step_once();
        }
        assert!(runner.plant().tree().len() > 1);

        runner.reset().unwrap();
        assert_eq!(runner.plant().age(), 0);
        assert_eq!(runner.plant().tree().len(), 1);
        assert_eq!(runner.plant().cloud().len(), 200);
    }

    #[test]
    fn same_seed_gives_same_summary() {
        let mut a = Runner::new(args(&["--seed", "7", "--steps", "10"])).unwrap();
        let mut b = Runner::new(args(&["--seed", "7", "--steps", "10"])).unwrap();
        a.run();
        b.run();
        assert_eq!(a.summary(), b.summary());
        assert!(a.summary().contains("internode"));
    }
}
