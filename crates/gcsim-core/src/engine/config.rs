use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_NAIVE_POOL_SIZE: usize = 1000;
pub const DEFAULT_RECEPTOR_DIMENSION: usize = 5;
pub const DEFAULT_ADMISSION_THRESHOLD: f64 = 0.3;
pub const DEFAULT_ASSIGNMENT_ROUNDS: usize = 200;
pub const DEFAULT_ENGAGEMENT_DELAY: usize = 1;
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_DIVISION_PROBABILITY: f64 = 0.1;
pub const DEFAULT_PER_SITE_RATE: f64 = 0.1;
pub const DEFAULT_MUTATION_STRENGTH: f64 = 0.05;
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_PLASMA_THRESHOLD: f64 = 0.6;
pub const DEFAULT_LF_DECAY: f64 = 0.1;
pub const DEFAULT_CAPACITY_K: f64 = 100.0;
pub const DEFAULT_CARRYING_CAPACITY: usize = 10_000;
pub const DEFAULT_PLASMA_PRODUCTION_FACTOR: f64 = 0.1;
pub const DEFAULT_MEMORY_PRODUCTION_FACTOR: f64 = 0.02;
pub const DEFAULT_PLASMA_DEATH_RATE: f64 = 0.01;
pub const DEFAULT_VACCINATION_DAYS: [u32; 3] = [0, 60, 180];
pub const DEFAULT_DURATION_DAYS: u32 = 730;

/// Daily IgG decay for a ~21 day half-life, `exp(-0.033)`.
pub fn default_antibody_decay_factor() -> f64 {
    (-0.033f64).exp()
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentMode {
    /// Round-robin simulation of the claiming protocol on one thread; reproducible.
    #[default]
    Deterministic,
    /// One OS thread per antigen lane contending on per-cell locks.
    Threaded,
}

/// Survivor-cap policy of a germinal center, see [`super::capacity::CapacitySchedule`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "kebab-case", tag = "type")]
pub enum CapacityPolicy {
    /// Every cell is eligible for selection in every cycle.
    Unbounded,
    /// A constant cap on survivors per cycle.
    Fixed { max_survivors: usize },
    /// `floor(cycles^2 / k * pool)`, clamped to the pool size.
    Quadratic { k: f64 },
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self::Quadratic {
            k: DEFAULT_CAPACITY_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepertoireConfig {
    pub naive_pool_size: usize,
    pub receptor_dimension: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentConfig {
    pub admission_threshold: f64,
    pub rounds: usize,
    pub engagement_delay: usize,
    pub mode: AssignmentMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationConfig {
    /// Probability that a surviving cell divides into a mutated offspring each cycle.
    pub division_probability: f64,
    pub per_site_rate: f64,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DifferentiationConfig {
    pub memory_threshold: f64,
    pub plasma_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GerminalCenterConfig {
    /// Per-cycle death probability from limiting factors.
    pub lf_decay: f64,
    pub capacity: CapacityPolicy,
    pub carrying_capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KineticsConfig {
    pub plasma_production_factor: f64,
    pub memory_production_factor: f64,
    pub antibody_decay_factor: f64,
    pub plasma_death_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub vaccination_days: Vec<u32>,
    pub duration_days: u32,
}

impl ScheduleConfig {
    pub fn is_vaccination_day(&self, day: u32) -> bool {
        self.vaccination_days.contains(&day)
    }
}

/// The complete, validated parameter bundle of one simulation run.
///
/// Only [`SimulationConfigBuilder::build`] and the TOML loaders hand these
/// out, and [`crate::engine::immune_system::ImmuneSystem::new`] validates
/// again, so no cycle ever runs against an inconsistent configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub seed: u64,
    pub repertoire: RepertoireConfig,
    pub assignment: AssignmentConfig,
    pub selection: SelectionConfig,
    pub mutation: MutationConfig,
    pub differentiation: DifferentiationConfig,
    pub germinal_center: GerminalCenterConfig,
    pub kinetics: KineticsConfig,
    pub schedule: ScheduleConfig,
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("{value} is outside [0, 1]"),
        })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("{value} must be finite and positive"),
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("{value} must be finite and non-negative"),
        })
    }
}

fn non_zero(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: "must be greater than zero".to_string(),
        })
    }
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("naive_pool_size", self.repertoire.naive_pool_size)?;
        non_zero("receptor_dimension", self.repertoire.receptor_dimension)?;

        unit_interval("admission_threshold", self.assignment.admission_threshold)?;
        non_zero("rounds", self.assignment.rounds)?;

        positive("temperature", self.selection.temperature)?;

        unit_interval("division_probability", self.mutation.division_probability)?;
        unit_interval("per_site_rate", self.mutation.per_site_rate)?;
        positive("strength", self.mutation.strength)?;

        let diff = &self.differentiation;
        unit_interval("memory_threshold", diff.memory_threshold)?;
        unit_interval("plasma_threshold", diff.plasma_threshold)?;
        if diff.memory_threshold <= diff.plasma_threshold {
            return Err(ConfigError::InvalidParameter {
                name: "memory_threshold",
                reason: format!(
                    "{} must be greater than plasma_threshold ({})",
                    diff.memory_threshold, diff.plasma_threshold
                ),
            });
        }

        unit_interval("lf_decay", self.germinal_center.lf_decay)?;
        non_zero("carrying_capacity", self.germinal_center.carrying_capacity)?;
        match self.germinal_center.capacity {
            CapacityPolicy::Unbounded => {}
            CapacityPolicy::Fixed { max_survivors } => non_zero("max_survivors", max_survivors)?,
            CapacityPolicy::Quadratic { k } => positive("capacity.k", k)?,
        }

        let kin = &self.kinetics;
        non_negative("plasma_production_factor", kin.plasma_production_factor)?;
        non_negative("memory_production_factor", kin.memory_production_factor)?;
        unit_interval("antibody_decay_factor", kin.antibody_decay_factor)?;
        unit_interval("plasma_death_rate", kin.plasma_death_rate)?;

        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        let partial: PartialSimulationConfig = toml::from_str(content)?;
        Ok(partial.into_builder().build()?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[derive(Default, Clone)]
pub struct SimulationConfigBuilder {
    seed: Option<u64>,
    naive_pool_size: Option<usize>,
    receptor_dimension: Option<usize>,
    admission_threshold: Option<f64>,
    assignment_rounds: Option<usize>,
    engagement_delay: Option<usize>,
    assignment_mode: Option<AssignmentMode>,
    temperature: Option<f64>,
    division_probability: Option<f64>,
    per_site_rate: Option<f64>,
    mutation_strength: Option<f64>,
    memory_threshold: Option<f64>,
    plasma_threshold: Option<f64>,
    lf_decay: Option<f64>,
    capacity: Option<CapacityPolicy>,
    carrying_capacity: Option<usize>,
    plasma_production_factor: Option<f64>,
    memory_production_factor: Option<f64>,
    antibody_decay_factor: Option<f64>,
    plasma_death_rate: Option<f64>,
    vaccination_days: Option<Vec<u32>>,
    duration_days: Option<u32>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn naive_pool_size(mut self, size: usize) -> Self {
        self.naive_pool_size = Some(size);
        self
    }
    pub fn receptor_dimension(mut self, dimension: usize) -> Self {
        self.receptor_dimension = Some(dimension);
        self
    }
    pub fn admission_threshold(mut self, threshold: f64) -> Self {
        self.admission_threshold = Some(threshold);
        self
    }
    pub fn assignment_rounds(mut self, rounds: usize) -> Self {
        self.assignment_rounds = Some(rounds);
        self
    }
    pub fn engagement_delay(mut self, ticks: usize) -> Self {
        self.engagement_delay = Some(ticks);
        self
    }
    pub fn assignment_mode(mut self, mode: AssignmentMode) -> Self {
        self.assignment_mode = Some(mode);
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn division_probability(mut self, p: f64) -> Self {
        self.division_probability = Some(p);
        self
    }
    pub fn per_site_rate(mut self, rate: f64) -> Self {
        self.per_site_rate = Some(rate);
        self
    }
    pub fn mutation_strength(mut self, strength: f64) -> Self {
        self.mutation_strength = Some(strength);
        self
    }
    pub fn memory_threshold(mut self, threshold: f64) -> Self {
        self.memory_threshold = Some(threshold);
        self
    }
    pub fn plasma_threshold(mut self, threshold: f64) -> Self {
        self.plasma_threshold = Some(threshold);
        self
    }
    pub fn lf_decay(mut self, decay: f64) -> Self {
        self.lf_decay = Some(decay);
        self
    }
    pub fn capacity(mut self, policy: CapacityPolicy) -> Self {
        self.capacity = Some(policy);
        self
    }
    pub fn carrying_capacity(mut self, cells: usize) -> Self {
        self.carrying_capacity = Some(cells);
        self
    }
    pub fn plasma_production_factor(mut self, factor: f64) -> Self {
        self.plasma_production_factor = Some(factor);
        self
    }
    pub fn memory_production_factor(mut self, factor: f64) -> Self {
        self.memory_production_factor = Some(factor);
        self
    }
    pub fn antibody_decay_factor(mut self, factor: f64) -> Self {
        self.antibody_decay_factor = Some(factor);
        self
    }
    pub fn plasma_death_rate(mut self, rate: f64) -> Self {
        self.plasma_death_rate = Some(rate);
        self
    }
    pub fn vaccination_days(mut self, days: Vec<u32>) -> Self {
        self.vaccination_days = Some(days);
        self
    }
    pub fn duration_days(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let config = SimulationConfig {
            seed: self.seed.ok_or(ConfigError::MissingParameter("seed"))?,
            repertoire: RepertoireConfig {
                naive_pool_size: self.naive_pool_size.unwrap_or(DEFAULT_NAIVE_POOL_SIZE),
                receptor_dimension: self
                    .receptor_dimension
                    .unwrap_or(DEFAULT_RECEPTOR_DIMENSION),
            },
            assignment: AssignmentConfig {
                admission_threshold: self
                    .admission_threshold
                    .unwrap_or(DEFAULT_ADMISSION_THRESHOLD),
                rounds: self.assignment_rounds.unwrap_or(DEFAULT_ASSIGNMENT_ROUNDS),
                engagement_delay: self.engagement_delay.unwrap_or(DEFAULT_ENGAGEMENT_DELAY),
                mode: self.assignment_mode.unwrap_or_default(),
            },
            selection: SelectionConfig {
                temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            },
            mutation: MutationConfig {
                division_probability: self
                    .division_probability
                    .unwrap_or(DEFAULT_DIVISION_PROBABILITY),
                per_site_rate: self.per_site_rate.unwrap_or(DEFAULT_PER_SITE_RATE),
                strength: self.mutation_strength.unwrap_or(DEFAULT_MUTATION_STRENGTH),
            },
            differentiation: DifferentiationConfig {
                memory_threshold: self.memory_threshold.unwrap_or(DEFAULT_MEMORY_THRESHOLD),
                plasma_threshold: self.plasma_threshold.unwrap_or(DEFAULT_PLASMA_THRESHOLD),
            },
            germinal_center: GerminalCenterConfig {
                lf_decay: self.lf_decay.unwrap_or(DEFAULT_LF_DECAY),
                capacity: self.capacity.unwrap_or_default(),
                carrying_capacity: self.carrying_capacity.unwrap_or(DEFAULT_CARRYING_CAPACITY),
            },
            kinetics: KineticsConfig {
                plasma_production_factor: self
                    .plasma_production_factor
                    .unwrap_or(DEFAULT_PLASMA_PRODUCTION_FACTOR),
                memory_production_factor: self
                    .memory_production_factor
                    .unwrap_or(DEFAULT_MEMORY_PRODUCTION_FACTOR),
                antibody_decay_factor: self
                    .antibody_decay_factor
                    .unwrap_or_else(default_antibody_decay_factor),
                plasma_death_rate: self.plasma_death_rate.unwrap_or(DEFAULT_PLASMA_DEATH_RATE),
            },
            schedule: ScheduleConfig {
                vaccination_days: self
                    .vaccination_days
                    .unwrap_or_else(|| DEFAULT_VACCINATION_DAYS.to_vec()),
                duration_days: self.duration_days.unwrap_or(DEFAULT_DURATION_DAYS),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRepertoireConfig {
    naive_pool_size: Option<usize>,
    receptor_dimension: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialAssignmentConfig {
    admission_threshold: Option<f64>,
    rounds: Option<usize>,
    engagement_delay: Option<usize>,
    mode: Option<AssignmentMode>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSelectionConfig {
    temperature: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMutationConfig {
    division_probability: Option<f64>,
    per_site_rate: Option<f64>,
    strength: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialDifferentiationConfig {
    memory_threshold: Option<f64>,
    plasma_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialGerminalCenterConfig {
    lf_decay: Option<f64>,
    capacity: Option<CapacityPolicy>,
    carrying_capacity: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialKineticsConfig {
    plasma_production_factor: Option<f64>,
    memory_production_factor: Option<f64>,
    antibody_decay_factor: Option<f64>,
    plasma_death_rate: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialScheduleConfig {
    vaccination_days: Option<Vec<u32>>,
    duration_days: Option<u32>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct PartialSimulationConfig {
    seed: Option<u64>,
    repertoire: Option<PartialRepertoireConfig>,
    assignment: Option<PartialAssignmentConfig>,
    selection: Option<PartialSelectionConfig>,
    mutation: Option<PartialMutationConfig>,
    differentiation: Option<PartialDifferentiationConfig>,
    germinal_center: Option<PartialGerminalCenterConfig>,
    kinetics: Option<PartialKineticsConfig>,
    schedule: Option<PartialScheduleConfig>,
}

impl PartialSimulationConfig {
    pub(crate) fn into_builder(self) -> SimulationConfigBuilder {
        let repertoire = self.repertoire.unwrap_or_default();
        let assignment = self.assignment.unwrap_or_default();
        let selection = self.selection.unwrap_or_default();
        let mutation = self.mutation.unwrap_or_default();
        let differentiation = self.differentiation.unwrap_or_default();
        let germinal_center = self.germinal_center.unwrap_or_default();
        let kinetics = self.kinetics.unwrap_or_default();
        let schedule = self.schedule.unwrap_or_default();

        SimulationConfigBuilder {
            seed: self.seed,
            naive_pool_size: repertoire.naive_pool_size,
            receptor_dimension: repertoire.receptor_dimension,
            admission_threshold: assignment.admission_threshold,
            assignment_rounds: assignment.rounds,
            engagement_delay: assignment.engagement_delay,
            assignment_mode: assignment.mode,
            temperature: selection.temperature,
            division_probability: mutation.division_probability,
            per_site_rate: mutation.per_site_rate,
            mutation_strength: mutation.strength,
            memory_threshold: differentiation.memory_threshold,
            plasma_threshold: differentiation.plasma_threshold,
            lf_decay: germinal_center.lf_decay,
            capacity: germinal_center.capacity,
            carrying_capacity: germinal_center.carrying_capacity,
            plasma_production_factor: kinetics.plasma_production_factor,
            memory_production_factor: kinetics.memory_production_factor,
            antibody_decay_factor: kinetics.antibody_decay_factor,
            plasma_death_rate: kinetics.plasma_death_rate,
            vaccination_days: schedule.vaccination_days,
            duration_days: schedule.duration_days,
        }
    }
}
