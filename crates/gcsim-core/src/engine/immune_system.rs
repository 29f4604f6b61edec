use super::assignment;
use super::config::SimulationConfig;
use super::error::EngineError;
use super::germinal_center::{CycleOutput, GerminalCenter};
use super::progress::{Progress, ProgressReporter};
use crate::core::metrics;
use crate::core::models::antigen::Antigen;
use crate::core::models::bcell::BCell;
use crate::core::models::ids::{CellId, Serotype};
use nalgebra::DVector;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-serotype bookkeeping that outlives individual germinal centers.
#[derive(Debug, Clone, Default)]
struct SerotypeState {
    memory: Vec<BCell>,
    plasma: Vec<BCell>,
    antibody_level: f64,
}

/// The whole humoral response of one individual.
///
/// Owns the shared naive pool, one [`GerminalCenter`] per serotype of the
/// most recent vaccination, and the memory pool, plasma pool and antibody
/// level of every serotype ever registered. Serotype state is created on
/// first vaccination and is never reset.
#[derive(Debug)]
pub struct ImmuneSystem {
    config: SimulationConfig,
    antigens: BTreeMap<Serotype, Arc<Antigen>>,
    serotypes: BTreeMap<Serotype, SerotypeState>,
    germinal_centers: Vec<GerminalCenter>,
    naive_pool: Vec<BCell>,
    antibody_levels: BTreeMap<Serotype, f64>,
    rng: StdRng,
    next_cell_id: u64,
    day: u32,
}

impl ImmuneSystem {
    pub fn new(config: SimulationConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            antigens: BTreeMap::new(),
            serotypes: BTreeMap::new(),
            germinal_centers: Vec::new(),
            naive_pool: Vec::new(),
            antibody_levels: BTreeMap::new(),
            rng,
            next_cell_id: 0,
            day: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of completed [`ImmuneSystem::step`] calls.
    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn antibody_levels(&self) -> &BTreeMap<Serotype, f64> {
        &self.antibody_levels
    }

    pub fn antibody_level(&self, serotype: &Serotype) -> Option<f64> {
        self.antibody_levels.get(serotype).copied()
    }

    pub fn serotypes(&self) -> impl Iterator<Item = &Serotype> {
        self.serotypes.keys()
    }

    pub fn antigen(&self, serotype: &Serotype) -> Option<&Antigen> {
        self.antigens.get(serotype).map(Arc::as_ref)
    }

    pub fn naive_pool(&self) -> &[BCell] {
        &self.naive_pool
    }

    pub fn germinal_centers(&self) -> &[GerminalCenter] {
        &self.germinal_centers
    }

    pub fn memory_pool(&self, serotype: &Serotype) -> Result<&[BCell], EngineError> {
        Ok(&self.state(serotype)?.memory)
    }

    pub fn plasma_pool(&self, serotype: &Serotype) -> Result<&[BCell], EngineError> {
        Ok(&self.state(serotype)?.plasma)
    }

    /// Mean affinity of the serotype's memory pool.
    pub fn avidity(&self, serotype: &Serotype) -> Result<f64, EngineError> {
        Ok(metrics::avidity_index(&self.state(serotype)?.memory))
    }

    fn state(&self, serotype: &Serotype) -> Result<&SerotypeState, EngineError> {
        self.serotypes
            .get(serotype)
            .ok_or_else(|| EngineError::UnknownSerotype {
                serotype: serotype.clone(),
            })
    }

    /// Starts a vaccination round.
    ///
    /// Validates the antigens, registers new serotypes with a zero antibody
    /// level, refills the naive pool to its configured size, partitions the
    /// pool across the antigens and replaces the running germinal centers
    /// with freshly seeded ones. Unclaimed naive cells stay in the pool.
    #[instrument(skip_all, fields(day = self.day, antigens = antigens.len()))]
    pub fn vaccinate(
        &mut self,
        antigens: &[Antigen],
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        if antigens.is_empty() {
            warn!("Vaccination without antigens; germinal centers left unchanged.");
            return Ok(());
        }
        self.check_antigens(antigens)?;

        reporter.report(Progress::VaccinationStart {
            day: self.day,
            antigens: antigens.len(),
        });

        let antigens: Vec<Arc<Antigen>> = antigens.iter().cloned().map(Arc::new).collect();
        for antigen in &antigens {
            let serotype = antigen.serotype().clone();
            self.antigens.insert(serotype.clone(), Arc::clone(antigen));
            self.serotypes.entry(serotype.clone()).or_default();
            self.antibody_levels.entry(serotype).or_insert(0.0);
        }

        self.replenish_naive_pool();

        let pool = std::mem::take(&mut self.naive_pool);
        let outcome = assignment::assign(
            pool,
            &antigens,
            &self.config.assignment,
            &mut self.rng,
            reporter,
        )?;
        let claimed = outcome.claimed();
        self.naive_pool = outcome.unclaimed;
        let mut seeds = outcome.seeds;

        let mut centers = Vec::with_capacity(antigens.len());
        for (id, antigen) in antigens.into_iter().enumerate() {
            let mut center = GerminalCenter::new(id, Arc::clone(&antigen), self.rng.r#gen());
            let cells = seeds.remove(antigen.serotype()).unwrap_or_default();
            center.seed_naive_cells(cells)?;
            centers.push(center);
        }
        self.germinal_centers = centers;

        info!(
            claimed,
            unclaimed = self.naive_pool.len(),
            centers = self.germinal_centers.len(),
            "Vaccination complete."
        );
        Ok(())
    }

    fn check_antigens(&self, antigens: &[Antigen]) -> Result<(), EngineError> {
        let expected = self.config.repertoire.receptor_dimension;
        let mut seen = BTreeSet::new();
        for antigen in antigens {
            if !seen.insert(antigen.serotype()) {
                return Err(EngineError::DuplicateSerotype {
                    serotype: antigen.serotype().clone(),
                });
            }
            if antigen.dimension() != expected {
                return Err(EngineError::EpitopeDimension {
                    serotype: antigen.serotype().clone(),
                    expected,
                    found: antigen.dimension(),
                });
            }
        }
        Ok(())
    }

    fn replenish_naive_pool(&mut self) {
        let target = self.config.repertoire.naive_pool_size;
        let dimension = self.config.repertoire.receptor_dimension;
        let missing = target.saturating_sub(self.naive_pool.len());
        self.naive_pool.reserve(missing);
        for _ in 0..missing {
            let rng = &mut self.rng;
            let receptor = DVector::from_fn(dimension, |_, _| rng.gen_range(0.0..=1.0));
            self.naive_pool
                .push(BCell::naive(CellId(self.next_cell_id), receptor));
            self.next_cell_id += 1;
        }
        debug!(fresh = missing, pool = self.naive_pool.len(), "Naive pool replenished.");
    }

    /// Advances the system by one day.
    ///
    /// Every germinal center runs one cycle, their output joins the
    /// serotype pools, antibody levels follow the production-then-decay
    /// recurrence and finally plasma cells turn over.
    #[instrument(skip_all, fields(day = self.day + 1))]
    pub fn step(&mut self, reporter: &ProgressReporter) -> Result<(), EngineError> {
        let config = &self.config;

        #[cfg(not(feature = "parallel"))]
        let iterator = self.germinal_centers.iter_mut();

        #[cfg(feature = "parallel")]
        let iterator = self.germinal_centers.par_iter_mut();

        let outputs: Vec<Result<(Serotype, CycleOutput), EngineError>> = iterator
            .map(|center| {
                let output = center.run_cycle(config, reporter)?;
                Ok((center.serotype().clone(), output))
            })
            .collect();

        for result in outputs {
            let (serotype, output) = result?;
            let state = self
                .serotypes
                .get_mut(&serotype)
                .ok_or_else(|| EngineError::Internal(format!("No pools for serotype {serotype}")))?;
            state.memory.extend(output.memory);
            state.plasma.extend(output.plasma);
        }

        self.update_antibody_levels();
        self.turn_over_plasma_cells();

        self.day += 1;
        reporter.report(Progress::DayFinished { day: self.day });
        Ok(())
    }

    fn update_antibody_levels(&mut self) {
        let kinetics = &self.config.kinetics;
        for (serotype, state) in &mut self.serotypes {
            let immunogenicity = self
                .antigens
                .get(serotype)
                .map_or(1.0, |antigen| antigen.immunogenicity_factor());
            let production = (state.plasma.len() as f64 * kinetics.plasma_production_factor
                + state.memory.len() as f64 * kinetics.memory_production_factor)
                * immunogenicity;
            let mut level = (state.antibody_level + production) * kinetics.antibody_decay_factor;
            if !level.is_finite() || level < 0.0 {
                warn!(%serotype, level, "Antibody level left the valid range; clamping.");
                level = if level.is_nan() { 0.0 } else { level.clamp(0.0, f64::MAX) };
            }
            state.antibody_level = level;
            self.antibody_levels.insert(serotype.clone(), level);
        }
    }

    fn turn_over_plasma_cells(&mut self) {
        let survival = 1.0 - self.config.kinetics.plasma_death_rate;
        let rng = &mut self.rng;
        for state in self.serotypes.values_mut() {
            state.plasma.retain(|_| rng.gen_bool(survival));
        }
    }
}
