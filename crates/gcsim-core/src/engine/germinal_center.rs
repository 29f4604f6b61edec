use super::capacity::CapacitySchedule;
use super::config::SimulationConfig;
use super::error::EngineError;
use super::progress::{CycleStage, Progress, ProgressReporter};
use crate::core::models::antigen::Antigen;
use crate::core::models::bcell::BCell;
use crate::core::models::ids::Serotype;
use crate::core::processes::affinity;
use crate::core::processes::differentiation::{DifferentiationPolicy, Fate};
use crate::core::processes::mutation::MutationEngine;
use crate::core::processes::selection;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;
use tracing::{instrument, trace};

/// Cells that left a germinal center during one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleOutput {
    pub memory: Vec<BCell>,
    pub plasma: Vec<BCell>,
}

impl CycleOutput {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.plasma.is_empty()
    }
}

/// One serotype's germinal-center reaction.
///
/// Every call to [`GerminalCenter::run_cycle`] performs, in this fixed order:
/// Boltzmann selection under the capacity schedule, differentiation of the
/// selected cells, stochastic culling of the cells left behind, and
/// mutation of the survivors with clonal expansion. The center owns its RNG,
/// so its trajectory does not depend on how centers are scheduled.
#[derive(Debug)]
pub struct GerminalCenter {
    id: usize,
    antigen: Arc<Antigen>,
    population: Vec<BCell>,
    cycles: u32,
    rng: StdRng,
}

impl GerminalCenter {
    pub fn new(id: usize, antigen: Arc<Antigen>, seed: u64) -> Self {
        Self {
            id,
            antigen,
            population: Vec::new(),
            cycles: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn antigen(&self) -> &Antigen {
        &self.antigen
    }

    pub fn serotype(&self) -> &Serotype {
        self.antigen.serotype()
    }

    pub fn population(&self) -> &[BCell] {
        &self.population
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn is_extinct(&self) -> bool {
        self.population.is_empty()
    }

    /// Hands the active pool back to the caller, ending the reaction.
    pub fn into_population(self) -> Vec<BCell> {
        self.population
    }

    /// Adds naive cells to the active pool, scored against this center's antigen.
    pub fn seed_naive_cells(&mut self, cells: Vec<BCell>) -> Result<(), EngineError> {
        self.population.reserve(cells.len());
        for cell in cells {
            let affinity = affinity::compute(self.antigen.epitope(), cell.receptor())?;
            self.population
                .push(cell.assigned(self.antigen.serotype().clone(), affinity));
        }
        Ok(())
    }

    pub fn run_cycle(
        &mut self,
        config: &SimulationConfig,
        reporter: &ProgressReporter,
    ) -> Result<CycleOutput, EngineError> {
        let schedule = config.germinal_center.capacity;
        self.run_cycle_with_schedule(config, &schedule, reporter)
    }

    #[instrument(level = "debug", skip_all, fields(serotype = %self.antigen.serotype(), cycle = self.cycles + 1))]
    pub fn run_cycle_with_schedule(
        &mut self,
        config: &SimulationConfig,
        schedule: &dyn CapacitySchedule,
        reporter: &ProgressReporter,
    ) -> Result<CycleOutput, EngineError> {
        let policy = DifferentiationPolicy::new(
            config.differentiation.memory_threshold,
            config.differentiation.plasma_threshold,
        )?;
        let mutation_engine =
            MutationEngine::new(config.mutation.per_site_rate, config.mutation.strength)?;

        self.cycles += 1;
        self.report_stage(reporter, CycleStage::PreSelect);

        // Select
        let cap = schedule.survivor_cap(self.cycles, self.population.len());
        let selected = selection::select_indices(
            &self.population,
            config.selection.temperature,
            cap,
            &mut self.rng,
        )?;

        // Differentiate
        let mut fates = vec![None; self.population.len()];
        for &index in &selected {
            fates[index] = Some(policy.differentiate(&self.population[index]));
        }

        let mut output = CycleOutput::default();
        let mut remaining = Vec::with_capacity(self.population.len());
        for (cell, fate) in std::mem::take(&mut self.population).into_iter().zip(fates) {
            match fate {
                Some(Fate::Memory) => output.memory.push(cell),
                Some(Fate::Plasma) => output.plasma.push(cell),
                Some(Fate::Unfated) | None => remaining.push(cell),
            }
        }
        self.population = remaining;
        self.report_stage(reporter, CycleStage::PostDifferentiate);

        // Cull
        let survival = 1.0 - config.germinal_center.lf_decay;
        let rng = &mut self.rng;
        let before_cull = self.population.len();
        self.population.retain(|_| rng.gen_bool(survival));

        // Mutate
        let room = config
            .germinal_center
            .carrying_capacity
            .saturating_sub(self.population.len());
        let division = config.mutation.division_probability;
        let rng = &mut self.rng;
        let mut dividers: Vec<usize> = (0..self.population.len())
            .filter(|_| rng.gen_bool(division))
            .collect();
        if dividers.len() > room {
            // Slots left under the carrying capacity go to a random subset of dividers.
            dividers.shuffle(rng);
            dividers.truncate(room);
            dividers.sort_unstable();
        }
        let mut offspring = Vec::with_capacity(dividers.len());
        for index in dividers {
            let child = mutation_engine.mutate(&self.population[index], &mut self.rng);
            let affinity = affinity::compute(self.antigen.epitope(), child.receptor())?;
            offspring.push(child.with_affinity(affinity));
        }
        let born = offspring.len();
        self.population.extend(offspring);
        self.report_stage(reporter, CycleStage::PostMutate);

        trace!(
            selected = selected.len(),
            memory = output.memory.len(),
            plasma = output.plasma.len(),
            culled = before_cull - (self.population.len() - born),
            born,
            population = self.population.len(),
            "Cycle complete."
        );

        Ok(output)
    }

    fn report_stage(&self, reporter: &ProgressReporter, stage: CycleStage) {
        reporter.report(Progress::CycleStage {
            serotype: self.antigen.serotype().clone(),
            cycle: self.cycles,
            stage,
            population: self.population.len(),
        });
    }
}
