use crate::core::metrics::{self, ProtectionStatus};
use crate::core::models::antigen::Antigen;
use crate::core::models::ids::Serotype;
use crate::engine::config::SimulationConfig;
use crate::engine::error::EngineError;
use crate::engine::immune_system::ImmuneSystem;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// End-of-run state of one serotype.
#[derive(Debug, Clone, PartialEq)]
pub struct SerotypeSummary {
    pub final_level: f64,
    pub memory_cells: usize,
    pub plasma_cells: usize,
    /// Mean affinity of the memory pool.
    pub avidity: f64,
    pub protection: ProtectionStatus,
}

/// Daily antibody series of one simulated individual.
///
/// Entry `i` of every series is the level after the step of day `i + 1`;
/// the level on day 0 is zero by construction. Serotypes are tracked from
/// the start of the run and read zero until their first vaccination.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub seed: u64,
    pub duration_days: u32,
    pub antibody_levels: BTreeMap<Serotype, Vec<f64>>,
    pub summaries: BTreeMap<Serotype, SerotypeSummary>,
}

impl SimulationReport {
    pub fn series(&self, serotype: &Serotype) -> Option<&[f64]> {
        self.antibody_levels.get(serotype).map(Vec::as_slice)
    }

    /// Antibody level of `serotype` at the end of `day`.
    pub fn level_on(&self, serotype: &Serotype, day: u32) -> Option<f64> {
        let series = self.antibody_levels.get(serotype)?;
        match day {
            0 => Some(0.0),
            d => series.get(d as usize - 1).copied(),
        }
    }
}

/// Runs one individual for `duration_days`, vaccinating on the configured days.
///
/// Every day is a vaccination (when scheduled) followed by one
/// [`ImmuneSystem::step`]. The run depends on nothing but its arguments, so
/// repeated calls with the same seed produce identical reports.
#[instrument(skip_all, name = "simulation_workflow", fields(seed = config.seed, days = duration_days))]
pub fn simulate(
    config: &SimulationConfig,
    antigens: &[Antigen],
    duration_days: u32,
    reporter: &ProgressReporter,
) -> Result<SimulationReport, EngineError> {
    let mut system = ImmuneSystem::new(config.clone())?;

    let mut antibody_levels: BTreeMap<Serotype, Vec<f64>> = antigens
        .iter()
        .map(|antigen| {
            (
                antigen.serotype().clone(),
                Vec::with_capacity(duration_days as usize),
            )
        })
        .collect();

    info!(
        antigens = antigens.len(),
        vaccinations = config
            .schedule
            .vaccination_days
            .iter()
            .filter(|&&day| day < duration_days)
            .count(),
        "Starting simulation."
    );

    for day in 0..duration_days {
        if config.schedule.is_vaccination_day(day) {
            system.vaccinate(antigens, reporter)?;
        }
        system.step(reporter)?;
        for (serotype, series) in &mut antibody_levels {
            series.push(system.antibody_level(serotype).unwrap_or(0.0));
        }
    }

    let summaries = summarize(&system, antigens)?;
    reporter.report(Progress::Message(format!(
        "Simulation of {duration_days} days complete."
    )));
    info!(
        serotypes = summaries.len(),
        protected = summaries
            .values()
            .filter(|s| s.protection == ProtectionStatus::Protective)
            .count(),
        "Simulation complete."
    );

    Ok(SimulationReport {
        seed: config.seed,
        duration_days,
        antibody_levels,
        summaries,
    })
}

/// Runs the configured schedule over its configured duration.
pub fn run(
    config: &SimulationConfig,
    antigens: &[Antigen],
    reporter: &ProgressReporter,
) -> Result<SimulationReport, EngineError> {
    simulate(config, antigens, config.schedule.duration_days, reporter)
}

/// Simulates one independent individual per seed.
///
/// Reports come back in seed order. With the `parallel` feature the
/// individuals run concurrently.
#[instrument(skip_all, name = "cohort_workflow", fields(individuals = seeds.len()))]
pub fn simulate_cohort(
    config: &SimulationConfig,
    antigens: &[Antigen],
    seeds: &[u64],
) -> Result<Vec<SimulationReport>, EngineError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = seeds.iter();

    #[cfg(feature = "parallel")]
    let iterator = seeds.par_iter();

    let reports: Vec<Result<SimulationReport, EngineError>> = iterator
        .map(|&seed| {
            let mut individual = config.clone();
            individual.seed = seed;
            run(&individual, antigens, &ProgressReporter::new())
        })
        .collect();

    reports.into_iter().collect()
}

fn summarize(
    system: &ImmuneSystem,
    antigens: &[Antigen],
) -> Result<BTreeMap<Serotype, SerotypeSummary>, EngineError> {
    let mut summaries = BTreeMap::new();
    for antigen in antigens {
        let serotype = antigen.serotype();
        let Some(final_level) = system.antibody_level(serotype) else {
            // Never vaccinated within the run.
            summaries.insert(
                serotype.clone(),
                SerotypeSummary {
                    final_level: 0.0,
                    memory_cells: 0,
                    plasma_cells: 0,
                    avidity: 0.0,
                    protection: metrics::elisa(0.0, antigen.protective_threshold()),
                },
            );
            continue;
        };
        summaries.insert(
            serotype.clone(),
            SerotypeSummary {
                final_level,
                memory_cells: system.memory_pool(serotype)?.len(),
                plasma_cells: system.plasma_pool(serotype)?.len(),
                avidity: system.avidity(serotype)?,
                protection: metrics::elisa(final_level, antigen.protective_threshold()),
            },
        );
    }
    Ok(summaries)
}
