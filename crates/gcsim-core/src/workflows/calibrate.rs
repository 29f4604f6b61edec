use super::simulate::SimulationReport;
use crate::core::models::ids::Serotype;
use kiddo::{KdTree, SquaredEuclidean};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("No observations were supplied")]
    EmptyObservations,
    #[error("No simulated individuals were supplied")]
    EmptyCohort,
    #[error("Simulation report has no series for serotype '{serotype}'")]
    MissingSeries { serotype: Serotype },
    #[error("Day {day} is outside the simulated {duration_days} days")]
    DayOutOfRange { day: u32, duration_days: u32 },
}

/// Symmetric Chamfer distance between two planar point clouds.
///
/// The mean distance from every point of `a` to its nearest neighbour in `b`,
/// plus the same in the other direction. Returns `None` when either cloud is
/// empty.
pub fn chamfer_distance(a: &[[f64; 2]], b: &[[f64; 2]]) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some(mean_nearest_distance(a, b) + mean_nearest_distance(b, a))
}

fn mean_nearest_distance(queries: &[[f64; 2]], targets: &[[f64; 2]]) -> f64 {
    // Coincident points change no nearest distance; keep one of each.
    let mut targets = targets.to_vec();
    targets.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    targets.dedup();

    let total: f64 = if has_distinct_axis_values(&targets) {
        let kdtree: KdTree<f64, 2> = (&targets).into();
        queries
            .iter()
            .map(|query| kdtree.nearest_one::<SquaredEuclidean>(query).distance.sqrt())
            .sum()
    } else {
        // The KD-tree cannot split buckets whose points share a coordinate,
        // which is routine here (every day-0 level is zero).
        queries
            .iter()
            .map(|query| linear_nearest_distance(query, &targets))
            .sum()
    };
    total / queries.len() as f64
}

fn has_distinct_axis_values(points: &[[f64; 2]]) -> bool {
    (0..2).all(|axis| {
        let mut values: Vec<f64> = points.iter().map(|point| point[axis]).collect();
        values.sort_by(f64::total_cmp);
        values.windows(2).all(|pair| pair[0] != pair[1])
    })
}

fn linear_nearest_distance(query: &[f64; 2], targets: &[[f64; 2]]) -> f64 {
    targets
        .iter()
        .map(|target| {
            let dx = target[0] - query[0];
            let dy = target[1] - query[1];
            dx * dx + dy * dy
        })
        .fold(f64::INFINITY, f64::min)
        .sqrt()
}

/// Observed (pre-vaccination, post-vaccination) titer pairs per serotype,
/// compared against the simulated levels on two chosen days.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTarget {
    observations: BTreeMap<Serotype, Vec<[f64; 2]>>,
    pre_day: u32,
    post_day: u32,
}

impl CalibrationTarget {
    pub fn new(pre_day: u32, post_day: u32) -> Self {
        Self {
            observations: BTreeMap::new(),
            pre_day,
            post_day,
        }
    }

    /// Adds one subject's titers for `serotype`.
    pub fn with_observation(mut self, serotype: impl Into<Serotype>, pre: f64, post: f64) -> Self {
        self.observations
            .entry(serotype.into())
            .or_default()
            .push([pre, post]);
        self
    }

    pub fn observations(&self, serotype: &Serotype) -> Option<&[[f64; 2]]> {
        self.observations.get(serotype).map(Vec::as_slice)
    }

    pub fn serotypes(&self) -> impl Iterator<Item = &Serotype> {
        self.observations.keys()
    }

    fn simulated_points(
        &self,
        serotype: &Serotype,
        cohort: &[SimulationReport],
    ) -> Result<Vec<[f64; 2]>, CalibrationError> {
        cohort
            .iter()
            .map(|report| {
                let level = |day| {
                    report.level_on(serotype, day).ok_or_else(|| {
                        if report.series(serotype).is_none() {
                            CalibrationError::MissingSeries {
                                serotype: serotype.clone(),
                            }
                        } else {
                            CalibrationError::DayOutOfRange {
                                day,
                                duration_days: report.duration_days,
                            }
                        }
                    })
                };
                Ok([level(self.pre_day)?, level(self.post_day)?])
            })
            .collect()
    }

    /// Chamfer distance per serotype between observed and simulated pairs.
    pub fn distances(
        &self,
        cohort: &[SimulationReport],
    ) -> Result<BTreeMap<Serotype, f64>, CalibrationError> {
        if self.observations.values().all(Vec::is_empty) {
            return Err(CalibrationError::EmptyObservations);
        }
        if cohort.is_empty() {
            return Err(CalibrationError::EmptyCohort);
        }

        let mut distances = BTreeMap::new();
        for (serotype, observed) in &self.observations {
            if observed.is_empty() {
                continue;
            }
            let simulated = self.simulated_points(serotype, cohort)?;
            if let Some(distance) = chamfer_distance(observed, &simulated) {
                distances.insert(serotype.clone(), distance);
            }
        }
        Ok(distances)
    }

    /// Mean per-serotype similarity `1 / (1 + chamfer)`, in `(0, 1]`.
    ///
    /// Higher is better; an external optimizer maximizes this value.
    #[instrument(skip_all, fields(individuals = cohort.len()))]
    pub fn score(&self, cohort: &[SimulationReport]) -> Result<f64, CalibrationError> {
        let distances = self.distances(cohort)?;
        let score = distances
            .values()
            .map(|distance| 1.0 / (1.0 + distance))
            .sum::<f64>()
            / distances.len() as f64;
        debug!(score, serotypes = distances.len(), "Cohort scored.");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::simulate::SimulationReport;

    const TOLERANCE: f64 = 1e-12;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    fn report(seed: u64, series: &[(&str, Vec<f64>)]) -> SimulationReport {
        SimulationReport {
            seed,
            duration_days: series.first().map_or(0, |(_, s)| s.len() as u32),
            antibody_levels: series
                .iter()
                .map(|(serotype, levels)| (Serotype::new(*serotype), levels.clone()))
                .collect(),
            summaries: BTreeMap::new(),
        }
    }

    #[test]
    fn chamfer_of_identical_clouds_is_zero() {
        let cloud = [[0.0, 1.0], [2.0, 3.0], [5.0, 5.0]];
        assert_close(chamfer_distance(&cloud, &cloud).unwrap(), 0.0);
    }

    #[test]
    fn chamfer_sums_both_directions() {
        let a = [[0.0, 0.0]];
        let b = [[3.0, 4.0], [6.0, 8.0]];
        // a -> b: 5. b -> a: (5 + 10) / 2.
        assert_close(chamfer_distance(&a, &b).unwrap(), 5.0 + 7.5);
        assert_close(chamfer_distance(&b, &a).unwrap(), 12.5);
    }

    #[test]
    fn chamfer_of_empty_cloud_is_undefined() {
        assert_eq!(chamfer_distance(&[], &[[1.0, 1.0]]), None);
        assert_eq!(chamfer_distance(&[[1.0, 1.0]], &[]), None);
    }

    #[test]
    fn chamfer_handles_many_points_on_a_shared_axis_value() {
        let column: Vec<[f64; 2]> = (0..100).map(|i| [0.0, i as f64]).collect();
        // [0, 0] -> column: 0. column -> [0, 0]: mean of 0..100 = 49.5.
        assert_close(chamfer_distance(&[[0.0, 0.0]], &column).unwrap(), 49.5);
        assert_close(chamfer_distance(&column, &[[0.0, 0.0]]).unwrap(), 49.5);
    }

    #[test]
    fn tree_and_linear_nearest_distances_agree() {
        let cloud: Vec<[f64; 2]> = (0..200)
            .map(|i| {
                let t = i as f64;
                [t * 0.37 + (t * 1.3).sin(), t * 0.11 + (t * 0.7).cos()]
            })
            .collect();
        assert!(has_distinct_axis_values(&cloud));
        let queries = [[0.5, 0.5], [10.0, 3.0], [80.0, 25.0], [-4.0, 40.0]];

        let expected: f64 = queries
            .iter()
            .map(|query| linear_nearest_distance(query, &cloud))
            .sum::<f64>()
            / queries.len() as f64;
        assert!((mean_nearest_distance(&queries, &cloud) - expected).abs() < 1e-9);
    }

    #[test]
    fn large_cohort_with_zero_pre_levels_is_scored() {
        let cohort: Vec<SimulationReport> = (0..100)
            .map(|i| report(i, &[("4", vec![0.1 * i as f64, 0.2 * i as f64])]))
            .collect();
        let target = CalibrationTarget::new(0, 2).with_observation("4", 0.0, 1.0);

        // Simulated points are (0, 0.2 i); observed (0, 1) coincides with i = 5.
        let back: f64 = (0..100).map(|i| (0.2 * i as f64 - 1.0).abs()).sum::<f64>() / 100.0;
        let distances = target.distances(&cohort).unwrap();
        assert!((distances[&Serotype::new("4")] - back).abs() < 1e-9);
        assert!((target.score(&cohort).unwrap() - 1.0 / (1.0 + back)).abs() < 1e-9);
    }

    #[test]
    fn perfect_fit_scores_one() {
        let target = CalibrationTarget::new(0, 2)
            .with_observation("4", 0.0, 0.7)
            .with_observation("6B", 0.0, 1.5);
        let cohort = [report(1, &[("4", vec![0.3, 0.7, 0.6]), ("6B", vec![1.0, 1.5, 1.4])])];
        assert_close(target.score(&cohort).unwrap(), 1.0);
    }

    #[test]
    fn score_averages_serotype_similarities() {
        let target = CalibrationTarget::new(1, 2)
            .with_observation("4", 0.5, 1.0)
            .with_observation("6B", 0.0, 0.0);
        let cohort = [report(1, &[("4", vec![0.5, 1.0]), ("6B", vec![0.0, 1.0])])];

        let distances = target.distances(&cohort).unwrap();
        assert_close(distances[&Serotype::new("4")], 0.0);
        assert_close(distances[&Serotype::new("6B")], 2.0);
        assert_close(target.score(&cohort).unwrap(), (1.0 + 1.0 / 3.0) / 2.0);
    }

    #[test]
    fn missing_serotype_series_is_reported() {
        let target = CalibrationTarget::new(0, 1).with_observation("19A", 0.1, 0.2);
        let cohort = [report(1, &[("4", vec![0.5])])];
        assert_eq!(
            target.score(&cohort),
            Err(CalibrationError::MissingSeries {
                serotype: Serotype::new("19A")
            })
        );
    }

    #[test]
    fn post_day_beyond_the_run_is_reported() {
        let target = CalibrationTarget::new(0, 30).with_observation("4", 0.1, 0.2);
        let cohort = [report(1, &[("4", vec![0.5, 0.6])])];
        assert_eq!(
            target.score(&cohort),
            Err(CalibrationError::DayOutOfRange {
                day: 30,
                duration_days: 2
            })
        );
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let cohort = [report(1, &[("4", vec![0.5])])];
        assert_eq!(
            CalibrationTarget::new(0, 1).score(&cohort),
            Err(CalibrationError::EmptyObservations)
        );
        assert_eq!(
            CalibrationTarget::new(0, 1)
                .with_observation("4", 0.0, 0.1)
                .score(&[]),
            Err(CalibrationError::EmptyCohort)
        );
    }
}
