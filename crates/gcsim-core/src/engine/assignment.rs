use super::config::{AssignmentConfig, AssignmentMode};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::antigen::Antigen;
use crate::core::models::bcell::BCell;
use crate::core::models::ids::Serotype;
use crate::core::processes::affinity;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Claim {
    lane: usize,
    affinity: f64,
}

/// Per-cell exclusive claim slots shared by all antigen lanes.
///
/// A slot is written at most once; the first lane to lock an empty slot and
/// find an admissible affinity owns the cell.
struct ClaimBoard {
    slots: Vec<Mutex<Option<Claim>>>,
    remaining: AtomicUsize,
}

impl ClaimBoard {
    fn new(cells: usize) -> Self {
        Self {
            slots: (0..cells).map(|_| Mutex::new(None)).collect(),
            remaining: AtomicUsize::new(cells),
        }
    }

    fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Evaluates `cell` for `lane` while holding the cell's lock.
    fn try_claim(
        &self,
        index: usize,
        lane: usize,
        antigen: &Antigen,
        cell: &BCell,
        threshold: f64,
    ) -> Result<ClaimAttempt, EngineError> {
        let mut slot = self.slots[index].lock();
        if slot.is_some() {
            return Ok(ClaimAttempt::Taken);
        }
        let affinity = affinity::compute(antigen.epitope(), cell.receptor())?;
        if affinity < threshold {
            return Ok(ClaimAttempt::Rejected);
        }
        *slot = Some(Claim { lane, affinity });
        self.remaining.fetch_sub(1, Ordering::AcqRel);
        Ok(ClaimAttempt::Claimed)
    }

    fn into_claims(self) -> Vec<Option<Claim>> {
        self.slots.into_iter().map(Mutex::into_inner).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimAttempt {
    Claimed,
    Rejected,
    Taken,
}

/// Matching statistics of one antigen lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneStats {
    pub serotype: Serotype,
    pub proposals: usize,
    pub claims: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentOutcome {
    /// Claimed cells per serotype, tagged and scored, in pool order.
    pub seeds: BTreeMap<Serotype, Vec<BCell>>,
    /// Cells no antigen claimed; they return to the shared pool.
    pub unclaimed: Vec<BCell>,
    pub lanes: Vec<LaneStats>,
}

impl AssignmentOutcome {
    pub fn claimed(&self) -> usize {
        self.seeds.values().map(Vec::len).sum()
    }
}

/// Partitions the shared naive pool across competing antigens.
///
/// Each antigen is a lane that, once per round, proposes a random unclaimed
/// cell and claims it if the affinity clears `admission_threshold`. A
/// successful claim parks the lane for `engagement_delay` rounds. The round
/// budget bounds the whole protocol, so it terminates even when some lanes
/// never find an admissible cell. The pool is owned by this call for its
/// whole duration and handed back, split, in the outcome.
#[instrument(skip_all, fields(cells = pool.len(), antigens = antigens.len(), mode = ?config.mode))]
pub fn assign(
    pool: Vec<BCell>,
    antigens: &[Arc<Antigen>],
    config: &AssignmentConfig,
    rng: &mut StdRng,
    reporter: &ProgressReporter,
) -> Result<AssignmentOutcome, EngineError> {
    let board = ClaimBoard::new(pool.len());

    let lane_counts = match config.mode {
        AssignmentMode::Deterministic => run_round_robin(&pool, antigens, config, &board, rng)?,
        AssignmentMode::Threaded => run_threaded(&pool, antigens, config, &board, rng)?,
    };

    let mut outcome = AssignmentOutcome::default();
    for antigen in antigens {
        outcome.seeds.entry(antigen.serotype().clone()).or_default();
    }
    for (cell, claim) in pool.into_iter().zip(board.into_claims()) {
        match claim {
            Some(Claim { lane, affinity }) => {
                let serotype = antigens[lane].serotype().clone();
                outcome
                    .seeds
                    .entry(serotype.clone())
                    .or_default()
                    .push(cell.assigned(serotype, affinity));
            }
            None => outcome.unclaimed.push(cell),
        }
    }

    for (antigen, (proposals, claims)) in antigens.iter().zip(lane_counts) {
        if claims == 0 {
            debug!(
                serotype = %antigen.serotype(),
                proposals,
                "Round budget exhausted without an admissible cell."
            );
        } else {
            debug!(serotype = %antigen.serotype(), proposals, claims, "Lane finished.");
        }
        reporter.report(Progress::AssignmentFinished {
            serotype: antigen.serotype().clone(),
            proposals,
            claims,
        });
        outcome.lanes.push(LaneStats {
            serotype: antigen.serotype().clone(),
            proposals,
            claims,
        });
    }

    Ok(outcome)
}

/// Virtual-time scheduler: each round, ready lanes propose in a shuffled order.
fn run_round_robin(
    pool: &[BCell],
    antigens: &[Arc<Antigen>],
    config: &AssignmentConfig,
    board: &ClaimBoard,
    rng: &mut StdRng,
) -> Result<Vec<(usize, usize)>, EngineError> {
    let mut counts = vec![(0usize, 0usize); antigens.len()];
    let mut ready_at = vec![0usize; antigens.len()];
    let mut unclaimed: Vec<usize> = (0..pool.len()).collect();
    let mut order: Vec<usize> = (0..antigens.len()).collect();

    for round in 0..config.rounds {
        if unclaimed.is_empty() {
            break;
        }
        order.shuffle(rng);
        for &lane in &order {
            if ready_at[lane] > round || unclaimed.is_empty() {
                continue;
            }
            let position = rng.gen_range(0..unclaimed.len());
            let index = unclaimed[position];
            counts[lane].0 += 1;
            let attempt = board.try_claim(
                index,
                lane,
                &antigens[lane],
                &pool[index],
                config.admission_threshold,
            )?;
            if attempt == ClaimAttempt::Claimed {
                unclaimed.swap_remove(position);
                counts[lane].1 += 1;
                ready_at[lane] = round + 1 + config.engagement_delay;
            }
        }
    }

    Ok(counts)
}

/// One scoped thread per lane; exclusivity comes from the board's per-cell locks.
fn run_threaded(
    pool: &[BCell],
    antigens: &[Arc<Antigen>],
    config: &AssignmentConfig,
    board: &ClaimBoard,
    rng: &mut StdRng,
) -> Result<Vec<(usize, usize)>, EngineError> {
    let seeds: Vec<u64> = antigens.iter().map(|_| rng.r#gen()).collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = antigens
            .iter()
            .zip(seeds)
            .enumerate()
            .map(|(lane, (antigen, seed))| {
                scope.spawn(move || run_lane(lane, antigen, pool, config, board, seed))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| EngineError::Internal("Assignment lane panicked".to_string()))?
            })
            .collect()
    })
}

fn run_lane(
    lane: usize,
    antigen: &Antigen,
    pool: &[BCell],
    config: &AssignmentConfig,
    board: &ClaimBoard,
    seed: u64,
) -> Result<(usize, usize), EngineError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (mut proposals, mut claims) = (0usize, 0usize);
    let mut parked = 0usize;

    if pool.is_empty() {
        return Ok((proposals, claims));
    }

    for _ in 0..config.rounds {
        if board.remaining() == 0 {
            break;
        }
        if parked > 0 {
            parked -= 1;
            std::thread::yield_now();
            continue;
        }
        // Cells owned by another lane are not candidates; redraw within the round.
        let claimed = loop {
            if board.remaining() == 0 {
                break None;
            }
            let index = rng.gen_range(0..pool.len());
            match board.try_claim(index, lane, antigen, &pool[index], config.admission_threshold)? {
                ClaimAttempt::Taken => continue,
                attempt => break Some(attempt == ClaimAttempt::Claimed),
            }
        };
        match claimed {
            None => break,
            Some(true) => {
                proposals += 1;
                claims += 1;
                parked = config.engagement_delay;
            }
            Some(false) => proposals += 1,
        }
    }

    Ok((proposals, claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::{AntigenId, CellId};
    use nalgebra::DVector;
    use std::collections::HashSet;

    fn random_pool(n: usize, dimension: usize, rng: &mut StdRng) -> Vec<BCell> {
        (0..n)
            .map(|i| {
                let receptor = DVector::from_fn(dimension, |_, _| rng.gen_range(0.0..1.0));
                BCell::naive(CellId(i as u64), receptor)
            })
            .collect()
    }

    fn antigens() -> Vec<Arc<Antigen>> {
        vec![
            Arc::new(Antigen::new(AntigenId(0), "4", vec![0.7, 0.6, 0.8])),
            Arc::new(Antigen::new(AntigenId(1), "6B", vec![0.5, 0.7, 1.0])),
            Arc::new(Antigen::new(AntigenId(2), "23F", vec![0.65, 0.55, 0.75])),
        ]
    }

    fn config(mode: AssignmentMode) -> AssignmentConfig {
        AssignmentConfig {
            admission_threshold: 0.3,
            rounds: 400,
            engagement_delay: 1,
            mode,
        }
    }

    fn assert_disjoint_and_complete(outcome: &AssignmentOutcome, pool_size: usize) {
        let mut seen = HashSet::new();
        for cells in outcome.seeds.values() {
            for cell in cells {
                assert!(seen.insert(cell.id()), "cell {} claimed twice", cell.id());
            }
        }
        for cell in &outcome.unclaimed {
            assert!(seen.insert(cell.id()), "cell {} both claimed and unclaimed", cell.id());
            assert!(cell.serotype().is_none());
        }
        assert_eq!(seen.len(), pool_size);
    }

    #[test]
    fn deterministic_assignment_never_double_claims() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pool = random_pool(300, 3, &mut rng);
            let outcome = assign(
                pool,
                &antigens(),
                &config(AssignmentMode::Deterministic),
                &mut rng,
                &ProgressReporter::new(),
            )
            .unwrap();
            assert_disjoint_and_complete(&outcome, 300);
        }
    }

    #[test]
    fn threaded_assignment_never_double_claims() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pool = random_pool(150, 3, &mut rng);
            let outcome = assign(
                pool,
                &antigens(),
                &config(AssignmentMode::Threaded),
                &mut rng,
                &ProgressReporter::new(),
            )
            .unwrap();
            assert_disjoint_and_complete(&outcome, 150);
            let lane_claims: usize = outcome.lanes.iter().map(|l| l.claims).sum();
            assert_eq!(lane_claims, outcome.claimed());
        }
    }

    #[test]
    fn claimed_cells_carry_serotype_and_admissible_affinity() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = random_pool(200, 3, &mut rng);
        let antigens = antigens();
        let outcome = assign(
            pool,
            &antigens,
            &config(AssignmentMode::Deterministic),
            &mut rng,
            &ProgressReporter::new(),
        )
        .unwrap();

        for antigen in &antigens {
            for cell in &outcome.seeds[antigen.serotype()] {
                assert_eq!(cell.serotype(), Some(antigen.serotype()));
                assert!(cell.affinity() >= 0.3);
                let expected = affinity::compute(antigen.epitope(), cell.receptor()).unwrap();
                assert_eq!(cell.affinity(), expected);
            }
        }
    }

    #[test]
    fn inadmissible_antigen_claims_nothing_and_leaves_pool_intact() {
        let mut rng = StdRng::seed_from_u64(4);
        let pool = random_pool(50, 3, &mut rng);
        let far = vec![Arc::new(Antigen::new(AntigenId(9), "1", vec![50.0, 50.0, 50.0]))];
        let outcome = assign(
            pool,
            &far,
            &config(AssignmentMode::Deterministic),
            &mut rng,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(outcome.claimed(), 0);
        assert_eq!(outcome.unclaimed.len(), 50);
        assert_eq!(outcome.lanes[0].proposals, 400);
        assert!(outcome.seeds[&Serotype::new("1")].is_empty());
    }

    #[test]
    fn engagement_delay_bounds_claims_per_lane() {
        let mut rng = StdRng::seed_from_u64(5);
        let pool = random_pool(500, 3, &mut rng);
        let antigen = vec![Arc::new(Antigen::new(AntigenId(0), "14", vec![0.5, 0.5, 0.5]))];
        let config = AssignmentConfig {
            admission_threshold: 0.0,
            rounds: 10,
            engagement_delay: 1,
            mode: AssignmentMode::Deterministic,
        };
        let outcome = assign(pool, &antigen, &config, &mut rng, &ProgressReporter::new()).unwrap();
        // With every cell admissible the lane claims on rounds 0, 2, 4, 6, 8.
        assert_eq!(outcome.lanes[0].claims, 5);
        assert_eq!(outcome.unclaimed.len(), 495);
    }

    #[test]
    fn small_pool_is_exhausted_before_the_budget() {
        let mut rng = StdRng::seed_from_u64(6);
        let pool = random_pool(4, 3, &mut rng);
        let config = AssignmentConfig {
            admission_threshold: 0.0,
            rounds: 100,
            engagement_delay: 0,
            mode: AssignmentMode::Deterministic,
        };
        let outcome = assign(pool, &antigens(), &config, &mut rng, &ProgressReporter::new()).unwrap();
        assert_eq!(outcome.claimed(), 4);
        assert!(outcome.unclaimed.is_empty());
    }

    #[test]
    fn both_modes_claim_the_whole_pool_when_every_cell_is_admissible() {
        let antigen = vec![Arc::new(Antigen::new(AntigenId(0), "14", vec![0.5, 0.5, 0.5]))];
        for mode in [AssignmentMode::Deterministic, AssignmentMode::Threaded] {
            let config = AssignmentConfig {
                admission_threshold: 0.0,
                rounds: 10,
                engagement_delay: 0,
                mode,
            };
            for seed in 0..50 {
                let mut rng = StdRng::seed_from_u64(seed);
                let pool = random_pool(10, 3, &mut rng);
                let outcome =
                    assign(pool, &antigen, &config, &mut rng, &ProgressReporter::new()).unwrap();
                assert_eq!(outcome.claimed(), 10, "{mode:?} with seed {seed}");
                assert_eq!(outcome.lanes[0].proposals, 10);
                assert!(outcome.unclaimed.is_empty());
            }
        }
    }

    #[test]
    fn competing_threaded_lanes_exhaust_the_pool() {
        let config = AssignmentConfig {
            admission_threshold: 0.0,
            rounds: 30,
            engagement_delay: 0,
            mode: AssignmentMode::Threaded,
        };
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pool = random_pool(30, 3, &mut rng);
            let outcome =
                assign(pool, &antigens(), &config, &mut rng, &ProgressReporter::new()).unwrap();
            assert_disjoint_and_complete(&outcome, 30);
            assert_eq!(outcome.claimed(), 30);
        }
    }

    #[test]
    fn deterministic_mode_is_reproducible() {
        let run = || {
            let mut rng = StdRng::seed_from_u64(77);
            let pool = random_pool(120, 3, &mut rng);
            let outcome = assign(
                pool,
                &antigens(),
                &config(AssignmentMode::Deterministic),
                &mut rng,
                &ProgressReporter::new(),
            )
            .unwrap();
            outcome
                .seeds
                .into_iter()
                .map(|(serotype, cells)| (serotype, cells.iter().map(BCell::id).collect::<Vec<_>>()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn empty_pool_produces_empty_outcome() {
        let mut rng = StdRng::seed_from_u64(8);
        for mode in [AssignmentMode::Deterministic, AssignmentMode::Threaded] {
            let outcome = assign(
                Vec::new(),
                &antigens(),
                &config(mode),
                &mut rng,
                &ProgressReporter::new(),
            )
            .unwrap();
            assert_eq!(outcome.claimed(), 0);
            assert_eq!(outcome.seeds.len(), 3);
        }
    }
}
