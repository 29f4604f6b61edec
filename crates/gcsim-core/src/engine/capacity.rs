use super::config::CapacityPolicy;

/// Decides how many cells of a germinal center may be selected in a cycle.
///
/// `cycle` counts from 1 for the first cycle after seeding. `None` leaves
/// every cell eligible.
pub trait CapacitySchedule {
    fn survivor_cap(&self, cycle: u32, pool_size: usize) -> Option<usize>;
}

impl CapacitySchedule for CapacityPolicy {
    fn survivor_cap(&self, cycle: u32, pool_size: usize) -> Option<usize> {
        match *self {
            CapacityPolicy::Unbounded => None,
            CapacityPolicy::Fixed { max_survivors } => Some(max_survivors.min(pool_size)),
            CapacityPolicy::Quadratic { k } => {
                let cycles = f64::from(cycle);
                let cap = (cycles * cycles / k * pool_size as f64).floor();
                if cap >= pool_size as f64 {
                    Some(pool_size)
                } else {
                    Some(cap.max(0.0) as usize)
                }
            }
        }
    }
}

impl<F> CapacitySchedule for F
where
    F: Fn(u32, usize) -> Option<usize>,
{
    fn survivor_cap(&self, cycle: u32, pool_size: usize) -> Option<usize> {
        self(cycle, pool_size)
    }
}
