use crate::core::models::ids::Serotype;

/// Boundaries inside one germinal-center cycle at which observers are notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    PreSelect,
    PostDifferentiate,
    PostMutate,
}

#[derive(Debug, Clone)]
pub enum Progress {
    VaccinationStart {
        day: u32,
        antigens: usize,
    },
    AssignmentFinished {
        serotype: Serotype,
        proposals: usize,
        claims: usize,
    },
    CycleStage {
        serotype: Serotype,
        cycle: u32,
        stage: CycleStage,
        population: usize,
    },
    DayFinished {
        day: u32,
    },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::Message("ignored".to_string()));
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::DayFinished { day } = event {
                seen.lock().unwrap().push(day);
            }
        }));
        reporter.report(Progress::DayFinished { day: 3 });
        reporter.report(Progress::Message("skip".to_string()));
        reporter.report(Progress::DayFinished { day: 4 });
        drop(reporter);

        assert_eq!(seen.into_inner().unwrap(), vec![3, 4]);
    }
}
