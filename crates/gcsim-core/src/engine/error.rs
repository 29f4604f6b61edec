use super::config::ConfigError;
use crate::core::models::ids::Serotype;
use crate::core::processes::affinity::AffinityError;
use crate::core::processes::differentiation::DifferentiationError;
use crate::core::processes::mutation::MutationError;
use crate::core::processes::selection::SelectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Affinity computation failed: {source}")]
    Affinity {
        #[from]
        source: AffinityError,
    },

    #[error("Mutation engine setup failed: {source}")]
    Mutation {
        #[from]
        source: MutationError,
    },

    #[error("Selection failed: {source}")]
    Selection {
        #[from]
        source: SelectionError,
    },

    #[error("Differentiation policy setup failed: {source}")]
    Differentiation {
        #[from]
        source: DifferentiationError,
    },

    #[error("Serotype '{serotype}' appears more than once in a vaccination")]
    DuplicateSerotype { serotype: Serotype },

    #[error(
        "Epitope of serotype '{serotype}' has {found} dimensions, receptors have {expected}"
    )]
    EpitopeDimension {
        serotype: Serotype,
        expected: usize,
        found: usize,
    },

    #[error("Serotype '{serotype}' has not been registered")]
    UnknownSerotype { serotype: Serotype },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
