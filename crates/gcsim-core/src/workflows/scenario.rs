use super::simulate::{self, SimulationReport};
use crate::core::models::antigen::{Antigen, CarrierProtein, DEFAULT_PROTECTIVE_THRESHOLD};
use crate::core::models::ids::{AntigenId, Serotype};
use crate::engine::config::{ConfigError, PartialSimulationConfig, SimulationConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid scenario configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Scenario declares no antigens")]
    NoAntigens,
    #[error("Serotype '{0}' is declared more than once")]
    DuplicateSerotype(Serotype),
    #[error("Invalid antigen '{serotype}': {reason}")]
    InvalidAntigen { serotype: Serotype, reason: String },
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AntigenEntry {
    serotype: Serotype,
    epitope: Vec<f64>,
    dose_ug: Option<f64>,
    carrier: Option<String>,
    immunogenicity_factor: Option<f64>,
    protective_threshold: Option<f64>,
}

impl AntigenEntry {
    fn into_antigen(self, id: AntigenId) -> Result<Antigen, ScenarioError> {
        let invalid = |reason: String| ScenarioError::InvalidAntigen {
            serotype: self.serotype.clone(),
            reason,
        };
        if self.epitope.is_empty() {
            return Err(invalid("epitope is empty".to_string()));
        }
        if let Some(value) = self.epitope.iter().find(|v| !v.is_finite()) {
            return Err(invalid(format!("epitope contains non-finite value {value}")));
        }
        let dose = self.dose_ug.unwrap_or(1.0);
        if !(dose.is_finite() && dose > 0.0) {
            return Err(invalid(format!("dose {dose} must be positive")));
        }
        let factor = self.immunogenicity_factor.unwrap_or(1.0);
        if !(factor.is_finite() && factor >= 0.0) {
            return Err(invalid(format!(
                "immunogenicity factor {factor} must be non-negative"
            )));
        }
        let threshold = self
            .protective_threshold
            .unwrap_or(DEFAULT_PROTECTIVE_THRESHOLD);
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(invalid(format!(
                "protective threshold {threshold} must be non-negative"
            )));
        }

        let carrier = self
            .carrier
            .as_deref()
            .map(CarrierProtein::from_name)
            .unwrap_or_default();
        Ok(Antigen::new(id, self.serotype, self.epitope)
            .with_dose(dose)
            .with_carrier(carrier)
            .with_immunogenicity_factor(factor)
            .with_protective_threshold(threshold))
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ScenarioFile {
    #[serde(default)]
    config: PartialSimulationConfig,
    #[serde(default)]
    antigen: Vec<AntigenEntry>,
}

/// A vaccine formulation together with the parameters to simulate it under.
///
/// Scenario files are TOML: a `[config]` table laid out like a standalone
/// configuration file, followed by one `[[antigen]]` table per serotype.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: SimulationConfig,
    pub antigens: Vec<Antigen>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self, ScenarioError> {
        let file: ScenarioFile = toml::from_str(content)?;
        let config = file.config.into_builder().build()?;

        if file.antigen.is_empty() {
            return Err(ScenarioError::NoAntigens);
        }
        let mut seen = BTreeSet::new();
        let mut antigens = Vec::with_capacity(file.antigen.len());
        for (index, entry) in file.antigen.into_iter().enumerate() {
            if !seen.insert(entry.serotype.clone()) {
                return Err(ScenarioError::DuplicateSerotype(entry.serotype));
            }
            antigens.push(entry.into_antigen(AntigenId(index as u32))?);
        }

        Ok(Self { config, antigens })
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            antigens = scenario.antigens.len(),
            "Scenario loaded."
        );
        Ok(scenario)
    }

    pub fn run(&self, reporter: &ProgressReporter) -> Result<SimulationReport, EngineError> {
        simulate::run(&self.config, &self.antigens, reporter)
    }

    pub fn run_cohort(&self, seeds: &[u64]) -> Result<Vec<SimulationReport>, EngineError> {
        simulate::simulate_cohort(&self.config, &self.antigens, seeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::AssignmentMode;
    use std::fs;
    use tempfile::tempdir;

    const PCV_SCENARIO: &str = r#"
[config]
seed = 11

[config.repertoire]
naive-pool-size = 200

[config.assignment]
mode = "threaded"

[config.schedule]
vaccination-days = [0]
duration-days = 15

[[antigen]]
serotype = "4"
epitope = [0.72, 0.15, 0.40, 0.85, 0.50]
dose-ug = 2.2
carrier = "CRM197"

[[antigen]]
serotype = "6B"
epitope = [0.5, 0.7, 1.0, 0.2, 0.3]
dose-ug = 4.4
carrier = "TT"
immunogenicity-factor = 0.8
protective-threshold = 0.5
"#;

    #[test]
    fn scenario_is_parsed_with_defaults() {
        let scenario = Scenario::from_toml_str(PCV_SCENARIO).unwrap();
        assert_eq!(scenario.config.seed, 11);
        assert_eq!(scenario.config.repertoire.naive_pool_size, 200);
        assert_eq!(scenario.config.assignment.mode, AssignmentMode::Threaded);
        assert_eq!(scenario.config.schedule.duration_days, 15);

        let [first, second] = scenario.antigens.as_slice() else {
            panic!("expected two antigens");
        };
        assert_eq!(first.id(), AntigenId(0));
        assert_eq!(first.carrier(), &CarrierProtein::Crm197);
        assert_eq!(first.protective_threshold(), DEFAULT_PROTECTIVE_THRESHOLD);
        assert_eq!(second.serotype(), &Serotype::new("6B"));
        assert_eq!(second.carrier(), &CarrierProtein::TetanusToxoid);
        assert_eq!(second.dose_ug(), 4.4);
        assert_eq!(second.immunogenicity_factor(), 0.8);
    }

    #[test]
    fn scenario_loads_from_file_and_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pcv.toml");
        fs::write(&path, PCV_SCENARIO).unwrap();

        let scenario = Scenario::load(&path).unwrap();
        let report = scenario.run(&ProgressReporter::new()).unwrap();
        assert_eq!(report.antibody_levels.len(), 2);
        assert!(report.antibody_levels.values().all(|s| s.len() == 15));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let result = Scenario::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ScenarioError::Io { .. })));
    }

    #[test]
    fn duplicate_serotypes_are_rejected() {
        let content = r#"
[config]
seed = 1

[[antigen]]
serotype = "4"
epitope = [0.1]

[[antigen]]
serotype = "4"
epitope = [0.2]
"#;
        assert!(matches!(
            Scenario::from_toml_str(content),
            Err(ScenarioError::DuplicateSerotype(s)) if s == Serotype::new("4")
        ));
    }

    #[test]
    fn scenario_without_antigens_is_rejected() {
        assert!(matches!(
            Scenario::from_toml_str("[config]\nseed = 1\n"),
            Err(ScenarioError::NoAntigens)
        ));
    }

    #[test]
    fn missing_seed_is_a_config_error() {
        let content = "[[antigen]]\nserotype = \"4\"\nepitope = [0.1]\n";
        assert!(matches!(
            Scenario::from_toml_str(content),
            Err(ScenarioError::Config(ConfigError::MissingParameter("seed")))
        ));
    }

    #[test]
    fn invalid_antigen_metadata_is_rejected() {
        let content = r#"
[config]
seed = 1

[[antigen]]
serotype = "19F"
epitope = [0.1, 0.2]
dose-ug = -1.0
"#;
        assert!(matches!(
            Scenario::from_toml_str(content),
            Err(ScenarioError::InvalidAntigen { .. })
        ));
    }

    #[test]
    fn unknown_antigen_fields_are_rejected() {
        let content = r#"
[config]
seed = 1

[[antigen]]
serotype = "4"
epitope = [0.1]
adjuvant = "alum"
"#;
        assert!(matches!(
            Scenario::from_toml_str(content),
            Err(ScenarioError::Toml(_))
        ));
    }
}
