use super::ids::{AntigenId, Serotype};
use nalgebra::DVector;

/// Default correlate of protection for pneumococcal IgG, in µg/mL.
pub const DEFAULT_PROTECTIVE_THRESHOLD: f64 = 0.35;

/// Carrier protein conjugated to the capsular polysaccharide.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CarrierProtein {
    /// Non-toxic diphtheria toxin mutant.
    #[default]
    Crm197,
    /// Tetanus toxoid.
    TetanusToxoid,
    /// Diphtheria toxoid.
    DiphtheriaToxoid,
    /// Any other carrier, identified by name.
    Other(String),
}

impl CarrierProtein {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "CRM197" | "CRM" => Self::Crm197,
            "TT" => Self::TetanusToxoid,
            "DT" => Self::DiphtheriaToxoid,
            _ => Self::Other(name.to_string()),
        }
    }
}

/// A vaccine antigen: one serotype's conjugated polysaccharide.
///
/// The epitope vector is the antigen's binding signature; affinity against a
/// B-cell receptor is computed from it. Antigens are immutable once built and
/// are shared (never owned) by the germinal centers and the assignment process.
#[derive(Debug, Clone, PartialEq)]
pub struct Antigen {
    id: AntigenId,
    serotype: Serotype,
    epitope: DVector<f64>,
    dose_ug: f64,
    carrier: CarrierProtein,
    immunogenicity_factor: f64,
    protective_threshold: f64,
}

impl Antigen {
    /// Creates an antigen with default metadata (1 µg, CRM197, neutral
    /// immunogenicity, 0.35 µg/mL protective threshold).
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier of the antigen within its vaccine formulation.
    /// * `serotype` - The serotype this antigen represents.
    /// * `epitope` - The epitope signature; its length fixes the receptor
    ///   dimensionality this antigen can be matched against.
    pub fn new(id: AntigenId, serotype: impl Into<Serotype>, epitope: Vec<f64>) -> Self {
        Self {
            id,
            serotype: serotype.into(),
            epitope: DVector::from_vec(epitope),
            dose_ug: 1.0,
            carrier: CarrierProtein::default(),
            immunogenicity_factor: 1.0,
            protective_threshold: DEFAULT_PROTECTIVE_THRESHOLD,
        }
    }

    pub fn with_dose(mut self, dose_ug: f64) -> Self {
        self.dose_ug = dose_ug;
        self
    }

    pub fn with_carrier(mut self, carrier: CarrierProtein) -> Self {
        self.carrier = carrier;
        self
    }

    pub fn with_immunogenicity_factor(mut self, factor: f64) -> Self {
        self.immunogenicity_factor = factor;
        self
    }

    pub fn with_protective_threshold(mut self, threshold: f64) -> Self {
        self.protective_threshold = threshold;
        self
    }

    pub fn id(&self) -> AntigenId {
        self.id
    }

    pub fn serotype(&self) -> &Serotype {
        &self.serotype
    }

    pub fn epitope(&self) -> &DVector<f64> {
        &self.epitope
    }

    pub fn dimension(&self) -> usize {
        self.epitope.len()
    }

    /// Polysaccharide quantity per dose, in µg.
    pub fn dose_ug(&self) -> f64 {
        self.dose_ug
    }

    pub fn carrier(&self) -> &CarrierProtein {
        &self.carrier
    }

    pub fn immunogenicity_factor(&self) -> f64 {
        self.immunogenicity_factor
    }

    /// Antibody concentration (µg/mL) at or above which the host counts as protected.
    pub fn protective_threshold(&self) -> f64 {
        self.protective_threshold
    }
}
