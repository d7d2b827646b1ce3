//! Theoretical isotope distributions.
//!
//! The engine only needs, for each identification, the mass offset of each
//! isotope peak relative to the monoisotope and its relative abundance. Any
//! chemistry library can provide that through [IsotopeProvider], the
//! [ConvolutionIsotopeProvider] shipped here covers peptides made of CHNOPS.

use crate::errors::IsotopeError;
use crate::models::Identification;
use rayon::prelude::*;
use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::{
    BTreeMap,
    HashMap,
};
use std::sync::{
    Arc,
    OnceLock,
};
use tracing::debug;

/// Mass difference between 13C and 12C, used as the isotope spacing.
pub const C13_MINUS_C12: f64 = 1.003_354_83;

const AVERAGINE_MASS: f64 = 111.1254;
const AVERAGINE_C: f64 = 4.9384;
const AVERAGINE_H: f64 = 7.7583;
const AVERAGINE_N: f64 = 1.3577;
const AVERAGINE_O: f64 = 1.4773;
const AVERAGINE_S: f64 = 0.0417;

// (extra neutrons, natural abundance)
const CARBON: &[(usize, f64)] = &[(0, 0.9893), (1, 0.0107)];
const HYDROGEN: &[(usize, f64)] = &[(0, 0.999_885), (1, 0.000_115)];
const NITROGEN: &[(usize, f64)] = &[(0, 0.996_36), (1, 0.003_64)];
const OXYGEN: &[(usize, f64)] = &[(0, 0.997_57), (1, 0.000_38), (2, 0.002_05)];
const PHOSPHORUS: &[(usize, f64)] = &[(0, 1.0)];
const SULFUR: &[(usize, f64)] = &[(0, 0.9499), (1, 0.0075), (2, 0.0425), (4, 0.0001)];

fn element_isotopes(element: &str) -> Option<&'static [(usize, f64)]> {
    match element {
        "C" => Some(CARBON),
        "H" => Some(HYDROGEN),
        "N" => Some(NITROGEN),
        "O" => Some(OXYGEN),
        "P" => Some(PHOSPHORUS),
        "S" => Some(SULFUR),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotopePeak {
    /// Mass difference to the monoisotopic peak, in daltons.
    pub mass_offset: f64,
    /// Abundance relative to the most abundant isotope (which is 1.0).
    pub abundance: f64,
}

pub trait IsotopeProvider: Send + Sync {
    /// Isotope peaks for a species, monoisotope first.
    ///
    /// The formula, when known, takes precedence over the mass.
    /// Must return an empty distribution, not an error, for non-finite or
    /// non-positive masses without a formula.
    fn distribution(
        &self,
        formula: Option<&str>,
        monoisotopic_mass: f64,
    ) -> Result<Vec<IsotopePeak>, IsotopeError>;
}

/// Convolves natural isotope abundances at nominal neutron resolution.
///
/// Without a formula an averagine composition scaled to the mass is used.
#[derive(Debug, Clone)]
pub struct ConvolutionIsotopeProvider {
    pub min_relative_abundance: f64,
    pub max_isotopes: usize,
}

impl Default for ConvolutionIsotopeProvider {
    fn default() -> Self {
        Self {
            min_relative_abundance: 0.1,
            max_isotopes: 10,
        }
    }
}

fn formula_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z][a-z]?)(\d*)").expect("static regex is valid"))
}

/// Parses Hill-style formulas such as "C34H53N7O15".
pub fn parse_formula(formula: &str) -> Result<BTreeMap<String, u32>, IsotopeError> {
    let compact: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
    let mut out: BTreeMap<String, u32> = BTreeMap::new();
    let mut consumed = 0;
    for cap in formula_regex().captures_iter(&compact) {
        let whole = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        consumed += whole.len();
        let element = &cap[1];
        if element_isotopes(element).is_none() {
            return Err(IsotopeError::UnknownElement {
                element: element.to_string(),
                formula: formula.to_string(),
            });
        }
        let count = match &cap[2] {
            "" => 1,
            digits => digits
                .parse::<u32>()
                .map_err(|_| IsotopeError::MalformedFormula {
                    formula: formula.to_string(),
                })?,
        };
        *out.entry(element.to_string()).or_insert(0) += count;
    }
    if consumed != compact.len() || out.is_empty() {
        return Err(IsotopeError::MalformedFormula {
            formula: formula.to_string(),
        });
    }
    Ok(out)
}

/// Averagine composition for a mass, rounded to whole atoms.
pub fn averagine_composition(monoisotopic_mass: f64) -> BTreeMap<String, u32> {
    let n_units = monoisotopic_mass / AVERAGINE_MASS;
    [
        ("C", AVERAGINE_C),
        ("H", AVERAGINE_H),
        ("N", AVERAGINE_N),
        ("O", AVERAGINE_O),
        ("S", AVERAGINE_S),
    ]
    .into_iter()
    .map(|(el, per_unit)| (el.to_string(), (per_unit * n_units).round() as u32))
    .filter(|(_, n)| *n > 0)
    .collect()
}

impl ConvolutionIsotopeProvider {
    fn convolve(&self, composition: &BTreeMap<String, u32>) -> Vec<f64> {
        // A few extra bins so truncation does not bias the last kept isotope.
        let len = self.max_isotopes + 4;
        let mut dist = vec![0.0; len];
        dist[0] = 1.0;
        for (element, count) in composition {
            let Some(isotopes) = element_isotopes(element) else {
                continue;
            };
            for _ in 0..*count {
                let mut next = vec![0.0; len];
                for (i, p) in dist.iter().enumerate() {
                    if *p == 0.0 {
                        continue;
                    }
                    for (shift, abundance) in isotopes {
                        if i + shift < len {
                            next[i + shift] += p * abundance;
                        }
                    }
                }
                dist = next;
            }
        }
        dist.truncate(self.max_isotopes);
        dist
    }
}

impl IsotopeProvider for ConvolutionIsotopeProvider {
    fn distribution(
        &self,
        formula: Option<&str>,
        monoisotopic_mass: f64,
    ) -> Result<Vec<IsotopePeak>, IsotopeError> {
        let composition = match formula {
            Some(f) => parse_formula(f)?,
            None => {
                if !(monoisotopic_mass.is_finite() && monoisotopic_mass > 0.0) {
                    return Ok(Vec::new());
                }
                averagine_composition(monoisotopic_mass)
            }
        };

        let probabilities = self.convolve(&composition);
        let max = probabilities.iter().cloned().fold(0.0, f64::max);
        if max <= 0.0 {
            return Ok(Vec::new());
        }

        let out = probabilities
            .iter()
            .enumerate()
            .map(|(i, p)| IsotopePeak {
                mass_offset: i as f64 * C13_MINUS_C12,
                abundance: p / max,
            })
            .filter(|x| x.mass_offset == 0.0 || x.abundance >= self.min_relative_abundance)
            .collect();
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IsotopeKey {
    Formula(String),
    MassBits(u64),
}

impl IsotopeKey {
    fn of(id: &Identification) -> Self {
        match &id.formula {
            Some(f) => IsotopeKey::Formula(f.clone()),
            None => IsotopeKey::MassBits(id.monoisotopic_mass.to_bits()),
        }
    }
}

/// Distributions for every identification, computed once before the
/// per-file phase and shared read-only between workers.
#[derive(Debug, Clone, Default)]
pub struct IsotopeCache {
    inner: HashMap<IsotopeKey, Arc<[IsotopePeak]>>,
}

impl IsotopeCache {
    pub fn build(
        provider: &dyn IsotopeProvider,
        identifications: &[Arc<Identification>],
    ) -> Result<Self, IsotopeError> {
        let mut keys: HashMap<IsotopeKey, (Option<&str>, f64)> = HashMap::new();
        for id in identifications {
            keys.entry(IsotopeKey::of(id))
                .or_insert((id.formula.as_deref(), id.monoisotopic_mass));
        }
        let keys: Vec<_> = keys.into_iter().collect();

        let inner = keys
            .into_par_iter()
            .map(
                |(key, (formula, mass))| -> Result<(IsotopeKey, Arc<[IsotopePeak]>), IsotopeError> {
                    let dist: Arc<[IsotopePeak]> = provider.distribution(formula, mass)?.into();
                    Ok((key, dist))
                },
            )
            .collect::<Result<HashMap<_, _>, IsotopeError>>()?;

        debug!("Computed {} theoretical isotope distributions", inner.len());
        Ok(Self { inner })
    }

    /// Distribution for an identification, empty if it was never computed.
    pub fn get(&self, id: &Identification) -> Arc<[IsotopePeak]> {
        self.inner
            .get(&IsotopeKey::of(id))
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }
}
