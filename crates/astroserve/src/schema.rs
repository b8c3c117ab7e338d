//! Feature schema: the ordered list of columns every batch and model agree on.

use std::collections::HashSet;

/// Columns of the exoplanet candidate table the default models were trained on.
pub const EXOPLANET_FEATURES: [&str; 39] = [
    "OrbitalPeriod_days",
    "OrbitalPeriodUpperUnc_days",
    "OrbitalPeriodLowerUnc_days",
    "TransitEpoch_BKJD",
    "TransitEpochUpperUnc_BKJD",
    "TransitEpochLowerUnc_BKJD",
    "ImpactParamete",
    "ImpactParameterUpperUnc",
    "ImpactParameterLowerUnc",
    "TransitDuration_hrs",
    "TransitDurationUpperUnc_hrs",
    "TransitDurationLowerUnc_hrs",
    "TransitDepth_ppm",
    "TransitDepthUpperUnc_ppm",
    "TransitDepthLowerUnc_ppm",
    "PlanetaryRadius_Earthradii",
    "PlanetaryRadiusUpperUnc_Earthradii",
    "PlanetaryRadiusLowerUnc_Earthradii",
    "EquilibriumTemperatureK",
    "EquilibriumTemperatureUpperUncK",
    "EquilibriumTemperatureLowerUncK",
    "InsolationFlux_Earthflux",
    "InsolationFluxUpperUnc_Earthflux",
    "InsolationFluxLowerUnc_Earthflux",
    "TransitSignal-to-Nois",
    "TCEPlanetNumbe",
    "StellarEffectiveTemperatureK",
    "StellarEffectiveTemperatureUpperUncK",
    "StellarEffectiveTemperatureLowerUncK",
    "StellarSurfaceGravity_log10(cm/s**2)",
    "StellarSurfaceGravityUpperUnc_log10(cm/s**2)",
    "StellarSurfaceGravityLowerUnc_log10(cm/s**2)",
    "StellarRadius_Solarradii",
    "StellarRadiusUpperUnc_Solarradii",
    "StellarRadiusLowerUnc_Solarradii",
    "RA_decimaldegrees",
    "Dec_decimaldegrees",
    "Kepler-band_mag",
    "DispositionScore",
];

/// Ordered, immutable list of feature names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

/// Reason a list of names cannot form a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("feature schema must contain at least one column")]
    Empty,
    #[error("feature name at position {0} is empty")]
    EmptyName(usize),
    #[error("feature '{0}' appears more than once")]
    Duplicate(String),
}

impl FeatureSchema {
    /// Build a schema from ordered names. Names must be non-empty and unique.
    pub fn new<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(SchemaError::EmptyName(idx));
            }
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::Duplicate(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// The default exoplanet schema.
    pub fn exoplanet() -> Self {
        Self {
            names: EXOPLANET_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Number of columns (N).
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed schema; provided for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column names in order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::exoplanet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exoplanet_schema_shape() {
        let schema = FeatureSchema::exoplanet();
        assert_eq!(schema.len(), 39);
        assert_eq!(schema.names()[0], "OrbitalPeriod_days");
        assert_eq!(schema.index_of("DispositionScore"), Some(38));
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert_eq!(
            FeatureSchema::new(Vec::<String>::new()),
            Err(SchemaError::Empty)
        );
        assert_eq!(
            FeatureSchema::new(["a", "b", "a"]),
            Err(SchemaError::Duplicate("a".into()))
        );
        assert_eq!(FeatureSchema::new(["a", ""]), Err(SchemaError::EmptyName(1)));
    }

    #[test]
    fn preserves_order() {
        let schema = FeatureSchema::new(["c", "a", "b"]).unwrap();
        assert_eq!(schema.names(), ["c", "a", "b"]);
        assert_eq!(schema.index_of("a"), Some(1));
    }
}
