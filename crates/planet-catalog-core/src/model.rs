use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Store-assigned planet identifier. Never supplied by callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct PlanetId(pub i64);

impl Display for PlanetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlanetId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A persisted planet. Holding one means the store has assigned its id.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Planet {
    pub id: PlanetId,
    pub name: String,
    pub climate: String,
    pub terrain: String,
}

/// Create candidate. Missing wire fields decode as empty and fail [`NewPlanet::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct NewPlanet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub climate: String,
    #[serde(default)]
    pub terrain: String,
}

impl NewPlanet {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        climate: impl Into<String>,
        terrain: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), climate: climate.into(), terrain: terrain.into() }
    }

    /// Check that every required field is non-empty. Whitespace counts as content.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] naming the first empty field.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (field, value) in
            [("name", &self.name), ("climate", &self.climate), ("terrain", &self.terrain)]
        {
            if value.is_empty() {
                return Err(CatalogError::Validation(format!(
                    "{field} MUST be provided for every planet"
                )));
            }
        }
        Ok(())
    }
}

/// Filter input: `None` leaves a field unconstrained, `Some("")` matches every value.
///
/// There is deliberately no id field; identifiers never take part in matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct PlanetProbe {
    pub name: Option<String>,
    pub climate: Option<String>,
    pub terrain: Option<String>,
}

impl PlanetProbe {
    #[must_use]
    pub fn unconstrained() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_climate(mut self, climate: impl Into<String>) -> Self {
        self.climate = Some(climate.into());
        self
    }

    #[must_use]
    pub fn with_terrain(mut self, terrain: impl Into<String>) -> Self {
        self.terrain = Some(terrain.into());
        self
    }
}
