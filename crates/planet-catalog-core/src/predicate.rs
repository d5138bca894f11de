//! Compiles a [`PlanetProbe`] into a [`Predicate`] a store can evaluate.
//!
//! The filterable fields are listed once, in [`PlanetField`], together with
//! the match policy each one uses. Stores translate the resulting conditions
//! into their own query language; [`Predicate::matches`] is the in-memory
//! reference evaluation.

use serde::{Deserialize, Serialize};

use crate::model::{Planet, PlanetProbe};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanetField {
    Name,
    Climate,
    Terrain,
}

impl PlanetField {
    pub const ALL: [Self; 3] = [Self::Name, Self::Climate, Self::Terrain];

    /// Column name used by persistent stores.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Climate => "climate",
            Self::Terrain => "terrain",
        }
    }

    #[must_use]
    pub fn match_policy(self) -> MatchPolicy {
        match self {
            Self::Name | Self::Climate | Self::Terrain => MatchPolicy::ContainsIgnoreCase,
        }
    }

    #[must_use]
    pub fn value(self, planet: &Planet) -> &str {
        match self {
            Self::Name => &planet.name,
            Self::Climate => &planet.climate,
            Self::Terrain => &planet.terrain,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// The stored value, case-folded, contains the case-folded needle.
    ContainsIgnoreCase,
}

impl MatchPolicy {
    #[must_use]
    pub fn accepts(self, value: &str, needle: &str) -> bool {
        match self {
            Self::ContainsIgnoreCase => value.to_lowercase().contains(&needle.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Condition {
    pub field: PlanetField,
    pub policy: MatchPolicy,
    pub needle: String,
}

impl Condition {
    #[must_use]
    pub fn matches(&self, planet: &Planet) -> bool {
        self.policy.accepts(self.field.value(planet), &self.needle)
    }
}

/// Conjunction of conditions. No conditions means every planet matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    #[must_use]
    pub fn unconstrained() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn matches(&self, planet: &Planet) -> bool {
        self.conditions.iter().all(|condition| condition.matches(planet))
    }
}

/// Build the predicate for `probe`. Pure and total.
#[must_use]
pub fn compile(probe: &PlanetProbe) -> Predicate {
    // Exhaustive destructuring: a new probe field will not compile until listed here.
    let PlanetProbe { name, climate, terrain } = probe;
    let fields = [
        (PlanetField::Name, name),
        (PlanetField::Climate, climate),
        (PlanetField::Terrain, terrain),
    ];

    let conditions = fields
        .into_iter()
        .filter_map(|(field, value)| {
            value.as_ref().map(|needle| Condition {
                field,
                policy: field.match_policy(),
                needle: needle.clone(),
            })
        })
        .collect();

    Predicate { conditions }
}
