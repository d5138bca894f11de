use crate::error::{CatalogError, Constraint, StoreError};
use crate::model::{NewPlanet, Planet, PlanetId, PlanetProbe};
use crate::predicate::compile;
use crate::store::PlanetStore;

/// Business rules over a [`PlanetStore`]: validation, uniqueness and
/// not-found outcomes. Holds no state beyond the injected store.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S> CatalogService<S>
where
    S: PlanetStore,
{
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persist a new planet.
    ///
    /// Uniqueness is left to the store so concurrent creators cannot race
    /// between a lookup and the insert.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] for empty fields and
    /// [`CatalogError::Conflict`] when the name is already taken.
    pub fn create(&self, candidate: NewPlanet) -> Result<Planet, CatalogError> {
        candidate.validate()?;

        match self.store.persist(&candidate) {
            Ok(planet) => {
                tracing::info!("Created planet {} ({})", planet.id, planet.name);
                Ok(planet)
            }
            Err(StoreError::ConstraintViolation { constraint: Constraint::UniqueName, .. }) => {
                tracing::warn!("Rejected duplicate planet name '{}'", candidate.name);
                Err(CatalogError::Conflict(format!(
                    "a planet named '{}' already exists",
                    candidate.name
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    /// Returns [`CatalogError::NotFound`] when no planet has `id`.
    pub fn get(&self, id: PlanetId) -> Result<Planet, CatalogError> {
        tracing::debug!("Loading planet {}", id);
        self.store
            .find_by_id(id)?
            .ok_or_else(|| CatalogError::NotFound(format!("planet {id}")))
    }

    /// Exact, case-sensitive lookup.
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] when no planet has that name.
    pub fn get_by_name(&self, name: &str) -> Result<Planet, CatalogError> {
        tracing::debug!("Loading planet named '{}'", name);
        self.store
            .find_by_name(name)?
            .ok_or_else(|| CatalogError::NotFound(format!("planet named '{name}'")))
    }

    /// List planets whose climate and terrain contain the given filters,
    /// ignoring case. Unset filters impose no constraint.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] only when the store fails.
    pub fn list(
        &self,
        climate: Option<&str>,
        terrain: Option<&str>,
    ) -> Result<Vec<Planet>, CatalogError> {
        let probe = PlanetProbe {
            name: None,
            climate: climate.map(str::to_owned),
            terrain: terrain.map(str::to_owned),
        };
        let predicate = compile(&probe);
        let planets = self.store.find_all(&predicate)?;
        tracing::debug!(
            "Listed {} planets for {} filter condition(s)",
            planets.len(),
            predicate.conditions().len()
        );
        Ok(planets)
    }

    /// # Errors
    /// Returns [`CatalogError::NotFound`] when no planet has `id`.
    pub fn remove(&self, id: PlanetId) -> Result<(), CatalogError> {
        match self.store.delete_by_id(id) {
            Ok(()) => {
                tracing::info!("Removed planet {}", id);
                Ok(())
            }
            Err(StoreError::NotFound(missing)) => {
                tracing::debug!("Remove requested for missing planet {}", missing);
                Err(CatalogError::NotFound(format!("planet {missing}")))
            }
            Err(err) => Err(err.into()),
        }
    }
}
