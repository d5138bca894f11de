use crate::error::StoreError;
use crate::model::{NewPlanet, Planet, PlanetId};
use crate::predicate::Predicate;

/// Persistence operations the catalog depends on.
///
/// Implementations own name uniqueness and must enforce it atomically: two
/// concurrent `persist` calls with the same name yield exactly one success and
/// one [`StoreError::ConstraintViolation`] carrying [`crate::Constraint::UniqueName`].
pub trait PlanetStore {
    /// Insert `candidate` and return it with its newly assigned id.
    ///
    /// # Errors
    /// Returns [`StoreError::ConstraintViolation`] when a store rule rejects the row.
    fn persist(&self, candidate: &NewPlanet) -> Result<Planet, StoreError>;

    /// # Errors
    /// Returns [`StoreError::Backend`] when the lookup itself fails.
    fn find_by_id(&self, id: PlanetId) -> Result<Option<Planet>, StoreError>;

    /// Exact, case-sensitive name lookup.
    ///
    /// # Errors
    /// Returns [`StoreError::Backend`] when the lookup itself fails.
    fn find_by_name(&self, name: &str) -> Result<Option<Planet>, StoreError>;

    /// # Errors
    /// Returns [`StoreError::Backend`] when the query fails.
    fn find_all(&self, predicate: &Predicate) -> Result<Vec<Planet>, StoreError>;

    /// # Errors
    /// Returns [`StoreError::NotFound`] when no planet has `id`.
    fn delete_by_id(&self, id: PlanetId) -> Result<(), StoreError>;
}

impl<S> PlanetStore for &S
where
    S: PlanetStore + ?Sized,
{
    fn persist(&self, candidate: &NewPlanet) -> Result<Planet, StoreError> {
        (**self).persist(candidate)
    }

    fn find_by_id(&self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Planet>, StoreError> {
        (**self).find_by_name(name)
    }

    fn find_all(&self, predicate: &Predicate) -> Result<Vec<Planet>, StoreError> {
        (**self).find_all(predicate)
    }

    fn delete_by_id(&self, id: PlanetId) -> Result<(), StoreError> {
        (**self).delete_by_id(id)
    }
}
