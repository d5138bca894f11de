mod error;
mod model;
pub mod predicate;
mod service;
mod store;

pub use error::{CatalogError, Constraint, StoreError};
pub use model::{NewPlanet, Planet, PlanetId, PlanetProbe};
pub use predicate::{compile, Condition, MatchPolicy, PlanetField, Predicate};
pub use service::CatalogService;
pub use store::PlanetStore;
