use crate::model::PlanetId;

/// Failure outcomes surfaced by [`crate::CatalogService`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(anyhow::Error),
}

impl CatalogError {
    /// Stable snake_case label for transports and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
        }
    }
}

/// Which store-enforced rule rejected a write.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Constraint {
    UniqueName,
    RequiredField,
}

impl Constraint {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UniqueName => "unique_name",
            Self::RequiredField => "required_field",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("constraint violation ({}): {detail}", constraint.as_str())]
    ConstraintViolation { constraint: Constraint, detail: String },
    #[error("no planet with id {0}")]
    NotFound(PlanetId),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConstraintViolation { constraint: Constraint::UniqueName, detail } => {
                Self::Conflict(detail)
            }
            StoreError::ConstraintViolation { constraint: Constraint::RequiredField, detail } => {
                Self::Validation(detail)
            }
            StoreError::NotFound(id) => Self::NotFound(format!("planet {id}")),
            StoreError::Backend(source) => Self::Storage(source),
        }
    }
}
