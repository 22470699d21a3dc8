use crate::tenancy::directory::DirectoryError;

/// Tenancy failures surfaced to clients. Context misuse (reading before the
/// resolver ran, or binding twice) is not represented here: that is a wiring
/// bug and panics instead.
#[derive(Debug, thiserror::Error)]
pub enum TenancyError {
    /// No tenant source on a request that needs one. 400-class.
    #[error("tenant could not be determined from the request")]
    Required,

    /// The request explicitly named a tenant that does not exist. 404-class.
    #[error("tenant '{0}' not found")]
    NotFound(String),

    /// The tenant exists but is suspended. 403-class, never folded into
    /// NotFound.
    #[error("tenant '{0}' is suspended")]
    Inactive(String),

    /// Authenticated principal belongs to a different tenant than the one
    /// the request resolved to. 403-class.
    #[error("authenticated user does not belong to the resolved tenant")]
    Mismatch,

    /// A write supplied a foreign key that lands outside the current tenant.
    #[error("field '{column}' references a record outside the current tenant")]
    CrossTenantReference { column: String },

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
