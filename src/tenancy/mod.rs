pub mod context;
pub mod directory;
pub mod guard;
pub mod resolver;

mod error;

pub use context::{ActiveTenant, TenantContext, TenantResolution};
pub use directory::{
    CachedDirectory, DirectoryError, PgTenantDirectory, StaticDirectory, TenantDirectory,
};
pub use error::TenancyError;
pub use guard::{admit, Admission, Principal, Rejection};
pub use resolver::{ResolutionSource, ResolvedTenant, TenantResolver};
