pub mod models;
pub mod pool;
pub mod record;
pub mod scoped;

pub use record::{Record, RecordError};
pub use scoped::{CrossTenantAccess, ScopeError, ScopedFk, ScopedRepository, TenantOwned};
