pub mod account;
pub mod alert;
pub mod audit;
pub mod budget;
pub mod category;
pub mod expense;
pub mod project;
pub mod tenant;
pub mod user;

pub use account::{Account, AccountKind};
pub use alert::{Alert, AlertSeverity, AlertType};
pub use audit::AuditEvent;
pub use budget::{Budget, BudgetPeriod};
pub use category::Category;
pub use expense::Expense;
pub use project::{Project, ProjectStatus};
pub use tenant::{PlanLimits, PlanTier, Tenant, TenantDomain};
pub use user::{Role, User};
