pub mod alert_service;
pub mod audit;
pub mod report_service;
pub mod tenant_service;

pub use alert_service::AlertService;
pub use audit::record_audit_event;
pub use report_service::ReportService;
pub use tenant_service::{TenantService, TenantServiceError};
