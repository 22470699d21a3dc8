//! HTTP endpoints, one module per resource.
//!
//! Public surface: `/health` and `/api/v1/auth/{register,login}`. Everything
//! else sits behind the auth and tenant-guard layers, and every data access
//! goes through [`crate::database::ScopedRepository`] built from the
//! request's tenant context.

pub mod accounts;
pub mod alerts;
pub mod auth;
pub mod budgets;
pub mod categories;
pub mod expenses;
pub mod health;
pub mod projects;
pub mod reports;
pub mod tenant;
pub mod users;

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::FromRow;

use crate::database::record::RecordError;
use crate::database::{Record, ScopedRepository, TenantOwned};
use crate::error::ApiError;
use crate::filter::FilterData;

/// Refuse a create once the tenant has `limit` live rows of `resource`.
pub(crate) async fn enforce_plan_limit<T>(
    repo: &ScopedRepository<T>,
    limit: i64,
    resource: &str,
) -> Result<(), ApiError>
where
    T: TenantOwned + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let count = repo.count(FilterData::default()).await?;
    if count >= limit {
        return Err(ApiError::PlanLimitReached { resource: resource.to_string(), limit });
    }
    Ok(())
}

/// A money field must be present and strictly positive.
pub(crate) fn require_positive_amount(record: &Record, field: &str) -> Result<(), ApiError> {
    let value = match record.get(field) {
        None | Some(Value::Null) => {
            return Err(RecordError::MissingRequiredField(field.to_string()).into())
        }
        Some(value) => value,
    };

    let positive = match value {
        Value::Number(n) => n.as_f64().is_some_and(|f| f > 0.0),
        Value::String(s) => s.parse::<Decimal>().map(|d| d > Decimal::ZERO).unwrap_or(false),
        _ => false,
    };

    if positive {
        Ok(())
    } else {
        Err(RecordError::InvalidValue {
            field: field.to_string(),
            reason: "must be a positive amount".to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positive_amounts_pass() {
        let record = Record::from_api_input(json!({"amount": 10.50})).unwrap();
        assert!(require_positive_amount(&record, "amount").is_ok());

        let record = Record::from_api_input(json!({"amount": "99.99"})).unwrap();
        assert!(require_positive_amount(&record, "amount").is_ok());
    }

    #[test]
    fn test_zero_negative_and_missing_amounts_fail() {
        let record = Record::from_api_input(json!({"amount": 0})).unwrap();
        assert!(require_positive_amount(&record, "amount").is_err());

        let record = Record::from_api_input(json!({"amount": -5})).unwrap();
        assert!(require_positive_amount(&record, "amount").is_err());

        let record = Record::from_api_input(json!({"title": "no amount"})).unwrap();
        assert!(require_positive_amount(&record, "amount").is_err());
    }
}
