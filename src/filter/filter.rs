use serde_json::{json, Value};
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult};

/// Parameterized SQL builder for reads against a single table.
///
/// A filter built with [`Filter::scoped`] pins every generated statement to
/// one tenant: the tenant predicate is rendered first, bound as `$1`, and is
/// ANDed with whatever filter data callers assign, so caller input can narrow
/// a query but never widen it past the tenant boundary. Soft-deleted rows are
/// excluded unless `include_deleted` is set.
pub struct Filter {
    table_name: String,
    tenant_scope: Option<Uuid>,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    include_deleted: bool,
}

impl Filter {
    /// An unscoped filter. Only valid for tables that are not tenant-owned
    /// (the tenant directory itself, audit history).
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            tenant_scope: None,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
        })
    }

    /// A filter pinned to `tenant_id`.
    pub fn scoped(table_name: impl Into<String>, tenant_id: Uuid) -> Result<Self, FilterError> {
        let mut filter = Self::new(table_name)?;
        filter.tenant_scope = Some(tenant_id);
        Ok(filter)
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        Self::validate_select_columns(&columns)?;
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        let order_info = FilterOrder::validate_and_parse(&order_spec)?;
        self.order_data = order_info;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        let max_limit = crate::config::config().filter.max_limit.unwrap_or(i32::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::config().filter.debug_logging {
                tracing::warn!(limit, max_limit, "limit exceeds configured max, capping");
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    /// Include soft-deleted rows. Used by restore paths and trash listings.
    pub fn include_deleted(&mut self, include: bool) -> &mut Self {
        self.include_deleted = include;
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let select_clause = self.build_select_clause();
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data)?;
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM \"{}\"", self.table_name),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) as count FROM \"{}\"", self.table_name)
        } else {
            format!("SELECT COUNT(*) as count FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    /// The bare predicate conjunction: scope conditions first, then caller
    /// conditions. Empty string when nothing constrains the query.
    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let mut conditions: Vec<String> = vec![];
        let mut params: Vec<Value> = vec![];

        if let Some(tenant_id) = self.tenant_scope {
            params.push(json!(tenant_id.to_string()));
            conditions.push(format!("\"tenant_id\" = ${}", params.len()));
        }
        if !self.include_deleted {
            conditions.push("\"is_deleted\" = false".to_string());
        }
        if let Some(ref where_data) = self.where_data {
            let user_result = FilterWhere::generate(where_data, params.len())?;
            if !user_result.query.is_empty() {
                conditions.push(user_result.query);
                params.extend(user_result.params);
            }
        }

        Ok(SqlResult { query: conditions.join(" AND "), params })
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty() {
            return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string()));
        }
        if !valid_identifier(name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    fn validate_select_columns(columns: &[String]) -> Result<(), FilterError> {
        for column in columns {
            if column == "*" { continue; }
            if !valid_identifier(column) {
                return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
            }
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.contains(&"*".to_string()) {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }
}

/// Bare SQL identifier: starts with a letter or underscore, alphanumeric and
/// underscores after, within the Postgres identifier length limit.
pub(crate) fn valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tenant() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn scoped_filter_renders_tenant_predicate_first() {
        let id = tenant();
        let mut filter = Filter::scoped("expenses", id).unwrap();
        filter.where_clause(json!({"vendor": "acme"})).unwrap();
        let sql = filter.to_sql().unwrap();

        assert_eq!(
            sql.query,
            "SELECT * FROM \"expenses\" WHERE \"tenant_id\" = $1 AND \"is_deleted\" = false AND \"vendor\" = $2"
        );
        assert_eq!(sql.params[0], json!(id.to_string()));
        assert_eq!(sql.params[1], json!("acme"));
    }

    #[test]
    fn assigned_filter_data_cannot_replace_the_scope() {
        let id = tenant();
        let other = tenant();
        let mut filter = Filter::scoped("expenses", id).unwrap();
        filter
            .assign(FilterData {
                where_clause: Some(json!({"tenant_id": other.to_string()})),
                ..Default::default()
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();

        // The pinned predicate stays first; the caller condition intersects it
        assert!(sql.query.contains("WHERE \"tenant_id\" = $1 AND"));
        assert_eq!(sql.params[0], json!(id.to_string()));
        assert!(sql.query.contains("\"tenant_id\" = $2"));
    }

    #[test]
    fn unscoped_filter_still_excludes_soft_deleted_rows() {
        let filter = Filter::new("tenants").unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(sql.query, "SELECT * FROM \"tenants\" WHERE \"is_deleted\" = false");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn include_deleted_drops_the_soft_delete_predicate() {
        let id = tenant();
        let mut filter = Filter::scoped("projects", id).unwrap();
        filter.include_deleted(true);
        let sql = filter.to_sql().unwrap();
        assert_eq!(sql.query, "SELECT * FROM \"projects\" WHERE \"tenant_id\" = $1");
    }

    #[test]
    fn select_order_and_limit_compose() {
        let id = tenant();
        let mut filter = Filter::scoped("expenses", id).unwrap();
        filter
            .assign(FilterData {
                select: Some(vec!["id".to_string(), "amount".to_string()]),
                where_clause: Some(json!({"amount": {"$gte": 100}})),
                order: Some(json!({"expense_date": "desc"})),
                limit: Some(25),
                offset: Some(50),
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();

        assert_eq!(
            sql.query,
            "SELECT \"id\", \"amount\" FROM \"expenses\" \
             WHERE \"tenant_id\" = $1 AND \"is_deleted\" = false AND \"amount\" >= $2 \
             ORDER BY \"expense_date\" DESC LIMIT 25 OFFSET 50"
        );
    }

    #[test]
    fn count_sql_shares_the_predicate() {
        let id = tenant();
        let mut filter = Filter::scoped("alerts", id).unwrap();
        filter.where_clause(json!({"is_read": false})).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) as count FROM \"alerts\" WHERE \"tenant_id\" = $1 AND \"is_deleted\" = false AND \"is_read\" = $2"
        );
    }

    #[test]
    fn limit_is_capped_to_configured_max() {
        let max = crate::config::config().filter.max_limit.unwrap();
        let mut filter = Filter::new("tenants").unwrap();
        filter.limit(max + 500, None).unwrap();
        let sql = filter.to_sql().unwrap();
        assert!(sql.query.ends_with(&format!("LIMIT {}", max)));
    }

    #[test]
    fn negative_limit_and_offset_are_rejected() {
        let mut filter = Filter::new("tenants").unwrap();
        assert!(matches!(filter.limit(-1, None), Err(FilterError::InvalidLimit(_))));
        assert!(matches!(filter.limit(10, Some(-1)), Err(FilterError::InvalidOffset(_))));
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        assert!(Filter::new("expenses; DROP TABLE tenants").is_err());

        let mut filter = Filter::new("expenses").unwrap();
        assert!(filter.select(vec!["amount\" FROM users --".to_string()]).is_err());
        assert!(filter.order(json!({"amount\" DESC; --": "asc"})).is_err());
    }
}
