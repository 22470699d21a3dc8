use serde_json::Value;

use super::error::FilterError;
use super::filter::valid_identifier;
use super::types::{FilterOp, FilterWhereInfo, SqlResult};

/// Translates filter JSON into a parameterized SQL predicate.
///
/// Produces only the caller's conditions; the tenant scope and soft-delete
/// predicates are prepended by `Filter` so they cannot be overridden from
/// filter input. All conditions are joined with AND and every logical
/// subclause is parenthesized, so OR branches can never widen the scope
/// predicates they are combined with.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    depth: u32,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    /// Generate a predicate for `where_data`, numbering placeholders after
    /// `starting_param_index` params the caller has already bound.
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<SqlResult, FilterError> {
        Self::generate_at(where_data, starting_param_index, 0)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        if where_data.is_null() || where_data.is_object() {
            Ok(())
        } else {
            Err(FilterError::InvalidWhereClause("WHERE must be a JSON object".to_string()))
        }
    }

    fn generate_at(where_data: &Value, starting_param_index: usize, depth: u32) -> Result<SqlResult, FilterError> {
        let max_depth = crate::config::config().filter.max_nested_depth;
        if depth > max_depth {
            return Err(FilterError::NestingTooDeep(max_depth));
        }

        let mut filter_where = Self {
            param_values: vec![],
            param_index: starting_param_index,
            depth,
            conditions: vec![],
        };
        filter_where.build(where_data)
    }

    fn build(&mut self, where_data: &Value) -> Result<SqlResult, FilterError> {
        self.parse_where_data(where_data)?;

        let mut sql_conditions = vec![];
        let conditions_snapshot = self.conditions.clone();
        for condition in &conditions_snapshot {
            if let Some(sql) = self.build_sql_condition(condition)? {
                sql_conditions.push(sql);
            }
        }

        Ok(SqlResult {
            query: sql_conditions.join(" AND "),
            params: self.param_values.clone(),
        })
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null => Ok(()),
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        self.parse_logical_operator(key, value)?;
                    } else {
                        self.parse_field_condition(key, value)?;
                    }
                }
                Ok(())
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be a JSON object".to_string())),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<(), FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires an array", op)))?;
                let mut sql_parts = Vec::new();
                for v in arr {
                    let sub = Self::generate_at(v, self.param_index, self.depth + 1)?;
                    if sub.query.is_empty() {
                        continue;
                    }
                    self.param_index += sub.params.len();
                    self.param_values.extend(sub.params);
                    sql_parts.push(format!("({})", sub.query));
                }
                if !sql_parts.is_empty() {
                    let joiner = if op == "$and" { " AND " } else { " OR " };
                    // Parenthesized so OR binds tighter than the outer AND chain
                    let combined = format!("({})", sql_parts.join(joiner));
                    self.conditions.push(FilterWhereInfo { column: combined, operator: FilterOp::Text, data: Value::Null });
                }
                Ok(())
            }
            "$not" => {
                let sub = Self::generate_at(value, self.param_index, self.depth + 1)?;
                if !sub.query.is_empty() {
                    self.param_index += sub.params.len();
                    self.param_values.extend(sub.params);
                    self.conditions.push(FilterWhereInfo {
                        column: format!("NOT ({})", sub.query),
                        operator: FilterOp::Text,
                        data: Value::Null,
                    });
                }
                Ok(())
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        if !valid_identifier(field) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", field)));
        }
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                self.conditions.push(FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() });
            }
        } else {
            // Implicit equality: { field: value }
            self.conditions.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() });
        }
        Ok(())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Neq,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$between" => FilterOp::Between,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<Option<String>, FilterError> {
        // Pseudo conditions where column already contains SQL (logical operators)
        if matches!(condition.operator, FilterOp::Text) && condition.data.is_null() {
            return Ok(Some(condition.column.clone()));
        }

        let quoted_column = format!("\"{}\"", condition.column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() { Ok(Some(format!("{} IS NULL", quoted_column))) }
                else { Ok(Some(format!("{} = {}", quoted_column, self.param(condition.data.clone())))) }
            }
            FilterOp::Ne | FilterOp::Neq => {
                if condition.data.is_null() { Ok(Some(format!("{} IS NOT NULL", quoted_column))) }
                else { Ok(Some(format!("{} <> {}", quoted_column, self.param(condition.data.clone())))) }
            }
            FilterOp::Gt => Ok(Some(format!("{} > {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Gte => Ok(Some(format!("{} >= {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Lt => Ok(Some(format!("{} < {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Lte => Ok(Some(format!("{} <= {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Like => Ok(Some(format!("{} LIKE {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::ILike => Ok(Some(format!("{} ILIKE {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::In => {
                if let Value::Array(values) = &condition.data {
                    if values.is_empty() { return Ok(Some("1=0".to_string())); }
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(Some(format!("{} IN ({})", quoted_column, params.join(", "))))
                } else {
                    Ok(Some(format!("{} = {}", quoted_column, self.param(condition.data.clone()))))
                }
            }
            FilterOp::Between => {
                if let Value::Array(values) = &condition.data {
                    if values.len() != 2 {
                        return Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string()));
                    }
                    Ok(Some(format!("{} BETWEEN {} AND {}", quoted_column, self.param(values[0].clone()), self.param(values[1].clone()))))
                } else {
                    Err(FilterError::InvalidOperatorData("$between requires an array with 2 values".to_string()))
                }
            }
            _ => Ok(None),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
