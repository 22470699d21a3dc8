use serde_json::Value;

use super::error::FilterError;
use super::filter::valid_identifier;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::Null => Vec::new(),
            Value::String(s) => Self::parse_order_string(s)?,
            // Array entries may be strings ("expense_date desc") or
            // single-key objects ({ "amount": "asc" }).
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        Value::Object(obj) => Self::parse_order_object(obj, &mut out),
                        other => {
                            return Err(FilterError::InvalidOrder(format!(
                                "Order entries must be strings or objects, got: {}",
                                other
                            )))
                        }
                    }
                }
                out
            }
            // { "expense_date": "desc", "amount": "asc" }
            Value::Object(obj) => {
                let mut out = Vec::new();
                Self::parse_order_object(obj, &mut out);
                out
            }
            other => {
                return Err(FilterError::InvalidOrder(format!("Unsupported order spec: {}", other)))
            }
        };

        for info in &infos {
            if !valid_identifier(&info.column) {
                return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", info.column)));
            }
        }
        Ok(infos)
    }

    fn parse_order_object(obj: &serde_json::Map<String, Value>, out: &mut Vec<FilterOrderInfo>) {
        for (k, v) in obj {
            let sort = match v.as_str().unwrap_or("asc").to_ascii_lowercase().as_str() {
                "desc" => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            out.push(FilterOrderInfo { column: k.clone(), sort });
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
