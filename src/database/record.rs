use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fields managed by the scoped repository. Client input may never set them;
/// the repository stamps them itself.
pub const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "tenant_id",
    "created_by",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
];

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Field '{0}' is managed by the server and cannot be set")]
    ProtectedField(String),
    #[error("Expected a JSON object")]
    NotAnObject,
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
    #[error("Invalid UUID for field '{field}': {value}")]
    InvalidUuid { field: String, value: String },
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A write payload: column name to JSON value. Keys stay sorted, so generated
/// SQL is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from client JSON. Rejects anything that is not an
    /// object, any attempt to set a protected field, and keys that are not
    /// plain column identifiers (keys end up quoted in generated SQL).
    pub fn from_api_input(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => {
                let mut record = Self::new();
                for (key, value) in map {
                    if PROTECTED_FIELDS.contains(&key.as_str()) {
                        return Err(RecordError::ProtectedField(key));
                    }
                    if !crate::filter::filter::valid_identifier(&key) {
                        return Err(RecordError::InvalidValue {
                            field: key,
                            reason: "not a valid field name".to_string(),
                        });
                    }
                    record.fields.insert(key, value);
                }
                Ok(record)
            }
            _ => Err(RecordError::NotAnObject),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Set an application field. Protected fields are ignored with a warning;
    /// the repository is the only writer allowed to touch them.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if PROTECTED_FIELDS.contains(&key.as_str()) {
            tracing::warn!(field = %key, "attempt to set protected field ignored");
            return self;
        }
        self.fields.insert(key, value.into());
        self
    }

    /// Set a protected field. Repository use only.
    pub(crate) fn set_system_field(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn id(&self) -> Option<Uuid> {
        self.get_str("id").and_then(|s| Uuid::parse_str(s).ok())
    }

    /// A required UUID field.
    pub fn get_uuid(&self, key: &str) -> Result<Uuid, RecordError> {
        match self.try_uuid(key)? {
            Some(id) => Ok(id),
            None => Err(RecordError::MissingRequiredField(key.to_string())),
        }
    }

    /// An optional UUID field. Absent or null is fine; a malformed value is
    /// an error.
    pub fn try_uuid(&self, key: &str) -> Result<Option<Uuid>, RecordError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Uuid::parse_str(s).map(Some).map_err(|_| RecordError::InvalidUuid {
                field: key.to_string(),
                value: s.clone(),
            }),
            Some(other) => Err(RecordError::InvalidUuid { field: key.to_string(), value: other.to_string() }),
        }
    }

    pub fn validate_required_fields(&self, fields: &[&str]) -> Result<(), RecordError> {
        for &field in fields {
            match self.get(field) {
                None | Some(Value::Null) => {
                    return Err(RecordError::MissingRequiredField(field.to_string()))
                }
                Some(Value::String(s)) if s.trim().is_empty() => {
                    return Err(RecordError::MissingRequiredField(field.to_string()))
                }
                Some(_) => continue,
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.to_json()
    }
}

/// Monetary values travel as JSON numbers so they bind as float8; the NUMERIC
/// column's scale rounds away any float noise on assignment.
pub fn decimal_value(amount: Decimal) -> Value {
    amount
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_input_rejects_protected_fields() {
        let err = Record::from_api_input(json!({"name": "Office", "tenant_id": "x"}));
        assert!(matches!(err, Err(RecordError::ProtectedField(f)) if f == "tenant_id"));

        let err = Record::from_api_input(json!({"is_deleted": false}));
        assert!(matches!(err, Err(RecordError::ProtectedField(_))));
    }

    #[test]
    fn api_input_must_be_an_object() {
        assert!(matches!(Record::from_api_input(json!([1, 2])), Err(RecordError::NotAnObject)));
        assert!(matches!(Record::from_api_input(json!("x")), Err(RecordError::NotAnObject)));
    }

    #[test]
    fn api_input_rejects_hostile_field_names() {
        let err = Record::from_api_input(json!({"name\" = '', \"role": "owner"}));
        assert!(matches!(err, Err(RecordError::InvalidValue { .. })));
    }

    #[test]
    fn set_ignores_protected_fields() {
        let mut record = Record::new();
        record.set("id", "not-allowed").set("name", "Office");
        assert!(!record.has("id"));
        assert_eq!(record.get_str("name"), Some("Office"));
    }

    #[test]
    fn system_fields_require_the_system_setter() {
        let mut record = Record::new();
        record.set_system_field("tenant_id", "7f4df8f2-6c0e-4d3a-9f57-3a1be44c9c1a");
        assert!(record.has("tenant_id"));
    }

    #[test]
    fn uuid_accessors_distinguish_missing_from_malformed() {
        let record = Record::from_api_input(json!({"project_id": "not-a-uuid"})).unwrap();
        assert!(matches!(record.try_uuid("project_id"), Err(RecordError::InvalidUuid { .. })));
        assert!(matches!(record.try_uuid("account_id"), Ok(None)));
        assert!(matches!(record.get_uuid("account_id"), Err(RecordError::MissingRequiredField(_))));

        let id = Uuid::new_v4();
        let record = Record::from_api_input(json!({"project_id": id.to_string()})).unwrap();
        assert_eq!(record.get_uuid("project_id").unwrap(), id);
    }

    #[test]
    fn required_fields_reject_blank_strings() {
        let record = Record::from_api_input(json!({"name": "  ", "amount": 10})).unwrap();
        assert!(record.validate_required_fields(&["amount"]).is_ok());
        assert!(matches!(
            record.validate_required_fields(&["name"]),
            Err(RecordError::MissingRequiredField(f)) if f == "name"
        ));
    }

    #[test]
    fn decimal_values_become_numbers() {
        let value = decimal_value(Decimal::new(1055, 2)); // 10.55
        assert!(value.is_number());
    }
}
