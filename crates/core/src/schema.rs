//! Explicit tagged schemas for tool arguments.
//!
//! An [`InputSchema`] is both the JSON Schema advertised to protocol
//! clients and the checker applied to raw arguments before a tool runs, so
//! the two can never drift apart.

use crate::error::{ValidationError, ValidationResult};
use crate::validation::parse_date;
use serde_json::{json, Map, Value};

/// Declared type and constraints of a single argument
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String { min_len: usize },
    Integer { min: Option<i64>, max: Option<i64> },
    Enum { values: Vec<&'static str> },
    /// Calendar date as `YYYY-MM-DD`
    Date,
    Array { items: Box<FieldKind> },
}

impl FieldKind {
    pub fn string() -> Self {
        FieldKind::String { min_len: 0 }
    }

    pub fn non_empty_string() -> Self {
        FieldKind::String { min_len: 1 }
    }

    pub fn integer(min: Option<i64>, max: Option<i64>) -> Self {
        FieldKind::Integer { min, max }
    }

    pub fn one_of(values: Vec<&'static str>) -> Self {
        FieldKind::Enum { values }
    }

    pub fn array_of(items: FieldKind) -> Self {
        FieldKind::Array {
            items: Box::new(items),
        }
    }

    fn check(&self, field: &str, value: &Value) -> ValidationResult<()> {
        match self {
            FieldKind::String { min_len } => {
                let s = value.as_str().ok_or_else(|| wrong_type(field, "a string"))?;
                if s.trim().chars().count() < *min_len {
                    return Err(ValidationError::out_of_range(
                        field,
                        format!("must be at least {} character(s)", min_len),
                    ));
                }
                Ok(())
            }
            FieldKind::Integer { min, max } => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| wrong_type(field, "an integer"))?;
                if let Some(min) = min {
                    if n < *min {
                        return Err(ValidationError::out_of_range(
                            field,
                            format!("{} is below the minimum of {}", n, min),
                        ));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(ValidationError::out_of_range(
                            field,
                            format!("{} exceeds the maximum of {}", n, max),
                        ));
                    }
                }
                Ok(())
            }
            FieldKind::Enum { values } => {
                let s = value.as_str().ok_or_else(|| wrong_type(field, "a string"))?;
                if values.contains(&s) {
                    Ok(())
                } else {
                    Err(ValidationError::NotInEnum {
                        field: field.to_string(),
                        value: s.to_string(),
                        allowed: values.join(", "),
                    })
                }
            }
            FieldKind::Date => {
                let s = value.as_str().ok_or_else(|| wrong_type(field, "a string"))?;
                parse_date(field, s).map(|_| ())
            }
            FieldKind::Array { items } => {
                let elements = value
                    .as_array()
                    .ok_or_else(|| wrong_type(field, "an array"))?;
                for (i, element) in elements.iter().enumerate() {
                    items.check(&format!("{}[{}]", field, i), element)?;
                }
                Ok(())
            }
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            FieldKind::String { min_len } if *min_len > 0 => {
                json!({ "type": "string", "minLength": min_len })
            }
            FieldKind::String { .. } => json!({ "type": "string" }),
            FieldKind::Integer { min, max } => {
                let mut schema = Map::new();
                schema.insert("type".to_string(), json!("integer"));
                if let Some(min) = min {
                    schema.insert("minimum".to_string(), json!(min));
                }
                if let Some(max) = max {
                    schema.insert("maximum".to_string(), json!(max));
                }
                Value::Object(schema)
            }
            FieldKind::Enum { values } => json!({ "type": "string", "enum": values }),
            FieldKind::Date => json!({
                "type": "string",
                "format": "date",
                "pattern": "^\\d{4}-\\d{2}-\\d{2}$"
            }),
            FieldKind::Array { items } => json!({
                "type": "array",
                "items": items.to_json_schema()
            }),
        }
    }
}

fn wrong_type(field: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType {
        field: field.to_string(),
        expected,
    }
}

/// A single declared argument
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

/// The full argument declaration of one tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind,
            required: true,
            description,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind,
            required: false,
            description,
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check raw arguments against the declaration.
    ///
    /// A JSON `null` counts as absent. Undeclared arguments are rejected.
    /// The first violation found is returned, checking fields in
    /// declaration order.
    pub fn validate(&self, arguments: &Value) -> ValidationResult<()> {
        let empty = Map::new();
        let object = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(ValidationError::NotAnObject),
        };

        if let Some(unknown) = object.keys().find(|k| self.field(k).is_none()) {
            return Err(ValidationError::UnknownField {
                field: unknown.clone(),
            });
        }

        for spec in &self.fields {
            match object.get(spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(ValidationError::missing(spec.name));
                    }
                }
                Some(value) => spec.kind.check(spec.name, value)?,
            }
        }

        Ok(())
    }

    /// Render as a JSON Schema object for `tools/list`
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.fields {
            let mut property = spec.kind.to_json_schema();
            if let Value::Object(ref mut map) = property {
                map.insert("description".to_string(), json!(spec.description));
            }
            properties.insert(spec.name.to_string(), property);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}
