use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DeclarationMappingError;

/// Name given to a capability whose source advertised no usable id.
pub const UNKNOWN_CAPABILITY_NAME: &str = "unknownCapability";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    String,
    Number,
    Boolean,
    Array,
}

impl SchemaType {
    /// Total mapping from JSON-schema type names. Anything unrecognized is a string.
    pub fn from_json_type(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("number") | Some("integer") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            _ => Self::String,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
}

/// Function declaration handed to the execution runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Derives a function-call-safe name from a capability id.
///
/// Hyphens, underscores and other separators start a new camel-case word:
/// `book-hotel` becomes `bookHotel`. A missing or blank id yields
/// [`UNKNOWN_CAPABILITY_NAME`].
pub fn tool_name_from_id(id: Option<&str>) -> String {
    let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
        return UNKNOWN_CAPABILITY_NAME.to_string();
    };

    let mut name = String::with_capacity(id.len());
    let mut upper_next = false;
    for ch in id.chars() {
        if !ch.is_alphanumeric() {
            upper_next = !name.is_empty();
            continue;
        }
        if upper_next {
            name.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            name.push(ch);
        }
    }

    if name.is_empty() {
        UNKNOWN_CAPABILITY_NAME.to_string()
    } else {
        name
    }
}

/// Maps an advertised input schema onto a [`FunctionDeclaration`].
///
/// A missing schema produces an empty parameter list. Property types are mapped
/// with [`SchemaType::from_json_type`]; only structurally malformed schemas fail.
pub fn map_declaration(
    name: &str,
    description: &str,
    schema: Option<&Value>,
) -> Result<FunctionDeclaration, DeclarationMappingError> {
    let mut parameters = ParameterSchema::default();

    if let Some(schema) = schema.filter(|schema| !schema.is_null()) {
        let schema = schema.as_object().ok_or_else(|| DeclarationMappingError {
            capability: name.to_string(),
            reason: "input schema is not an object".to_string(),
        })?;

        match schema.get("properties") {
            None | Some(Value::Null) => {}
            Some(Value::Object(properties)) => {
                for (property, definition) in properties {
                    let definition =
                        definition.as_object().ok_or_else(|| DeclarationMappingError {
                            capability: name.to_string(),
                            reason: format!("property `{property}` is not an object"),
                        })?;
                    let kind =
                        SchemaType::from_json_type(definition.get("type").and_then(Value::as_str));
                    let description = definition
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    parameters.properties.insert(property.clone(), PropertySchema { kind, description });
                }
            }
            Some(_) => {
                return Err(DeclarationMappingError {
                    capability: name.to_string(),
                    reason: "`properties` is not an object".to_string(),
                })
            }
        }

        match schema.get("required") {
            None | Some(Value::Null) => {}
            Some(Value::Array(required)) => {
                for entry in required {
                    let field = entry.as_str().ok_or_else(|| DeclarationMappingError {
                        capability: name.to_string(),
                        reason: "`required` contains a non-string entry".to_string(),
                    })?;
                    parameters.required.push(field.to_string());
                }
            }
            Some(_) => {
                return Err(DeclarationMappingError {
                    capability: name.to_string(),
                    reason: "`required` is not an array".to_string(),
                })
            }
        }
    }

    Ok(FunctionDeclaration {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    })
}
