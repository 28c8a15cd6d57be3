use serde_json::{Number, Value};

use crate::error::{AgentCoreError, Result};
use crate::tools::manifest::{ToolCallParameterType, ToolDefinition};
use crate::tools::tool::ToolArguments;

/// Converts a raw model-supplied value to the declared parameter type.
///
/// `Ok(None)` means "no value": null input, a blank string for a non-string
/// target, or a target type without a converter (dates). Malformed input for
/// a convertible type is an `InvalidArgument` error.
pub fn coerce(raw: &Value, target: ToolCallParameterType) -> Result<Option<Value>> {
    coerce_named("value", raw, target)
}

/// Coerces every declared parameter of `definition`. Missing required
/// parameters and values outside a declared enum set are rejected;
/// undeclared arguments pass through untouched.
pub fn coerce_arguments(definition: &ToolDefinition, raw: &ToolArguments) -> Result<ToolArguments> {
    let mut coerced = raw.clone();
    for parameter in &definition.parameters {
        let value = match raw.get(&parameter.name) {
            Some(value) => coerce_named(&parameter.name, value, parameter.parameter_type)?,
            None => None,
        };
        match value {
            Some(value) => {
                if !parameter.enums.is_empty() {
                    let text = match &value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    if !parameter.enums.iter().any(|allowed| *allowed == text) {
                        return Err(AgentCoreError::invalid_argument(
                            &parameter.name,
                            format!("`{}` is not one of {:?}", text, parameter.enums),
                        ));
                    }
                }
                coerced.insert(parameter.name.clone(), value);
            }
            None if parameter.required => {
                return Err(AgentCoreError::invalid_argument(
                    &parameter.name,
                    "required parameter is missing",
                ));
            }
            None => {
                coerced.remove(&parameter.name);
            }
        }
    }
    Ok(coerced)
}

fn coerce_named(name: &str, raw: &Value, target: ToolCallParameterType) -> Result<Option<Value>> {
    if raw.is_null() {
        return Ok(None);
    }
    if target == ToolCallParameterType::String {
        return Ok(Some(match raw {
            Value::String(_) => raw.clone(),
            other => Value::String(other.to_string()),
        }));
    }
    if let Value::String(text) = raw {
        if text.trim().is_empty() {
            return Ok(None);
        }
    }
    if target == ToolCallParameterType::Any {
        return Ok(Some(raw.clone()));
    }
    if satisfies(raw, target) {
        return Ok(Some(raw.clone()));
    }

    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };

    let converted = match target {
        ToolCallParameterType::Boolean => Value::Bool(parse_bool(name, &text)?),
        ToolCallParameterType::Integer => {
            let parsed: i32 = text
                .parse()
                .map_err(|_| AgentCoreError::invalid_argument(name, format!("`{text}` is not an integer")))?;
            Value::from(parsed)
        }
        ToolCallParameterType::Long => {
            let parsed: i64 = text
                .parse()
                .map_err(|_| AgentCoreError::invalid_argument(name, format!("`{text}` is not a long")))?;
            Value::from(parsed)
        }
        ToolCallParameterType::Double | ToolCallParameterType::Float => {
            let parsed: f64 = text
                .parse()
                .map_err(|_| AgentCoreError::invalid_argument(name, format!("`{text}` is not a number")))?;
            let number = Number::from_f64(parsed).ok_or_else(|| {
                AgentCoreError::invalid_argument(name, format!("`{text}` is not a finite number"))
            })?;
            Value::Number(number)
        }
        ToolCallParameterType::Date | ToolCallParameterType::DateTime => return Ok(None),
        ToolCallParameterType::String | ToolCallParameterType::Any => raw.clone(),
    };
    Ok(Some(converted))
}

fn satisfies(raw: &Value, target: ToolCallParameterType) -> bool {
    match (raw, target) {
        (Value::Bool(_), ToolCallParameterType::Boolean) => true,
        (Value::Number(n), ToolCallParameterType::Integer) => n
            .as_i64()
            .map(|v| i32::try_from(v).is_ok())
            .unwrap_or(false),
        (Value::Number(n), ToolCallParameterType::Long) => n.is_i64(),
        (Value::Number(_), ToolCallParameterType::Double | ToolCallParameterType::Float) => true,
        _ => false,
    }
}

fn parse_bool(name: &str, text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AgentCoreError::invalid_argument(
            name,
            format!("`{text}` is not a boolean"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_parse_from_trimmed_strings() {
        assert_eq!(
            coerce(&json!(" 42 "), ToolCallParameterType::Integer).unwrap(),
            Some(json!(42))
        );
        assert_eq!(
            coerce(&json!("1.5"), ToolCallParameterType::Double).unwrap(),
            Some(json!(1.5))
        );
    }

    #[test]
    fn integer_overflow_is_invalid() {
        let result = coerce(&json!("99999999999"), ToolCallParameterType::Integer);
        assert!(matches!(result, Err(AgentCoreError::InvalidArgument { .. })));
        assert_eq!(
            coerce(&json!("99999999999"), ToolCallParameterType::Long).unwrap(),
            Some(json!(99999999999i64))
        );
    }

    #[test]
    fn dates_have_no_converter() {
        assert_eq!(
            coerce(&json!("2024-01-01"), ToolCallParameterType::Date).unwrap(),
            None
        );
    }

    #[test]
    fn any_passes_objects_through() {
        let raw = json!({"a": [1, 2]});
        assert_eq!(
            coerce(&raw, ToolCallParameterType::Any).unwrap(),
            Some(raw.clone())
        );
    }
}
