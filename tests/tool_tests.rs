use std::sync::Arc;

use agentcore::error::AgentCoreError;
use agentcore::tools::{
    coerce, coerce_arguments, describe, describe_definition, EchoTool, FunctionTool,
    ToolArguments, ToolCallParameter, ToolCallParameterType, ToolDefinition, ToolInvocation,
    ToolRegistry,
};
use serde_json::{json, Value};

fn weather_definition() -> anyhow::Result<ToolDefinition> {
    Ok(ToolDefinition::builder("weather")
        .description("Looks up the forecast")
        .parameter(
            ToolCallParameter::new("city", ToolCallParameterType::String)
                .with_description("city name")
                .required(),
        )
        .parameter(ToolCallParameter::new("days", ToolCallParameterType::Integer))
        .parameter(
            ToolCallParameter::new("unit", ToolCallParameterType::String)
                .with_enums(["celsius", "fahrenheit"]),
        )
        .parameter(ToolCallParameter::new("alerts", ToolCallParameterType::Boolean).required())
        .build()?)
}

#[test]
fn schema_required_matches_required_parameters() -> anyhow::Result<()> {
    let definition = weather_definition()?;
    let schema = describe_definition(&definition);

    assert_eq!(schema.name, "weather");
    assert_eq!(schema.input_schema.schema_type, "object");
    assert_eq!(schema.input_schema.required, vec!["city", "alerts"]);
    let names: Vec<&str> = schema
        .input_schema
        .properties
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["city", "days", "unit", "alerts"]);
    assert_eq!(schema.input_schema.properties[2].enums, vec!["celsius", "fahrenheit"]);
    Ok(())
}

#[test]
fn schema_of_live_tool_matches_definition() {
    let tool = EchoTool::new();
    let schema = describe(&tool);
    assert_eq!(schema.input_schema.required, vec!["text"]);
    assert_eq!(schema.input_schema.properties[0].property_type, "string");
}

#[test]
fn null_is_never_a_value() -> anyhow::Result<()> {
    for target in [
        ToolCallParameterType::String,
        ToolCallParameterType::Boolean,
        ToolCallParameterType::Integer,
        ToolCallParameterType::Long,
        ToolCallParameterType::Double,
        ToolCallParameterType::Float,
        ToolCallParameterType::Date,
        ToolCallParameterType::DateTime,
        ToolCallParameterType::Any,
    ] {
        assert_eq!(coerce(&Value::Null, target)?, None, "{target:?}");
    }
    Ok(())
}

#[test]
fn blank_string_is_absent_for_non_string_types() -> anyhow::Result<()> {
    for target in [
        ToolCallParameterType::Boolean,
        ToolCallParameterType::Integer,
        ToolCallParameterType::Long,
        ToolCallParameterType::Double,
        ToolCallParameterType::Float,
        ToolCallParameterType::Any,
    ] {
        assert_eq!(coerce(&json!(""), target)?, None, "{target:?}");
    }
    assert_eq!(coerce(&json!(""), ToolCallParameterType::String)?, Some(json!("")));
    Ok(())
}

#[test]
fn booleans_parse_strictly() -> anyhow::Result<()> {
    assert_eq!(coerce(&json!("true"), ToolCallParameterType::Boolean)?, Some(json!(true)));
    assert_eq!(coerce(&json!("0"), ToolCallParameterType::Boolean)?, Some(json!(false)));
    assert_eq!(coerce(&json!("FALSE"), ToolCallParameterType::Boolean)?, Some(json!(false)));
    let err = coerce(&json!("maybe"), ToolCallParameterType::Boolean).unwrap_err();
    assert!(matches!(err, AgentCoreError::InvalidArgument { .. }));
    Ok(())
}

#[test]
fn arguments_are_checked_against_definition() -> anyhow::Result<()> {
    let definition = weather_definition()?;

    let mut raw = ToolArguments::new();
    raw.insert("city".into(), json!("Oslo"));
    raw.insert("days".into(), json!("3"));
    raw.insert("alerts".into(), json!("1"));
    raw.insert("trace_id".into(), json!("abc"));
    let coerced = coerce_arguments(&definition, &raw)?;
    assert_eq!(coerced["days"], json!(3));
    assert_eq!(coerced["alerts"], json!(true));
    assert_eq!(coerced["trace_id"], json!("abc"));

    raw.remove("alerts");
    let err = coerce_arguments(&definition, &raw).unwrap_err();
    assert!(matches!(err, AgentCoreError::InvalidArgument { ref parameter, .. } if parameter == "alerts"));

    raw.insert("alerts".into(), json!(false));
    raw.insert("unit".into(), json!("kelvin"));
    let err = coerce_arguments(&definition, &raw).unwrap_err();
    assert!(matches!(err, AgentCoreError::InvalidArgument { ref parameter, .. } if parameter == "unit"));
    Ok(())
}

#[test]
fn numeric_enums_compare_by_value() -> anyhow::Result<()> {
    let definition = ToolDefinition::builder("pick")
        .parameter(
            ToolCallParameter::new("level", ToolCallParameterType::Integer)
                .with_enums(["1", "2", "3"])
                .required(),
        )
        .build()?;

    let mut raw = ToolArguments::new();
    raw.insert("level".into(), json!(2));
    assert_eq!(coerce_arguments(&definition, &raw)?["level"], json!(2));

    raw.insert("level".into(), json!("3"));
    assert_eq!(coerce_arguments(&definition, &raw)?["level"], json!(3));

    raw.insert("level".into(), json!(7));
    let err = coerce_arguments(&definition, &raw).unwrap_err();
    assert!(matches!(err, AgentCoreError::InvalidArgument { ref parameter, .. } if parameter == "level"));
    Ok(())
}

#[test]
fn definition_rejects_duplicate_parameters() {
    let result = ToolDefinition::builder("dup")
        .parameter(ToolCallParameter::new("a", ToolCallParameterType::String))
        .parameter(ToolCallParameter::new("a", ToolCallParameterType::Integer))
        .build();
    assert!(result.is_err());
}

#[tokio::test]
async fn registry_reports_argument_errors_as_tool_failures() -> anyhow::Result<()> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool::with_prefix("Said")));

    let ok = registry
        .execute(&ToolInvocation::new("echo", json!({"text": "hello"})))
        .await?;
    assert_eq!(ok, "Said: hello");

    let err = registry
        .execute(&ToolInvocation::new("echo", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentCoreError::ToolExecution { ref tool, .. } if tool == "echo"));

    let err = registry
        .execute(&ToolInvocation::new("missing", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentCoreError::ToolNotRegistered(_)));
    Ok(())
}

#[tokio::test]
async fn function_tool_failures_carry_tool_name() -> anyhow::Result<()> {
    let definition = ToolDefinition::builder("divide")
        .parameter(ToolCallParameter::new("by", ToolCallParameterType::Integer).required())
        .build()?;
    let tool = FunctionTool::from_fn(definition, |args| {
        let by = args.get("by").and_then(Value::as_i64).unwrap_or_default();
        if by == 0 {
            return Err(AgentCoreError::Other(anyhow::anyhow!("division by zero")));
        }
        Ok((100 / by).to_string())
    });
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(tool));

    assert_eq!(
        registry
            .execute(&ToolInvocation::new("divide", json!({"by": "4"})))
            .await?,
        "25"
    );
    let err = registry
        .execute(&ToolInvocation::new("divide", json!({"by": 0})))
        .await
        .unwrap_err();
    match err {
        AgentCoreError::ToolExecution { tool, message } => {
            assert_eq!(tool, "divide");
            assert!(message.contains("division by zero"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}
