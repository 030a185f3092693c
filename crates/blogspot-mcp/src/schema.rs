//! Input schemas and argument validation.
//!
//! Tools declare an [`InputSchema`] made of [`FieldSpec`]s. The schema is
//! listed to clients as JSON Schema and checked against every call before
//! the handler runs. Prompts declare a flat list of [`PromptArgument`]s
//! checked by [`validate_arguments`].

use crate::error::{McpError, McpResult};
use crate::protocol::McpPromptArgument;
use serde_json::{json, Map, Value};

/// Type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<FieldKind>),
    Object(Vec<FieldSpec>),
}

impl FieldKind {
    fn json_type(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array(_) => "array",
            FieldKind::Object(_) => "object",
        }
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.json_type()));
        match self {
            FieldKind::Array(items) => {
                schema.insert("items".into(), items.to_json_schema());
            }
            FieldKind::Object(fields) => {
                let (properties, required) = render_fields(fields);
                schema.insert("properties".into(), Value::Object(properties));
                if !required.is_empty() {
                    schema.insert("required".into(), json!(required));
                }
            }
            _ => {}
        }
        Value::Object(schema)
    }

    fn check(&self, path: &str, value: &Value, errors: &mut Vec<String>) {
        let ok = match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array(items) => match value.as_array() {
                Some(elements) => {
                    for (i, element) in elements.iter().enumerate() {
                        items.check(&format!("{path}[{i}]"), element, errors);
                    }
                    true
                }
                None => false,
            },
            FieldKind::Object(fields) => match value.as_object() {
                Some(object) => {
                    check_fields(fields, object, Some(path), errors);
                    true
                }
                None => false,
            },
        };

        if !ok {
            errors.push(format!(
                "{path}: expected {}, got {}",
                self.json_type(),
                describe(value)
            ));
        }
    }
}

/// A named field of an input schema. Fields are required unless marked
/// [`optional`](FieldSpec::optional).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub description: Option<String>,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: true,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn array(name: impl Into<String>, items: FieldKind) -> Self {
        Self::new(name, FieldKind::Array(Box::new(items)))
    }

    pub fn object(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self::new(name, FieldKind::Object(fields))
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = self.kind.to_json_schema();
        if let (Some(description), Value::Object(map)) = (&self.description, &mut schema) {
            map.insert("description".into(), json!(description));
        }
        schema
    }
}

/// Declared input of a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Schema accepting any object.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Render as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        FieldKind::Object(self.fields.clone()).to_json_schema()
    }

    /// Check `input` against the schema.
    ///
    /// `null` is treated as an empty object. Unknown fields are ignored.
    /// Every offending field is reported in a single validation error.
    pub fn validate(&self, input: &Value) -> McpResult<()> {
        let empty = Map::new();
        let object = match input {
            Value::Null => &empty,
            Value::Object(object) => object,
            other => {
                return Err(McpError::validation(format!(
                    "Invalid arguments: expected object, got {}",
                    describe(other)
                )))
            }
        };

        let mut errors = Vec::new();
        check_fields(&self.fields, object, None, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(McpError::validation(format!(
                "Invalid arguments: {}",
                errors.join("; ")
            )))
        }
    }
}

fn render_fields(fields: &[FieldSpec]) -> (Map<String, Value>, Vec<String>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.clone(), field.to_json_schema());
        if field.required {
            required.push(field.name.clone());
        }
    }
    (properties, required)
}

fn check_fields(
    fields: &[FieldSpec],
    object: &Map<String, Value>,
    prefix: Option<&str>,
    errors: &mut Vec<String>,
) {
    for field in fields {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{}", field.name),
            None => field.name.clone(),
        };
        match object.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    errors.push(format!("{path}: required field missing"));
                }
            }
            Some(value) => field.kind.check(&path, value, errors),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Prompt arguments
// ============================================================================

/// Expected type of a prompt argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    String,
    Number,
    Boolean,
    Array,
}

impl ArgumentKind {
    fn as_str(&self) -> &'static str {
        match self {
            ArgumentKind::String => "string",
            ArgumentKind::Number => "number",
            ArgumentKind::Boolean => "boolean",
            ArgumentKind::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ArgumentKind::String => value.is_string(),
            ArgumentKind::Number => value.is_number(),
            ArgumentKind::Boolean => value.is_boolean(),
            ArgumentKind::Array => value.is_array(),
        }
    }
}

/// A declared prompt argument.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptArgument {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    /// Type check applied when the argument is present.
    pub kind: Option<ArgumentKind>,
}

impl PromptArgument {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: true,
            kind: None,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn of_kind(mut self, kind: ArgumentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub(crate) fn listing(&self) -> McpPromptArgument {
        McpPromptArgument {
            name: self.name.clone(),
            description: self.description.clone(),
            required: self.required,
        }
    }
}

/// Check prompt parameters against the declared arguments.
///
/// Reports the first offending argument.
pub fn validate_arguments(arguments: &[PromptArgument], params: &Value) -> McpResult<()> {
    let Some(object) = params.as_object() else {
        return Err(McpError::validation("Prompt parameters must be an object"));
    };

    for argument in arguments {
        match object.get(&argument.name) {
            None | Some(Value::Null) => {
                if argument.required {
                    return Err(McpError::validation(format!(
                        "Required argument '{}' is missing",
                        argument.name
                    )));
                }
            }
            Some(value) => {
                if let Some(kind) = argument.kind.filter(|k| !k.matches(value)) {
                    return Err(McpError::validation(format!(
                        "Argument '{}' must be a {}",
                        argument.name,
                        kind.as_str()
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_schema() -> InputSchema {
        InputSchema::new(vec![
            FieldSpec::string("title").describe("Post title"),
            FieldSpec::string("content"),
            FieldSpec::array("labels", FieldKind::String).optional(),
            FieldSpec::boolean("isDraft").optional(),
        ])
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = post_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["title"]["type"], "string");
        assert_eq!(schema["properties"]["title"]["description"], "Post title");
        assert_eq!(schema["properties"]["labels"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["title", "content"]));
    }

    #[test]
    fn test_empty_schema_has_no_required() {
        let schema = InputSchema::empty().to_json_schema();
        assert_eq!(schema, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_validate_accepts_valid_input() {
        let input = json!({"title": "t", "content": "c", "labels": ["a"], "extra": 1});
        assert!(post_schema().validate(&input).is_ok());
    }

    #[test]
    fn test_validate_reports_all_offending_fields() {
        let input = json!({"title": 5, "labels": ["a", 2]});
        let err = post_schema().validate(&input).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("title: expected string, got number"), "{msg}");
        assert!(msg.contains("content: required field missing"), "{msg}");
        assert!(msg.contains("labels[1]: expected string, got number"), "{msg}");
        assert_eq!(err.code(), crate::error::codes::INVALID_PARAMS);
    }

    #[test]
    fn test_validate_nested_objects() {
        let schema = InputSchema::new(vec![FieldSpec::array(
            "posts",
            FieldKind::Object(vec![FieldSpec::string("title"), FieldSpec::string("content")]),
        )]);

        let err = schema
            .validate(&json!({"posts": [{"title": "a", "content": "b"}, {"title": "c"}]}))
            .unwrap_err();
        assert!(err.to_string().contains("posts[1].content: required field missing"));
    }

    #[test]
    fn test_validate_null_and_non_object() {
        assert!(InputSchema::empty().validate(&Value::Null).is_ok());
        assert!(post_schema().validate(&Value::Null).is_err());
        assert!(InputSchema::empty().validate(&json!([1])).is_err());
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let schema = InputSchema::new(vec![FieldSpec::integer("n")]);
        assert!(schema.validate(&json!({"n": 3})).is_ok());
        assert!(schema.validate(&json!({"n": 3.5})).is_err());
    }

    #[test]
    fn test_prompt_arguments_must_be_object() {
        let args = [PromptArgument::required("topic")];
        let err = validate_arguments(&args, &json!("nope")).unwrap_err();
        assert_eq!(err.to_string(), "Prompt parameters must be an object");
    }

    #[test]
    fn test_prompt_required_argument_missing() {
        let args = [
            PromptArgument::required("topic"),
            PromptArgument::optional("tone"),
        ];
        let err = validate_arguments(&args, &json!({"tone": "casual"})).unwrap_err();
        assert_eq!(err.to_string(), "Required argument 'topic' is missing");
        assert!(validate_arguments(&args, &json!({"topic": "rust"})).is_ok());
    }

    #[test]
    fn test_prompt_argument_type_check() {
        let args = [
            PromptArgument::required("count").of_kind(ArgumentKind::Number),
            PromptArgument::optional("labels").of_kind(ArgumentKind::Array),
        ];
        let err = validate_arguments(&args, &json!({"count": "3"})).unwrap_err();
        assert_eq!(err.to_string(), "Argument 'count' must be a number");

        let err = validate_arguments(&args, &json!({"count": 3, "labels": "a"})).unwrap_err();
        assert_eq!(err.to_string(), "Argument 'labels' must be a array");
    }
}
