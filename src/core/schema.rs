/// Schema Builder (spec §4.1).
///
/// Pure derivation from a tool's `ParameterDescriptor` list to a JSON
/// Schema object. No I/O, no handler involvement — this is what keeps
/// `ToolDescriptor::input_schema` byte-identical for identical parameters.
use serde_json::{json, Map, Value};

/// The declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
    Object,
}

/// Metadata for a single tool parameter (spec §3).
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub default_value: Option<String>,
    pub pattern: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub enum_values: Option<Vec<String>>,
    pub example: Option<String>,
    pub description: String,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default_value: None,
            pattern: None,
            min: None,
            max: None,
            enum_values: None,
            example: None,
            description: String::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn enum_values(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Satisfied without the caller providing it: a non-empty default
    /// makes an otherwise-required parameter effectively optional (spec §3).
    pub fn implicitly_satisfied(&self) -> bool {
        self.default_value
            .as_ref()
            .is_some_and(|d| !d.is_empty())
    }

    /// Per-parameter JSON Schema fragment (spec §4.1).
    fn schema_fragment(&self) -> Value {
        let mut obj = Map::new();
        match self.param_type {
            ParameterType::String => {
                obj.insert("type".to_string(), json!("string"));
                if let Some(p) = &self.pattern {
                    obj.insert("pattern".to_string(), json!(p));
                }
                if let Some(values) = &self.enum_values {
                    if !values.is_empty() {
                        obj.insert("enum".to_string(), json!(values));
                    }
                }
            }
            ParameterType::Integer | ParameterType::Long => {
                obj.insert("type".to_string(), json!("integer"));
                if let Some(min) = self.min {
                    if min.is_finite() {
                        obj.insert("minimum".to_string(), json!(min));
                    }
                }
                if let Some(max) = self.max {
                    if max.is_finite() {
                        obj.insert("maximum".to_string(), json!(max));
                    }
                }
            }
            ParameterType::Double => {
                obj.insert("type".to_string(), json!("number"));
                if let Some(min) = self.min {
                    if min.is_finite() {
                        obj.insert("minimum".to_string(), json!(min));
                    }
                }
                if let Some(max) = self.max {
                    if max.is_finite() {
                        obj.insert("maximum".to_string(), json!(max));
                    }
                }
            }
            ParameterType::Boolean => {
                obj.insert("type".to_string(), json!("boolean"));
            }
            ParameterType::Object => {
                obj.insert("type".to_string(), json!("object"));
            }
        }
        obj.insert("description".to_string(), json!(self.description));
        Value::Object(obj)
    }
}

/// Build the `{type: "object", properties, required, additionalProperties: false}`
/// input schema for a tool from its ordered parameter list (spec §4.1).
pub fn build_schema(parameters: &[ParameterDescriptor]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in parameters {
        properties.insert(param.name.clone(), param.schema_fragment());
        if param.required && !param.implicitly_satisfied() {
            required.push(param.name.clone());
        }
    }

    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_param_with_pattern_and_enum() {
        let p = ParameterDescriptor::new("color", ParameterType::String)
            .required(true)
            .pattern("^#[0-9a-f]{6}$")
            .enum_values(vec!["#ff0000".into(), "#00ff00".into()])
            .description("a color");
        let schema = build_schema(&[p]);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["color"]["type"], "string");
        assert_eq!(schema["properties"]["color"]["pattern"], "^#[0-9a-f]{6}$");
        assert_eq!(schema["properties"]["color"]["enum"][0], "#ff0000");
        assert_eq!(schema["required"][0], "color");
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn numeric_param_omits_infinite_bounds() {
        let p = ParameterDescriptor::new("x", ParameterType::Double)
            .min(0.0)
            .max(f64::INFINITY);
        let schema = build_schema(&[p]);
        assert_eq!(schema["properties"]["x"]["minimum"], 0.0);
        assert!(schema["properties"]["x"].get("maximum").is_none());
    }

    #[test]
    fn required_with_default_is_not_listed_required() {
        let p = ParameterDescriptor::new("greeting", ParameterType::String)
            .required(true)
            .default_value("hello");
        let schema = build_schema(&[p]);
        let required = schema["required"].as_array().unwrap();
        assert!(required.is_empty());
    }

    #[test]
    fn zero_parameters_yields_empty_schema() {
        let schema = build_schema(&[]);
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["required"], json!([]));
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn schema_build_is_pure_and_deterministic() {
        let p = ParameterDescriptor::new("text", ParameterType::String).required(true);
        let a = build_schema(&[p.clone()]);
        let b = build_schema(std::slice::from_ref(&p));
        assert_eq!(a, b);
    }
}
