//! JSON schemas describing every accepted spec form of a registry

use serde_json::{Map, Value, json};

use super::{SpecParam, SpecRegistry, SpecType};

/// Alternative JSON schemas for the specs a registry accepts
///
/// Per registered name, up to three shapes are produced:
/// - the bare name, when no parameter is required
/// - `{name: value}`, when there is exactly one parameter or exactly one required one
/// - `{name: {param: value, ...}}`, when there is more than one parameter
///
/// `get_schema_target` overrides the parameter list inspected for a type.
pub fn build_schema_types<T>(
    registry: &SpecRegistry<T>,
    get_schema_target: Option<&dyn Fn(&SpecType<T>) -> Vec<SpecParam>>,
) -> Vec<Value> {
    let mut schemas = Vec::new();

    for (name, spec_type) in registry {
        let params: Vec<SpecParam> = match get_schema_target {
            Some(target) => target(spec_type),
            None => spec_type.parameters().to_vec(),
        };
        let required: Vec<&SpecParam> = params.iter().filter(|param| param.required).collect();

        if params.is_empty() || required.is_empty() {
            schemas.push(json!({ "type": "string", "const": name }));
        }

        let short = if params.len() == 1 {
            params.first()
        } else if required.len() == 1 {
            required.first().copied()
        } else {
            None
        };
        if let Some(param) = short {
            schemas.push(closed_object(name, param.schema.clone()));
        }

        if params.len() > 1 {
            let mut properties = Map::new();
            for param in &params {
                properties.insert(param.name.clone(), param.schema.clone());
            }
            let required_names: Vec<&str> = required.iter().map(|param| param.name.as_str()).collect();
            let params_schema = json!({
                "type": "object",
                "properties": properties,
                "required": required_names,
                "additionalProperties": false,
            });
            schemas.push(closed_object(name, params_schema));
        }
    }

    schemas
}

fn closed_object(key: &str, schema: Value) -> Value {
    let mut properties = Map::new();
    properties.insert(key.to_string(), schema);
    json!({
        "type": "object",
        "properties": properties,
        "required": [key],
        "additionalProperties": false,
    })
}
