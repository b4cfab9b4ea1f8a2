//! Method registry: a fixed name → handler mapping built at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::MethodError;
use crate::types::ParamMap;

/// JSON type expected for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Boolean,
    Integer,
    Object,
    Array,
    Any,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
            ParamKind::Any => true,
        }
    }

    fn schema_type(self) -> Option<&'static str> {
        match self {
            ParamKind::String => Some("string"),
            ParamKind::Boolean => Some("boolean"),
            ParamKind::Integer => Some("integer"),
            ParamKind::Object => Some("object"),
            ParamKind::Array => Some("array"),
            ParamKind::Any => None,
        }
    }
}

/// One declared parameter. `default == None` means required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Describes a method's interface: parameters and result shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// Informal description of the result object.
    pub result: Value,
}

impl MethodDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            result: Value::Null,
        }
    }

    /// Declare a required parameter.
    pub fn required(mut self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            default: None,
        });
        self
    }

    /// Declare an optional parameter filled with `default` when absent.
    /// A `null` default leaves the parameter absent-as-null.
    pub fn optional(
        mut self,
        name: &str,
        kind: ParamKind,
        description: &str,
        default: Value,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            default: Some(default),
        });
        self
    }

    pub fn returns(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    /// JSON Schema for the parameter object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut prop = Map::new();
            if let Some(ty) = p.kind.schema_type() {
                prop.insert("type".into(), json!(ty));
            }
            prop.insert("description".into(), json!(p.description));
            if let Some(default) = p.default.as_ref().filter(|d| !d.is_null()) {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(p.name.clone(), Value::Object(prop));
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Normalize raw params: must be an object (or null), required names
    /// present, declared types respected, defaults filled.
    pub fn prepare(&self, raw: Value) -> Result<Params, MethodError> {
        let mut map = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(MethodError::invalid_params("params must be an object")),
        };
        for param in &self.params {
            let well_typed = map
                .get(&param.name)
                .filter(|v| !v.is_null())
                .map(|v| param.kind.accepts(v));
            match well_typed {
                None => match &param.default {
                    None => {
                        return Err(MethodError::invalid_params(format!(
                            "missing required parameter '{}'",
                            param.name
                        )))
                    }
                    Some(Value::Null) => {
                        map.remove(&param.name);
                    }
                    Some(default) => {
                        map.insert(param.name.clone(), default.clone());
                    }
                },
                Some(false) => {
                    return Err(MethodError::invalid_params(format!(
                        "parameter '{}' must be of type {:?}",
                        param.name, param.kind
                    )))
                }
                Some(true) => {}
            }
        }
        Ok(Params(map))
    }
}

impl fmt::Display for MethodDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

/// A validated parameter object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(ParamMap);

impl Params {
    pub fn new(map: ParamMap) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// A string parameter that must be present.
    pub fn str(&self, name: &str) -> Result<&str, MethodError> {
        self.opt_str(name)?
            .ok_or_else(|| MethodError::invalid_params(format!("missing '{name}' field")))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, MethodError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(MethodError::invalid_params(format!("'{name}' must be a string"))),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, MethodError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(MethodError::invalid_params(format!("'{name}' must be a boolean"))),
        }
    }

    pub fn opt_object(&self, name: &str) -> Result<Option<&ParamMap>, MethodError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(obj)) => Ok(Some(obj)),
            Some(_) => Err(MethodError::invalid_params(format!("'{name}' must be an object"))),
        }
    }

    /// A list of strings; absent means empty.
    pub fn str_list(&self, name: &str) -> Result<Vec<String>, MethodError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        MethodError::invalid_params(format!("'{name}' must contain only strings"))
                    })
                })
                .collect(),
            Some(_) => Err(MethodError::invalid_params(format!("'{name}' must be an array"))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A named method. Handlers are object-safe, Send + Sync, and async.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Returns the method's definition (name, params, result shape).
    fn definition(&self) -> MethodDefinition;

    /// Run the method. Params have already been validated against the
    /// definition.
    async fn call(&self, params: Params) -> Result<Value, MethodError>;
}

/// Receives any method name the registry does not know.
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, MethodError>;
}

struct Entry {
    definition: MethodDefinition,
    handler: Arc<dyn MethodHandler>,
}

/// Maps method names to handlers. Built once; shared immutably afterwards.
pub struct MethodRegistry {
    methods: HashMap<String, Entry>,
    order: Vec<String>,
    fallback: Option<Arc<dyn FallbackHandler>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            order: Vec::new(),
            fallback: None,
        }
    }

    /// Register a handler. Returns error if the name is already registered.
    pub fn register(&mut self, handler: impl MethodHandler + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn MethodHandler>) -> Result<(), RegistryError> {
        let definition = handler.definition();
        if self.methods.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateName(definition.name));
        }
        self.order.push(definition.name.clone());
        self.methods
            .insert(definition.name.clone(), Entry { definition, handler });
        Ok(())
    }

    /// Install the handler used for unknown method names.
    pub fn set_fallback(&mut self, fallback: impl FallbackHandler + 'static) {
        self.fallback = Some(Arc::new(fallback));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Definitions in registration order.
    pub fn list(&self) -> Vec<MethodDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.methods.get(name))
            .map(|e| e.definition.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Validate params and run the named method.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, MethodError> {
        match self.methods.get(method) {
            Some(entry) => {
                let params = entry.definition.prepare(params)?;
                entry.handler.call(params).await
            }
            None => match &self.fallback {
                Some(fallback) => fallback.call(method, params).await,
                None => Err(MethodError::MethodNotFound(method.to_string())),
            },
        }
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Method with name '{0}' is already registered")]
    DuplicateName(String),
}
