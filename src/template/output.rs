use serde_json::json;

use super::Value;

/// A value exposed once the stack exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
    pub export: Option<Value>,
}

impl Output {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
            export: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Publishes the value as a cross-stack export under `name`.
    pub fn export(mut self, name: impl Into<Value>) -> Self {
        self.export = Some(name.into());
        self
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        std::iter::once(&self.value).chain(self.export.iter())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        if let Some(description) = &self.description {
            map.insert(String::from("Description"), json!(description));
        }
        map.insert(String::from("Value"), self.value.to_json());
        if let Some(export) = &self.export {
            map.insert(String::from("Export"), json!({ "Name": export.to_json() }));
        }
        serde_json::Value::Object(map)
    }
}
