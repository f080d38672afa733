use super::{Error, Value};

/// A two-level lookup table: top-level key -> attribute -> literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub name: String,
    pub entries: Vec<(String, Vec<(String, Value)>)>,
}

impl Mapping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn entry<I, K, V>(mut self, key: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(attribute, value)| (attribute.into(), value.into()))
            .collect();
        self.entries.push((key.into(), attributes));
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidConstraintError {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.entries.is_empty() {
            return Err(self.invalid("mapping has no entries"));
        }
        for (index, (key, attributes)) in self.entries.iter().enumerate() {
            if self.entries[..index].iter().any(|(seen, _)| seen == key) {
                return Err(self.invalid(format!("duplicate key `{}`", key)));
            }
            if attributes.is_empty() {
                return Err(self.invalid(format!("key `{}` has no attributes", key)));
            }
            for (position, (attribute, value)) in attributes.iter().enumerate() {
                if attributes[..position].iter().any(|(seen, _)| seen == attribute) {
                    return Err(self.invalid(format!(
                        "duplicate attribute `{}` under `{}`",
                        attribute, key
                    )));
                }
                if !value.is_literal() {
                    return Err(self.invalid(format!(
                        "`{}.{}` must be a literal value",
                        key, attribute
                    )));
                }
            }
        }
        return Ok(());
    }

    pub fn get(&self, key: &str, attribute: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .and_then(|(_, attributes)| {
                attributes
                    .iter()
                    .find(|(candidate, _)| candidate == attribute)
                    .map(|(_, value)| value)
            })
    }

    /// True when every top-level key carries `attribute`, so a lookup
    /// deferred to instantiation time cannot miss.
    pub fn has_attribute_everywhere(&self, attribute: &str) -> bool {
        self.entries.iter().all(|(_, attributes)| {
            attributes
                .iter()
                .any(|(candidate, _)| candidate == attribute)
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, attributes) in &self.entries {
            let mut inner = serde_json::Map::new();
            for (attribute, value) in attributes {
                inner.insert(attribute.clone(), value.to_json());
            }
            map.insert(key.clone(), serde_json::Value::Object(inner));
        }
        serde_json::Value::Object(map)
    }
}
