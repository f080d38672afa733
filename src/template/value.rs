use serde_json::json;

/// Values supplied by CloudFormation itself when the stack is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    Region,
    StackName,
    StackId,
    AccountId,
    NoValue,
}

impl Pseudo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pseudo::Region => "AWS::Region",
            Pseudo::StackName => "AWS::StackName",
            Pseudo::StackId => "AWS::StackId",
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::NoValue => "AWS::NoValue",
        }
    }
}

/// A late-bound pointer the provider resolves at instantiation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Parameter(String),
    Resource(String),
    Attribute { resource: String, attribute: String },
    Pseudo(Pseudo),
}

impl Reference {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Reference::Parameter(name) | Reference::Resource(name) => json!({ "Ref": name }),
            Reference::Attribute {
                resource,
                attribute,
            } => json!({ "Fn::GetAtt": [resource, attribute] }),
            Reference::Pseudo(pseudo) => json!({ "Ref": pseudo.as_str() }),
        }
    }
}

/// A declared entity a value depends on. Collected before a value is
/// accepted into the document so dangling names are caught at declare time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Parameter(&'a str),
    Resource(&'a str),
    Mapping(&'a str),
}

impl<'a> Target<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Target::Parameter(name) | Target::Resource(name) | Target::Mapping(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::Parameter(_) => "parameter",
            Target::Resource(_) => "resource",
            Target::Mapping(_) => "mapping",
        }
    }
}

/// A property value. Literals are emitted as-is; everything else becomes the
/// matching CloudFormation intrinsic function.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Bool(bool),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
    Ref(Reference),
    FindInMap {
        mapping: String,
        key: Box<Value>,
        attribute: String,
    },
    Join {
        delimiter: String,
        parts: Vec<Value>,
    },
    Select {
        index: usize,
        list: Box<Value>,
    },
    GetAZs(Box<Value>),
    Base64(Box<Value>),
}

impl Value {
    pub fn pseudo(pseudo: Pseudo) -> Self {
        Value::Ref(Reference::Pseudo(pseudo))
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn join<I, V>(delimiter: &str, parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Join {
            delimiter: delimiter.to_string(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn select(index: usize, list: Value) -> Self {
        Value::Select {
            index,
            list: Box::new(list),
        }
    }

    /// Availability zones of the stack's own region.
    pub fn azs() -> Self {
        Value::GetAZs(Box::new(Value::String(String::new())))
    }

    pub fn base64(value: impl Into<Value>) -> Self {
        Value::Base64(Box::new(value.into()))
    }

    /// Resource tag list in the `[{"Key": .., "Value": ..}]` shape.
    pub fn tags<I, K, V>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::List(
            tags.into_iter()
                .map(|(key, value)| {
                    Value::object([("Key", Value::String(key.into())), ("Value", value.into())])
                })
                .collect(),
        )
    }

    pub fn is_literal(&self) -> bool {
        match self {
            Value::String(_) | Value::Integer(_) | Value::Bool(_) => true,
            Value::List(items) => items.iter().all(Value::is_literal),
            Value::Object(entries) => entries.iter().all(|(_, value)| value.is_literal()),
            _ => false,
        }
    }

    /// Every declared entity this value points at, in traversal order.
    pub fn targets(&self) -> Vec<Target<'_>> {
        let mut targets = Vec::new();
        self.collect_targets(&mut targets);
        targets
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<Target<'a>>) {
        match self {
            Value::String(_) | Value::Integer(_) | Value::Bool(_) => {}
            Value::List(items) | Value::Join { parts: items, .. } => {
                for item in items {
                    item.collect_targets(out);
                }
            }
            Value::Object(entries) => {
                for (_, value) in entries {
                    value.collect_targets(out);
                }
            }
            Value::Ref(reference) => match reference {
                Reference::Parameter(name) => out.push(Target::Parameter(name)),
                Reference::Resource(name) => out.push(Target::Resource(name)),
                Reference::Attribute { resource, .. } => out.push(Target::Resource(resource)),
                Reference::Pseudo(_) => {}
            },
            Value::FindInMap { mapping, key, .. } => {
                out.push(Target::Mapping(mapping));
                key.collect_targets(out);
            }
            Value::Select { list: inner, .. }
            | Value::GetAZs(inner)
            | Value::Base64(inner) => inner.collect_targets(out),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(value) => json!(value),
            Value::Integer(value) => json!(value),
            Value::Bool(value) => json!(value),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(entries) => {
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                serde_json::Value::Object(map)
            }
            Value::Ref(reference) => reference.to_json(),
            Value::FindInMap {
                mapping,
                key,
                attribute,
            } => json!({ "Fn::FindInMap": [mapping, key.to_json(), attribute] }),
            Value::Join { delimiter, parts } => {
                let parts: Vec<serde_json::Value> = parts.iter().map(Value::to_json).collect();
                json!({ "Fn::Join": [delimiter, parts] })
            }
            Value::Select { index, list } => {
                json!({ "Fn::Select": [index.to_string(), list.to_json()] })
            }
            Value::GetAZs(region) => json!({ "Fn::GetAZs": region.to_json() }),
            Value::Base64(inner) => json!({ "Fn::Base64": inner.to_json() }),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        Value::Ref(reference)
    }
}

impl From<Pseudo> for Value {
    fn from(pseudo: Pseudo) -> Self {
        Value::pseudo(pseudo)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{Pseudo, Reference, Target, Value};

    #[test]
    fn references_render_as_intrinsics() {
        let value = Value::object([
            ("Vpc", Value::Ref(Reference::Resource(String::from("ioVPC")))),
            (
                "Dns",
                Value::Ref(Reference::Attribute {
                    resource: String::from("FrontHttpLB"),
                    attribute: String::from("DNSName"),
                }),
            ),
            ("Region", Value::pseudo(Pseudo::Region)),
        ]);

        assert_eq!(
            json!({
                "Vpc": { "Ref": "ioVPC" },
                "Dns": { "Fn::GetAtt": ["FrontHttpLB", "DNSName"] },
                "Region": { "Ref": "AWS::Region" }
            }),
            value.to_json()
        );
    }

    #[test]
    fn select_and_join_nest() {
        let zone = Value::select(1, Value::azs());
        let name = Value::join("-", [Value::pseudo(Pseudo::StackName), Value::from("vpc")]);

        assert_eq!(
            json!({ "Fn::Select": ["1", { "Fn::GetAZs": "" }] }),
            zone.to_json()
        );
        assert_eq!(
            json!({ "Fn::Join": ["-", [{ "Ref": "AWS::StackName" }, "vpc"]] }),
            name.to_json()
        );
    }

    #[test]
    fn collects_targets_through_nesting() {
        let value = Value::base64(Value::join(
            "",
            [
                Value::Ref(Reference::Parameter(String::from("KeyPair"))),
                Value::FindInMap {
                    mapping: String::from("RegionMap"),
                    key: Box::new(Value::pseudo(Pseudo::Region)),
                    attribute: String::from("AMI"),
                },
                Value::Ref(Reference::Attribute {
                    resource: String::from("Db"),
                    attribute: String::from("Endpoint.Address"),
                }),
            ],
        ));

        assert_eq!(
            vec![
                Target::Parameter("KeyPair"),
                Target::Mapping("RegionMap"),
                Target::Resource("Db"),
            ],
            value.targets()
        );
    }

    #[test]
    fn tags_keep_order() {
        let tags = Value::tags([("IoCluster", Value::pseudo(Pseudo::StackName)), ("Name", "x".into())]);
        assert_eq!(
            json!([
                { "Key": "IoCluster", "Value": { "Ref": "AWS::StackName" } },
                { "Key": "Name", "Value": "x" }
            ]),
            tags.to_json()
        );
        assert_eq!(false, tags.is_literal());
    }
}
