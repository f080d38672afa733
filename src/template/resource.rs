use serde_json::json;

use super::Value;

pub const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
            DeletionPolicy::Snapshot => "Snapshot",
        }
    }
}

/// A typed resource declaration with an insertion-ordered property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub resource_type: String,
    pub properties: Vec<(String, Value)>,
    pub depends_on: Vec<String>,
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            properties: Vec::new(),
            depends_on: Vec::new(),
            deletion_policy: None,
        }
    }

    /// Sets a property, replacing an earlier value for the same key in place.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((key, value)),
        }
        self
    }

    pub fn depends_on(mut self, resource: impl Into<String>) -> Self {
        self.depends_on.push(resource.into());
        self
    }

    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.properties
            .iter_mut()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(String::from("Type"), json!(self.resource_type));
        match self.depends_on.as_slice() {
            [] => {}
            [single] => {
                map.insert(String::from("DependsOn"), json!(single));
            }
            many => {
                map.insert(String::from("DependsOn"), json!(many));
            }
        }
        if let Some(policy) = self.deletion_policy {
            map.insert(String::from("DeletionPolicy"), json!(policy.as_str()));
        }
        if !self.properties.is_empty() {
            let mut properties = serde_json::Map::new();
            for (key, value) in &self.properties {
                properties.insert(key.clone(), value.to_json());
            }
            map.insert(
                String::from("Properties"),
                serde_json::Value::Object(properties),
            );
        }
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngressSource {
    Cidr(Value),
    SecurityGroup(Value),
}

/// One inbound rule of a security group.
#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    pub protocol: String,
    pub from_port: i64,
    pub to_port: i64,
    pub source: IngressSource,
}

impl IngressRule {
    pub fn new(protocol: &str, from_port: i64, to_port: i64, source: IngressSource) -> Self {
        Self {
            protocol: protocol.to_string(),
            from_port,
            to_port,
            source,
        }
    }

    pub fn tcp(port: i64, source: IngressSource) -> Self {
        Self::new("tcp", port, port, source)
    }

    /// Rule properties in the order CloudFormation documents them. Shared by
    /// inline `SecurityGroupIngress` entries and standalone ingress resources.
    pub fn fields(&self) -> Vec<(String, Value)> {
        let source = match &self.source {
            IngressSource::Cidr(cidr) => ("CidrIp", cidr.clone()),
            IngressSource::SecurityGroup(group) => ("SourceSecurityGroupId", group.clone()),
        };
        vec![
            (String::from("IpProtocol"), Value::from(self.protocol.as_str())),
            (String::from("FromPort"), Value::from(self.from_port.to_string())),
            (String::from("ToPort"), Value::from(self.to_port.to_string())),
            (source.0.to_string(), source.1),
        ]
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields())
    }
}
