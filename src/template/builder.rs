use std::collections::HashMap;

use serde_json::json;
use tracing::debug;

use super::{
    Error, IngressRule, Mapping, Output, Parameter, Reference, Resource, Target, Value,
    SECURITY_GROUP,
};

const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Parameter,
    Mapping,
    Resource,
    Output,
}

impl Kind {
    fn of(target: &Target) -> Self {
        match target {
            Target::Parameter(_) => Kind::Parameter,
            Target::Resource(_) => Kind::Resource,
            Target::Mapping(_) => Kind::Mapping,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterHandle {
    name: String,
}

impl ParameterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> Value {
        Value::Ref(Reference::Parameter(self.name.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingHandle {
    name: String,
}

impl MappingHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    name: String,
}

impl ResourceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> Value {
        Value::Ref(Reference::Resource(self.name.clone()))
    }

    pub fn attribute(&self, attribute: &str) -> Value {
        Value::Ref(Reference::Attribute {
            resource: self.name.clone(),
            attribute: attribute.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputHandle {
    name: String,
}

impl OutputHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Accumulates one document. Entities keep their insertion order all the way
/// through rendering.
#[derive(Debug, Default)]
pub struct TemplateBuilder {
    description: Option<String>,
    names: HashMap<String, Kind>,
    parameters: Vec<Parameter>,
    mappings: Vec<Mapping>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    pub fn mapping(&self, name: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|mapping| mapping.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.name == name)
    }

    fn check_name(&self, name: &str) -> Result<(), Error> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConstraintError {
                name: name.to_string(),
                reason: String::from("logical names must be non-empty and alphanumeric"),
            });
        }
        if self.names.contains_key(name) {
            return Err(Error::DuplicateNameError(name.to_string()));
        }
        return Ok(());
    }

    fn first_unresolved<'a>(&self, value: &'a Value) -> Option<Target<'a>> {
        value
            .targets()
            .into_iter()
            .find(|target| self.names.get(target.name()) != Some(&Kind::of(target)))
    }

    fn check_references(&self, entity: &str, value: &Value) -> Result<(), Error> {
        match self.first_unresolved(value) {
            None => Ok(()),
            Some(target) => Err(Error::DanglingReferenceError {
                entity: entity.to_string(),
                kind: target.kind(),
                target: target.name().to_string(),
            }),
        }
    }

    pub fn declare_parameter(&mut self, parameter: Parameter) -> Result<ParameterHandle, Error> {
        self.check_name(&parameter.name)?;
        parameter.validate()?;

        debug!(name = %parameter.name, sensitive = parameter.sensitive, "declared parameter");
        let handle = ParameterHandle {
            name: parameter.name.clone(),
        };
        self.names.insert(parameter.name.clone(), Kind::Parameter);
        self.parameters.push(parameter);
        return Ok(handle);
    }

    pub fn declare_mapping(&mut self, mapping: Mapping) -> Result<MappingHandle, Error> {
        self.check_name(&mapping.name)?;
        mapping.validate()?;

        debug!(name = %mapping.name, keys = mapping.entries.len(), "declared mapping");
        let handle = MappingHandle {
            name: mapping.name.clone(),
        };
        self.names.insert(mapping.name.clone(), Kind::Mapping);
        self.mappings.push(mapping);
        return Ok(handle);
    }

    pub fn declare_resource(&mut self, mut resource: Resource) -> Result<ResourceHandle, Error> {
        self.check_name(&resource.name)?;
        resource.properties = resource
            .properties
            .into_iter()
            .map(|(key, value)| self.resolve(value).map(|value| (key, value)))
            .collect::<Result<_, Error>>()?;
        for (_, value) in &resource.properties {
            self.check_references(&resource.name, value)?;
        }
        for dependency in &resource.depends_on {
            if self.names.get(dependency) != Some(&Kind::Resource) {
                return Err(Error::DanglingReferenceError {
                    entity: resource.name.clone(),
                    kind: "resource",
                    target: dependency.clone(),
                });
            }
        }

        debug!(
            name = %resource.name,
            resource_type = %resource.resource_type,
            "declared resource"
        );
        let handle = ResourceHandle {
            name: resource.name.clone(),
        };
        self.names.insert(resource.name.clone(), Kind::Resource);
        self.resources.push(resource);
        return Ok(handle);
    }

    pub fn declare_output(&mut self, mut output: Output) -> Result<OutputHandle, Error> {
        self.check_name(&output.name)?;
        output.value = self.resolve(output.value)?;
        output.export = match output.export {
            Some(export) => Some(self.resolve(export)?),
            None => None,
        };
        for value in output.values() {
            self.check_references(&output.name, value)?;
            for target in value.targets() {
                if let Target::Parameter(name) = target {
                    if self.parameter(name).map_or(false, |p| p.sensitive) {
                        return Err(Error::SensitiveOutputError {
                            output: output.name.clone(),
                            parameter: name.to_string(),
                        });
                    }
                }
            }
        }

        debug!(name = %output.name, "declared output");
        let handle = OutputHandle {
            name: output.name.clone(),
        };
        self.names.insert(output.name.clone(), Kind::Output);
        self.outputs.push(output);
        return Ok(handle);
    }

    /// Looks `attribute` up in a declared mapping.
    ///
    /// A literal string key is resolved now and the table's literal returned.
    /// Any other key (a pseudo parameter or a declared parameter) is only
    /// known at instantiation time, so a deferred `Fn::FindInMap` is returned.
    pub fn find_in_map(
        &self,
        mapping: &MappingHandle,
        key: impl Into<Value>,
        attribute: &str,
    ) -> Result<Value, Error> {
        let table = self.mapping(&mapping.name).ok_or_else(|| Error::NotFoundError {
            kind: "mapping",
            name: mapping.name.clone(),
        })?;
        let key = key.into();
        self.check_references(&table.name, &key)?;
        return self.lookup(table, key, attribute);
    }

    fn lookup(&self, table: &Mapping, key: Value, attribute: &str) -> Result<Value, Error> {
        if let Value::String(literal) = &key {
            return match table.get(literal, attribute) {
                Some(value) => Ok(value.clone()),
                None => Err(Error::NotFoundError {
                    kind: "mapping entry",
                    name: format!("{}.{}.{}", table.name, literal, attribute),
                }),
            };
        }

        if !table.has_attribute_everywhere(attribute) {
            return Err(Error::NotFoundError {
                kind: "mapping attribute",
                name: format!("{}.*.{}", table.name, attribute),
            });
        }
        return Ok(Value::FindInMap {
            mapping: table.name.clone(),
            key: Box::new(key),
            attribute: attribute.to_string(),
        });
    }

    /// Rewrites every mapping lookup inside an incoming value the way
    /// `find_in_map` would, so a hand-built `Value::FindInMap` gets the same
    /// treatment. Lookups into undeclared mappings are left for the
    /// reference check to report.
    fn resolve(&self, value: Value) -> Result<Value, Error> {
        let resolved = match value {
            Value::FindInMap {
                mapping,
                key,
                attribute,
            } => {
                let key = self.resolve(*key)?;
                match self.mapping(&mapping) {
                    Some(table) => self.lookup(table, key, &attribute)?,
                    None => Value::FindInMap {
                        mapping,
                        key: Box::new(key),
                        attribute,
                    },
                }
            }
            Value::List(items) => Value::List(self.resolve_all(items)?),
            Value::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| self.resolve(value).map(|value| (key, value)))
                    .collect::<Result<_, Error>>()?,
            ),
            Value::Join { delimiter, parts } => Value::Join {
                delimiter,
                parts: self.resolve_all(parts)?,
            },
            Value::Select { index, list } => Value::Select {
                index,
                list: Box::new(self.resolve(*list)?),
            },
            Value::GetAZs(inner) => Value::GetAZs(Box::new(self.resolve(*inner)?)),
            Value::Base64(inner) => Value::Base64(Box::new(self.resolve(*inner)?)),
            literal_or_reference => literal_or_reference,
        };
        return Ok(resolved);
    }

    fn resolve_all(&self, values: Vec<Value>) -> Result<Vec<Value>, Error> {
        return values.into_iter().map(|value| self.resolve(value)).collect();
    }

    fn resource_index(&self, handle: &ResourceHandle) -> Result<usize, Error> {
        self.resources
            .iter()
            .position(|resource| resource.name == handle.name)
            .ok_or_else(|| Error::NotFoundError {
                kind: "resource",
                name: handle.name.clone(),
            })
    }

    fn check_appended(&self, resource: &str, value: &Value) -> Result<(), Error> {
        if value.targets().contains(&Target::Resource(resource)) {
            return Err(Error::CircularReferenceError(resource.to_string()));
        }
        self.check_references(resource, value)
    }

    /// Appends an inbound rule to a declared security group.
    pub fn add_ingress_rule(
        &mut self,
        security_group: &ResourceHandle,
        rule: IngressRule,
    ) -> Result<(), Error> {
        let index = self.resource_index(security_group)?;
        if self.resources[index].resource_type != SECURITY_GROUP {
            return Err(Error::NotFoundError {
                kind: "security group",
                name: security_group.name.clone(),
            });
        }
        let rule = self.resolve(rule.to_value())?;
        self.check_appended(&security_group.name, &rule)?;

        let resource = &mut self.resources[index];
        if let Some(existing) = resource.get_mut("SecurityGroupIngress") {
            match existing {
                Value::List(rules) => rules.push(rule),
                _ => {
                    return Err(Error::PropertyExistsError {
                        resource: security_group.name.clone(),
                        property: String::from("SecurityGroupIngress"),
                    })
                }
            }
        } else {
            resource
                .properties
                .push((String::from("SecurityGroupIngress"), Value::List(vec![rule])));
        }
        debug!(name = %security_group.name, "appended ingress rule");
        return Ok(());
    }

    /// Adds a property to a declared resource. Existing properties are never
    /// overwritten; a list value extends an existing list instead.
    pub fn add_resource_property(
        &mut self,
        resource: &ResourceHandle,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        let index = self.resource_index(resource)?;
        let value = self.resolve(value.into())?;
        self.check_appended(&resource.name, &value)?;

        let target = &mut self.resources[index];
        if let Some(existing) = target.get_mut(key) {
            match (existing, value) {
                (Value::List(existing), Value::List(items)) => existing.extend(items),
                _ => {
                    return Err(Error::PropertyExistsError {
                        resource: resource.name.clone(),
                        property: key.to_string(),
                    })
                }
            }
        } else {
            target.properties.push((key.to_string(), value));
        }
        debug!(name = %resource.name, property = key, "appended resource property");
        return Ok(());
    }

    fn verify(&self, entity: &str, value: &Value) -> Result<(), Error> {
        match self.first_unresolved(value) {
            None => Ok(()),
            Some(target) => Err(Error::UnresolvedReferenceError {
                entity: entity.to_string(),
                kind: target.kind(),
                target: target.name().to_string(),
            }),
        }
    }

    /// Builds the structured document. Sections with no entries are left out.
    pub fn to_json(&self) -> Result<serde_json::Value, Error> {
        let mut document = serde_json::Map::new();
        document.insert(
            String::from("AWSTemplateFormatVersion"),
            json!(FORMAT_VERSION),
        );
        if let Some(description) = &self.description {
            document.insert(String::from("Description"), json!(description));
        }

        if !self.parameters.is_empty() {
            let mut section = serde_json::Map::new();
            for parameter in &self.parameters {
                section.insert(parameter.name.clone(), parameter.to_json());
            }
            document.insert(String::from("Parameters"), serde_json::Value::Object(section));
        }

        if !self.mappings.is_empty() {
            let mut section = serde_json::Map::new();
            for mapping in &self.mappings {
                section.insert(mapping.name.clone(), mapping.to_json());
            }
            document.insert(String::from("Mappings"), serde_json::Value::Object(section));
        }

        if !self.resources.is_empty() {
            let mut section = serde_json::Map::new();
            for resource in &self.resources {
                for (_, value) in &resource.properties {
                    self.verify(&resource.name, value)?;
                }
                for dependency in &resource.depends_on {
                    self.verify(
                        &resource.name,
                        &Value::Ref(Reference::Resource(dependency.clone())),
                    )?;
                }
                section.insert(resource.name.clone(), resource.to_json());
            }
            document.insert(String::from("Resources"), serde_json::Value::Object(section));
        }

        if !self.outputs.is_empty() {
            let mut section = serde_json::Map::new();
            for output in &self.outputs {
                for value in output.values() {
                    self.verify(&output.name, value)?;
                }
                section.insert(output.name.clone(), output.to_json());
            }
            document.insert(String::from("Outputs"), serde_json::Value::Object(section));
        }

        return Ok(serde_json::Value::Object(document));
    }

    pub fn render(&self, format: Format) -> Result<String, Error> {
        let document = self.to_json()?;
        let rendered = match format {
            Format::Json => serde_json::to_string_pretty(&document)
                .map_err(|error| Error::SerializationError(error.to_string()))?,
            Format::Yaml => serde_yaml::to_string(&document)
                .map_err(|error| Error::SerializationError(error.to_string()))?,
        };
        return Ok(rendered);
    }

    pub fn serialize(&self) -> Result<String, Error> {
        self.render(Format::Json)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::TemplateBuilder;
    use crate::template::{
        Error, Format, IngressRule, IngressSource, Mapping, Output, Parameter, Pseudo, Resource,
        Value,
    };

    fn size_parameter() -> Parameter {
        Parameter::string("Size")
            .allowed_values(["small", "large", "huge"])
            .default_value("small")
    }

    #[test]
    fn duplicate_names_collide_across_kinds() {
        let mut builder = TemplateBuilder::new();
        builder.declare_parameter(size_parameter()).unwrap();

        let as_mapping = builder.declare_mapping(Mapping::new("Size").entry("a", [("b", "c")]));
        assert_eq!(Err(Error::DuplicateNameError(String::from("Size"))), as_mapping);

        let as_resource = builder.declare_resource(Resource::new("Size", "compute"));
        assert_eq!(Err(Error::DuplicateNameError(String::from("Size"))), as_resource);

        let as_output = builder.declare_output(Output::new("Size", "x"));
        assert_eq!(Err(Error::DuplicateNameError(String::from("Size"))), as_output);

        let as_parameter = builder.declare_parameter(Parameter::string("Size"));
        assert_eq!(Err(Error::DuplicateNameError(String::from("Size"))), as_parameter);
    }

    #[test]
    fn rejects_non_alphanumeric_names() {
        let mut builder = TemplateBuilder::new();
        let result = builder.declare_resource(Resource::new("io-vpc", "AWS::EC2::VPC"));
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::InvalidConstraintError { .. } => {}
            _ => panic!("Expected `InvalidConstraintError` error"),
        }
    }

    #[test]
    fn forward_references_are_dangling() {
        let mut builder = TemplateBuilder::new();
        let other = TemplateBuilder::new()
            .declare_resource(Resource::new("Vpc", "AWS::EC2::VPC"))
            .unwrap();
        let subnet = Resource::new("Subnet", "AWS::EC2::Subnet").property("VpcId", other.reference());

        let result = builder.declare_resource(subnet.clone());
        assert_eq!(
            Err(Error::DanglingReferenceError {
                entity: String::from("Subnet"),
                kind: "resource",
                target: String::from("Vpc"),
            }),
            result
        );
        // The failed declaration must not claim the name.
        assert_eq!(None, builder.resource("Subnet"));

        builder
            .declare_resource(Resource::new("Vpc", "AWS::EC2::VPC"))
            .unwrap();
        assert_eq!(true, builder.declare_resource(subnet).is_ok());
    }

    #[test]
    fn reference_kind_must_match() {
        let mut builder = TemplateBuilder::new();
        let size = builder.declare_parameter(size_parameter()).unwrap();
        let misused = Value::Ref(crate::template::Reference::Resource(size.name().to_string()));

        let result = builder.declare_resource(Resource::new("Box", "compute").property("size", misused));
        assert_eq!(true, result.is_err());
    }

    #[test]
    fn depends_on_must_be_declared() {
        let mut builder = TemplateBuilder::new();
        let result = builder.declare_resource(
            Resource::new("Lc", "AWS::AutoScaling::LaunchConfiguration").depends_on("ioGateway"),
        );
        match result.err().unwrap() {
            Error::DanglingReferenceError { target, .. } => assert_eq!("ioGateway", target),
            _ => panic!("Expected `DanglingReferenceError` error"),
        }
    }

    #[test]
    fn literal_mapping_lookup_is_resolved_now() {
        let mut builder = TemplateBuilder::new();
        let regions = builder
            .declare_mapping(Mapping::new("RegionMap").entry("us-east-1", [("AMI", "ami-xxxx")]))
            .unwrap();

        let ami = builder.find_in_map(&regions, "us-east-1", "AMI").unwrap();
        assert_eq!(Value::from("ami-xxxx"), ami);

        builder
            .declare_resource(Resource::new("Host", "AWS::EC2::Instance").property("ImageId", ami))
            .unwrap();
        let document = builder.to_json().unwrap();
        assert_eq!(
            json!("ami-xxxx"),
            document["Resources"]["Host"]["Properties"]["ImageId"]
        );
    }

    #[test]
    fn runtime_mapping_lookup_is_deferred() {
        let mut builder = TemplateBuilder::new();
        let regions = builder
            .declare_mapping(
                Mapping::new("RegionMap")
                    .entry("us-east-1", [("AMI", "ami-820ff0ea")])
                    .entry("eu-west-1", [("AMI", "ami-a73bf2d0")]),
            )
            .unwrap();

        let ami = builder
            .find_in_map(&regions, Value::pseudo(Pseudo::Region), "AMI")
            .unwrap();
        assert_eq!(
            json!({ "Fn::FindInMap": ["RegionMap", { "Ref": "AWS::Region" }, "AMI"] }),
            ami.to_json()
        );

        let missing = builder.find_in_map(&regions, Value::pseudo(Pseudo::Region), "Kernel");
        assert_eq!(true, missing.is_err());
        let unknown_key = builder.find_in_map(&regions, "mars-north-1", "AMI");
        assert_eq!(true, unknown_key.is_err());
    }

    #[test]
    fn hand_built_lookups_are_resolved_on_declare() {
        let mut builder = TemplateBuilder::new();
        builder
            .declare_mapping(Mapping::new("RegionMap").entry("us-east-1", [("AMI", "ami-xxxx")]))
            .unwrap();
        let lookup = |key: Value, attribute: &str| Value::FindInMap {
            mapping: String::from("RegionMap"),
            key: Box::new(key),
            attribute: attribute.to_string(),
        };

        let host = builder
            .declare_resource(
                Resource::new("Host", "AWS::EC2::Instance")
                    .property("ImageId", lookup("us-east-1".into(), "AMI"))
                    .property(
                        "UserData",
                        Value::base64(Value::join("", [lookup("us-east-1".into(), "AMI")])),
                    ),
            )
            .unwrap();
        let document = builder.to_json().unwrap();
        let properties = &document["Resources"]["Host"]["Properties"];
        assert_eq!(json!("ami-xxxx"), properties["ImageId"]);
        assert_eq!(
            json!({ "Fn::Base64": { "Fn::Join": ["", ["ami-xxxx"]] } }),
            properties["UserData"]
        );

        let bogus = builder.declare_resource(
            Resource::new("Bogus", "AWS::EC2::Instance")
                .property("ImageId", lookup("mars-1".into(), "Kernel")),
        );
        match bogus.err().unwrap() {
            Error::NotFoundError { kind, .. } => assert_eq!("mapping entry", kind),
            _ => panic!("Expected `NotFoundError` error"),
        }
        assert_eq!(None, builder.resource("Bogus"));

        let deferred_unknown = builder.add_resource_property(
            &host,
            "KernelId",
            lookup(Value::pseudo(Pseudo::Region), "Kernel"),
        );
        match deferred_unknown.err().unwrap() {
            Error::NotFoundError { kind, .. } => assert_eq!("mapping attribute", kind),
            _ => panic!("Expected `NotFoundError` error"),
        }

        builder
            .declare_output(Output::new("Ami", lookup("us-east-1".into(), "AMI")))
            .unwrap();
        let document = builder.to_json().unwrap();
        assert_eq!(json!("ami-xxxx"), document["Outputs"]["Ami"]["Value"]);
    }

    #[test]
    fn add_property_checks_target_and_references() {
        let mut builder = TemplateBuilder::new();
        let bucket = builder
            .declare_resource(Resource::new("Bucket", "AWS::S3::Bucket"))
            .unwrap();
        let stranger = TemplateBuilder::new()
            .declare_resource(Resource::new("Ghost", "AWS::S3::Bucket"))
            .unwrap();

        assert_eq!(
            Err(Error::NotFoundError {
                kind: "resource",
                name: String::from("Ghost"),
            }),
            builder.add_resource_property(&stranger, "AccessControl", "Private")
        );

        let dangling = builder.add_resource_property(
            &bucket,
            "LoggingConfiguration",
            Value::object([("DestinationBucketName", stranger.reference())]),
        );
        assert_eq!(
            Err(Error::DanglingReferenceError {
                entity: String::from("Bucket"),
                kind: "resource",
                target: String::from("Ghost"),
            }),
            dangling
        );

        let looped = builder.add_resource_property(&bucket, "Replica", bucket.attribute("Arn"));
        assert_eq!(Err(Error::CircularReferenceError(String::from("Bucket"))), looped);

        let document = builder.to_json().unwrap();
        assert_eq!(None, document["Resources"]["Bucket"].get("Properties"));
    }

    #[test]
    fn ingress_rules_append_in_order() {
        let mut builder = TemplateBuilder::new();
        let group = builder
            .declare_resource(Resource::new("publicSG", "AWS::EC2::SecurityGroup").property(
                "SecurityGroupIngress",
                Value::list([IngressRule::tcp(80, IngressSource::Cidr("0.0.0.0/0".into())).to_value()]),
            ))
            .unwrap();

        builder
            .add_ingress_rule(&group, IngressRule::tcp(443, IngressSource::Cidr("0.0.0.0/0".into())))
            .unwrap();

        let document = builder.to_json().unwrap();
        let rules = &document["Resources"]["publicSG"]["Properties"]["SecurityGroupIngress"];
        assert_eq!(json!("80"), rules[0]["FromPort"]);
        assert_eq!(json!("443"), rules[1]["FromPort"]);

        let looped = builder.add_ingress_rule(
            &group,
            IngressRule::tcp(22, IngressSource::SecurityGroup(group.reference())),
        );
        assert_eq!(Err(Error::CircularReferenceError(String::from("publicSG"))), looped);
    }

    #[test]
    fn ingress_needs_a_security_group() {
        let mut builder = TemplateBuilder::new();
        let vpc = builder
            .declare_resource(Resource::new("Vpc", "AWS::EC2::VPC"))
            .unwrap();
        let stranger = TemplateBuilder::new()
            .declare_resource(Resource::new("Ghost", "AWS::EC2::SecurityGroup"))
            .unwrap();
        let rule = IngressRule::tcp(22, IngressSource::Cidr("0.0.0.0/0".into()));

        match builder.add_ingress_rule(&stranger, rule.clone()).err().unwrap() {
            Error::NotFoundError { name, .. } => assert_eq!("Ghost", name),
            _ => panic!("Expected `NotFoundError` error"),
        }
        assert_eq!(true, builder.add_ingress_rule(&vpc, rule).is_err());
    }

    #[test]
    fn add_property_never_overwrites() {
        let mut builder = TemplateBuilder::new();
        let bucket = builder
            .declare_resource(
                Resource::new("Bucket", "AWS::S3::Bucket")
                    .property("Tags", Value::tags([("A", "1")])),
            )
            .unwrap();

        builder
            .add_resource_property(&bucket, "Tags", Value::tags([("B", "2")]))
            .unwrap();
        builder
            .add_resource_property(&bucket, "AccessControl", "Private")
            .unwrap();
        let clash = builder.add_resource_property(&bucket, "AccessControl", "PublicRead");
        assert_eq!(
            Err(Error::PropertyExistsError {
                resource: String::from("Bucket"),
                property: String::from("AccessControl"),
            }),
            clash
        );

        let document = builder.to_json().unwrap();
        assert_eq!(
            json!({
                "Type": "AWS::S3::Bucket",
                "Properties": {
                    "Tags": [
                        { "Key": "A", "Value": "1" },
                        { "Key": "B", "Value": "2" }
                    ],
                    "AccessControl": "Private"
                }
            }),
            document["Resources"]["Bucket"]
        );
    }

    #[test]
    fn outputs_must_resolve_and_hide_secrets() {
        let mut builder = TemplateBuilder::new();
        let password = builder
            .declare_parameter(Parameter::string("DBPassword").length(8, 41).sensitive())
            .unwrap();

        let dangling = builder.declare_output(Output::new(
            "Endpoint",
            Value::Ref(crate::template::Reference::Attribute {
                resource: String::from("Db"),
                attribute: String::from("Endpoint.Address"),
            }),
        ));
        assert_eq!(true, dangling.is_err());

        let leaked = builder.declare_output(Output::new("Password", password.reference()));
        assert_eq!(
            Err(Error::SensitiveOutputError {
                output: String::from("Password"),
                parameter: String::from("DBPassword"),
            }),
            leaked
        );
    }

    #[test]
    fn sensitive_parameter_renders_as_marker_only() {
        let mut builder = TemplateBuilder::new();
        let password = builder
            .declare_parameter(Parameter::string("DBPassword").length(8, 41).sensitive())
            .unwrap();
        builder
            .declare_resource(
                Resource::new("Db", "AWS::RDS::DBInstance")
                    .property("MasterUserPassword", password.reference()),
            )
            .unwrap();

        let document = builder.to_json().unwrap();
        assert_eq!(json!(true), document["Parameters"]["DBPassword"]["NoEcho"]);
        assert_eq!(None, document["Parameters"]["DBPassword"].get("Default"));
        assert_eq!(
            json!({ "Ref": "DBPassword" }),
            document["Resources"]["Db"]["Properties"]["MasterUserPassword"]
        );
    }

    fn build_box_document() -> TemplateBuilder {
        let mut builder = TemplateBuilder::new();
        let size = builder.declare_parameter(size_parameter()).unwrap();
        builder
            .declare_resource(Resource::new("Box", "compute").property("size", size.reference()))
            .unwrap();
        builder
    }

    #[test]
    fn end_to_end_box_document() {
        let rendered = build_box_document().serialize().unwrap();
        let document: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(
            json!({ "Ref": "Size" }),
            document["Resources"]["Box"]["Properties"]["size"]
        );
        assert_eq!(
            json!(["small", "large", "huge"]),
            document["Parameters"]["Size"]["AllowedValues"]
        );
        assert_eq!(json!("small"), document["Parameters"]["Size"]["Default"]);
    }

    #[test]
    fn serialization_is_deterministic() {
        let first = build_box_document().serialize().unwrap();
        let second = build_box_document().serialize().unwrap();
        assert_eq!(first, second);

        let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
        let sections: Vec<String> = match parsed {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            _ => panic!("Expected an object"),
        };
        assert_eq!(
            vec!["AWSTemplateFormatVersion", "Parameters", "Resources"],
            sections
        );
    }

    #[test]
    fn yaml_keeps_insertion_order() {
        let rendered = build_box_document().render(Format::Yaml).unwrap();
        let parameters = rendered.find("Parameters:").unwrap();
        let resources = rendered.find("Resources:").unwrap();
        assert_eq!(true, parameters < resources);
        assert_eq!(true, rendered.contains("Ref: Size"));
    }
}
