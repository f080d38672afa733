//! In-memory CloudFormation document.
//!
//! Entities are declared once, in a single pass, and every reference must
//! point at something declared earlier. Values the provider resolves at
//! instantiation time (parameters, resource ids, attributes, pseudo
//! parameters) stay references in the rendered document; mapping lookups with
//! a literal key are resolved here.

mod builder;
mod mapping;
mod output;
mod parameter;
mod resource;
mod value;

pub use builder::{
    Format, MappingHandle, OutputHandle, ParameterHandle, ResourceHandle, TemplateBuilder,
};
pub use mapping::Mapping;
pub use output::Output;
pub use parameter::{Parameter, ParameterType};
pub use resource::{DeletionPolicy, IngressRule, IngressSource, Resource, SECURITY_GROUP};
pub use value::{Pseudo, Reference, Target, Value};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Name `{0}` is already declared")]
    DuplicateNameError(String),

    #[error("Invalid constraint on `{name}`: {reason}")]
    InvalidConstraintError { name: String, reason: String },

    #[error("`{entity}` references undeclared {kind} `{target}`")]
    DanglingReferenceError {
        entity: String,
        kind: &'static str,
        target: String,
    },

    #[error("No {kind} named `{name}`")]
    NotFoundError { kind: &'static str, name: String },

    #[error("`{entity}` holds an unresolved reference to {kind} `{target}`")]
    UnresolvedReferenceError {
        entity: String,
        kind: &'static str,
        target: String,
    },

    #[error("Property `{property}` is already set on `{resource}`")]
    PropertyExistsError { resource: String, property: String },

    #[error("`{0}` cannot reference itself")]
    CircularReferenceError(String),

    #[error("Output `{output}` would expose NoEcho parameter `{parameter}`")]
    SensitiveOutputError { output: String, parameter: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
