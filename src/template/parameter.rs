use regex::Regex;
use serde_json::json;

use super::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Number,
    CommaDelimitedList,
    KeyPairName,
    /// Any other provider-specific type, e.g. `AWS::EC2::VPC::Id`.
    Other(String),
}

impl ParameterType {
    pub fn as_str(&self) -> &str {
        match self {
            ParameterType::String => "String",
            ParameterType::Number => "Number",
            ParameterType::CommaDelimitedList => "CommaDelimitedList",
            ParameterType::KeyPairName => "AWS::EC2::KeyPair::KeyName",
            ParameterType::Other(name) => name,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ParameterType::Number)
    }
}

/// A named, typed input to the template.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub description: Option<String>,
    pub default: Option<String>,
    pub allowed_values: Vec<String>,
    pub allowed_pattern: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub constraint_description: Option<String>,
    pub sensitive: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            description: None,
            default: None,
            allowed_values: Vec::new(),
            allowed_pattern: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            constraint_description: None,
            sensitive: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Number)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.allowed_pattern = Some(pattern.into());
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn constraint_description(mut self, description: impl Into<String>) -> Self {
        self.constraint_description = Some(description.into());
        self
    }

    /// Marks the parameter `NoEcho`.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidConstraintError {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn pattern(&self) -> Result<Option<Regex>, Error> {
        match &self.allowed_pattern {
            None => Ok(None),
            Some(pattern) => match Regex::new(&format!("^(?:{})$", pattern)) {
                Ok(regex) => Ok(Some(regex)),
                Err(error) => Err(self.invalid(format!("invalid AllowedPattern: {}", error))),
            },
        }
    }

    /// Checks that the constraints are consistent with each other and with
    /// the default value.
    pub fn validate(&self) -> Result<(), Error> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(self.invalid(format!("MinLength {} exceeds MaxLength {}", min, max)));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(self.invalid(format!("MinValue {} exceeds MaxValue {}", min, max)));
            }
        }

        let has_length_rules =
            self.min_length.is_some() || self.max_length.is_some() || self.allowed_pattern.is_some();
        if self.parameter_type.is_numeric() && has_length_rules {
            return Err(self.invalid("length and pattern constraints apply to string parameters only"));
        }
        let has_value_rules = self.min_value.is_some() || self.max_value.is_some();
        if !self.parameter_type.is_numeric() && has_value_rules {
            return Err(self.invalid("MinValue/MaxValue apply to Number parameters only"));
        }

        for (index, value) in self.allowed_values.iter().enumerate() {
            if self.allowed_values[..index].contains(value) {
                return Err(self.invalid("AllowedValues contains a duplicate entry"));
            }
        }

        if self.sensitive && !self.allowed_values.is_empty() {
            return Err(self.invalid("a NoEcho parameter cannot list AllowedValues"));
        }

        // Compile eagerly so a bad pattern fails even without a default.
        self.pattern()?;

        if let Some(default) = &self.default {
            if self.sensitive {
                return Err(self.invalid("a NoEcho parameter cannot carry a default value"));
            }
            if let Err(reason) = self.admits(default) {
                return Err(self.invalid(format!("default value {}", reason)));
            }
        }

        return Ok(());
    }

    /// Checks a candidate instantiation value against every constraint.
    ///
    /// The returned reason never contains the candidate itself when the
    /// parameter is sensitive.
    pub fn admits(&self, value: &str) -> Result<(), String> {
        let shown = if self.sensitive {
            String::from("(hidden)")
        } else {
            format!("`{}`", value)
        };

        if self.parameter_type.is_numeric() {
            let number = match value.trim().parse::<f64>() {
                Ok(number) if number.is_finite() => number,
                _ => return Err(format!("{} is not a number", shown)),
            };
            if let Some(min) = self.min_value {
                if number < min as f64 {
                    return Err(format!("{} is below MinValue {}", shown, min));
                }
            }
            if let Some(max) = self.max_value {
                if number > max as f64 {
                    return Err(format!("{} is above MaxValue {}", shown, max));
                }
            }
        } else {
            let length = value.chars().count();
            if let Some(min) = self.min_length {
                if length < min {
                    return Err(format!("{} is shorter than MinLength {}", shown, min));
                }
            }
            if let Some(max) = self.max_length {
                if length > max {
                    return Err(format!("{} is longer than MaxLength {}", shown, max));
                }
            }
            let pattern = self.pattern().map_err(|error| error.to_string())?;
            if let Some(pattern) = pattern {
                if !pattern.is_match(value) {
                    return Err(format!("{} does not match AllowedPattern", shown));
                }
            }
        }

        if !self.allowed_values.is_empty() && !self.allowed_values.iter().any(|v| v == value) {
            return Err(format!("{} is not one of AllowedValues", shown));
        }

        return Ok(());
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(String::from("Type"), json!(self.parameter_type.as_str()));
        if let Some(description) = &self.description {
            map.insert(String::from("Description"), json!(description));
        }
        if let Some(default) = &self.default {
            map.insert(String::from("Default"), json!(default));
        }
        if !self.allowed_values.is_empty() {
            map.insert(String::from("AllowedValues"), json!(self.allowed_values));
        }
        if let Some(pattern) = &self.allowed_pattern {
            map.insert(String::from("AllowedPattern"), json!(pattern));
        }
        if let Some(min) = self.min_length {
            map.insert(String::from("MinLength"), json!(min));
        }
        if let Some(max) = self.max_length {
            map.insert(String::from("MaxLength"), json!(max));
        }
        if let Some(min) = self.min_value {
            map.insert(String::from("MinValue"), json!(min));
        }
        if let Some(max) = self.max_value {
            map.insert(String::from("MaxValue"), json!(max));
        }
        if let Some(description) = &self.constraint_description {
            map.insert(String::from("ConstraintDescription"), json!(description));
        }
        if self.sensitive {
            map.insert(String::from("NoEcho"), json!(true));
        }
        serde_json::Value::Object(map)
    }
}
