use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path, path::PathBuf};
use validator::{Validate, ValidationError};

use crate::discovery::DEFAULT_DISCOVERY_URL;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ConfigFile {
    pub location: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Pins the region so the CoreOS AMI is resolved at generation time.
    #[validate(custom = "validate_region")]
    pub region: Option<String>,

    /// Discovery service asked for a fresh etcd token. Read here rather than
    /// declared as a template parameter: the token is spliced into the
    /// cloud-init body before the template is built, and is surfaced as the
    /// `DiscoveryURL` output.
    #[serde(default = "default_discovery_url")]
    #[validate(url)]
    pub discovery_url: String,

    /// Pre-fetched token; skips the call to the discovery service.
    #[validate(custom = "validate_discovery_token")]
    pub discovery_token: Option<String>,

    #[validate(custom = "validate_cloud_init_file")]
    pub cloud_init: ConfigFile,

    #[validate(length(min = 1, max = 1024))]
    pub description: Option<String>,
}

fn default_discovery_url() -> String {
    String::from(DEFAULT_DISCOVERY_URL)
}

pub fn parse(path: &Path) -> Result<Config, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let config: Config = match serde_yaml::from_str(&contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    match config.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    return Ok(config);
}

fn validate_region(region: &str) -> Result<(), ValidationError> {
    let shape = Regex::new(r"^[a-z]{2}(-gov)?-[a-z]+-\d+$").map_err(|_| {
        ValidationError::new("Unable to compile the region pattern")
    })?;
    if !shape.is_match(region) {
        return Err(ValidationError::new(
            "The region has to look like `eu-west-1`",
        ));
    }

    return Ok(());
}

fn validate_discovery_token(token: &str) -> Result<(), ValidationError> {
    if token.trim().is_empty() || token.contains(char::is_whitespace) {
        return Err(ValidationError::new(
            "The discovery token has to be a single non-empty word",
        ));
    }

    return Ok(());
}

fn validate_cloud_init_file(cloud_init_file: &ConfigFile) -> Result<(), ValidationError> {
    if cloud_init_file.location.file_name().is_none() {
        return Err(ValidationError::new(
            "The cloud-init location has to name a file",
        ));
    }

    return Ok(());
}
