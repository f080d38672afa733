use std::{fs, io, path::Path};

/// Marker in the cloud-init body replaced by the etcd discovery token.
pub const TOKEN_PLACEHOLDER: &str = "##ETCD_TOKEN##";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Placeholder ##ETCD_TOKEN## not found in {0}")]
    PlaceholderMissing(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

pub fn read(path: &Path) -> Result<String, Error> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }
}

/// Substitutes every occurrence of [`TOKEN_PLACEHOLDER`] in `body` with
/// `token`. A body without the placeholder is an error; `source` names the
/// body in that error.
pub fn render(body: &str, token: &str, source: &str) -> Result<String, Error> {
    if !body.contains(TOKEN_PLACEHOLDER) {
        return Err(Error::PlaceholderMissing(source.to_string()));
    }

    return Ok(body.replace(TOKEN_PLACEHOLDER, token));
}

pub fn load(path: &Path, token: &str) -> Result<String, Error> {
    let body = read(path)?;
    render(&body, token, &path.display().to_string())
}
