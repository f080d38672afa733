use tracing::info;

pub const DEFAULT_DISCOVERY_URL: &str = "https://discovery.etcd.io/new";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),

    #[error("Malformed discovery token: {0}")]
    MalformedTokenError(String),
}

/// Asks the discovery service for a fresh cluster token.
pub async fn fetch_token(url: &str) -> Result<String, Error> {
    info!(url, "requesting etcd discovery token");

    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(error) => return Err(Error::UnknownError(error.to_string())),
    };

    let status = response.status();
    if !status.is_success() {
        return Err(Error::ServiceError(format!("{} answered {}", url, status)));
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(error) => return Err(Error::UnknownError(error.to_string())),
    };

    parse_token(&body)
}

/// The service answers with the token URL followed by a newline.
pub fn parse_token(body: &str) -> Result<String, Error> {
    let token = body.trim();
    if token.is_empty() {
        return Err(Error::MalformedTokenError(String::from("empty response")));
    }
    if token.contains(char::is_whitespace) {
        return Err(Error::MalformedTokenError(String::from(
            "token spans more than one word",
        )));
    }

    return Ok(token.to_string());
}
