use aws_config::meta::region::RegionProviderChain;
use aws_types::region::Region;
use tracing::info;

/// Largest template CloudFormation accepts inline as `TemplateBody`.
pub const MAX_TEMPLATE_BODY: usize = 51_200;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),

    #[error("Template is {0} bytes, above the 51200 byte inline limit")]
    TemplateTooLargeError(usize),
}

/// What CloudFormation reports back about an accepted template.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub description: Option<String>,
    pub parameters: Vec<String>,
}

pub struct Stack {
    client: aws_sdk_cloudformation::Client,
}

impl Stack {
    pub async fn new(region: Option<&str>) -> Self {
        let region_provider = RegionProviderChain::first_try(region.map(|r| Region::new(r.to_string())))
            .or_default_provider();

        let sdk_config = aws_config::from_env().region(region_provider).load().await;
        let client = aws_sdk_cloudformation::Client::new(&sdk_config);

        Self { client }
    }

    /// Submits the rendered template to `ValidateTemplate`.
    pub async fn validate(&self, template_body: &str) -> Result<Validation, Error> {
        check_size(template_body)?;
        info!(bytes = template_body.len(), "validating template with CloudFormation");

        let result = self
            .client
            .validate_template()
            .template_body(template_body)
            .send()
            .await;

        let result = match result {
            Ok(data) => data,
            Err(aws_sdk_cloudformation::types::SdkError::ServiceError { err, .. }) => {
                return Err(Error::ServiceError(err.to_string()));
            }
            Err(err) => return Err(Error::UnknownError(err.to_string())),
        };

        let parameters = result
            .parameters()
            .unwrap_or_else(|| &[])
            .iter()
            .filter_map(|parameter| parameter.parameter_key())
            .map(String::from)
            .collect();

        return Ok(Validation {
            description: result.description().map(String::from),
            parameters,
        });
    }
}

fn check_size(template_body: &str) -> Result<(), Error> {
    if template_body.len() > MAX_TEMPLATE_BODY {
        return Err(Error::TemplateTooLargeError(template_body.len()));
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::{check_size, Error, MAX_TEMPLATE_BODY};

    #[test]
    fn oversized_body_is_refused_locally() {
        let body = "x".repeat(MAX_TEMPLATE_BODY + 1);
        assert_eq!(
            Err(Error::TemplateTooLargeError(MAX_TEMPLATE_BODY + 1)),
            check_size(&body)
        );
        assert_eq!(Ok(()), check_size("{}"));
    }
}
