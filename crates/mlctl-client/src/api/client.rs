use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use url::Url;

use super::error::{ApiErrorBody, ClientError};
use super::transport::Transport;
use crate::credentials::AccessToken;
use crate::schemas::PaginatedResult;

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => ClientError::ApiError {
                status,
                body: ApiErrorBody {
                    message: error.to_string(),
                    ..ApiErrorBody::default()
                },
            },
            None => ClientError::UnknownError(error.to_string()),
        }
    }
}

trait ResponseExt {
    fn map_to_mlctl_err(self) -> Result<reqwest::blocking::Response, ClientError>;
}

impl ResponseExt for reqwest::blocking::Response {
    fn map_to_mlctl_err(self) -> Result<reqwest::blocking::Response, ClientError> {
        if self.status().is_success() {
            return Ok(self);
        }
        match self.status() {
            reqwest::StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            reqwest::StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            reqwest::StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
            status => {
                let text = self
                    .text()
                    .map_err(|e| ClientError::UnknownError(e.to_string()))?;
                Err(ClientError::ApiError {
                    status,
                    body: ApiErrorBody::from_response_text(&text),
                })
            }
        }
    }
}

/// Blocking HTTP client for the management endpoint.
///
/// Every request is authenticated with a bearer token and carries the
/// `api-version` query parameter required by the service.
#[derive(Debug, Clone)]
pub struct Client {
    http_client: reqwest::blocking::Client,
    base_url: Url,
    token: AccessToken,
}

impl Client {
    pub fn new(base_url: Url, token: AccessToken) -> Self {
        Client {
            http_client: reqwest::blocking::Client::new(),
            base_url,
            token,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn req(
        &self,
        method: reqwest::Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        log::debug!("{method} {url}");
        let request_builder = self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.secret()));

        let request_builder = match body {
            Some(body) => request_builder.json(body),
            None => request_builder,
        };

        let response = request_builder.send()?.map_to_mlctl_err()?;
        let text = response.text()?;
        if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }

    /// Join the given resource path to the base URL and append the query.
    fn join(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api-version", api_version);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl Transport for Client {
    fn get(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ClientError> {
        let url = self.join(path, api_version, query)?;
        self.req(reqwest::Method::GET, url, None)
    }

    fn list(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Value>, ClientError> {
        let mut items = Vec::new();
        let mut next = Some(self.join(path, api_version, query)?);

        while let Some(url) = next.take() {
            let page: PaginatedResult<Value> =
                serde_json::from_value(self.req(reqwest::Method::GET, url, None)?)?;
            items.extend(page.value);
            next = page
                .next_link
                .map(|link| {
                    Url::parse(&link).map_err(|e| ClientError::InvalidUrl(format!("{link}: {e}")))
                })
                .transpose()?;
        }

        Ok(items)
    }

    fn put(&self, path: &str, api_version: &str, body: &Value) -> Result<Value, ClientError> {
        let url = self.join(path, api_version, &[])?;
        self.req(reqwest::Method::PUT, url, Some(body))
    }

    fn post(
        &self,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = self.join(path, api_version, &[])?;
        self.req(reqwest::Method::POST, url, body)
    }

    fn delete(&self, path: &str, api_version: &str) -> Result<(), ClientError> {
        let url = self.join(path, api_version, &[])?;
        self.req(reqwest::Method::DELETE, url, None).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_keeps_resource_path_and_appends_version() {
        let client = Client::new(
            Url::parse("https://management.example.com/").unwrap(),
            AccessToken::new("token"),
        );
        let url = client
            .join(
                "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/codes",
                "2020-09-01-preview",
                &[("$orderBy", "createdtime desc")],
            )
            .unwrap();

        assert_eq!(
            url.path(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/codes"
        );
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("api-version".to_string(), "2020-09-01-preview".to_string()),
                ("$orderBy".to_string(), "createdtime desc".to_string()),
            ]
        );
    }
}
