use crate::client::AggregationClient;
use crate::dto::{AggregateRow, AggregationRequest, ResponseEnvelope, decode_body};
use crate::errors::FetchError;
use reqwest::Url;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_AGGREGATION_PATH: &str = "/api/v1/resources/aggregate";

/// Aggregation client backed by the platform's REST API.
#[derive(Debug, Clone)]
pub struct HttpAggregationClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpAggregationClient {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, FetchError> {
        let base = Url::parse(base_url)
            .map_err(|e| FetchError::Transport(format!("invalid base url {base_url}: {e}")))?;
        let endpoint = base
            .join(path)
            .map_err(|e| FetchError::Transport(format!("invalid aggregation path {path}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

async fn fetch_rows(
    http: reqwest::Client,
    endpoint: Url,
    request: AggregationRequest,
) -> Result<Vec<AggregateRow>, FetchError> {
    let resp = http
        .get(endpoint)
        .query(&request)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    if !status.is_success() {
        let (code, message) = match serde_json::from_slice::<ResponseEnvelope>(&bytes) {
            Ok(ResponseEnvelope {
                error: Some(error), ..
            }) => (error.code, error.message),
            _ => (
                "HTTP_ERROR".to_string(),
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            ),
        };
        return Err(FetchError::Status {
            status: status.as_u16(),
            code,
            message,
        });
    }

    let body: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    decode_body(request.level, body)
}

impl AggregationClient for HttpAggregationClient {
    fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> impl Future<Output = Result<Vec<AggregateRow>, FetchError>> + Send {
        tracing::debug!(endpoint = %self.endpoint, level = %request.level, "aggregation request");
        fetch_rows(self.http.clone(), self.endpoint.clone(), request.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        let client = HttpAggregationClient::new(
            "http://localhost:8000",
            DEFAULT_AGGREGATION_PATH,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:8000/api/v1/resources/aggregate"
        );
    }

    #[test]
    fn test_invalid_base_url_is_transport_error() {
        let err = HttpAggregationClient::new("not a url", "/x", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
