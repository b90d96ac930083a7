use async_trait::async_trait;
use serde_json::Value;

use crate::error::PipelineError;
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient};
use crate::services::route_api::{RawRoute, RouteApi};

const BASE_URL: &str = "http://aviation-edge.com/v2/public/routes";

/// Result limit per departure airport. Far above any real airport's
/// outbound route count, so responses are never truncated.
const ROUTE_LIMIT: u32 = 30_000;

/// [`RouteApi`] implementation backed by the aviation-edge routes endpoint.
///
/// The API key is appended as the `key` query parameter by the wrapped
/// [`UrlParam`] client, so it never appears in the URLs built here.
pub struct AviationEdgeClient<C> {
    client: C,
    base_url: String,
}

impl AviationEdgeClient<UrlParam<BasicClient>> {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: UrlParam::new(BasicClient::new(), "key", api_key),
            base_url: BASE_URL.to_string(),
        }
    }
}

impl<C: HttpClient> AviationEdgeClient<C> {
    pub fn with_client(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> RouteApi for AviationEdgeClient<C> {
    async fn outbound_routes(
        &self,
        depart_iata: &str,
    ) -> Result<Option<Vec<RawRoute>>, PipelineError> {
        let url = format!(
            "{}?departureIata={}&limit={}",
            self.base_url, depart_iata, ROUTE_LIMIT
        );
        let parsed = url
            .parse()
            .map_err(|e| PipelineError::malformed(depart_iata, format!("bad URL: {e}")))?;
        let req = reqwest::Request::new(reqwest::Method::GET, parsed);

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| PipelineError::transient(depart_iata, e.to_string()))?;

        // Probe the shape before typed deserialization: the service answers
        // with a JSON object (not a list) when it has no data for an airport.
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::transient(depart_iata, e.to_string()))?;

        match body {
            Value::Array(_) => {
                let routes: Vec<RawRoute> = serde_json::from_value(body)
                    .map_err(|e| PipelineError::malformed(depart_iata, e.to_string()))?;
                Ok(Some(routes))
            }
            _ => Ok(None),
        }
    }
}
