use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::schema::{ToolSchema, TypeSpec};
use crate::tool::Tool;

use super::invocation_error;

const NAME: &str = "get_current_location";

/// Looks up the caller's approximate coordinates from their public IP.
#[derive(Debug, Clone)]
pub struct CurrentLocation {
    http: reqwest::Client,
    endpoint: String,
}

impl CurrentLocation {
    pub const DEFAULT_ENDPOINT: &'static str = "http://ip-api.com/json?fields=lat,lon";

    pub fn new(timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| invocation_error(NAME, err))?;
        Ok(Self {
            http,
            endpoint: Self::DEFAULT_ENDPOINT.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Tool for CurrentLocation {
    fn schema(&self) -> Result<ToolSchema> {
        ToolSchema::builder(NAME)
            .description("Get the user's current location.")
            .returns(
                TypeSpec::of::<str>().describe("JSON string representing latitude and longitude"),
            )
            .build()
    }

    async fn call(&self, _arguments: Value) -> Result<Value> {
        let body: Value = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| invocation_error(NAME, err))?
            .json()
            .await
            .map_err(|err| invocation_error(NAME, err))?;
        Ok(json!(body.to_string()))
    }
}
