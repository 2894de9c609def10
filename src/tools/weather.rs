use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::schema::{ToolSchema, TypeSpec};
use crate::tool::Tool;

use super::{invocation_error, required_f64, required_str};

const NAME: &str = "get_current_weather";
const UNITS: [&str; 2] = ["celsius", "fahrenheit"];

/// Current conditions from the open-meteo forecast API.
#[derive(Debug, Clone)]
pub struct CurrentWeather {
    http: reqwest::Client,
    endpoint: String,
}

impl CurrentWeather {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.open-meteo.com/v1/forecast";

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
impl Tool for CurrentWeather {
    fn schema(&self) -> Result<ToolSchema> {
        ToolSchema::builder(NAME)
            .description("Get the current weather in a given location.")
            .param::<f64>("latitude")
            .param::<f64>("longitude")
            .required("temperature_unit", TypeSpec::literal(UNITS))
            .returns(TypeSpec::of::<str>())
            .build()
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let latitude = required_f64(&arguments, "latitude", NAME)?;
        let longitude = required_f64(&arguments, "longitude", NAME)?;
        let unit = required_str(&arguments, "temperature_unit", NAME)?;
        if !UNITS.contains(&unit) {
            return Err(invocation_error(
                NAME,
                format!("`temperature_unit` must be one of {UNITS:?}, got `{unit}`"),
            ));
        }

        let body: Value = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("temperature_unit", unit.to_string()),
                ("current_weather", "true".to_string()),
            ])
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
