//! Baidu Maps geocoding web service (`geocoding/v3`).
use crate::diagnostics::Diagnostics;
use crate::error::GeocodeSheetError;
use crate::geocoding::Coordinates;
use crate::geocoding::GeocodeClient;
use crate::geocoding::GeocodeResult;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const BAIDU_GEOCODE_URL: &str = "https://api.map.baidu.com/geocoding/v3/";

/// Coordinate system requested from the service (GCJ-02)
pub const COORDINATE_TYPE: &str = "gcj02ll";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_STATUS: i64 = 0;
const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Deserialize)]
struct GeocodeResponse {
    status: Option<Value>,
    #[serde(alias = "msg")]
    message: Option<Value>,
    result: Option<ResponseResult>,
}

#[derive(Deserialize)]
struct ResponseResult {
    location: Option<Location>,
}

#[derive(Deserialize)]
struct Location {
    lng: Option<Value>,
    lat: Option<Value>,
}

/// What a response body says, before it is turned into a [`GeocodeResult`].
#[derive(Debug, PartialEq)]
enum Answer {
    Located(Coordinates),
    /// Non-success status with the provider's message
    Rejected(String),
    /// Body that cannot be understood
    Malformed(String),
}

/// Number or numeric string, as the service uses both.
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn classify(body: &str) -> Answer {
    let response: GeocodeResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => return Answer::Malformed(format!("invalid JSON response: {e}")),
    };

    let status = response.status.as_ref().and_then(as_i64);
    if status != Some(SUCCESS_STATUS) {
        let message = match response.message {
            Some(Value::String(text)) => text,
            Some(Value::Null) | None => UNKNOWN_ERROR.to_owned(),
            Some(other) => other.to_string(),
        };
        return Answer::Rejected(message);
    }

    let location = response.result.and_then(|result| result.location);
    let coordinates = location.and_then(|location| {
        let lng = location.lng.as_ref().and_then(as_f64)?;
        let lat = location.lat.as_ref().and_then(as_f64)?;
        Coordinates::new(lng, lat)
    });
    match coordinates {
        Some(coordinates) => Answer::Located(coordinates),
        None => Answer::Malformed("missing or invalid result.location".to_owned()),
    }
}

/// Blocking client for the Baidu geocoding API.
///
/// One GET per lookup, no retries. The body is classified whatever the HTTP
/// status, since the service reports rejections in its JSON.
pub struct BaiduGeocoder<'a> {
    client: Client,
    endpoint: Url,
    key: String,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> BaiduGeocoder<'a> {
    pub fn new(
        endpoint: Url,
        key: &str,
        timeout: Duration,
        diagnostics: &'a dyn Diagnostics,
    ) -> Result<BaiduGeocoder<'a>, GeocodeSheetError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(BaiduGeocoder {
            client,
            endpoint,
            key: key.to_owned(),
            diagnostics,
        })
    }

    fn fetch(&self, address: &str) -> Result<(StatusCode, String), reqwest::Error> {
        let params = [
            ("address", address),
            ("output", "json"),
            ("ak", self.key.as_str()),
            ("ret_coordtype", COORDINATE_TYPE),
        ];
        let response = self.client.get(self.endpoint.clone()).query(&params).send()?;
        let status = response.status();
        Ok((status, response.text()?))
    }
}

impl GeocodeClient for BaiduGeocoder<'_> {
    fn lookup(&self, address: &str) -> GeocodeResult {
        let (status, body) = match self.fetch(address) {
            Ok(response) => response,
            Err(e) => {
                self.diagnostics
                    .emit(&format!("Request error for '{address}': {e}"));
                return GeocodeResult::TransportError;
            }
        };
        log::trace!("Response for '{address}' ({status}): {body}");

        match classify(&body) {
            Answer::Located(coordinates) => GeocodeResult::Success(coordinates),
            Answer::Rejected(message) => {
                self.diagnostics
                    .emit(&format!("Geocoding failed for '{address}': {message}"));
                GeocodeResult::ApiError
            }
            Answer::Malformed(reason) if status.is_success() => {
                self.diagnostics
                    .emit(&format!("Request error for '{address}': {reason}"));
                GeocodeResult::TransportError
            }
            Answer::Malformed(reason) => {
                self.diagnostics
                    .emit(&format!("Request error for '{address}': HTTP {status}, {reason}"));
                GeocodeResult::TransportError
            }
        }
    }
}
