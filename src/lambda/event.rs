//! API Gateway proxy-integration payloads.
//!
//! Only the fields the adapter reads are modelled; unknown fields are
//! ignored on input.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Incoming proxy event.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    #[serde(default)]
    pub http_method: String,

    #[serde(default)]
    pub path: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,

    /// Every value of repeated headers; merged under `headers`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub multi_value_headers: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,

    #[serde(default)]
    pub body: Option<String>,

    /// The body is passed to handlers as received, still encoded.
    #[serde(default)]
    pub is_base64_encoded: bool,

    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

/// The subset of the request context the adapter uses.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Outgoing proxy response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,

    /// First value of each header.
    pub headers: HashMap<String, String>,

    /// All values of each header, in insertion order.
    pub multi_value_headers: HashMap<String, Vec<String>>,

    pub body: String,

    pub is_base64_encoded: bool,
}

/// API Gateway sends `null` instead of omitting empty maps.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
