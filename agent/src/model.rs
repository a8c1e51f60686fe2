use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_ENCODING_UTF8: &str = "utf-8";

/// One synthetic sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Device-to-cloud message with its system and application properties
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_encoding: String,
    pub properties: Vec<(String, String)>,
}

impl Message {
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self {
            body: serde_json::to_vec(value)?,
            content_type: CONTENT_TYPE_JSON.to_string(),
            content_encoding: CONTENT_ENCODING_UTF8.to_string(),
            properties: Vec::new(),
        })
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    #[cfg(test)]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Direct method invocation received from the hub
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRequest {
    pub request_id: String,
    pub name: String,
    pub payload: Value,
}

/// Reply to exactly one [`MethodRequest`], matched by `request_id`
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResponse {
    pub request_id: String,
    pub status: u16,
    pub payload: Value,
}

impl MethodResponse {
    pub fn new(request_id: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            payload: json!({ "Response": message.into() }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportedProperties {
    #[serde(rename = "telemetryInterval")]
    pub telemetry_interval: Option<u64>,
    #[serde(rename = "nodeId")]
    pub node_id: Option<String>,
}

/// Device twin as returned by the hub. Only the reported keys the agent owns
/// are read; `desired`, `$version` and the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Twin {
    #[serde(default)]
    pub reported: ReportedProperties,
}

/// Partial update merged into the twin's reported section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TwinPatch {
    #[serde(rename = "telemetryInterval", skip_serializing_if = "Option::is_none")]
    pub telemetry_interval: Option<u64>,
    #[serde(rename = "nodeId", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl TwinPatch {
    pub fn telemetry_interval(secs: u64) -> Self {
        Self {
            telemetry_interval: Some(secs),
            ..Default::default()
        }
    }

    pub fn node_id(id: impl Into<String>) -> Self {
        Self {
            node_id: Some(id.into()),
            ..Default::default()
        }
    }
}
