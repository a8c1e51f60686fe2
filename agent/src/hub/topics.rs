//! IoT Hub MQTT topic layout.
//!
//! Outbound topics are built here and inbound topics are classified here so
//! that the event loop only has to route the result.

use crate::model::Message;

pub const METHODS_SUBSCRIPTION: &str = "$iothub/methods/POST/#";
pub const TWIN_RESPONSES_SUBSCRIPTION: &str = "$iothub/twin/res/#";

const METHODS_PREFIX: &str = "$iothub/methods/POST/";
const TWIN_RESPONSE_PREFIX: &str = "$iothub/twin/res/";

/// Classified inbound publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    MethodRequest { name: String, request_id: String },
    TwinResponse { status: u16, request_id: String },
    Unknown,
}

pub fn telemetry_topic(device_id: &str, message: &Message) -> String {
    let mut bag = vec![
        format!("$.ct={}", urlencoding::encode(&message.content_type)),
        format!("$.ce={}", urlencoding::encode(&message.content_encoding)),
    ];
    bag.extend(
        message
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))),
    );

    format!("devices/{}/messages/events/{}", device_id, bag.join("&"))
}

pub fn method_response_topic(status: u16, request_id: &str) -> String {
    format!("$iothub/methods/res/{}/?$rid={}", status, request_id)
}

pub fn twin_get_topic(request_id: &str) -> String {
    format!("$iothub/twin/GET/?$rid={}", request_id)
}

pub fn twin_patch_reported_topic(request_id: &str) -> String {
    format!("$iothub/twin/PATCH/properties/reported/?$rid={}", request_id)
}

pub fn classify(topic: &str) -> Inbound {
    if let Some(rest) = topic.strip_prefix(METHODS_PREFIX) {
        let Some((name, query)) = rest.split_once("/?") else {
            return Inbound::Unknown;
        };
        return match request_id(query) {
            Some(request_id) if !name.is_empty() => Inbound::MethodRequest {
                name: name.to_string(),
                request_id,
            },
            _ => Inbound::Unknown,
        };
    }

    if let Some(rest) = topic.strip_prefix(TWIN_RESPONSE_PREFIX) {
        let Some((status, query)) = rest.split_once("/?") else {
            return Inbound::Unknown;
        };
        return match (status.parse::<u16>(), request_id(query)) {
            (Ok(status), Some(request_id)) => Inbound::TwinResponse { status, request_id },
            _ => Inbound::Unknown,
        };
    }

    Inbound::Unknown
}

fn request_id(query: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("$rid="))
        .filter(|rid| !rid.is_empty())
        .map(str::to_string)
}
