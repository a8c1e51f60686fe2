use crate::errors::{MethodError, Result};
use crate::hub::HubClient;
use crate::interval::SharedInterval;
use crate::metrics::{METHOD_REQUESTS_TOTAL, TWIN_PATCHES_TOTAL};
use crate::model::{MethodRequest, MethodResponse, TwinPatch};
use serde_json::Value;
use tracing::{info, warn};

pub const SET_TELEMETRY_INTERVAL: &str = "SetTelemetryInterval";

/// Direct methods this device understands, with their validated arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectMethod {
    SetTelemetryInterval(u64),
}

impl DirectMethod {
    pub fn parse(name: &str, payload: &Value) -> std::result::Result<Self, MethodError> {
        match name {
            SET_TELEMETRY_INTERVAL => parse_interval(payload)
                .map(DirectMethod::SetTelemetryInterval)
                .ok_or(MethodError::InvalidParameter),
            other => Err(MethodError::UnknownMethod(other.to_string())),
        }
    }
}

/// Accepts a JSON integer or a string holding one, eg. `10` or `"10"`.
fn parse_interval(payload: &Value) -> Option<u64> {
    match payload {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            s.strip_prefix('+').unwrap_or(s).parse().ok()
        }
        _ => None,
    }
}

/// Outcome of one dispatched request
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub response: MethodResponse,
    /// Reported properties to write once the response is out
    pub patch: Option<TwinPatch>,
}

pub fn dispatch(request: &MethodRequest, interval: &SharedInterval) -> Dispatch {
    match DirectMethod::parse(&request.name, &request.payload) {
        Ok(DirectMethod::SetTelemetryInterval(secs)) => {
            interval.set(secs);
            info!("Telemetry interval set to {}s", secs);
            Dispatch {
                response: MethodResponse::new(
                    &request.request_id,
                    200,
                    format!("Executed direct method {}", request.name),
                ),
                patch: Some(TwinPatch::telemetry_interval(secs)),
            }
        }
        Err(e) => {
            warn!("Rejected direct method {}: {}", request.name, e);
            Dispatch {
                response: MethodResponse::new(&request.request_id, e.status(), e.to_string()),
                patch: None,
            }
        }
    }
}

/// Serves direct methods one at a time until the hub connection fails.
pub async fn run_listener<H>(hub: &H, interval: &SharedInterval) -> Result<()>
where
    H: HubClient + ?Sized,
{
    info!("Starting direct method listener");

    loop {
        let request = hub.receive_method_request().await?;
        info!(
            "methodName = {}, payload = {}, rid = {}",
            request.name, request.payload, request.request_id
        );

        let Dispatch { response, patch } = dispatch(&request, interval);
        let status = response.status.to_string();
        METHOD_REQUESTS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
        hub.send_method_response(response).await?;

        if let Some(patch) = patch {
            hub.patch_twin_reported_properties(patch).await?;
            TWIN_PATCHES_TOTAL.inc();
        }
    }
}
