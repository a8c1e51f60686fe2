use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Device identity error: {0}")]
    Identity(String),

    #[error("Twin request {request_id} failed with status {status}")]
    TwinStatus { request_id: String, status: u16 },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Hub connection closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Validation failure of an inbound direct method, reported back to the
/// caller as a response instead of tearing down the listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    #[error("Direct method {0} not defined")]
    UnknownMethod(String),

    #[error("Invalid parameter")]
    InvalidParameter,
}

impl MethodError {
    pub fn status(&self) -> u16 {
        match self {
            MethodError::UnknownMethod(_) => 404,
            MethodError::InvalidParameter => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_error_status() {
        assert_eq!(MethodError::InvalidParameter.status(), 400);
        assert_eq!(MethodError::UnknownMethod("Reboot".to_string()).status(), 404);
    }

    #[test]
    fn test_method_error_message() {
        assert_eq!(
            MethodError::UnknownMethod("Reboot".to_string()).to_string(),
            "Direct method Reboot not defined"
        );
        assert_eq!(MethodError::InvalidParameter.to_string(), "Invalid parameter");
    }
}
