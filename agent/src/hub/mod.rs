pub mod mqtt;
pub mod sas;
pub mod topics;

#[cfg(test)]
pub mod fake;

use crate::errors::Result;
use crate::model::{Message, MethodRequest, MethodResponse, Twin, TwinPatch};
use async_trait::async_trait;

/// Device-side operations against the cloud hub.
///
/// Everything the agent does over the wire goes through this trait; the
/// MQTT implementation lives in [`mqtt::MqttHub`].
#[async_trait]
pub trait HubClient: Send + Sync {
    async fn send_message(&self, message: Message) -> Result<()>;

    /// Waits for the next direct method request. Only one caller at a time.
    async fn receive_method_request(&self) -> Result<MethodRequest>;

    async fn send_method_response(&self, response: MethodResponse) -> Result<()>;

    async fn get_twin(&self) -> Result<Twin>;

    async fn patch_twin_reported_properties(&self, patch: TwinPatch) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}
