//! In-memory [`HubClient`] used by unit tests.

use super::HubClient;
use crate::errors::{Error, Result};
use crate::model::{Message, MethodRequest, MethodResponse, Twin, TwinPatch};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Records everything written to it. Method requests are fed through the
/// sender returned by [`FakeHub::new`]; dropping that sender makes
/// `receive_method_request` fail like a closed connection.
pub struct FakeHub {
    twin: Twin,
    requests: tokio::sync::Mutex<mpsc::UnboundedReceiver<MethodRequest>>,
    pub fail_sends: bool,
    pub messages: Mutex<Vec<Message>>,
    pub responses: Mutex<Vec<MethodResponse>>,
    pub patches: Mutex<Vec<TwinPatch>>,
    /// Interleaving of responses and patches, eg. "response:1", "patch"
    pub log: Mutex<Vec<String>>,
}

impl FakeHub {
    pub fn new(twin: Value) -> (Self, mpsc::UnboundedSender<MethodRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            twin: serde_json::from_value(twin).unwrap(),
            requests: tokio::sync::Mutex::new(rx),
            fail_sends: false,
            messages: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            patches: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        };
        (hub, tx)
    }

    pub fn patches(&self) -> Vec<TwinPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<MethodResponse> {
        self.responses.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl HubClient for FakeHub {
    async fn send_message(&self, message: Message) -> Result<()> {
        if self.fail_sends {
            return Err(Error::ChannelClosed);
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    async fn receive_method_request(&self) -> Result<MethodRequest> {
        self.requests
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::ChannelClosed)
    }

    async fn send_method_response(&self, response: MethodResponse) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("response:{}", response.request_id));
        self.responses.lock().unwrap().push(response);
        Ok(())
    }

    async fn get_twin(&self) -> Result<Twin> {
        Ok(self.twin.clone())
    }

    async fn patch_twin_reported_properties(&self, patch: TwinPatch) -> Result<()> {
        self.log.lock().unwrap().push("patch".to_string());
        self.patches.lock().unwrap().push(patch);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
