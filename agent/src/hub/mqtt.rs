use super::sas::generate_sas_token;
use super::topics::{self, Inbound};
use super::HubClient;
use crate::config::{ConnectionString, Credential};
use crate::errors::{Error, Result};
use crate::model::{Message, MethodRequest, MethodResponse, Twin, TwinPatch};
use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const API_VERSION: &str = "2021-04-12";
const REQUEST_CAPACITY: usize = 64;
const MAX_PACKET_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct HubOptions {
    pub connection: ConnectionString,
    pub port: u16,
    pub tls: bool,
    pub keep_alive: Duration,
    pub sas_ttl: Duration,
}

#[derive(Debug)]
struct TwinReply {
    status: u16,
    body: Vec<u8>,
}

#[derive(Default)]
struct PendingTwinRequests(Mutex<HashMap<String, oneshot::Sender<TwinReply>>>);

impl PendingTwinRequests {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<TwinReply>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// IoT Hub device client over MQTT 3.1.1
pub struct MqttHub {
    client: AsyncClient,
    device_id: String,
    pending: Arc<PendingTwinRequests>,
    methods: tokio::sync::Mutex<mpsc::UnboundedReceiver<MethodRequest>>,
    eventloop: JoinHandle<()>,
}

impl MqttHub {
    /// Connects and subscribes to the method and twin response topics.
    /// Returns once the hub has accepted the connection.
    pub async fn connect(options: HubOptions) -> Result<Self> {
        let HubOptions {
            connection,
            port,
            tls,
            keep_alive,
            sas_ttl,
        } = options;

        info!(
            "Connecting to IoT hub at {}:{} as {}",
            connection.host_name, port, connection.device_id
        );

        let password = match &connection.credential {
            Credential::SharedAccessSignature(token) => token.clone(),
            Credential::SharedAccessKey(key) => {
                let expiry = Utc::now().timestamp() + sas_ttl.as_secs() as i64;
                debug!("Signing SAS token valid until {}", expiry);
                generate_sas_token(&connection.resource_uri(), key, expiry)?
            }
        };
        let username = format!(
            "{}/{}/?api-version={}",
            connection.host_name, connection.device_id, API_VERSION
        );

        let mut mqtt_options =
            MqttOptions::new(&connection.device_id, &connection.host_name, port);
        mqtt_options.set_keep_alive(keep_alive);
        mqtt_options.set_clean_session(false);
        mqtt_options.set_credentials(username, password);
        mqtt_options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        if tls {
            mqtt_options.set_transport(Transport::tls_with_default_config());
        } else {
            warn!("TLS disabled, credentials are sent in clear text");
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        client
            .subscribe(topics::METHODS_SUBSCRIPTION, QoS::AtLeastOnce)
            .await?;
        client
            .subscribe(topics::TWIN_RESPONSES_SUBSCRIPTION, QoS::AtLeastOnce)
            .await?;

        let pending = Arc::new(PendingTwinRequests::default());
        let (methods_tx, methods_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let eventloop = tokio::spawn(run_eventloop(
            eventloop,
            methods_tx,
            pending.clone(),
            ready_tx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Connection(e)),
            Err(_) => return Err(Error::ChannelClosed),
        }

        info!(
            "Connected to IoT hub, subscribed to {} and {}",
            topics::METHODS_SUBSCRIPTION,
            topics::TWIN_RESPONSES_SUBSCRIPTION
        );

        Ok(Self {
            client,
            device_id: connection.device_id,
            pending,
            methods: tokio::sync::Mutex::new(methods_rx),
            eventloop,
        })
    }

    async fn twin_request(
        &self,
        request_id: String,
        topic: String,
        payload: Vec<u8>,
    ) -> Result<TwinReply> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), tx);

        debug!("Twin request {} on {}", request_id, topic);
        if let Err(e) = self
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
        {
            self.pending.lock().remove(&request_id);
            return Err(Error::Mqtt(e));
        }

        let reply = rx.await.map_err(|_| Error::ChannelClosed)?;
        if !(200..300).contains(&reply.status) {
            return Err(Error::TwinStatus {
                request_id,
                status: reply.status,
            });
        }
        Ok(reply)
    }
}

#[async_trait]
impl HubClient for MqttHub {
    async fn send_message(&self, message: Message) -> Result<()> {
        let topic = topics::telemetry_topic(&self.device_id, &message);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, message.body)
            .await?;
        Ok(())
    }

    async fn receive_method_request(&self) -> Result<MethodRequest> {
        self.methods
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::ChannelClosed)
    }

    async fn send_method_response(&self, response: MethodResponse) -> Result<()> {
        let topic = topics::method_response_topic(response.status, &response.request_id);
        let body = serde_json::to_vec(&response.payload)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await?;
        Ok(())
    }

    async fn get_twin(&self) -> Result<Twin> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let reply = self
            .twin_request(request_id.clone(), topics::twin_get_topic(&request_id), Vec::new())
            .await?;
        Ok(serde_json::from_slice(&reply.body)?)
    }

    async fn patch_twin_reported_properties(&self, patch: TwinPatch) -> Result<()> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = serde_json::to_vec(&patch)?;
        let topic = topics::twin_patch_reported_topic(&request_id);
        self.twin_request(request_id, topic, body).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from IoT hub");
        self.client.disconnect().await?;
        Ok(())
    }
}

impl Drop for MqttHub {
    fn drop(&mut self) {
        self.eventloop.abort();
    }
}

async fn run_eventloop(
    mut eventloop: EventLoop,
    methods: mpsc::UnboundedSender<MethodRequest>,
    pending: Arc<PendingTwinRequests>,
    ready: oneshot::Sender<std::result::Result<(), rumqttc::ConnectionError>>,
) {
    let mut ready = Some(ready);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Ok(()));
                } else {
                    info!("Reconnected to IoT hub");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(
                    "Received message on topic {}, size: {} bytes",
                    publish.topic,
                    publish.payload.len()
                );
                route(&publish.topic, &publish.payload, &methods, &pending);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Disconnect sent, stopping event loop");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(ready) = ready.take() {
                    // Never connected: report to the caller and stop polling
                    pending.lock().clear();
                    let _ = ready.send(Err(e));
                    return;
                }
                error!("MQTT error: {}", e);
                // rumqttc reconnects on the next poll
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn route(
    topic: &str,
    payload: &[u8],
    methods: &mpsc::UnboundedSender<MethodRequest>,
    pending: &PendingTwinRequests,
) {
    match topics::classify(topic) {
        Inbound::MethodRequest { name, request_id } => {
            let request = MethodRequest {
                request_id,
                name,
                payload: decode_payload(payload),
            };
            if methods.send(request).is_err() {
                warn!("Method listener is gone, dropping request on {}", topic);
            }
        }
        Inbound::TwinResponse { status, request_id } => {
            match pending.lock().remove(&request_id) {
                Some(tx) => {
                    let _ = tx.send(TwinReply {
                        status,
                        body: payload.to_vec(),
                    });
                }
                None => debug!("No pending twin request {}", request_id),
            }
        }
        Inbound::Unknown => warn!("Ignoring message on unexpected topic {}", topic),
    }
}

/// Method payloads are JSON; anything else is passed on as a plain string so
/// the dispatcher can reject it.
fn decode_payload(payload: &[u8]) -> Value {
    if payload.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}
