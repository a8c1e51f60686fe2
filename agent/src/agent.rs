use crate::bootstrap;
use crate::errors::{Error, Result};
use crate::hub::HubClient;
use crate::identity::IdentityProvider;
use crate::interval::SharedInterval;
use crate::methods;
use crate::telemetry;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs the agent until `shutdown` resolves or one of its loops fails.
///
/// Reconciliation happens first and must succeed. The method listener then
/// runs as its own task while telemetry is sent from this one. On the way
/// out the listener is always stopped before the hub is disconnected.
pub async fn run<F>(
    hub: Arc<dyn HubClient>,
    identity: &dyn IdentityProvider,
    interval: SharedInterval,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!("Reconciling device twin");
    bootstrap::reconcile(hub.as_ref(), identity, &interval).await?;

    let listener_hub = hub.clone();
    let listener_interval = interval.clone();
    let mut listener = tokio::spawn(async move {
        methods::run_listener(listener_hub.as_ref(), &listener_interval).await
    });

    info!("Running");
    let outcome = tokio::select! {
        sent = telemetry::run_sender(hub.as_ref(), &interval, shutdown) => sent,
        joined = &mut listener => {
            let result = joined.map_err(Error::from).and_then(|r| r);
            if let Err(e) = &result {
                error!("Method listener stopped: {}", e);
            }
            result
        }
    };

    listener.abort();
    if let Err(e) = hub.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
    info!("Stopped");

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::fake::FakeHub;
    use crate::identity::FixedIdentity;
    use crate::model::{MethodRequest, TwinPatch};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_until_shutdown() {
        // The sender half must outlive run(); a closed channel ends the listener
        let (hub, requests) = FakeHub::new(json!({"reported": {"telemetryInterval": 0}}));
        let hub = Arc::new(hub);
        let interval = SharedInterval::new(1);

        requests
            .send(MethodRequest {
                request_id: "1".to_string(),
                name: "SetTelemetryInterval".to_string(),
                payload: json!("0"),
            })
            .unwrap();

        let observed = hub.clone();
        let shutdown = async move {
            while observed.patches().len() < 2 || observed.messages().len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        run(hub.clone(), &FixedIdentity::new("AA11BB22CC33"), interval, shutdown)
            .await
            .unwrap();

        assert_eq!(
            hub.patches(),
            vec![
                TwinPatch::node_id("AA11BB22CC33"),
                TwinPatch::telemetry_interval(0)
            ]
        );
        assert_eq!(hub.responses()[0].status, 200);
    }

    #[tokio::test]
    async fn test_listener_failure_stops_agent() {
        let (hub, requests) = FakeHub::new(json!({"reported": {"nodeId": "AA11BB22CC33"}}));
        drop(requests);

        let result = run(
            Arc::new(hub),
            &FixedIdentity::new("AA11BB22CC33"),
            SharedInterval::new(3600),
            std::future::pending(),
        )
        .await;

        assert!(matches!(result, Err(Error::ChannelClosed)));
    }
}
