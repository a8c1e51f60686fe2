use crate::errors::Result;
use crate::hub::HubClient;
use crate::identity::IdentityProvider;
use crate::interval::SharedInterval;
use crate::metrics::TWIN_PATCHES_TOTAL;
use crate::model::TwinPatch;
use tracing::info;

/// Reconciles local state with the twin before the loops start: seeds the
/// telemetry interval from the reported section and makes sure the reported
/// `nodeId` matches this host. Any error here aborts startup.
pub async fn reconcile<H, I>(hub: &H, identity: &I, interval: &SharedInterval) -> Result<String>
where
    H: HubClient + ?Sized,
    I: IdentityProvider + ?Sized,
{
    let node_id = identity.node_id()?;
    info!("Node id: {}", node_id);

    let twin = hub.get_twin().await?;

    if let Some(secs) = twin.reported.telemetry_interval {
        info!("Telemetry interval {}s restored from twin", secs);
        interval.set(secs);
    }

    if twin.reported.node_id.as_deref() != Some(node_id.as_str()) {
        hub.patch_twin_reported_properties(TwinPatch::node_id(&node_id))
            .await?;
        TWIN_PATCHES_TOTAL.inc();
        info!("Update nodeId: {}", node_id);
    }

    Ok(node_id)
}
