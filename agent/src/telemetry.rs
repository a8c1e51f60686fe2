use crate::errors::Result;
use crate::hub::HubClient;
use crate::interval::SharedInterval;
use crate::metrics::{MESSAGES_SENT_TOTAL, TEMPERATURE_ALERTS_TOTAL};
use crate::model::{Message, Reading};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use tracing::{debug, info};

const TEMPERATURE_BASE: f64 = 20.0;
const TEMPERATURE_SPAN: f64 = 15.0;
const HUMIDITY_BASE: f64 = 60.0;
const HUMIDITY_SPAN: f64 = 20.0;
const TEMPERATURE_ALERT_THRESHOLD: f64 = 30.0;

pub const TEMPERATURE_ALERT_PROPERTY: &str = "temperatureAlert";

pub fn generate_reading(rng: &mut impl Rng) -> Reading {
    Reading {
        temperature: TEMPERATURE_BASE + rng.gen_range(0.0..TEMPERATURE_SPAN),
        humidity: HUMIDITY_BASE + rng.gen_range(0.0..HUMIDITY_SPAN),
    }
}

pub fn is_temperature_alert(reading: &Reading) -> bool {
    reading.temperature > TEMPERATURE_ALERT_THRESHOLD
}

pub fn build_message(reading: &Reading) -> Result<Message> {
    let alert = is_temperature_alert(reading);
    Ok(Message::json(reading)?.with_property(TEMPERATURE_ALERT_PROPERTY, alert.to_string()))
}

/// Publishes one reading per interval until `shutdown` resolves.
///
/// The interval is read again before every sleep. Shutdown interrupts both
/// an in-flight send and the sleep and is not an error; a failed send is.
pub async fn run_sender<H, F>(hub: &H, interval: &SharedInterval, shutdown: F) -> Result<()>
where
    H: HubClient + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut rng = StdRng::from_entropy();

    info!("Starting telemetry sender, interval {}s", interval.get());

    loop {
        let reading = generate_reading(&mut rng);
        let message = build_message(&reading)?;
        let alert = is_temperature_alert(&reading);

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            sent = hub.send_message(message) => sent?,
        }

        MESSAGES_SENT_TOTAL.inc();
        if alert {
            TEMPERATURE_ALERTS_TOTAL.inc();
        }
        info!(
            "Message sent: temperature={:.2} humidity={:.2} temperatureAlert={}",
            reading.temperature, reading.humidity, alert
        );

        let wait = interval.duration();
        debug!("Sleeping {:?}", wait);
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    info!("Telemetry sender stopped");
    Ok(())
}
