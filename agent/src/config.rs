use crate::errors::{Error, Result};
use clap::Parser;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, Parser)]
#[command(version, about = "IoT Hub device agent", long_about = None)]
pub struct Cli {
    /// Device connection string (HostName=...;DeviceId=...;SharedAccessKey=...)
    #[arg(
        env = "IOTHUB_DEVICE_CONNECTION_STRING",
        long = "connection-string",
        value_name = "str",
        hide_env_values = true
    )]
    pub connection_string: ConnectionString,

    /// MQTT port of the hub
    #[arg(env = "IOTHUB_PORT", long = "port", default_value_t = 8883)]
    pub port: u16,

    /// Connect over plain TCP instead of TLS (local test brokers only)
    #[arg(env = "IOTHUB_NO_TLS", long = "no-tls")]
    pub no_tls: bool,

    /// MQTT keep-alive in seconds
    #[arg(env = "IOTHUB_KEEP_ALIVE_SECS", long = "keep-alive-secs", default_value_t = 30)]
    pub keep_alive_secs: u64,

    /// Lifetime of a SAS token signed from a SharedAccessKey, in seconds
    #[arg(env = "IOTHUB_SAS_TTL_SECS", long = "sas-ttl-secs", default_value_t = 86400)]
    pub sas_ttl_secs: u64,

    /// Telemetry interval in seconds until the twin or a direct method says otherwise
    #[arg(env = "TELEMETRY_INTERVAL", long = "telemetry-interval", default_value_t = 1)]
    pub telemetry_interval: u64,

    /// Fixed node id instead of the one derived from the hardware address
    #[arg(env = "NODE_ID", long = "node-id", value_name = "hex")]
    pub node_id: Option<String>,

    /// Serve Prometheus metrics on this address, eg. "0.0.0.0:9100"
    #[arg(env = "METRICS_ADDR", long = "metrics-addr", value_name = "addr")]
    pub metrics_addr: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    SharedAccessKey(String),
    SharedAccessSignature(String),
}

/// Parsed device connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub host_name: String,
    pub device_id: String,
    pub credential: Credential,
}

impl ConnectionString {
    /// Resource URI the SAS token is scoped to
    pub fn resource_uri(&self) -> String {
        format!("{}/devices/{}", self.host_name, self.device_id)
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut host_name = None;
        let mut device_id = None;
        let mut key = None;
        let mut signature = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                Error::Config(format!("Malformed connection string segment {:?}", name_of(part)))
            })?;
            let value = value.to_string();
            match name {
                "HostName" => host_name = Some(value),
                "DeviceId" => device_id = Some(value),
                "SharedAccessKey" => key = Some(value),
                "SharedAccessSignature" => signature = Some(value),
                "ModuleId" => {
                    return Err(Error::Config(
                        "Module identities are not supported".to_string(),
                    ))
                }
                other => {
                    return Err(Error::Config(format!(
                        "Unknown connection string key {:?}",
                        other
                    )))
                }
            }
        }

        let host_name = host_name
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("Connection string is missing HostName".to_string()))?;
        let device_id = device_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("Connection string is missing DeviceId".to_string()))?;
        let credential = match (key, signature) {
            (Some(key), None) => Credential::SharedAccessKey(key),
            (None, Some(sig)) => Credential::SharedAccessSignature(sig),
            (None, None) => {
                return Err(Error::Config(
                    "Connection string needs SharedAccessKey or SharedAccessSignature".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "Connection string has both SharedAccessKey and SharedAccessSignature"
                        .to_string(),
                ))
            }
        };

        Ok(Self {
            host_name,
            device_id,
            credential,
        })
    }
}

// Only the key name of a bad segment is echoed; the value may be a secret
fn name_of(segment: &str) -> &str {
    segment.split('=').next().unwrap_or_default()
}

// Secrets stay out of logs and clap error output
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedAccessKey(_) => f.write_str("SharedAccessKey"),
            Credential::SharedAccessSignature(_) => f.write_str("SharedAccessSignature"),
        }
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field("credential", &self.credential)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shared_access_key() {
        let cs: ConnectionString =
            "HostName=hub.azure-devices.net;DeviceId=dev-1;SharedAccessKey=a2V5PQ=="
                .parse()
                .unwrap();

        assert_eq!(cs.host_name, "hub.azure-devices.net");
        assert_eq!(cs.device_id, "dev-1");
        // Base64 padding survives the split on the first '='
        assert_eq!(cs.credential, Credential::SharedAccessKey("a2V5PQ==".to_string()));
        assert_eq!(cs.resource_uri(), "hub.azure-devices.net/devices/dev-1");
    }

    #[test]
    fn test_parse_shared_access_signature() {
        let cs: ConnectionString = "HostName=h;DeviceId=d;SharedAccessSignature=SharedAccessSignature sr=h%2Fdevices%2Fd&sig=x&se=1"
            .parse()
            .unwrap();

        assert_eq!(
            cs.credential,
            Credential::SharedAccessSignature(
                "SharedAccessSignature sr=h%2Fdevices%2Fd&sig=x&se=1".to_string()
            )
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "DeviceId=d;SharedAccessKey=k",
            "HostName=h;SharedAccessKey=k",
            "HostName=h;DeviceId=d",
            "HostName=h;DeviceId=d;SharedAccessKey=k;SharedAccessSignature=s",
            "HostName=h;DeviceId=d;ModuleId=m;SharedAccessKey=k",
            "HostName=h;DeviceId=d;SharedAccessKey=k;Bogus=1",
            "HostName=h;DeviceId",
        ] {
            assert!(
                matches!(bad.parse::<ConnectionString>(), Err(Error::Config(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let cs: ConnectionString = "HostName=h;DeviceId=d;SharedAccessKey=topsecret"
            .parse()
            .unwrap();
        assert!(!format!("{:?}", cs).contains("topsecret"));
    }

    #[test]
    fn test_credential_debug_names_variant_only() {
        let key = Credential::SharedAccessKey("topsecret".to_string());
        let sig = Credential::SharedAccessSignature("SharedAccessSignature sig=x".to_string());

        assert_eq!(format!("{:?}", key), "SharedAccessKey");
        assert_eq!(format!("{:?}", sig), "SharedAccessSignature");
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from([
            "device-agent",
            "--connection-string",
            "HostName=h;DeviceId=d;SharedAccessKey=a2V5",
        ])
        .unwrap();

        assert_eq!(cli.port, 8883);
        assert!(!cli.no_tls);
        assert_eq!(cli.telemetry_interval, 1);
        assert_eq!(cli.node_id, None);
    }
}
