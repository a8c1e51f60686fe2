use crate::errors::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Builds a `SharedAccessSignature` token for `resource_uri` valid until
/// `expiry` (seconds since the Unix epoch).
pub fn generate_sas_token(resource_uri: &str, key: &str, expiry: i64) -> Result<String> {
    let key = STANDARD
        .decode(key.trim())
        .map_err(|e| Error::Config(format!("SharedAccessKey is not valid base64: {}", e)))?;

    let encoded_uri = urlencoding::encode(resource_uri).into_owned();
    let string_to_sign = format!("{}\n{}", encoded_uri, expiry);

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| Error::Config(format!("Invalid SharedAccessKey: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}",
        encoded_uri,
        urlencoding::encode(&signature),
        expiry
    ))
}
