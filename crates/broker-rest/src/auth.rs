//! Credentials and request signing.
//!
//! Secrets are wrapped in `SecretString` so they cannot be logged by
//! accident and are zeroed on drop. Signed endpoints get an HMAC-SHA256
//! signature over the query string plus timestamp.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors from credential loading.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// API credentials for authenticated requests.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    secret_key: SecretString,
}

impl ApiCredentials {
    /// Load credentials from `BROKER_API_KEY` / `BROKER_API_SECRET`.
    ///
    /// A `.env` file is loaded first when present.
    pub fn from_env() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("BROKER_API_KEY")
            .map_err(|_| AuthError::MissingEnvVar("BROKER_API_KEY".into()))?;
        let secret_key = std::env::var("BROKER_API_SECRET")
            .map_err(|_| AuthError::MissingEnvVar("BROKER_API_SECRET".into()))?;

        Ok(Self::new(api_key, secret_key))
    }

    /// Create credentials from explicit values.
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key: SecretString::from(secret_key),
        }
    }

    /// The API key (public, safe to log).
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn expose_secret(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Signs request query strings.
pub struct RequestSigner<'a> {
    credentials: &'a ApiCredentials,
}

impl<'a> RequestSigner<'a> {
    pub fn new(credentials: &'a ApiCredentials) -> Self {
        Self { credentials }
    }

    /// HMAC-SHA256 of the message, lowercase hex.
    pub fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.credentials.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build a signed query string: params in order, timestamp appended,
    /// signature appended last.
    pub fn sign_params(&self, params: &[(&str, &str)], timestamp_ms: i64) -> String {
        let mut parts: Vec<String> =
            params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        parts.push(format!("timestamp={}", timestamp_ms));

        let query = parts.join("&");
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = ApiCredentials::new("key".into(), "secret".into());
        assert_eq!(creds.api_key(), "key");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ApiCredentials::new("my_key".into(), "super_secret".into());
        let debug = format!("{:?}", creds);

        assert!(debug.contains("my_key"));
        assert!(!debug.contains("super_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_sign_is_deterministic() {
        let creds = ApiCredentials::new("key".into(), "secret".into());
        let signer = RequestSigner::new(&creds);

        let a = signer.sign("symbol=NIFTY&qty=75");
        let b = signer.sign("symbol=NIFTY&qty=75");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // hex-encoded SHA-256
    }

    #[test]
    fn test_sign_params_layout() {
        let creds = ApiCredentials::new("key".into(), "secret".into());
        let signer = RequestSigner::new(&creds);

        let signed = signer.sign_params(&[("symbol", "X"), ("qty", "75")], 1_000);

        assert!(signed.starts_with("symbol=X&qty=75&timestamp=1000&signature="));
        let sig = signed.rsplit("signature=").next().unwrap();
        assert_eq!(sig, signer.sign("symbol=X&qty=75&timestamp=1000"));
    }

    #[test]
    fn test_sign_empty_message() {
        let creds = ApiCredentials::new("key".into(), "secret".into());
        let signer = RequestSigner::new(&creds);
        assert!(!signer.sign("").is_empty());
    }
}
