//! TLS identity for the WebTransport endpoint

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::digest::{digest, SHA256};
use tracing::info;
use wtransport::Identity;

use crate::config::ServerConfig;

// Written by scripts/gen-dev-cert.rs
const DEV_CERT_FILE: &str = "certs/cert.pem";
const DEV_KEY_FILE: &str = "certs/key.pem";

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error(
        "TLS certificate not found. Run `cargo run --manifest-path scripts/Cargo.toml` \
         for a dev certificate or set TLS_CERT_PATH and TLS_KEY_PATH"
    )]
    NotFound,
    #[error("failed to load certificate from {cert}: {reason}")]
    Load { cert: String, reason: String },
}

pub struct TlsConfig {
    pub identity: Identity,
    /// Base64 SHA-256 of the leaf certificate, for browser pinning
    pub cert_hash: String,
}

impl TlsConfig {
    /// Configured paths first, then the dev certificate in `certs/`
    pub async fn load(config: &ServerConfig) -> Result<Self, TlsError> {
        if let (Some(cert), Some(key)) = (&config.tls_cert_path, &config.tls_key_path) {
            info!("Loading TLS certificate from {}", cert);
            return Self::load_from_paths(cert, key).await;
        }

        if Path::new(DEV_CERT_FILE).exists() && Path::new(DEV_KEY_FILE).exists() {
            info!("Loading dev certificate from certs/");
            Self::load_from_paths(DEV_CERT_FILE, DEV_KEY_FILE).await
        } else {
            Err(TlsError::NotFound)
        }
    }

    async fn load_from_paths(cert_path: &str, key_path: &str) -> Result<Self, TlsError> {
        let identity = Identity::load_pemfiles(cert_path, key_path)
            .await
            .map_err(|e| TlsError::Load {
                cert: cert_path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_identity(identity))
    }

    pub fn from_identity(identity: Identity) -> Self {
        let cert_hash = compute_cert_hash(&identity);
        Self {
            identity,
            cert_hash,
        }
    }

    pub fn cert_hash(&self) -> &str {
        &self.cert_hash
    }
}

fn compute_cert_hash(identity: &Identity) -> String {
    identity
        .certificate_chain()
        .as_slice()
        .first()
        .map(|cert| STANDARD.encode(digest(&SHA256, cert.der()).as_ref()))
        .unwrap_or_default()
}
