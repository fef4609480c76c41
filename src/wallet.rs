//! Signer keypair loading
//!
//! The buyer identity is loaded once at startup and shared read-only with
//! every worker. Two on-disk formats are accepted: the JSON byte-array
//! produced by `solana-keygen`, and a bare base58-encoded secret key (the
//! format wallet apps export). Anything else fails fast before the race
//! starts.

use std::path::Path;

use solana_sdk::signature::Keypair;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Load the signer keypair from a file, validating permissions first
pub fn load_keypair(path: &Path) -> Result<Keypair> {
    if !path.exists() {
        return Err(Error::InvalidKeypair(format!(
            "keypair file not found: {}",
            path.display()
        )));
    }

    // Refuse group/world-readable key material on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path)?.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(Error::InsecureKeypair(format!(
                "{} has permissions {:o}. Run 'chmod 600 {}'",
                path.display(),
                mode & 0o777,
                path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(path)?;
    let content = content.trim();

    let secret_bytes: Vec<u8> = if content.starts_with('[') {
        debug!("Parsing keypair as JSON byte array");
        serde_json::from_str(content)
            .map_err(|e| Error::InvalidKeypair(format!("invalid keypair JSON: {}", e)))?
    } else {
        debug!("Parsing keypair as base58 secret key");
        bs58::decode(content)
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("invalid base58 secret key: {}", e)))?
    };

    let keypair = Keypair::from_bytes(&secret_bytes)
        .map_err(|e| Error::InvalidKeypair(format!("invalid keypair bytes: {}", e)))?;

    info!("Loaded signer keypair from {}", path.display());
    Ok(keypair)
}
