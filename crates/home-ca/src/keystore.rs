//! Generate-or-load RSA private keys.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::persist::{FileMode, write_new};
use crate::types::PrivateKey;

/// Loads the key stored at `path`, or generates and persists a new one.
///
/// A stored key is returned as-is: its size and exponent are not checked,
/// only that it is an unencrypted RSA key.
///
/// # Errors
///
/// Returns [`Error::InvalidKeyType`] for a non-RSA key, [`Error::Parse`] for
/// malformed contents and [`Error::Io`] for filesystem failures.
pub fn generate_or_load(path: &Path) -> Result<PrivateKey> {
    if path.exists() {
        debug!(path = %path.display(), "loading existing private key");
        let pem = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        return PrivateKey::from_pem(&pem);
    }

    info!(path = %path.display(), "generating new RSA private key");
    let key = PrivateKey::generate()?;
    let pem = key.to_pem()?;
    write_new(path, pem.as_bytes(), FileMode::Private)?;

    Ok(key)
}
