//! Chain file assembly.

use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;
use crate::persist::{FileMode, write_new};
use crate::types::Certificate;

/// Writes `root` followed by `leaf` as PEM to `path` unless `path` exists.
///
/// An existing chain file is never rewritten, even if the root or leaf it
/// was built from has since been regenerated. Returns `true` if the file
/// was written by this call.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_chain_if_absent(path: &Path, root: &Certificate, leaf: &Certificate) -> Result<bool> {
    if path.exists() {
        debug!(path = %path.display(), "chain file already present");
        return Ok(false);
    }

    info!(path = %path.display(), leaf = %leaf.subject(), "writing certificate chain");
    let chain = chain_pem(root, leaf);
    write_new(path, chain.as_bytes(), FileMode::Public)?;
    Ok(true)
}

/// Root PEM block immediately followed by the leaf PEM block.
#[must_use]
pub fn chain_pem(root: &Certificate, leaf: &Certificate) -> String {
    let mut chain = root.pem();
    chain.push_str(&leaf.pem());
    chain
}
