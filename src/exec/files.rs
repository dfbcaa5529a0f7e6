// src/exec/files.rs

use tracing::debug;

use crate::context::Context;
use crate::errors::{HostrunError, Result};
use crate::host::Host;

/// Write `content` to `remote_path` (relative to the remote home) on `host`.
pub fn upload(ctx: &Context, host: &Host, content: &[u8], remote_path: &str, mode: u32) -> Result<()> {
    let session = ctx
        .sessions()
        .session(host)
        .map_err(|err| HostrunError::Transport {
            host: host.to_string(),
            reason: err.to_string(),
        })?;
    session.upload(content, remote_path, mode)?;
    debug!(host = %host, path = remote_path, bytes = content.len(), "uploaded");
    Ok(())
}

pub fn download(ctx: &Context, host: &Host, remote_path: &str) -> Result<Vec<u8>> {
    let session = ctx
        .sessions()
        .session(host)
        .map_err(|err| HostrunError::Transport {
            host: host.to_string(),
            reason: err.to_string(),
        })?;
    let content = session.download(remote_path)?;
    debug!(host = %host, path = remote_path, bytes = content.len(), "downloaded");
    Ok(content)
}
