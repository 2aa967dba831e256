use std::net::TcpListener;

use anyhow::Context;
use tracing::info;

/// Binds the listening socket and switches it to non-blocking mode; the
/// dispatcher drives it through the epoll set from then on.
pub fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr).with_context(|| format!("binding {addr}"))?;
    listener.set_nonblocking(true)?;
    info!("Listening on {}", listener.local_addr()?);
    Ok(listener)
}
