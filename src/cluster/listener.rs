//! # Shared application listener.
//!
//! Every worker binds the *same* address with `SO_REUSEPORT`, so the kernel
//! distributes incoming connections across the pool. This is the only
//! resource shared between processes — no shared memory, no passed file
//! descriptors.
//!
//! On non-Unix targets the reuseport option does not exist; the first worker
//! wins the bind and the rest fail fast with [`RuntimeError::Bind`].

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

use crate::error::RuntimeError;

/// Backlog passed to `listen(2)`.
const LISTEN_BACKLOG: u32 = 1024;

/// Binds `addr` with `SO_REUSEADDR` + `SO_REUSEPORT` and starts listening.
pub fn bind_reuseport(addr: SocketAddr) -> Result<TcpListener, RuntimeError> {
    let bind_err = |source| RuntimeError::Bind { addr, source };

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(bind_err)?;

    socket.set_reuseaddr(true).map_err(bind_err)?;
    #[cfg(unix)]
    socket.set_reuseport(true).map_err(bind_err)?;

    socket.bind(addr).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_two_binds_share_one_port() {
        let first = bind_reuseport("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = first.local_addr().unwrap();

        // Second bind on the identical address must succeed with reuseport.
        #[cfg(unix)]
        {
            let second = bind_reuseport(addr).unwrap();
            assert_eq!(second.local_addr().unwrap().port(), addr.port());
        }
    }

    #[tokio::test]
    async fn test_bind_error_carries_addr() {
        // Port 1 requires privileges in practice; accept either outcome but
        // verify the error shape when it fails.
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        if let Err(err) = bind_reuseport(addr) {
            assert_eq!(err.as_label(), "runtime_bind");
            assert!(err.as_message().contains("127.0.0.1:1"));
        }
    }
}
