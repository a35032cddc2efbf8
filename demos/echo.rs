//! Clustered echo server.
//!
//! Run the primary, then talk to any worker through the shared port:
//! ```text
//! cargo run --example echo
//! printf 'hello\n' | nc 127.0.0.1 4000
//! curl -s 127.0.0.1:3001/health
//! ```
//! Ctrl-C drains the whole cluster.

use std::net::SocketAddr;
use std::sync::Arc;

use procvisor::{Cluster, Config, HandlerError, HandlerFn, HandlerRef, LogWriter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Stderr logging: worker stdout is the control channel.
    env_logger::init();

    let handler: HandlerRef = HandlerFn::arc(
        "echo",
        |mut stream: TcpStream, _peer: SocketAddr, ctx: CancellationToken| async move {
            let mut buf = [0u8; 4096];
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    n = stream.read(&mut buf) => {
                        let n = n?;
                        if n == 0 { break; }
                        stream.write_all(&buf[..n]).await?;
                    }
                }
            }
            Ok::<_, HandlerError>(())
        },
    );

    let cluster = Cluster::new(Config::from_env(), vec![Arc::new(LogWriter::new())]);
    cluster.run(handler).await?;
    Ok(())
}
