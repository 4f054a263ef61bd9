use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::FrameCodec;
use crate::commands;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::ErrorKind;
use crate::store::Store;
use crate::Error;

/// Binds the configured address and serves clients until Ctrl-C is received.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind(config.bind_address()).await?;
    let store = Store::new();

    info!("respkv listening on {}", listener.local_addr()?);

    tokio::select! {
        res = serve(listener, store, config.max_frame_size) => res,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping server");
            Ok(())
        }
    }
}

/// Accepts connections on `listener` forever, handling each one on its own task.
pub async fn serve(listener: TcpListener, store: Store, max_frame_size: usize) -> Result<(), Error> {
    loop {
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let store = store.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, store, max_frame_size).await {
                error!("Connection failed: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip_all,
    fields(connection_id = tracing::field::Empty, client_address = %client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    max_frame_size: usize,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream, FrameCodec::new(max_frame_size));

    tracing::Span::current().record("connection_id", conn.id.to_string());

    process(&mut conn, &store).await
}

/// Serves one client: decode a frame, dispatch it, write the reply, and repeat until the stream
/// ends.
///
/// A clean end of stream, a frame cut short by the peer hanging up, and a malformed frame all
/// end the loop normally. Only I/O failures are returned as errors.
pub async fn process<S>(conn: &mut Connection<S>, store: &Store) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = match conn.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => match e.kind() {
                ErrorKind::Truncated => {
                    debug!("Client closed the stream in the middle of a frame");
                    break;
                }
                ErrorKind::MalformedFrame => {
                    warn!("Closing connection after malformed frame: {}", e);
                    break;
                }
                ErrorKind::IoFailure => return Err(e.into()),
            },
        };

        debug!("Received frame from client: {}", frame);

        let Some(reply) = commands::dispatch(frame, store) else {
            continue;
        };

        debug!("Sending response to client: {}", reply);
        conn.write_reply(reply).await?;
    }

    info!("Connection closed");
    Ok(())
}
