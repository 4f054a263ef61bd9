use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::{self, Frame};
use crate::reply::Reply;

/// A client connection over any duplex byte stream.
///
/// Incoming bytes are buffered by the codec until a whole frame is available. Replies are flushed
/// as soon as they are written, so a client always sees them in the order its commands arrived.
pub struct Connection<S> {
    pub id: Uuid,
    framed: Framed<S, FrameCodec>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, codec: FrameCodec) -> Connection<S> {
        Connection {
            id: Uuid::new_v4(),
            framed: Framed::new(stream, codec),
        }
    }

    /// Reads the next frame. `Ok(None)` means the peer closed the stream on a frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, frame::Error> {
        self.framed.next().await.transpose()
    }

    pub async fn write_reply(&mut self, reply: Reply) -> Result<(), frame::Error> {
        self.framed.send(reply).await
    }
}
