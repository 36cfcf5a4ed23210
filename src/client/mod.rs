use std::net::SocketAddr;
use std::time::Duration;

use tracing::Instrument;

use crate::client::message::Request;
use crate::client::task::ClientLoop;
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::types::UnitId;

/// persistent communication channel to a server
pub mod channel;

pub(crate) mod message;
pub(crate) mod requests;
pub(crate) mod task;

pub use channel::Channel;

/// Parameters common to every request on a channel: the target unit id and
/// the per-request response timeout
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RequestParam {
    /// Unit id of the request
    pub id: UnitId,
    /// Timeout applied to the request. A request that receives no response
    /// within this duration completes with `ResponseTimeout`; the timeout
    /// cancels only that request, never the connection.
    pub response_timeout: Duration,
}

impl RequestParam {
    /// create a `RequestParam` from its fields
    pub fn new(id: UnitId, response_timeout: Duration) -> Self {
        Self {
            id,
            response_timeout,
        }
    }
}

/// Establishes a TCP connection to the server, then spawns a connection task
/// onto the runtime that processes requests from the returned [`Channel`].
///
/// The task runs until the connection dies or every channel handle is dropped.
/// Requests that are in flight when the connection dies complete with
/// `NoConnection`.
///
/// * `addr` - Socket address of the remote server
/// * `max_queued_requests` - The maximum size of the request queue
/// * `decode` - Decode log level
pub async fn connect_tcp_client(
    addr: SocketAddr,
    max_queued_requests: usize,
    decode: DecodeLevel,
) -> Result<Channel, std::io::Error> {
    let socket = tokio::net::TcpStream::connect(addr).await?;

    let (tx, rx) = tokio::sync::mpsc::channel::<Request>(max_queued_requests);
    tokio::spawn(
        async move {
            let mut io = PhysLayer::new_tcp(socket);
            ClientLoop::new(rx, decode).run(&mut io).await
        }
        .instrument(tracing::info_span!("Modbus-Client-TCP", "endpoint" = ?addr)),
    );

    Ok(Channel::new(tx))
}
