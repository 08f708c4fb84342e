//! BEP 15 connect handshake used as a UDP tracker liveness check.

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng as _;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::error::TrackerError;

const PROTOCOL_ID: u64 = 0x41727101980;
const ACTION_CONNECT: u32 = 0;
const CONNECT_RESPONSE_LEN: usize = 16;

/// 16-byte connect request: magic, action, transaction id (big endian).
pub(crate) fn connect_request(transaction_id: u32) -> [u8; 16] {
    let mut request = [0u8; 16];
    request[..8].copy_from_slice(&PROTOCOL_ID.to_be_bytes());
    request[8..12].copy_from_slice(&ACTION_CONNECT.to_be_bytes());
    request[12..].copy_from_slice(&transaction_id.to_be_bytes());
    request
}

/// Whether `response` is a connect reply for `transaction_id`.
pub(crate) fn is_connect_response(response: &[u8], transaction_id: u32) -> bool {
    if response.len() < CONNECT_RESPONSE_LEN {
        return false;
    }
    let action = u32::from_be_bytes([response[0], response[1], response[2], response[3]]);
    let resp_tid = u32::from_be_bytes([response[4], response[5], response[6], response[7]]);
    action == ACTION_CONNECT && resp_tid == transaction_id
}

/// Sends a connect request to `addr` and waits for the matching reply.
///
/// Datagrams that do not echo the action and transaction id are ignored
/// until `limit` elapses. The whole exchange runs under a single timeout, so
/// a late reply can never complete a check that already failed.
///
/// # Errors
///
/// - `TrackerError::Udp` - Socket failure, no matching reply, or timeout
pub async fn handshake(url: &str, addr: SocketAddr, limit: Duration) -> Result<(), TrackerError> {
    let udp_error = |reason: String| TrackerError::Udp {
        url: url.to_string(),
        reason,
    };

    let exchange = async {
        let bind_addr = if addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;

        let transaction_id: u32 = rand::rng().random();
        socket.send(&connect_request(transaction_id)).await?;

        let mut buf = [0u8; 64];
        loop {
            let len = socket.recv(&mut buf).await?;
            if is_connect_response(&buf[..len], transaction_id) {
                return Ok::<(), std::io::Error>(());
            }
            tracing::trace!("Ignoring unmatched {len}-byte datagram from {addr}");
        }
    };

    match timeout(limit, exchange).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(udp_error(e.to_string())),
        Err(_) => Err(udp_error(format!("no response within {}ms", limit.as_millis()))),
    }
}
