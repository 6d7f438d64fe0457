//! Minimal RTSP DESCRIBE probe against a named stream on the relay.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, ShepherdError};

/// Issue an RTSP DESCRIBE for `stream` and report whether the response
/// carries a stream description (an SDP media section).
///
/// This is deliberately not an RTSP client: one request, one read, one
/// marker check.
pub async fn describe_stream(
    host: &str,
    port: u16,
    stream: &str,
    timeout: Duration,
) -> Result<bool> {
    let addr = format!("{host}:{port}");
    let request = format!(
        "DESCRIBE rtsp://{host}:{port}/{stream} RTSP/1.0\r\n\
         CSeq: 1\r\n\
         Accept: application/sdp\r\n\
         User-Agent: shepherd/0.1\r\n\r\n"
    );

    let probe = async {
        let mut socket = TcpStream::connect(&addr).await?;
        socket.write_all(request.as_bytes()).await?;

        let mut response = Vec::with_capacity(2048);
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
            // Headers plus SDP body fit well under this; stop once the
            // media section marker could have arrived.
            if response.len() >= 8192 || response.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        Ok::<Vec<u8>, std::io::Error>(response)
    };

    let response = match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            debug!(stream, "describe probe failed: {e}");
            return Ok(false);
        }
        Err(_) => {
            debug!(stream, "describe probe timed out");
            return Ok(false);
        }
    };

    let text = String::from_utf8_lossy(&response);
    if !text.starts_with("RTSP/1.0") {
        return Err(ShepherdError::Internal(format!(
            "unexpected describe response for {stream}"
        )));
    }

    Ok(text.contains("RTSP/1.0 200") && (text.contains("m=") || text.contains("application/sdp")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_describe_detects_stream_description() {
        let addr = serve_once(
            "RTSP/1.0 200 OK\r\nCSeq: 1\r\nContent-Type: application/sdp\r\n\r\n\
             v=0\r\nm=video 0 RTP/AVP 96\r\n",
        )
        .await;
        let (host, port) = addr.rsplit_once(':').unwrap();

        let described = describe_stream(host, port.parse().unwrap(), "pi_cam_0", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(described);
    }

    #[tokio::test]
    async fn test_describe_missing_stream_is_negative() {
        let addr = serve_once("RTSP/1.0 404 Not Found\r\nCSeq: 1\r\n\r\n").await;
        let (host, port) = addr.rsplit_once(':').unwrap();

        let described = describe_stream(host, port.parse().unwrap(), "ghost", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!described);
    }

    #[tokio::test]
    async fn test_describe_connection_refused_is_negative() {
        let described = describe_stream("127.0.0.1", 1, "pi_cam_0", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!described);
    }
}
