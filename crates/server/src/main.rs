use std::{net::SocketAddr, sync::Arc};

use dispatch::Dispatcher;
use shared::{error::DispatchError, protocol::Reply};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpListener,
};
use tracing::{info, warn};

mod config;
mod handlers;

use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let registry = handlers::build_registry()?;
    info!(handlers = registry.len(), "handlers registered");
    let dispatcher = Arc::new(Dispatcher::new(registry));

    let addr: SocketAddr = settings.server_bind.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let dispatcher = Arc::clone(&dispatcher);
        let max_message_bytes = settings.max_message_bytes;
        tokio::spawn(async move {
            if let Err(err) = serve_connection(dispatcher, stream, max_message_bytes).await {
                warn!(%peer, %err, "connection closed with error");
            }
        });
    }
}

/// Newline-delimited JSON, one reply line per request line, strictly in
/// order. A line that does not parse as JSON gets the same Error reply as a
/// non-object payload; an over-long line gets an Error reply and closes the
/// connection, since the stream can no longer be resynchronized.
async fn serve_connection<S>(
    dispatcher: Arc<Dispatcher>,
    stream: S,
    max_message_bytes: usize,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(max_message_bytes as u64 + 1);
        let n = limited.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        if buf.len() > max_message_bytes && !buf.ends_with(b"\n") {
            let reply = Reply::error(format!("Message exceeds {max_message_bytes} bytes"));
            send_reply(&mut writer, &reply).await?;
            return Ok(());
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(msg) => dispatcher.dispatch(&msg),
            Err(_) => Reply::from(DispatchError::MalformedMessage),
        };
        send_reply(&mut writer, &reply).await?;
    }
}

async fn send_reply<W>(writer: &mut W, reply: &Reply) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = serde_json::to_vec(reply)?;
    out.push(b'\n');
    writer.write_all(&out).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_MAX_BYTES: usize = 256;

    fn spawn_server(max_message_bytes: usize) -> tokio::io::DuplexStream {
        let (client, server) = tokio::io::duplex(4 * 1024);
        let dispatcher = Arc::new(Dispatcher::new(
            handlers::build_registry().expect("registry"),
        ));
        tokio::spawn(async move {
            let _ = serve_connection(dispatcher, server, max_message_bytes).await;
        });
        client
    }

    async fn round_trip(
        client: &mut BufReader<tokio::io::DuplexStream>,
        request: &str,
    ) -> serde_json::Value {
        client
            .get_mut()
            .write_all(format!("{request}\n").as_bytes())
            .await
            .expect("write");
        let mut reply_line = String::new();
        client.read_line(&mut reply_line).await.expect("read");
        serde_json::from_str(reply_line.trim()).expect("reply json")
    }

    #[tokio::test]
    async fn ping_round_trips_the_handler_reply_verbatim() {
        let mut client = BufReader::new(spawn_server(TEST_MAX_BYTES));
        let reply = round_trip(&mut client, r#"{"cmd":"ping"}"#).await;
        assert_eq!(reply, json!({ "status": "Success", "result": "pong" }));
    }

    #[tokio::test]
    async fn undecodable_line_gets_the_malformed_message_reply() {
        let mut client = BufReader::new(spawn_server(TEST_MAX_BYTES));
        let reply = round_trip(&mut client, "this is not json").await;
        assert_eq!(
            reply,
            json!({ "status": "Error", "msg": "Unable to convert message to dict" })
        );
    }

    #[tokio::test]
    async fn non_object_payload_gets_the_malformed_message_reply() {
        let mut client = BufReader::new(spawn_server(TEST_MAX_BYTES));
        let reply = round_trip(&mut client, "[1,2]").await;
        assert_eq!(
            reply,
            json!({ "status": "Error", "msg": "Unable to convert message to dict" })
        );
    }

    #[tokio::test]
    async fn validation_failures_come_back_as_error_replies() {
        let mut client = BufReader::new(spawn_server(TEST_MAX_BYTES));
        let reply = round_trip(&mut client, r#"{"opts":{}}"#).await;
        assert_eq!(
            reply,
            json!({ "status": "Error", "msg": "No 'cmd' key given" })
        );

        let reply = round_trip(&mut client, r#"{"cmd":"nope"}"#).await;
        assert_eq!(
            reply,
            json!({ "status": "Error", "msg": "Unknown cmd: nope" })
        );
    }

    #[tokio::test]
    async fn requests_on_one_connection_are_answered_in_order() {
        let mut client = BufReader::new(spawn_server(TEST_MAX_BYTES));
        let first = round_trip(&mut client, r#"{"cmd":"ping"}"#).await;
        let second = round_trip(&mut client, r#"{"cmd":"echo","opts":{"n":1}}"#).await;
        assert_eq!(first["result"], json!("pong"));
        assert_eq!(second["result"], json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let mut client = BufReader::new(spawn_server(TEST_MAX_BYTES));
        client.get_mut().write_all(b"\n").await.expect("write");
        let reply = round_trip(&mut client, r#"{"cmd":"ping"}"#).await;
        assert_eq!(reply["result"], json!("pong"));
    }

    #[tokio::test]
    async fn over_long_line_is_rejected_and_closes_the_connection() {
        let mut client = BufReader::new(spawn_server(64));
        let oversized = "x".repeat(200);
        client
            .get_mut()
            .write_all(format!("{oversized}\n").as_bytes())
            .await
            .expect("write");

        let mut reply_line = String::new();
        client.read_line(&mut reply_line).await.expect("read");
        let reply: serde_json::Value = serde_json::from_str(reply_line.trim()).expect("json");
        assert_eq!(
            reply,
            json!({ "status": "Error", "msg": "Message exceeds 64 bytes" })
        );

        let mut rest = String::new();
        let n = client.read_line(&mut rest).await.expect("read eof");
        assert_eq!(n, 0);
    }
}
