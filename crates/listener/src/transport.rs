//! Newline-delimited JSON relay transport.
//!
//! The agent connects to a relay server over TCP. Every line the server sends
//! is one inbound message; every line the agent writes is one finalised
//! outbound message.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pipeline::{AgentId, InboundSink, MergedResult};

use crate::{finalize_outbound, InboundEnvelope, TransportError};

/// Where to connect and how to sign outbound messages.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub agent_id: AgentId,
}

/// A single connection to the relay server.
pub struct RelayTransport {
    config: RelayConfig,
}

impl RelayTransport {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Connects and pumps messages until `shutdown` fires or the server hangs up.
    ///
    /// Inbound content goes to `sink`; results arriving on `outbound` are
    /// finalised and written back.
    pub async fn run(
        &self,
        sink: Arc<dyn InboundSink>,
        mut outbound: mpsc::UnboundedReceiver<MergedResult>,
        shutdown: CancellationToken,
    ) -> Result<(), TransportError> {
        let address = (self.config.host.as_str(), self.config.port);
        let stream = TcpStream::connect(address).await?;
        info!(host = %self.config.host, port = self.config.port, "connected to relay");

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("transport shutting down");
                    break;
                }
                line = lines.next_line() => match line? {
                    Some(line) => self.accept_line(&line, sink.as_ref()),
                    None => return Err(TransportError::Closed),
                },
                Some(result) = outbound.recv() => {
                    let Some(message) = finalize_outbound(result.into_value(), &self.config.agent_id) else {
                        continue;
                    };
                    let mut frame = serde_json::to_string(&message)?;
                    frame.push('\n');
                    write_half.write_all(frame.as_bytes()).await?;
                    debug!(bytes = frame.len(), "result sent");
                }
            }
        }

        write_half.shutdown().await?;
        Ok(())
    }

    fn accept_line(&self, line: &str, sink: &dyn InboundSink) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        // Relays may send bare text (e.g. warnings); it fails envelope checks below.
        let message = serde_json::from_str(line).unwrap_or_else(|_| Value::String(line.to_owned()));
        match InboundEnvelope::from_message(message) {
            Some(envelope) => {
                debug!(remote_addr = %envelope.remote_addr, "payload buffered");
                sink.enqueue(envelope.content);
            }
            None => debug!(line = %line, "ignoring message without remote_addr/content"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<Value>>);

    impl InboundSink for CollectingSink {
        fn enqueue(&self, payload: Value) {
            self.0.lock().unwrap().push(payload);
        }
    }

    #[tokio::test]
    async fn relays_inbound_content_and_signs_outbound_results() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let sink = Arc::new(CollectingSink::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let transport = RelayTransport::new(RelayConfig {
            host: "127.0.0.1".into(),
            port,
            agent_id: AgentId::new("minimal_agent").unwrap(),
        });

        let task = tokio::spawn({
            let sink = Arc::clone(&sink) as Arc<dyn InboundSink>;
            let shutdown = shutdown.clone();
            async move { transport.run(sink, rx, shutdown).await }
        });

        let (server, _) = listener.accept().await.unwrap();
        let (server_read, mut server_write) = server.into_split();
        server_write
            .write_all(b"Warning: relay busy\n{\"remote_addr\":\"peer\",\"content\":{\"x\":1}}\n")
            .await
            .unwrap();

        tx.send(MergedResult {
            answers: [("y".to_string(), json!(2))].into_iter().collect(),
            cancelled: None,
            to: Some(json!("peer")),
        })
        .unwrap();

        let mut server_lines = BufReader::new(server_read).lines();
        let sent: Value =
            serde_json::from_str(&server_lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(
            sent,
            json!({"answers": {"y": 2}, "to": "peer", "from": "minimal_agent"})
        );

        // Inbound lines are handled on the same loop; wait until the payload lands.
        while sink.0.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(*sink.0.lock().unwrap(), vec![json!({"x": 1})]);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn server_hangup_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (_tx, rx) = mpsc::unbounded_channel();
        let transport = RelayTransport::new(RelayConfig {
            host: "127.0.0.1".into(),
            port,
            agent_id: AgentId::new("a").unwrap(),
        });

        let task = tokio::spawn(async move {
            transport
                .run(Arc::new(CollectingSink::default()), rx, CancellationToken::new())
                .await
        });
        let (server, _) = listener.accept().await.unwrap();
        drop(server);

        assert!(matches!(task.await.unwrap(), Err(TransportError::Closed)));
    }
}
