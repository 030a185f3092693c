//! Stdio transport.
//!
//! Newline-delimited JSON over stdin/stdout. Each request is handled on its
//! own task so a slow tool call does not block the rest of the stream;
//! responses are serialized through a single writer task.

use crate::dispatch::Dispatcher;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Serve MCP over the process's stdin and stdout until stdin closes.
pub async fn serve_stdio(dispatcher: Arc<Dispatcher>) -> Result<(), TransportError> {
    serve(dispatcher, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve MCP over an arbitrary reader/writer pair.
///
/// Returns once the reader hits EOF and every in-flight response has been
/// written.
pub async fn serve<R, W>(
    dispatcher: Arc<Dispatcher>,
    reader: R,
    writer: W,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(100);
    let writer_task = tokio::spawn(write_loop(writer, outgoing_rx));

    let mut lines = BufReader::new(reader).lines();
    let read_result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                debug!("Received: {}", line);

                let dispatcher = dispatcher.clone();
                let tx = outgoing_tx.clone();
                tokio::spawn(async move {
                    let Some(response) = dispatcher.handle_message(&line).await else {
                        return;
                    };
                    match serde_json::to_string(&response) {
                        Ok(json) => {
                            if tx.send(json).await.is_err() {
                                error!("Writer closed before response could be sent");
                            }
                        }
                        Err(e) => error!("Failed to serialize response: {}", e),
                    }
                });
            }
            Ok(None) => {
                info!("stdin closed");
                break Ok(());
            }
            Err(e) => {
                error!("Error reading stdin: {}", e);
                break Err(TransportError::Io(e));
            }
        }
    };

    // The writer drains once every request task has dropped its sender.
    drop(outgoing_tx);
    let write_result = writer_task
        .await
        .map_err(|_| TransportError::ChannelClosed)?;

    read_result.and(write_result)
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        debug!("Sending: {}", msg);
        writer.write_all(msg.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcId, JsonRpcResponse, ToolCallResult};
    use crate::registry::{tool_handler, ToolDefinition, ToolRegistry};
    use crate::schema::InputSchema;
    use std::time::Duration;

    async fn dispatcher() -> Arc<Dispatcher> {
        let tools = Arc::new(ToolRegistry::new());
        tools
            .register(
                ToolDefinition::builder("slow")
                    .description("Sleeps before answering")
                    .schema(InputSchema::empty())
                    .handler(tool_handler(|_, _| async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(ToolCallResult::text("slow done"))
                    }))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        Arc::new(Dispatcher::new("test", "1.0.0").with_tools(tools))
    }

    async fn run(input: &str) -> Vec<JsonRpcResponse> {
        let (client, server_out) = tokio::io::duplex(64 * 1024);
        serve(dispatcher().await, input.as_bytes(), server_out)
            .await
            .unwrap();

        let mut lines = BufReader::new(client).lines();
        let mut responses = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            responses.push(serde_json::from_str(&line).unwrap());
        }
        responses
    }

    #[tokio::test]
    async fn test_requests_answered_and_notifications_skipped() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let responses = run(input).await;

        let mut ids: Vec<_> = responses.iter().filter_map(|r| r.id.clone()).collect();
        ids.sort_by_key(|id| id.to_string());
        assert_eq!(ids, vec![JsonRpcId::Number(1), JsonRpcId::Number(2)]);
    }

    #[tokio::test]
    async fn test_slow_request_does_not_block_later_ones() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"slow"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        );
        let responses = run(input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, Some(JsonRpcId::Number(2)));
        assert_eq!(responses[1].id, Some(JsonRpcId::Number(1)));
    }

    #[tokio::test]
    async fn test_garbage_line_gets_parse_error() {
        let responses = run("this is not json\n").await;
        assert_eq!(responses.len(), 1);
        assert!(responses[0].id.is_none());
        assert_eq!(responses[0].error.as_ref().unwrap().code, -32700);
    }
}
