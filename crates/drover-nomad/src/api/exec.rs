//! Nomad exec websocket protocol.
//!
//! Client frames carry base64 stdin (`{"stdin":{"data":".."}}`) and a final
//! `{"stdin":{"close":true}}`. Server frames carry base64 `stdout`/`stderr`
//! chunks and end with `{"exited":true,"result":{"exit_code":N}}`. Empty
//! `{}` frames are heartbeats.

use base64::{Engine, engine::general_purpose::STANDARD};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::{WebSocketStream, tungstenite::Message};
use tracing::{debug, trace};

use crate::{
    api::ExecStreams,
    error::{NomadError, NomadResult},
};

const STDIN_CHUNK: usize = 16 * 1024;

#[derive(Debug, Serialize)]
struct ClientFrame {
    stdin: StdinFrame,
}

#[derive(Debug, Serialize)]
struct StdinFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    close: bool,
}

impl ClientFrame {
    fn data(chunk: &[u8]) -> Self {
        Self {
            stdin: StdinFrame {
                data: Some(STANDARD.encode(chunk)),
                close: false,
            },
        }
    }

    fn close() -> Self {
        Self {
            stdin: StdinFrame {
                data: None,
                close: true,
            },
        }
    }

    fn message(&self) -> NomadResult<Message> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServerFrame {
    #[serde(default)]
    stdout: Option<OutputFrame>,
    #[serde(default)]
    stderr: Option<OutputFrame>,
    #[serde(default)]
    exited: bool,
    #[serde(default)]
    result: Option<ExitResult>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputFrame {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExitResult {
    #[serde(default)]
    exit_code: i32,
}

/// Pump stdin and demultiplex output until the remote process exits.
pub(crate) async fn run_session<S>(ws: WebSocketStream<S>, streams: ExecStreams<'_>) -> NomadResult<i32>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let ExecStreams {
        stdin,
        stdout,
        stderr,
    } = streams;
    let (mut sink, mut source) = ws.split();

    let outcome = {
        let pump = pump_stdin(&mut sink, stdin);
        tokio::pin!(pump);
        let mut stdin_done = false;

        loop {
            tokio::select! {
                res = &mut pump, if !stdin_done => {
                    res?;
                    stdin_done = true;
                    trace!("stdin closed");
                }
                msg = source.next() => {
                    let msg = match msg {
                        Some(msg) => msg?,
                        None => break Err(NomadError::ExecClosed("connection ended before exit".into())),
                    };
                    match handle_message(msg, stdout, stderr).await {
                        Ok(Some(code)) => break Ok(code),
                        Ok(None) => {}
                        Err(e) => break Err(e),
                    }
                }
            }
        }
    };

    if let Err(e) = sink.close().await {
        debug!(error = %e, "exec websocket close failed");
    }
    if let Ok(code) = &outcome {
        debug!(exit_code = code, "exec session finished");
    }
    outcome
}

async fn pump_stdin<K>(sink: &mut K, stdin: &mut (dyn AsyncRead + Send + Unpin)) -> NomadResult<()>
where
    K: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let mut buf = vec![0u8; STDIN_CHUNK];
    loop {
        let n = stdin.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sink.send(ClientFrame::data(&buf[..n]).message()?).await?;
    }
    sink.send(ClientFrame::close().message()?).await?;
    Ok(())
}

/// Handle one server message; `Some(code)` once the process exited.
async fn handle_message(
    msg: Message,
    stdout: &mut (dyn AsyncWrite + Send + Unpin),
    stderr: &mut (dyn AsyncWrite + Send + Unpin),
) -> NomadResult<Option<i32>> {
    let raw = match msg {
        Message::Text(text) => text.into_bytes(),
        Message::Binary(bytes) => bytes,
        Message::Close(frame) => {
            let reason = frame
                .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                .unwrap_or_else(|| "closed by server".to_string());
            return Err(NomadError::ExecClosed(reason));
        }
        _ => return Ok(None),
    };

    let frame: ServerFrame = serde_json::from_slice(&raw)?;
    if let Some(out) = frame.stdout {
        write_chunk(stdout, out).await?;
    }
    if let Some(err) = frame.stderr {
        write_chunk(stderr, err).await?;
    }
    if frame.exited {
        return Ok(Some(frame.result.unwrap_or_default().exit_code));
    }
    Ok(None)
}

async fn write_chunk(out: &mut (dyn AsyncWrite + Send + Unpin), frame: OutputFrame) -> NomadResult<()> {
    let Some(data) = frame.data else {
        return Ok(());
    };
    let bytes = STANDARD
        .decode(data.as_bytes())
        .map_err(|e| NomadError::ExecClosed(format!("invalid output frame: {e}")))?;
    out.write_all(&bytes).await?;
    out.flush().await?;
    Ok(())
}
