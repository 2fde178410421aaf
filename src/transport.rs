/// JSON-lines transport
///
/// Reads one request per line, runs each on its own worker thread and writes
/// one response line per request through a single writer thread. Responses
/// carry the request id and may come back in any order.
///
/// ```text
/// -> {"id":1,"method":"openDatabase","arguments":{"path":"/tmp/app.db"}}
/// <- {"status":"success","id":1,"result":1}
/// -> {"id":2,"method":"query","arguments":{"id":9,"sql":"SELECT 1"}}
/// <- {"status":"error","id":2,"code":"query","message":"database 9 not found"}
/// ```

use crate::dispatcher::{Bridge, CommandError, Outcome, Reply};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, warn};

/// Error code used when a request line cannot be decoded
pub const PARSE_ERROR_CODE: &str = "parse";

/// One decoded request line.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Caller-chosen correlation id, echoed in the response
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Response {
    Success {
        id: Option<u64>,
        result: Reply,
    },
    Error {
        id: Option<u64>,
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    NotImplemented {
        id: Option<u64>,
    },
}

impl Response {
    pub fn from_outcome(id: u64, outcome: Outcome) -> Self {
        let id = Some(id);
        match outcome {
            Outcome::Success(result) => Response::Success { id, result },
            Outcome::Error(CommandError { code, message, details }) => Response::Error {
                id,
                code,
                message,
                details,
            },
            Outcome::NotImplemented => Response::NotImplemented { id },
        }
    }

    /// Response to a line that is not a valid request.
    ///
    /// The id is recovered when the line is at least a JSON object with one.
    pub fn parse_error(line: &str, err: &serde_json::Error) -> Self {
        let id = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("id").and_then(serde_json::Value::as_u64));
        Response::Error {
            id,
            code: PARSE_ERROR_CODE.to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

/// Handles one raw request line, producing exactly one response.
pub fn handle_line(bridge: &Bridge, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => {
            debug!("Request {} {}", request.id, request.method);
            Response::from_outcome(request.id, bridge.handle(&request.method, &request.arguments))
        }
        Err(e) => {
            warn!("Malformed request: {}", e);
            Response::parse_error(line, &e)
        }
    }
}

/// Serves requests from `input` until it is exhausted.
///
/// Returns once every in-flight request has been answered.
///
/// # Errors
///
/// The first I/O error from reading `input` or writing `output`.
pub fn serve<R, W>(bridge: &Bridge, input: R, output: W) -> io::Result<()>
where
    R: BufRead,
    W: Write + Send,
{
    let (tx, rx) = mpsc::channel::<Response>();

    thread::scope(|scope| {
        let writer = scope.spawn(move || write_responses(rx, output));

        let mut read_result = Ok(());
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read request: {}", e);
                    read_result = Err(e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let tx = tx.clone();
            scope.spawn(move || {
                // The writer only stops early on an output error, already reported there
                let _ = tx.send(handle_line(bridge, &line));
            });
        }
        drop(tx);

        let write_result = writer
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        read_result.and(write_result)
    })
}

fn write_responses<W: Write>(rx: mpsc::Receiver<Response>, mut output: W) -> io::Result<()> {
    for response in rx {
        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}
