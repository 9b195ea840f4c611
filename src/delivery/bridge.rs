//! Scripted delivery bridge: embeds a secondary scripting runtime and
//! forwards payloads into it.
//!
//! The bridge spawns one long-lived interpreter process per bridge instance,
//! lazily, on first delivery. A generated bootstrap fragment loads the
//! configured script module, instantiates the configured entry type, and
//! loops forwarding one JSON payload per stdin line to the configured start
//! operation; a per-line rescue keeps one failed delivery from taking the
//! runtime down with it. The handle (child process + a dedicated writer
//! task that owns its stdin) is retained across deliveries and never shared
//! across bridge instances. A runtime found dead is discarded and the next
//! delivery boots a fresh one.
//!
//! Lines reach the pipe whole or not at all: the caller hands the writer
//! task a complete newline-terminated line and awaits an acknowledgement,
//! so cancelling the caller (timeout) can never split a line mid-write.
//!
//! Thread-safety of the script's own delivery operation is an environmental
//! assumption: payload lines are written strictly one at a time, but the
//! bridge makes no promise about what the script does per line.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};

use super::{DeliveryBackend, DeliveryError, NotificationPayload};
use crate::config::BridgeConfig;

/// Loader-configuration variables scrubbed from the child environment.
///
/// The caller's ambient loader state (option injection, extra load paths,
/// bundler project pinning) must never leak into the secondary runtime.
/// Scrubbing the child environment achieves the required isolation without
/// ever mutating the parent process environment.
const SCRUBBED_ENV_VARS: [&str; 6] = [
    "RUBYOPT",
    "RUBYLIB",
    "BUNDLE_GEMFILE",
    "BUNDLE_PATH",
    "GEM_HOME",
    "GEM_PATH",
];

/// Queued-line capacity of the writer channel.
const WRITER_QUEUE_LINES: usize = 16;

/// Acknowledgement for one written line.
type WriteAck = oneshot::Sender<Result<(), DeliveryError>>;

/// Retained handle to the booted secondary runtime.
struct BridgeHandle {
    child: Child,
    lines: mpsc::Sender<(String, WriteAck)>,
}

/// Delivery backend backed by an embedded scripting runtime.
///
/// Construction is cheap; the expensive runtime boot happens once, on the
/// first delivery, guarded by the handle mutex so concurrent build
/// completions cannot boot twice.
pub struct ScriptBridge {
    config: BridgeConfig,
    handle: Mutex<Option<BridgeHandle>>,
}

impl ScriptBridge {
    /// Create a bridge for the given deployment-fixed identifiers.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
        }
    }

    /// The bootstrap fragment evaluated inside the secondary runtime.
    ///
    /// Requires the configured module, instantiates the configured entry
    /// type, and forwards each JSON line on stdin to the configured start
    /// operation. Each line is rescued individually: a failed delivery is
    /// reported on stderr and the loop keeps serving later builds.
    #[doc(hidden)]
    pub fn bootstrap_fragment(config: &BridgeConfig) -> String {
        format!(
            concat!(
                "require \"json\"\n",
                "require \"{module}\"\n",
                "STDOUT.sync = true\n",
                "handler = {entry}.new\n",
                "while (line = STDIN.gets)\n",
                "  begin\n",
                "    handler.{start}(JSON.parse(line))\n",
                "  rescue StandardError => e\n",
                "    warn(\"delivery failed: \" + e.message)\n",
                "  end\n",
                "end\n",
            ),
            module = config.script_module,
            entry = config.entry_type,
            start = config.start_operation,
        )
    }

    /// Boot the secondary runtime and retain its handle.
    async fn boot(&self) -> Result<BridgeHandle, DeliveryError> {
        let fragment = Self::bootstrap_fragment(&self.config);

        let mut command = Command::new(&self.config.interpreter);
        // Additive module search path, isolated to this child.
        for path in &self.config.search_paths {
            command.arg("-I").arg(path);
        }
        command.arg("-e").arg(&fragment);
        for var in SCRUBBED_ENV_VARS {
            command.env_remove(var);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            DeliveryError::Boot(format!(
                "failed to spawn interpreter '{}': {e}",
                self.config.interpreter
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DeliveryError::Boot("interpreter stdin pipe unavailable".to_owned()))?;
        let lines = spawn_writer(stdin);

        // Surface interpreter diagnostics without ever blocking delivery.
        if let Some(stderr) = child.stderr.take() {
            let module = self.config.script_module.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(script = %module, "delivery runtime stderr: {line}");
                }
            });
        }

        info!(
            interpreter = %self.config.interpreter,
            module = %self.config.script_module,
            entry = %self.config.entry_type,
            operation = %self.config.start_operation,
            "delivery runtime booted"
        );
        Ok(BridgeHandle { child, lines })
    }

    /// One delivery attempt without the timeout wrapper.
    async fn deliver_inner(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let mut line = serde_json::to_string(payload)?;
        line.push('\n');

        let mut guard = self.handle.lock().await;
        let mut handle = match guard.take() {
            Some(handle) => handle,
            None => self.boot().await?,
        };

        // A dead runtime is dropped here instead of being put back, so the
        // next delivery boots a fresh one; this delivery still fails.
        if let Ok(Some(status)) = handle.child.try_wait() {
            return Err(DeliveryError::RuntimeGone(format!(
                "interpreter exited with {status}"
            )));
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if handle.lines.send((line, ack_tx)).await.is_err() {
            return Err(DeliveryError::RuntimeGone(
                "delivery writer stopped".to_owned(),
            ));
        }
        *guard = Some(handle);
        drop(guard);

        match ack_rx.await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::RuntimeGone(
                "delivery writer dropped the line".to_owned(),
            )),
        }
    }
}

/// Spawn the task that owns the runtime's stdin and writes queued lines.
///
/// The write itself happens in this uncancellable task, so a caller that
/// gives up waiting (timeout) leaves the pipe with whole lines only; its
/// line is either fully written or discarded with the writer, never split.
/// A write error stops the task, which closes the channel and surfaces as
/// a gone runtime on the next delivery.
fn spawn_writer<W>(mut stdin: W) -> mpsc::Sender<(String, WriteAck)>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<(String, WriteAck)>(WRITER_QUEUE_LINES);
    tokio::spawn(async move {
        while let Some((line, ack)) = rx.recv().await {
            let result = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            }
            .await;
            let failed = result.is_err();
            let _ = ack.send(
                result.map_err(|e| DeliveryError::RuntimeGone(format!("stdin write failed: {e}"))),
            );
            if failed {
                break;
            }
        }
    });
    tx
}

#[async_trait]
impl DeliveryBackend for ScriptBridge {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        match self.config.delivery_timeout_seconds {
            None => self.deliver_inner(payload).await,
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), self.deliver_inner(payload))
                    .await
                {
                    Ok(result) => result,
                    // The line was handed to the writer whole (or not at
                    // all); giving up here cannot corrupt the stream.
                    Err(_) => Err(DeliveryError::Timeout(secs)),
                }
            }
        }
    }
}
