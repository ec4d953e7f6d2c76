//! Output of a running VM's standard streams.
//!
//! Every child gets exactly one drain task. It reads stdout and stderr line by
//! line and either forwards the lines to a [`ConsoleOutput`] (interactive
//! launches) or logs stderr through `tracing` (detached launches). In both
//! cases the last few stderr lines are kept so a failed startup can report
//! what the hypervisor said.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use virtmachines_core::{Error, Result};

const STDERR_TAIL_LINES: usize = 20;

/// Which of the child's output streams a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One complete line of child output, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Receiving end of an interactive VM's output.
///
/// Obtained once per VM from [`VmHandle::take_output`](crate::VmHandle::take_output).
/// The stream ends after the child has closed both of its output pipes.
pub struct ConsoleOutput {
    rx: UnboundedReceiver<ConsoleLine>,
}

impl ConsoleOutput {
    pub(crate) fn channel() -> (UnboundedSender<ConsoleLine>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Next line, or `None` once the child's output is closed.
    pub async fn next_line(&mut self) -> Option<ConsoleLine> {
        self.rx.recv().await
    }

    /// Next line if one is already queued.
    pub fn try_next_line(&mut self) -> Option<ConsoleLine> {
        self.rx.try_recv().ok()
    }

    /// Skips lines until one contains `pattern`.
    ///
    /// Returns `None` if the output closes first.
    pub async fn wait_for(&mut self, pattern: &str) -> Option<ConsoleLine> {
        while let Some(line) = self.rx.recv().await {
            if line.text.contains(pattern) {
                return Some(line);
            }
        }
        None
    }

    /// Like [`wait_for`](Self::wait_for) with a deadline.
    ///
    /// Returns [`Error::Timeout`] when the deadline passes and
    /// [`Error::NotRunning`] when the output closes without a match.
    pub async fn wait_for_timeout(&mut self, pattern: &str, duration: Duration) -> Result<ConsoleLine> {
        match timeout(duration, self.wait_for(pattern)).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(Error::NotRunning),
            Err(_) => Err(Error::Timeout(format!("waiting for '{pattern}' in VM output"))),
        }
    }
}

/// Bounded record of the most recent stderr lines.
#[derive(Debug, Clone, Default)]
pub(crate) struct StderrTail(Arc<Mutex<VecDeque<String>>>);

impl StderrTail {
    fn push(&self, line: &str) {
        let mut lines = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == STDERR_TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    pub(crate) fn snapshot(&self) -> String {
        let lines = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Spawns the drain task for one child.
///
/// With a `sink`, every line of both streams is forwarded to it. Without one,
/// stderr lines are logged at warn level under `label` and stdout is
/// discarded.
pub(crate) fn spawn_drain<O, E>(
    stdout: Option<O>,
    stderr: Option<E>,
    sink: Option<UnboundedSender<ConsoleLine>>,
    tail: StderrTail,
    label: String,
) -> JoinHandle<()>
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let out = async {
            if let Some(reader) = stdout {
                forward(reader, OutputStream::Stdout, sink.as_ref(), &tail, &label).await;
            }
        };
        let err = async {
            if let Some(reader) = stderr {
                forward(reader, OutputStream::Stderr, sink.as_ref(), &tail, &label).await;
            }
        };
        tokio::join!(out, err);
        tracing::debug!(vm = %label, "output streams closed");
    })
}

async fn forward<R>(
    reader: R,
    stream: OutputStream,
    sink: Option<&UnboundedSender<ConsoleLine>>,
    tail: &StderrTail,
    label: &str,
) where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        let bytes = match segments.next_segment().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(vm = %label, "failed to read {:?}: {}", stream, e);
                break;
            }
        };
        let text = String::from_utf8_lossy(&bytes)
            .trim_end_matches('\r')
            .to_string();

        if stream == OutputStream::Stderr {
            tail.push(&text);
        }

        match sink {
            // A dropped receiver only means nobody is watching any more.
            Some(tx) => {
                let _ = tx.send(ConsoleLine { stream, text });
            }
            None if stream == OutputStream::Stderr => {
                tracing::warn!(vm = %label, "{}", text);
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_bytes(
        stdout: &'static [u8],
        stderr: &'static [u8],
        sink: Option<UnboundedSender<ConsoleLine>>,
        tail: StderrTail,
    ) -> JoinHandle<()> {
        spawn_drain(Some(stdout), Some(stderr), sink, tail, "test".to_string())
    }

    mod drain {
        use super::*;

        #[tokio::test]
        async fn forwards_both_streams() {
            let (tx, mut output) = ConsoleOutput::channel();
            drain_bytes(b"one\ntwo\n", b"oops\n", Some(tx), StderrTail::default())
                .await
                .unwrap();

            let mut lines = Vec::new();
            while let Some(line) = output.next_line().await {
                lines.push(line);
            }

            let stdout: Vec<_> = lines
                .iter()
                .filter(|l| l.stream == OutputStream::Stdout)
                .map(|l| l.text.as_str())
                .collect();
            assert_eq!(stdout, ["one", "two"]);
            assert!(lines.contains(&ConsoleLine {
                stream: OutputStream::Stderr,
                text: "oops".to_string(),
            }));
        }

        #[tokio::test]
        async fn strips_carriage_returns_and_keeps_partial_last_line() {
            let (tx, mut output) = ConsoleOutput::channel();
            drain_bytes(b"dos\r\n(qemu) ", b"", Some(tx), StderrTail::default())
                .await
                .unwrap();

            assert_eq!(output.next_line().await.unwrap().text, "dos");
            assert_eq!(output.next_line().await.unwrap().text, "(qemu) ");
            assert!(output.next_line().await.is_none());
        }

        #[tokio::test]
        async fn keeps_stderr_tail_without_sink() {
            let tail = StderrTail::default();
            drain_bytes(b"ignored\n", b"first\nsecond\n", None, tail.clone())
                .await
                .unwrap();
            assert_eq!(tail.snapshot(), "first\nsecond");
        }

        #[tokio::test]
        async fn tail_is_bounded() {
            let tail = StderrTail::default();
            for i in 0..(STDERR_TAIL_LINES + 5) {
                tail.push(&format!("line {i}"));
            }
            let snapshot = tail.snapshot();
            assert_eq!(snapshot.lines().count(), STDERR_TAIL_LINES);
            assert!(snapshot.starts_with("line 5"));
        }
    }

    mod console_output {
        use super::*;

        #[tokio::test]
        async fn wait_for_skips_to_match() {
            let (tx, mut output) = ConsoleOutput::channel();
            for text in ["booting", "login: ready", "after"] {
                tx.send(ConsoleLine {
                    stream: OutputStream::Stdout,
                    text: text.to_string(),
                })
                .unwrap();
            }
            let line = output.wait_for("login").await.unwrap();
            assert_eq!(line.text, "login: ready");
            assert_eq!(output.try_next_line().unwrap().text, "after");
        }

        #[tokio::test]
        async fn wait_for_timeout_reports_closed_stream() {
            let (tx, mut output) = ConsoleOutput::channel();
            drop(tx);
            let err = output
                .wait_for_timeout("never", Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotRunning));
        }

        #[tokio::test]
        async fn wait_for_timeout_expires() {
            let (_tx, mut output) = ConsoleOutput::channel();
            let err = output
                .wait_for_timeout("never", Duration::from_millis(20))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Timeout(_)));
        }
    }
}
