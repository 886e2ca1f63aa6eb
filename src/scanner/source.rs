use std::{io::BufRead, thread};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc::{self, error::TryRecvError},
};

/// Result of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePoll {
    Payload(String),
    /// Nothing decodable in this frame.
    Pending,
    /// The decoder will never produce another payload.
    Exhausted,
}

/// The external QR decoder, polled once per frame.
pub trait PayloadSource: Send {
    fn poll_payload(&mut self) -> SourcePoll;
}

/// Payloads pushed by a decoder running elsewhere.
pub struct ChannelSource {
    receiver: mpsc::Receiver<String>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<String>) -> Self {
        Self { receiver }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(receiver))
    }
}

impl PayloadSource for ChannelSource {
    fn poll_payload(&mut self) -> SourcePoll {
        match self.receiver.try_recv() {
            Ok(payload) => SourcePoll::Payload(payload),
            Err(TryRecvError::Empty) => SourcePoll::Pending,
            Err(TryRecvError::Disconnected) => SourcePoll::Exhausted,
        }
    }
}

/// Turn literal `\n` sequences into line breaks so multi-line payloads can be
/// carried on a single input line.
pub fn unescape_newlines(line: &str) -> String {
    line.replace("\\r\\n", "\n").replace("\\n", "\n")
}

fn line_to_payload(line: String, unescape: bool) -> Option<String> {
    if line.trim().is_empty() {
        return None;
    }
    Some(if unescape {
        unescape_newlines(&line)
    } else {
        line
    })
}

/// Feed a [`ChannelSource`] from a line-oriented reader, one payload per
/// non-blank line (e.g. the raw output of a command-line QR decoder).
pub fn spawn_line_reader<R>(reader: R, unescape: bool) -> ChannelSource
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (sender, source) = ChannelSource::channel(64);

    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some(payload) = line_to_payload(line, unescape) else {
                        continue;
                    };
                    if sender.send(payload).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    log::error!("Failed to read payload input: {err}");
                    break;
                }
            }
        }
    });

    source
}

/// Same as [`spawn_line_reader`] for readers that block, such as a terminal's
/// stdin. The read runs on a detached OS thread instead of the runtime's
/// blocking pool, so a read that never returns cannot hold up runtime shutdown.
pub fn spawn_blocking_line_reader<R>(reader: R, unescape: bool) -> std::io::Result<ChannelSource>
where
    R: BufRead + Send + 'static,
{
    let (sender, source) = ChannelSource::channel(64);

    thread::Builder::new()
        .name("qr-attendance-input".into())
        .spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        log::error!("Failed to read payload input: {err}");
                        break;
                    }
                };
                let Some(payload) = line_to_payload(line, unescape) else {
                    continue;
                };
                if sender.blocking_send(payload).is_err() {
                    break;
                }
            }
        })?;

    Ok(source)
}
