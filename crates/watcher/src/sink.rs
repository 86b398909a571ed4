//! Consumer loop: messages out of the channel into an output
//!
//! A [`Sink`] accepts one message at a time. [`run_sink`] drains the channel
//! into it, logging delivery failures without stopping.

use crate::channel::Receiver;
use crate::events::Message;
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error};
use watchpipe_core::{Error, Result};

/// Final destination for delivered messages
#[async_trait]
pub trait Sink: Send {
    /// Accept one message
    async fn deliver(&mut self, message: &Message) -> Result<()>;
}

/// Writes each message's text as one line
#[derive(Debug)]
pub struct LineSink<W> {
    writer: W,
}

impl<W> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Get the underlying writer back
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl LineSink<tokio::io::Stdout> {
    /// Sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> Sink for LineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(&mut self, message: &Message) -> Result<()> {
        write_line(&mut self.writer, &message.text)
            .await
            .map_err(|e| Error::delivery(format!("Failed to write message: {e}")))
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for &mut S {
    async fn deliver(&mut self, message: &Message) -> Result<()> {
        (**self).deliver(message).await
    }
}

/// Forward messages to another task
#[async_trait]
impl Sink for mpsc::UnboundedSender<Message> {
    async fn deliver(&mut self, message: &Message) -> Result<()> {
        self.send(message.clone())
            .map_err(|_| Error::delivery("Forwarding receiver dropped"))
    }
}

/// Deliver every message from `receiver` to `sink` until the channel closes
///
/// Delivery failures are logged and the loop carries on with the next
/// message. Returns the number of successful deliveries.
pub async fn run_sink<S: Sink>(mut receiver: Receiver<Message>, mut sink: S) -> usize {
    let mut delivered = 0;

    while let Some(message) = receiver.recv().await {
        match sink.deliver(&message).await {
            Ok(()) => delivered += 1,
            Err(e) => error!("Failed to deliver message from {:?}: {}", message.path, e),
        }
    }

    debug!("Channel closed after {} deliveries", delivered);
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::unbounded;

    /// Fails every other delivery
    struct FlakySink {
        attempts: usize,
        accepted: Vec<String>,
    }

    #[async_trait]
    impl Sink for FlakySink {
        async fn deliver(&mut self, message: &Message) -> Result<()> {
            self.attempts += 1;
            if self.attempts % 2 == 0 {
                return Err(Error::delivery("output closed"));
            }
            self.accepted.push(message.text.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_line_sink_writes_one_line_per_message() {
        let mut sink = LineSink::new(Vec::new());
        sink.deliver(&Message::new("a.txt", "first"))
            .await
            .expect("write to Vec failed");
        sink.deliver(&Message::new("b.txt", "second\nline"))
            .await
            .expect("write to Vec failed");

        let output = String::from_utf8(sink.into_inner()).expect("output is UTF-8");
        assert_eq!(output, "first\nsecond\nline\n");
    }

    #[tokio::test]
    async fn test_run_sink_delivers_in_order() {
        let (tx, rx) = unbounded();
        for text in ["one", "two", "three"] {
            tx.send(Message::new("f.txt", text));
        }
        drop(tx);

        let mut sink = LineSink::new(Vec::new());
        let delivered = run_sink(rx, &mut sink).await;

        assert_eq!(delivered, 3);
        assert_eq!(
            String::from_utf8(sink.into_inner()).expect("output is UTF-8"),
            "one\ntwo\nthree\n"
        );
    }

    #[tokio::test]
    async fn test_run_sink_survives_delivery_errors() {
        let (tx, rx) = unbounded();
        for text in ["a", "b", "c", "d", "e"] {
            tx.send(Message::new("f.txt", text));
        }
        drop(tx);

        let mut flaky = FlakySink {
            attempts: 0,
            accepted: Vec::new(),
        };
        let delivered = run_sink(rx, &mut flaky).await;

        assert_eq!(delivered, 3);
        assert_eq!(flaky.attempts, 5);
        assert_eq!(flaky.accepted, vec!["a", "c", "e"]);
    }

    #[tokio::test]
    async fn test_forwarding_sink() {
        let (tx, rx) = unbounded();
        tx.send(Message::new("a.txt", "A"));
        drop(tx);

        let (fwd_tx, mut fwd_rx) = mpsc::unbounded_channel::<Message>();
        assert_eq!(run_sink(rx, fwd_tx).await, 1);
        assert_eq!(fwd_rx.recv().await, Some(Message::new("a.txt", "A")));
    }

    #[tokio::test]
    async fn test_forwarding_sink_reports_dropped_receiver() {
        let (mut fwd_tx, fwd_rx) = mpsc::unbounded_channel::<Message>();
        drop(fwd_rx);

        let err = fwd_tx
            .deliver(&Message::new("a.txt", "A"))
            .await
            .expect_err("receiver is gone");
        assert!(err.is_recoverable());
    }
}
