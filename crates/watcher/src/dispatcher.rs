//! Producer loop: change events in, messages out
//!
//! The dispatcher pulls events from an [`EventSource`], feeds qualifying
//! ones through a [`Debouncer`], and once a burst settles reads the files
//! and pushes one [`Message`] per file onto the channel.

use crate::channel::{SendOutcome, Sender};
use crate::debouncer::{Debouncer, Settlement};
use crate::events::{ChangeEvent, Message};
use crate::reader::{FileReader, ReadOutcome};
use crate::source::EventSource;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use watchpipe_core::config::{BurstPolicy, ReadPolicy};

/// Paths touched since the last burst settled
#[derive(Debug, Clone, Default)]
struct BurstPaths {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl BurstPaths {
    fn lock(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add the event's paths (first-seen order, no duplicates) and return
    /// everything recorded so far
    fn record(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut recorded = self.lock();
        for path in paths {
            if !recorded.contains(&path) {
                recorded.push(path);
            }
        }
        recorded.clone()
    }

    fn reset(&self) {
        self.lock().clear();
    }
}

/// Drives the source and hands settled bursts to the channel
pub struct Dispatcher {
    window: Duration,
    burst_policy: BurstPolicy,
    read_policy: ReadPolicy,
    reader: Arc<dyn FileReader>,
    sender: Sender<Message>,
}

impl Dispatcher {
    /// Create a dispatcher reading with `reader` and sending on `sender`
    pub fn new(window: Duration, reader: Arc<dyn FileReader>, sender: Sender<Message>) -> Self {
        Self {
            window,
            burst_policy: BurstPolicy::default(),
            read_policy: ReadPolicy::default(),
            reader,
            sender,
        }
    }

    /// Choose which paths a settled burst reads
    pub fn with_burst_policy(mut self, policy: BurstPolicy) -> Self {
        self.burst_policy = policy;
        self
    }

    /// Choose how partial read failures are handled
    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    /// Run until the source is exhausted
    ///
    /// Bursts still inside their window when the source ends are delivered
    /// by their own tasks; the channel closes once the last of them is done.
    pub async fn run<S: EventSource>(self, mut source: S) {
        let burst = BurstPaths::default();
        let reader = Arc::clone(&self.reader);
        let handler_burst = burst.clone();

        let debouncer = Debouncer::new(self.window, move |paths: Vec<PathBuf>| {
            handler_burst.reset();
            let reader = Arc::clone(&reader);
            async move { reader.read_all(&paths).await }
        });

        while let Some(event) = source.next_event().await {
            if !event.is_qualifying() {
                trace!("Ignoring {:?} event for {:?}", event.kind, event.paths);
                continue;
            }

            let paths = self.burst_paths(&burst, event);
            debug!("Debouncing change to {} path(s)", paths.len());

            let call = debouncer.call(paths);
            let sender = self.sender.clone();
            let read_policy = self.read_policy;

            tokio::spawn(async move {
                match call.await {
                    Settlement::Completed(outcomes) => {
                        deliver(outcomes, read_policy, &sender).await;
                    }
                    Settlement::Superseded => {
                        trace!("Change superseded by a newer event");
                    }
                    Settlement::Failed => {
                        error!("Reading a settled burst failed; nothing delivered");
                    }
                }
            });
        }

        debug!("Change source ended");
    }

    fn burst_paths(&self, burst: &BurstPaths, event: ChangeEvent) -> Vec<PathBuf> {
        match self.burst_policy {
            BurstPolicy::LastEvent => event.paths,
            BurstPolicy::Union => burst.record(event.paths),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("window", &self.window)
            .field("burst_policy", &self.burst_policy)
            .field("read_policy", &self.read_policy)
            .finish_non_exhaustive()
    }
}

/// Send the successful reads of a settled burst, in read order
///
/// Returns the number of messages that reached the buffer.
async fn deliver(
    outcomes: Vec<ReadOutcome>,
    policy: ReadPolicy,
    sender: &Sender<Message>,
) -> usize {
    let mut texts = Vec::with_capacity(outcomes.len());
    let mut failures = 0usize;

    for (path, outcome) in outcomes {
        match outcome {
            Ok(text) => texts.push(Message::new(path, text)),
            Err(e) => {
                failures += 1;
                error!("{}", e);
            }
        }
    }

    if failures > 0 && policy == ReadPolicy::FailFast {
        error!(
            "Discarding burst of {} file(s) after {} read failure(s)",
            texts.len() + failures,
            failures
        );
        return 0;
    }

    let mut enqueued = 0;
    for message in texts {
        match sender.send_wait(message).await {
            SendOutcome::Enqueued => enqueued += 1,
            SendOutcome::DroppedOldest(evicted) => {
                enqueued += 1;
                warn!("Channel full, dropped oldest message from {:?}", evicted.path);
            }
            SendOutcome::DroppedNewest(rejected) | SendOutcome::Full(rejected) => {
                warn!("Channel full, dropped message from {:?}", rejected.path);
            }
            SendOutcome::Closed(rejected) => {
                warn!("Sink is gone, dropped message from {:?}", rejected.path);
            }
        }
    }

    debug!("Delivered {} message(s) to the channel", enqueued);
    enqueued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{unbounded, Receiver};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::path::Path;
    use tokio::sync::mpsc;
    use tokio::time::Instant;
    use watchpipe_core::{Error, Result};

    /// In-memory reader that records every batch it is asked for
    #[derive(Default)]
    struct MapReader {
        files: HashMap<PathBuf, String>,
        batches: Mutex<Vec<(Duration, Vec<PathBuf>)>>,
        start: Option<Instant>,
    }

    impl MapReader {
        fn with_files(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, t)| (PathBuf::from(p), t.to_string()))
                    .collect(),
                batches: Mutex::new(Vec::new()),
                start: Some(Instant::now()),
            }
        }

        fn batches(&self) -> Vec<(Duration, Vec<PathBuf>)> {
            self.batches.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl FileReader for MapReader {
        async fn read_text(&self, path: &Path) -> Result<String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| Error::read(path, "No such file or directory"))
        }

        async fn read_all(&self, paths: &[PathBuf]) -> Vec<ReadOutcome> {
            let at = self.start.map(|s| s.elapsed()).unwrap_or_default();
            self.batches
                .lock()
                .expect("lock poisoned")
                .push((at, paths.to_vec()));
            let mut outcomes = Vec::new();
            for path in paths {
                outcomes.push((path.clone(), self.read_text(path).await));
            }
            outcomes
        }
    }

    /// Reader that crashes on `boom.txt`
    struct CrashingReader {
        inner: MapReader,
    }

    #[async_trait]
    impl FileReader for CrashingReader {
        async fn read_text(&self, path: &Path) -> Result<String> {
            if path == Path::new("boom.txt") {
                panic!("reader crashed on {}", path.display());
            }
            self.inner.read_text(path).await
        }
    }

    async fn drain(mut rx: Receiver<Message>) -> Vec<String> {
        let mut texts = Vec::new();
        while let Some(message) = rx.recv().await {
            texts.push(message.text);
        }
        texts
    }

    /// Feed `(at_ms, event)` pairs to a dispatcher and collect what reaches
    /// the channel
    async fn run_scenario(
        dispatcher: impl FnOnce(Sender<Message>) -> Dispatcher,
        events: Vec<(u64, ChangeEvent)>,
    ) -> Vec<String> {
        let (msg_tx, msg_rx) = unbounded();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let run = tokio::spawn(dispatcher(msg_tx).run(event_rx));

        let start = Instant::now();
        for (at_ms, event) in events {
            tokio::time::sleep_until(start + Duration::from_millis(at_ms)).await;
            event_tx.send(event).expect("dispatcher stopped early");
        }
        drop(event_tx);

        let texts = drain(msg_rx).await;
        run.await.expect("dispatcher panicked");
        texts
    }

    fn assert_near(actual: Duration, expected_ms: u64) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(10),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_reads_last_event_paths_once() {
        let reader = Arc::new(MapReader::with_files(&[("a.txt", "A"), ("b.txt", "B")]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| Dispatcher::new(Duration::from_millis(300), shared, tx),
            vec![
                (0, ChangeEvent::modified(["a.txt"])),
                (100, ChangeEvent::modified(["a.txt", "b.txt"])),
            ],
        )
        .await;

        assert_eq!(texts, vec!["A", "B"]);
        let batches = reader.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0].1,
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
        assert_near(batches[0].0, 400);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separated_events_deliver_independently() {
        let reader = Arc::new(MapReader::with_files(&[("a.txt", "A")]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| Dispatcher::new(Duration::from_millis(300), shared, tx),
            vec![
                (0, ChangeEvent::modified(["a.txt"])),
                (500, ChangeEvent::created(["a.txt"])),
            ],
        )
        .await;

        assert_eq!(texts, vec!["A", "A"]);
        let batches = reader.batches();
        assert_eq!(batches.len(), 2);
        assert_near(batches[0].0, 300);
        assert_near(batches[1].0, 800);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_qualifying_events_never_deliver() {
        let reader = Arc::new(MapReader::with_files(&[("a.txt", "A")]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| Dispatcher::new(Duration::from_millis(300), shared, tx),
            vec![
                (0, ChangeEvent::other(["a.txt"])),
                (1_000, ChangeEvent::other(["a.txt"])),
            ],
        )
        .await;

        assert!(texts.is_empty());
        assert!(reader.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_qualifying_event_does_not_disturb_burst() {
        let reader = Arc::new(MapReader::with_files(&[("a.txt", "A")]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| Dispatcher::new(Duration::from_millis(300), shared, tx),
            vec![
                (0, ChangeEvent::modified(["a.txt"])),
                (200, ChangeEvent::other(["a.txt"])),
            ],
        )
        .await;

        assert_eq!(texts, vec!["A"]);
        assert_near(reader.batches()[0].0, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_delivers_readable_files() {
        let reader = Arc::new(MapReader::with_files(&[("a.txt", "A"), ("c.txt", "C")]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| Dispatcher::new(Duration::from_millis(300), shared, tx),
            vec![(0, ChangeEvent::modified(["a.txt", "gone.txt", "c.txt"]))],
        )
        .await;

        assert_eq!(texts, vec!["A", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_discards_burst() {
        let reader = Arc::new(MapReader::with_files(&[("a.txt", "A")]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| {
                Dispatcher::new(Duration::from_millis(300), shared, tx)
                    .with_read_policy(ReadPolicy::FailFast)
            },
            vec![
                (0, ChangeEvent::modified(["a.txt", "gone.txt"])),
                (1_000, ChangeEvent::modified(["a.txt"])),
            ],
        )
        .await;

        // The failed burst is skipped; the next event reads again.
        assert_eq!(texts, vec!["A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_union_policy_reads_every_touched_path() {
        let reader = Arc::new(MapReader::with_files(&[
            ("a.txt", "A"),
            ("b.txt", "B"),
            ("c.txt", "C"),
        ]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| {
                Dispatcher::new(Duration::from_millis(300), shared, tx)
                    .with_burst_policy(BurstPolicy::Union)
            },
            vec![
                (0, ChangeEvent::modified(["b.txt"])),
                (100, ChangeEvent::created(["a.txt", "b.txt"])),
                (1_000, ChangeEvent::modified(["c.txt"])),
            ],
        )
        .await;

        assert_eq!(texts, vec!["B", "A", "C"]);
        let batches = reader.batches();
        assert_eq!(batches.len(), 2);
        // The accumulator starts over after each burst.
        assert_eq!(batches[1].1, vec![PathBuf::from("c.txt")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_qualifying_event_without_paths() {
        let reader = Arc::new(MapReader::with_files(&[]));
        let shared: Arc<dyn FileReader> = reader.clone();

        let texts = run_scenario(
            |tx| Dispatcher::new(Duration::from_millis(300), shared, tx),
            vec![(0, ChangeEvent::modified(Vec::<PathBuf>::new()))],
        )
        .await;

        assert!(texts.is_empty());
        assert_eq!(reader.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_read_drops_burst_and_keeps_running() {
        let reader: Arc<dyn FileReader> = Arc::new(CrashingReader {
            inner: MapReader::with_files(&[("a.txt", "A")]),
        });

        let texts = run_scenario(
            |tx| Dispatcher::new(Duration::from_millis(300), reader, tx),
            vec![
                (0, ChangeEvent::modified(["a.txt", "boom.txt"])),
                (1_000, ChangeEvent::modified(["a.txt"])),
            ],
        )
        .await;

        assert_eq!(texts, vec!["A"]);
    }

    #[tokio::test]
    async fn test_deliver_reports_closed_channel() {
        let (tx, rx) = unbounded();
        drop(rx);

        let delivered = deliver(
            vec![(PathBuf::from("a.txt"), Ok("A".to_string()))],
            ReadPolicy::CollectPartial,
            &tx,
        )
        .await;
        assert_eq!(delivered, 0);
    }
}
