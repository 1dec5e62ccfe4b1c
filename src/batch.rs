//! Sequential batched upserts with per-record failure accounting.
//!
//! Every record handed to [`BatchUpserter::run`] comes back exactly once, either as an
//! [`IndexedResult`] or an [`IndexedError`], tagged with its position in the input slice.

use std::time::Duration;

use itertools::Itertools;
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::config::{DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE};
use crate::error::RemoteError;
use crate::record::Record;
use crate::remote::{RemoteConnection, UpsertOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedResult {
    pub index: usize,
    pub id: String,
    pub created: bool,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedError {
    pub index: usize,
    pub messages: Vec<String>,
    pub record: Record,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub results: Vec<IndexedResult>,
    pub errors: Vec<IndexedError>,
}

/// Fixed-interval gate following each remote call.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Marks the end of a remote call.
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }

    /// Waits until `interval` has passed since the last [`mark`](Self::mark).
    pub async fn wait(&self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.interval).await;
        }
    }
}

pub struct BatchUpserter<'a, C: RemoteConnection + ?Sized> {
    connection: &'a C,
    batch_size: usize,
    pause: Duration,
}

impl<'a, C: RemoteConnection + ?Sized> BatchUpserter<'a, C> {
    pub fn new(connection: &'a C) -> Self {
        Self {
            connection,
            batch_size: DEFAULT_BATCH_SIZE,
            pause: DEFAULT_BATCH_PAUSE,
        }
    }

    /// Sizes below one are raised to one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Upserts `records` in consecutive chunks, one chunk in flight at a time.
    ///
    /// A chunk whose request fails as a whole yields one error per record carrying the
    /// request's error message; later chunks are still attempted.
    pub async fn run(
        &self,
        object_type: &str,
        external_id_field: &str,
        records: &[Record],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut pacer = Pacer::new(self.pause);
        let total_batches = records.len().div_ceil(self.batch_size);

        for (batch_no, chunk) in records.chunks(self.batch_size).enumerate() {
            let offset = batch_no * self.batch_size;

            info!(
                "Batch {}/{}: upserting records {}-{} into {}",
                batch_no + 1,
                total_batches,
                offset + 1,
                offset + chunk.len(),
                object_type
            );

            let response = self
                .connection
                .upsert(object_type, external_id_field, chunk)
                .await
                .and_then(|outcomes| {
                    if outcomes.len() == chunk.len() {
                        Ok(outcomes)
                    } else {
                        Err(RemoteError::Transport(format!(
                            "remote returned {} outcomes for {} records",
                            outcomes.len(),
                            chunk.len()
                        )))
                    }
                });
            pacer.mark();

            match response {
                Ok(outcomes) => {
                    for (j, (record, result)) in chunk.iter().zip(outcomes).enumerate() {
                        record_outcome(&mut outcome, offset + j, record, result);
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        "Batch {}/{} failed, marking {} records as failed: {}",
                        batch_no + 1,
                        total_batches,
                        chunk.len(),
                        message
                    );
                    outcome
                        .errors
                        .extend(chunk.iter().enumerate().map(|(j, record)| IndexedError {
                            index: offset + j,
                            messages: vec![message.clone()],
                            record: record.clone(),
                        }));
                }
            }

            // Rate limit applies after every chunk, the last one included.
            pacer.wait().await;
        }

        info!(
            "Upserted {} records: {} succeeded, {} failed",
            records.len(),
            outcome.results.len(),
            outcome.errors.len()
        );
        outcome
    }
}

fn record_outcome(
    outcome: &mut BatchOutcome,
    index: usize,
    record: &Record,
    result: UpsertOutcome,
) {
    match result {
        UpsertOutcome::Success { id, created } => {
            info!(
                "Record {}: {} {}",
                index + 1,
                if created { "created" } else { "updated" },
                id
            );
            outcome.results.push(IndexedResult {
                index,
                id,
                created,
                record: record.clone(),
            });
        }
        UpsertOutcome::Failure { messages } => {
            warn!("Record {}: failed: {}", index + 1, messages.iter().join("; "));
            debug!("Record {} payload: {:?}", index + 1, record);
            outcome.errors.push(IndexedError {
                index,
                messages,
                record: record.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::remote::Identity;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails every record whose `Id` is `"bad"`, and every chunk whose first `Id` is `"down"`.
    #[derive(Default)]
    struct FakeConnection {
        chunks: Mutex<Vec<Vec<Record>>>,
        short_response: bool,
    }

    #[async_trait]
    impl RemoteConnection for FakeConnection {
        async fn authenticate(&mut self, _: &Credentials) -> Result<Identity, RemoteError> {
            unreachable!("engine never authenticates")
        }

        async fn upsert(
            &self,
            _object_type: &str,
            _external_id_field: &str,
            records: &[Record],
        ) -> Result<Vec<UpsertOutcome>, RemoteError> {
            self.chunks.lock().unwrap().push(records.to_vec());
            if records[0].get("Id") == Some("down") {
                return Err(RemoteError::Transport("connection reset".to_string()));
            }
            let mut outcomes: Vec<_> = records
                .iter()
                .map(|r| match r.get("Id") {
                    Some("bad") => UpsertOutcome::Failure {
                        messages: vec!["DUPLICATE_VALUE".to_string(), "second".to_string()],
                    },
                    id => UpsertOutcome::Success {
                        id: format!("sf-{}", id.unwrap_or_default()),
                        created: id != Some("existing"),
                    },
                })
                .collect();
            if self.short_response {
                outcomes.pop();
            }
            Ok(outcomes)
        }
    }

    fn records(ids: &[&str]) -> Vec<Record> {
        ids.iter().map(|id| [("Id", *id)].into_iter().collect()).collect()
    }

    fn indices(outcome: &BatchOutcome) -> Vec<usize> {
        outcome
            .results
            .iter()
            .map(|r| r.index)
            .chain(outcome.errors.iter().map(|e| e.index))
            .sorted()
            .collect()
    }

    #[tokio::test]
    async fn chunks_are_consecutive_and_sized() {
        let conn = FakeConnection::default();
        let input = records(&["1", "2", "3", "4", "5", "6", "7"]);

        let outcome = BatchUpserter::new(&conn)
            .batch_size(3)
            .pause(Duration::ZERO)
            .run("Account", "Id", &input)
            .await;

        let chunks = conn.chunks.lock().unwrap();
        assert_eq!(chunks.iter().map(Vec::len).collect_vec(), vec![3, 3, 1]);
        assert_eq!(chunks.concat(), input);
        assert_eq!(indices(&outcome), (0..7).collect_vec());
    }

    #[tokio::test]
    async fn per_record_failures_keep_global_index() {
        let conn = FakeConnection::default();
        let input = records(&["1", "2", "bad", "existing"]);

        let outcome = BatchUpserter::new(&conn)
            .batch_size(2)
            .pause(Duration::ZERO)
            .run("Account", "Id", &input)
            .await;

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index, 2);
        assert_eq!(outcome.errors[0].messages, vec!["DUPLICATE_VALUE", "second"]);
        assert_eq!(outcome.errors[0].record, input[2]);

        let existing = &outcome.results[2];
        assert_eq!(existing.index, 3);
        assert_eq!(existing.id, "sf-existing");
        assert!(!existing.created);
    }

    #[tokio::test]
    async fn transport_failure_marks_whole_chunk_and_continues() {
        let conn = FakeConnection::default();
        let input = records(&["1", "2", "down", "x", "5"]);

        let outcome = BatchUpserter::new(&conn)
            .batch_size(2)
            .pause(Duration::ZERO)
            .run("Account", "Id", &input)
            .await;

        assert_eq!(conn.chunks.lock().unwrap().len(), 3);
        assert_eq!(
            outcome.results.iter().map(|r| r.index).collect_vec(),
            vec![0, 1, 4]
        );
        assert_eq!(
            outcome.errors.iter().map(|e| e.index).collect_vec(),
            vec![2, 3]
        );
        assert!(outcome
            .errors
            .iter()
            .all(|e| e.messages == vec!["connection reset".to_string()]));
    }

    #[tokio::test]
    async fn short_response_fails_the_chunk() {
        let conn = FakeConnection {
            short_response: true,
            ..Default::default()
        };
        let input = records(&["1", "2"]);

        let outcome = BatchUpserter::new(&conn)
            .pause(Duration::ZERO)
            .run("Account", "Id", &input)
            .await;

        assert!(outcome.results.is_empty());
        assert_eq!(indices(&outcome), vec![0, 1]);
        assert_eq!(
            outcome.errors[0].messages,
            vec!["remote returned 1 outcomes for 2 records"]
        );
    }

    #[tokio::test]
    async fn every_batch_size_accounts_for_every_record() {
        let input = records(&["1", "bad", "3", "down", "5", "6", "bad", "8", "9", "10", "11"]);
        for batch_size in 1..=12 {
            let conn = FakeConnection::default();
            let outcome = BatchUpserter::new(&conn)
                .batch_size(batch_size)
                .pause(Duration::ZERO)
                .run("Account", "Id", &input)
                .await;
            assert_eq!(
                indices(&outcome),
                (0..input.len()).collect_vec(),
                "batch size {batch_size}"
            );
        }
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let conn = FakeConnection::default();
        let outcome = BatchUpserter::new(&conn).run("Account", "Id", &[]).await;
        assert_eq!(outcome, BatchOutcome::default());
        assert!(conn.chunks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn single_batch_is_still_followed_by_a_pause() {
        let conn = FakeConnection::default();
        let start = Instant::now();

        BatchUpserter::new(&conn)
            .pause(Duration::from_millis(100))
            .run("Account", "Id", &records(&["1"]))
            .await;

        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_paced() {
        let conn = FakeConnection::default();
        let input = records(&["1", "2", "3"]);
        let start = Instant::now();

        BatchUpserter::new(&conn)
            .batch_size(1)
            .pause(Duration::from_millis(100))
            .run("Account", "Id", &input)
            .await;

        // One pause after each of the three batches.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }
}
