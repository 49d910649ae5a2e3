//! Test utilities and mock implementations for testing the ingester

pub mod mocks;

use crate::monitoring::IngestEvent;
use crate::record::Record;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;

const ANIMALS: [&str; 6] = ["dog", "cat", "mouse", "horse", "stoat", "snake"];

/// Helper functions for creating test data
pub struct TestUtils;

impl TestUtils {
    /// Create a test record with a given payload and partition key
    pub fn create_test_record(data: &str, partition_key: &str) -> Record {
        Record::new(data.to_string(), partition_key)
    }

    /// Create `count` records with distinct payloads spread over 100 partition keys
    pub fn create_test_records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| Self::create_test_record(&format!("data-{}", i), &format!("pk-{}", i % 100)))
            .collect()
    }

    /// Create CSV-like sample records with random content; payloads stay unique by index
    pub fn create_sample_records(count: usize) -> Vec<Record> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|i| {
                let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("dog");
                let a: u32 = rng.gen();
                let b: f32 = rng.gen::<u32>() as f32 * 0.001;
                Self::create_test_record(
                    &format!("{}, {}, {}, {}", i, animal, a, b),
                    &format!("pk-{}", i % 100),
                )
            })
            .collect()
    }
}

/// Drain monitoring events until the channel is idle for `idle` or closes
pub async fn collect_monitoring_events(
    rx: &mut mpsc::Receiver<IngestEvent>,
    idle: Duration,
) -> Vec<IngestEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(idle, rx.recv()).await {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_create_test_records() {
        let records = TestUtils::create_test_records(150);
        assert_eq!(records.len(), 150);
        assert_eq!(records[0].data().as_ref(), b"data-0");
        assert_eq!(records[0].partition_key(), "pk-0");
        assert_eq!(records[101].partition_key(), "pk-1");
    }

    #[test]
    fn test_sample_records_are_unique() {
        let records = TestUtils::create_sample_records(500);
        let payloads: HashSet<_> = records.iter().map(|r| r.data().clone()).collect();
        assert_eq!(payloads.len(), 500);
        assert!(records[7].data().starts_with(b"7, "));
    }
}
