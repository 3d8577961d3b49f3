//! Session-wide error aggregation.
//!
//! Every asynchronous collaborator (allowance watch, shard fetches, claim
//! status watch, submissions) reports failures here instead of raising them,
//! so one failing data source never halts unrelated controls.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::state::{ErrorRecord, ErrorReport};

/// Snapshot of the queue, newest record first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    next_key: u64,
    records: Vec<ErrorRecord>,
}

impl ErrorLog {
    fn push(&mut self, report: ErrorReport) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        debug!(key, source = %report.source, message = %report.message, "error recorded");
        self.records.insert(
            0,
            ErrorRecord {
                key,
                source: report.source,
                message: report.message,
            },
        );
        key
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }
}

/// Queue of error records shared by every component of a session.
///
/// All mutations go through `watch::Sender::send_modify`, which runs the
/// update under the channel lock against the current log. Concurrent adders
/// therefore always compose onto the latest state and never lose entries.
#[derive(Debug, Clone)]
pub struct ErrorQueue {
    log: Arc<watch::Sender<ErrorLog>>,
}

impl Default for ErrorQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorQueue {
    pub fn new() -> Self {
        let (log, _) = watch::channel(ErrorLog::default());
        Self { log: Arc::new(log) }
    }

    /// Appends every present report and returns the keys assigned to them.
    ///
    /// `None`, an empty list, and `None` entries inside a list are ignored.
    pub fn add_errors<I>(&self, errors: Option<I>) -> Vec<u64>
    where
        I: IntoIterator,
        I::Item: Into<Option<ErrorReport>>,
    {
        let reports: Vec<ErrorReport> = errors
            .into_iter()
            .flatten()
            .filter_map(|item| -> Option<ErrorReport> { item.into() })
            .collect();
        if reports.is_empty() {
            return Vec::new();
        }

        let mut keys = Vec::with_capacity(reports.len());
        self.log.send_modify(|log| {
            keys.extend(reports.into_iter().map(|report| log.push(report)));
        });
        keys
    }

    pub fn add_error(&self, report: ErrorReport) -> u64 {
        let mut key = 0;
        self.log.send_modify(|log| key = log.push(report));
        key
    }

    /// Dismisses the record with `key`. Unknown keys are ignored.
    pub fn remove_error(&self, key: u64) -> bool {
        self.log.send_if_modified(|log| {
            let before = log.records.len();
            log.records.retain(|record| record.key != key);
            log.records.len() != before
        })
    }

    /// Drops every record; keys keep increasing afterwards.
    pub fn clear(&self) {
        self.log.send_if_modified(|log| {
            let had_records = !log.records.is_empty();
            log.records.clear();
            had_records
        });
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.log.borrow().records.clone()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().records.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<ErrorLog> {
        self.log.subscribe()
    }
}
