//! # History Ring Buffers
//!
//! One bounded FIFO per identifier. Appending past the cap evicts exactly one
//! oldest record, so a buffer never holds more than `cap` records.

use std::collections::{HashMap, VecDeque};

use crate::core::error::EngineError;
use crate::core::record::TelemetryRecord;

/// Bounded, oldest-first record buffer for one identifier.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    records: VecDeque<TelemetryRecord>,
    cap: usize,
}

impl HistoryBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            records: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    /// Appends a record, evicting the oldest one when the cap is exceeded.
    pub fn push(&mut self, record: TelemetryRecord) {
        self.records.push_back(record);
        if self.records.len() > self.cap {
            self.records.pop_front();
        }
    }

    /// The most recently appended record.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.records.back()
    }

    /// Records with `start < timestamp < end`, in buffer order.
    pub fn range(&self, start: i64, end: i64) -> impl Iterator<Item = &TelemetryRecord> {
        self.records
            .iter()
            .filter(move |r| r.timestamp() > start && r.timestamp() < end)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

/// All per-identifier buffers, sharing one cap.
#[derive(Debug, Clone)]
pub struct History {
    buffers: HashMap<String, HistoryBuffer>,
    cap: usize,
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            cap,
        }
    }

    /// Creates an empty buffer for `id` if it has none.
    pub fn ensure(&mut self, id: &str) {
        if !self.buffers.contains_key(id) {
            self.buffers.insert(id.to_string(), HistoryBuffer::new(self.cap));
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.buffers.contains_key(id)
    }

    pub fn buffer(&self, id: &str) -> Option<&HistoryBuffer> {
        self.buffers.get(id)
    }

    /// Appends to the buffer of `id`, failing for identifiers without one.
    pub fn push(&mut self, id: &str, record: TelemetryRecord) -> Result<(), EngineError> {
        let buffer = self
            .buffers
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownIdentifier(id.to_string()))?;
        buffer.push(record);
        Ok(())
    }

    /// Last record of each identifier, concatenated in argument order.
    /// Identifiers without data contribute nothing.
    pub fn latest<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<TelemetryRecord>, EngineError> {
        let mut response = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.lookup(id.as_ref())?.latest() {
                response.push(record.clone());
            }
        }
        Ok(response)
    }

    /// Records strictly inside `(start, end)` for each identifier,
    /// concatenated per identifier in argument order (not merged by time).
    pub fn range<S: AsRef<str>>(
        &self,
        ids: &[S],
        start: i64,
        end: i64,
    ) -> Result<Vec<TelemetryRecord>, EngineError> {
        let buffers = ids
            .iter()
            .map(|id| self.lookup(id.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(buffers
            .into_iter()
            .flat_map(|buffer| buffer.range(start, end).cloned())
            .collect())
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.buffers.keys()
    }

    fn lookup(&self, id: &str) -> Result<&HistoryBuffer, EngineError> {
        self.buffers
            .get(id)
            .ok_or_else(|| EngineError::UnknownIdentifier(id.to_string()))
    }
}
