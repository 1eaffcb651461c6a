use std::sync::{Arc, Mutex};

use dagrun::dag::{TransitionRecord, TransitionSink};

/// Transition sink that remembers every record, for observability tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TransitionRecord>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<TransitionRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TransitionSink for RecordingSink {
    fn record(&self, record: &TransitionRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}
