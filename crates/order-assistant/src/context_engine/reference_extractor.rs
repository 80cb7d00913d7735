//! Finds an order number in free text and checks it against the store

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::records::{OrderRecord, RecordStore};

lazy_static! {
    // ASCII digits only; Unicode \d would also match e.g. Arabic-Indic digits.
    static ref ORDER_NUMBER_REGEX: Regex = Regex::new(r"\b[0-9]{5,}\b").unwrap();
}

/// Exact-match gate between user text and the record store. Only the first
/// candidate number in the text is considered.
#[derive(Clone)]
pub struct ReferenceExtractor {
    store: Arc<RecordStore>,
}

impl ReferenceExtractor {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// First run of five or more digits, whether or not it is a known order.
    pub fn candidate(text: &str) -> Option<&str> {
        ORDER_NUMBER_REGEX.find(text).map(|m| m.as_str())
    }

    /// Tracking number referenced by `text`, if it names a stored order.
    pub fn extract(&self, text: &str) -> Option<String> {
        Self::candidate(text)
            .filter(|candidate| self.store.contains(candidate))
            .map(str::to_string)
    }

    /// The referenced order itself.
    pub fn resolve(&self, text: &str) -> Option<&OrderRecord> {
        Self::candidate(text).and_then(|candidate| self.store.get(candidate))
    }
}
