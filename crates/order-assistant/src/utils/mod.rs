//! Utilities module - Common text helpers

pub mod text_utils;

pub use text_utils::TextUtils;
