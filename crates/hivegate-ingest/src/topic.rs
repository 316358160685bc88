//! Topic parsing.
//!
//! Topics address messages as `devices/{device_id}/{category}`. Parsing
//! is pure; anything off-pattern fails with `InvalidTopic`.

use hivegate_core::envelope::MessageCategory;
use hivegate_core::error::{Error, Result};

/// Extract (device_id, category) from a topic string.
pub fn parse_topic(topic: &str) -> Result<(String, MessageCategory)> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() != 3 {
        return Err(Error::InvalidTopic(
            "expected devices/{device_id}/{category}".into(),
        ));
    }

    if parts[0] != "devices" {
        return Err(Error::InvalidTopic("invalid topic root".into()));
    }

    let device_id = parts[1];
    if device_id.is_empty() {
        return Err(Error::InvalidTopic("empty device id".into()));
    }

    match MessageCategory::parse(parts[2]) {
        Some(category) => Ok((device_id.to_string(), category)),
        None => Err(Error::InvalidTopic("unsupported message category".into())),
    }
}
