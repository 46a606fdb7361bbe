// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! The canonical time-series record: `(measurement, tags, fields, timestamp)`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Tags are indexed, low-cardinality string labels. Kept as a `BTreeMap` so two
/// points carrying the same tags always hash/compare/serialize identically
/// regardless of insertion order — this is what makes the natural key
/// `(measurement, tagset, timestamp)` well-defined.
pub type TagSet = BTreeMap<String, String>;

/// Fields are the floating-point measurements carried by a point.
pub type FieldSet = BTreeMap<String, f64>;

/// A single time-series point ready to be written through the store adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub timestamp: DateTime<Utc>,
    pub tags: TagSet,
    pub fields: FieldSet,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp,
            tags: TagSet::new(),
            fields: FieldSet::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).copied()
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Stable string encoding of the tagset, used as part of the natural key
    /// and as the `tagset_filter` carried on gap records. Tags are already
    /// sorted by key because `TagSet` is a `BTreeMap`.
    pub fn tagset_key(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagset_key_is_order_independent() {
        let a = Point::new("energy_prices", Utc::now())
            .with_tag("provider", "ree")
            .with_tag("market_type", "pvpc");
        let b = Point::new("energy_prices", Utc::now())
            .with_tag("market_type", "pvpc")
            .with_tag("provider", "ree");
        assert_eq!(a.tagset_key(), b.tagset_key());
    }
}
