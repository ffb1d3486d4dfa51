//! Breach records and severity classification.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::{CRITICAL_DATA_CLASSES, HIGH_DATA_CLASSES};

/// Severity of a breach, derived from the data classes it exposed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing in the critical or high tables was exposed
    #[default]
    Medium,
    /// Contact details or account identifiers were exposed
    High,
    /// Passwords, payment cards or social security numbers were exposed
    Critical,
}

impl Severity {
    /// Classifies a breach from its exposed data classes.
    ///
    /// Matching is exact and case-sensitive against the class names the
    /// breach service reports.
    pub fn classify<S: AsRef<str>>(data_classes: &[S]) -> Self {
        let exposes = |table: &[&'static str]| {
            data_classes
                .iter()
                .any(|class| table.iter().any(|t| *t == class.as_ref()))
        };

        if exposes(CRITICAL_DATA_CLASSES) {
            Severity::Critical
        } else if exposes(HIGH_DATA_CLASSES) {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Returns the wire name of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One historical exposure of an email address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachRecord {
    /// Display name of the breached service
    pub title: String,
    /// Domain of the breached service (may be empty)
    #[serde(default)]
    pub domain: String,
    /// Date the breach occurred, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breach_date: Option<NaiveDate>,
    /// Exposed data classes, as reported by the breach service
    #[serde(default)]
    pub data_classes: Vec<String>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Number of affected accounts
    #[serde(default)]
    pub pwn_count: u64,
    /// Whether the breach service verified the breach
    #[serde(default)]
    pub is_verified: bool,
    /// Severity derived from `data_classes`
    #[serde(default)]
    pub severity: Severity,
}

impl BreachRecord {
    /// Creates a record, classifying its severity.
    pub fn new(
        title: impl Into<String>,
        domain: impl Into<String>,
        breach_date: Option<NaiveDate>,
        data_classes: Vec<String>,
    ) -> Self {
        let severity = Severity::classify(&data_classes);
        Self {
            title: title.into(),
            domain: domain.into(),
            breach_date,
            data_classes,
            description: None,
            pwn_count: 0,
            is_verified: false,
            severity,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the affected account count and verification flag.
    pub fn with_pwn_count(mut self, pwn_count: u64, is_verified: bool) -> Self {
        self.pwn_count = pwn_count;
        self.is_verified = is_verified;
        self
    }

    /// Returns true if the exposed data includes the given class.
    pub fn exposes(&self, data_class: &str) -> bool {
        self.data_classes.iter().any(|c| c == data_class)
    }
}

/// Sorts breaches newest first. Undated breaches go last, keeping their
/// relative order.
pub fn sort_breaches(breaches: &mut [BreachRecord]) {
    breaches.sort_by(|a, b| match (a.breach_date, b.breach_date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
