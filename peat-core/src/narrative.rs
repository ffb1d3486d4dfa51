//! Narrative context, risk metrics and the deterministic fallback report.
//!
//! The context is what a [`NarrativeGenerator`](crate::NarrativeGenerator)
//! receives. [`fallback_narrative`] is what the scanner substitutes when the
//! generator fails: it only reads counts already on the context and never
//! performs I/O.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SENSITIVE_DATA_MARKERS;
use crate::types::{sort_breaches, BreachRecord, ScanKind, UsernameHit};

/// Everything a narrative generator may use to describe a scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeContext {
    /// Email, or usernames joined by ", "
    pub subject: String,
    /// Scan kind
    pub kind: ScanKind,
    /// Breaches, newest first
    pub breaches: Vec<BreachRecord>,
    /// Services the email is registered on
    pub registrations: Vec<String>,
    /// Services that rate limited the registration check
    #[serde(default)]
    pub rate_limited: Vec<String>,
    /// Platforms on which a username was found
    pub username_hits: Vec<UsernameHit>,
    /// Year used for breach age computations
    pub reference_year: i32,
}

impl NarrativeContext {
    /// Builds a context, sorting breaches newest first.
    pub fn new(
        subject: impl Into<String>,
        kind: ScanKind,
        mut breaches: Vec<BreachRecord>,
        registrations: Vec<String>,
        username_hits: Vec<UsernameHit>,
    ) -> Self {
        sort_breaches(&mut breaches);
        Self {
            subject: subject.into(),
            kind,
            breaches,
            registrations,
            rate_limited: Vec::new(),
            username_hits,
            reference_year: Utc::now().year(),
        }
    }

    /// Adds the services that rate limited the registration check.
    pub fn with_rate_limited(mut self, services: Vec<String>) -> Self {
        self.rate_limited = services;
        self
    }

    /// Overrides the reference year.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// Breach insights for this context.
    pub fn insights(&self) -> BreachInsights {
        BreachInsights::from_breaches(&self.breaches, self.reference_year)
    }

    /// Risk metrics for this context.
    ///
    /// Rate-limited services count toward the platform spread.
    pub fn risk_metrics(&self) -> RiskMetrics {
        RiskMetrics::calculate(
            &self.breaches,
            self.username_hits.len(),
            self.registrations.len() + self.rate_limited.len(),
            self.reference_year,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BREACH INSIGHTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Facts about a breach history used to personalize a report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachInsights {
    /// Distinct exposed data classes considered sensitive, first seen first
    pub sensitive_data: Vec<String>,
    /// Year of the oldest dated breach
    pub oldest_year: Option<i32>,
    /// Years between the oldest dated breach and the reference year
    pub years_old: i32,
    /// Title of the most recent dated breach
    pub newest_breach: Option<String>,
}

impl BreachInsights {
    /// Computes insights relative to `reference_year`.
    pub fn from_breaches(breaches: &[BreachRecord], reference_year: i32) -> Self {
        let mut seen = BTreeSet::new();
        let mut sensitive_data = Vec::new();
        for class in breaches.iter().flat_map(|b| b.data_classes.iter()) {
            let lower = class.to_lowercase();
            if SENSITIVE_DATA_MARKERS.iter().any(|m| lower.contains(m)) && seen.insert(class.clone()) {
                sensitive_data.push(class.clone());
            }
        }

        let dated = breaches.iter().filter_map(|b| b.breach_date.map(|d| (d, b)));
        let oldest = dated.clone().min_by_key(|(d, _)| *d);
        let newest = dated.max_by_key(|(d, _)| *d);

        let oldest_year = oldest.map(|(d, _)| d.year());
        Self {
            sensitive_data,
            oldest_year,
            years_old: oldest_year.map(|y| reference_year - y).unwrap_or(0),
            newest_breach: newest.map(|(_, b)| b.title.clone()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RISK METRICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Overall risk level of a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Score below 3
    Low,
    /// Score 3 to 5
    Medium,
    /// Score 6 or 7
    High,
    /// Score 8 and above
    Critical,
}

impl RiskLevel {
    fn from_score(score: u8) -> Self {
        match score {
            8.. => RiskLevel::Critical,
            6..=7 => RiskLevel::High,
            3..=5 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Data class fragments that make a breach count as sensitive for scoring.
const SCORING_SENSITIVE: &[&str] = &["password", "credit card", "ssn", "phone"];

/// Heuristic exposure score.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    /// Score from 0 to 10
    pub score: u8,
    /// Level derived from the uncapped score
    pub level: RiskLevel,
    /// Human-readable contributing factors
    pub factors: Vec<String>,
}

impl RiskMetrics {
    /// Scores a breach history and platform spread.
    pub fn calculate(
        breaches: &[BreachRecord],
        public_profiles: usize,
        registrations: usize,
        reference_year: i32,
    ) -> Self {
        let mut score: u8 = 0;
        let mut factors = Vec::new();

        match breaches.len() {
            20.. => {
                score += 5;
                factors.push("extensive breach history");
            }
            10..=19 => {
                score += 3;
                factors.push("multiple breaches");
            }
            5..=9 => {
                score += 2;
                factors.push("several breaches");
            }
            _ => {}
        }

        let sensitive = breaches
            .iter()
            .filter(|b| {
                b.data_classes.iter().any(|dc| {
                    let dc = dc.to_lowercase();
                    SCORING_SENSITIVE.iter().any(|s| dc.contains(s))
                })
            })
            .count();
        if sensitive >= 3 {
            score += 3;
            factors.push("sensitive data exposed");
        }

        let old = breaches
            .iter()
            .filter_map(|b| b.breach_date)
            .filter(|d| reference_year - d.year() >= 4)
            .count();
        if old >= 5 {
            score += 2;
            factors.push("old passwords likely reused");
        }

        if public_profiles >= 8 {
            score += 2;
            factors.push("high public visibility");
        }

        if registrations >= 15 {
            score += 1;
            factors.push("wide digital footprint");
        }

        if factors.is_empty() {
            factors.push("minimal exposure detected");
        }

        Self {
            score: score.min(10),
            level: RiskLevel::from_score(score),
            factors: factors.into_iter().map(String::from).collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FALLBACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Deterministic report built from counts already on the context.
pub fn fallback_narrative(ctx: &NarrativeContext) -> String {
    let hits = ctx.username_hits.len();

    match ctx.kind {
        ScanKind::Username => {
            if hits == 0 {
                format!(
                    "## Profile Discovery Results\n\n\
                     No public profiles found for {}. Your username keeps a low profile.\n",
                    ctx.subject
                )
            } else {
                format!(
                    "## Profile Discovery Results\n\n\
                     Found {} public profile{} for {}. Review them and remove any you no longer use.\n",
                    hits,
                    plural(hits),
                    ctx.subject
                )
            }
        }
        ScanKind::Email => {
            let breaches = ctx.breaches.len();
            let registrations = ctx.registrations.len();

            let mut text = String::from("## Exposure Summary\n\n");
            if breaches > 0 {
                text.push_str(&format!(
                    "{} appeared in {} known data breach{}. Change any password you reused on those services and enable two-factor authentication.\n\n",
                    ctx.subject,
                    breaches,
                    if breaches == 1 { "" } else { "es" }
                ));
            } else {
                text.push_str(&format!(
                    "No known data breaches were found for {}.\n\n",
                    ctx.subject
                ));
            }
            text.push_str(&format!(
                "The address is registered on {} service{} and the probed username has {} public profile{}.\n",
                registrations,
                plural(registrations),
                hits,
                plural(hits)
            ));
            if !ctx.rate_limited.is_empty() {
                let limited = ctx.rate_limited.len();
                text.push_str(&format!(
                    "{} more service{} could not be checked because of rate limiting ({}) and may also hold an account.\n",
                    limited,
                    plural(limited),
                    ctx.rate_limited.join(", ")
                ));
            }
            text
        }
    }
}

/// Report for a quick scan whose breach list was cut to the most recent
/// `shown` of `total`.
pub fn high_exposure_narrative(subject: &str, total: usize, shown: usize) -> String {
    format!(
        "## High-Risk Email Detected\n\n\
         {} appears in {} data breaches, far more than average.\n\n\
         ## Immediate Action Required\n\n\
         1. **Change your email password** now.\n\
         2. **Enable two-factor authentication** on your email account.\n\
         3. **Consider a new email address** for important accounts.\n\
         4. **Use a password manager** with a unique password per site.\n\n\
         Showing the {} most recent breaches.\n",
        subject, total, shown
    )
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn breach(title: &str, year: i32, classes: &[&str]) -> BreachRecord {
        BreachRecord::new(
            title,
            format!("{}.com", title.to_lowercase()),
            NaiveDate::from_ymd_opt(year, 6, 1),
            classes.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_context_sorts_breaches() {
        let ctx = NarrativeContext::new(
            "alice@example.com",
            ScanKind::Email,
            vec![breach("Old", 2012, &[]), breach("New", 2022, &[])],
            vec![],
            vec![],
        );
        assert_eq!(ctx.breaches[0].title, "New");
    }

    #[test]
    fn test_insights() {
        let breaches = vec![
            breach("New", 2022, &["Email addresses", "Passwords"]),
            breach("Old", 2014, &["Passwords", "Phone numbers"]),
        ];
        let insights = BreachInsights::from_breaches(&breaches, 2025);

        assert_eq!(insights.sensitive_data, vec!["Passwords", "Phone numbers"]);
        assert_eq!(insights.oldest_year, Some(2014));
        assert_eq!(insights.years_old, 11);
        assert_eq!(insights.newest_breach.as_deref(), Some("New"));
    }

    #[test]
    fn test_insights_empty() {
        assert_eq!(BreachInsights::from_breaches(&[], 2025), BreachInsights::default());
    }

    #[test]
    fn test_risk_metrics_levels() {
        let low = RiskMetrics::calculate(&[], 0, 0, 2025);
        assert_eq!(low.score, 0);
        assert_eq!(low.level, RiskLevel::Low);
        assert_eq!(low.factors, vec!["minimal exposure detected"]);

        // 20 old breaches, all with passwords: 5 + 3 + 2, plus visibility and spread
        let breaches: Vec<_> = (0..20).map(|i| breach(&format!("B{}", i), 2010, &["Passwords"])).collect();
        let critical = RiskMetrics::calculate(&breaches, 8, 15, 2025);
        assert_eq!(critical.score, 10);
        assert_eq!(critical.level, RiskLevel::Critical);
        assert_eq!(critical.factors.len(), 5);

        let breaches: Vec<_> = (0..5).map(|i| breach(&format!("B{}", i), 2024, &["Names"])).collect();
        let medium = RiskMetrics::calculate(&breaches, 8, 0, 2025);
        assert_eq!(medium.score, 4);
        assert_eq!(medium.level, RiskLevel::Medium);
    }

    #[test]
    fn test_fallback_username_without_hits() {
        let ctx = NarrativeContext::new("ghost", ScanKind::Username, vec![], vec![], vec![]);
        let text = fallback_narrative(&ctx);
        assert!(text.to_lowercase().contains("no public profiles found"));
    }

    #[test]
    fn test_fallback_email_uses_counts() {
        let ctx = NarrativeContext::new(
            "alice@example.com",
            ScanKind::Email,
            vec![breach("Canva", 2019, &["Passwords"])],
            vec!["spotify.com".into(), "twitter.com".into()],
            vec![],
        );
        let text = fallback_narrative(&ctx);
        assert!(text.contains("1 known data breach."));
        assert!(text.contains("2 services"));
        assert!(!text.contains("rate limiting"));
        assert_eq!(text, fallback_narrative(&ctx));
    }

    #[test]
    fn test_high_exposure_narrative() {
        let text = high_exposure_narrative("alice@example.com", 250, 20);
        assert!(text.starts_with("## High-Risk Email Detected"));
        assert!(text.contains("alice@example.com appears in 250 data breaches"));
        assert!(text.contains("Showing the 20 most recent breaches."));
    }

    #[test]
    fn test_fallback_mentions_rate_limited_services() {
        let ctx = NarrativeContext::new(
            "alice@example.com",
            ScanKind::Email,
            vec![],
            vec!["spotify.com".into()],
            vec![],
        )
        .with_rate_limited(vec!["instagram.com".into()]);

        let text = fallback_narrative(&ctx);
        assert!(text.contains("1 service"));
        assert!(text.contains("1 more service could not be checked"));
        assert!(text.contains("(instagram.com)"));
    }

    #[test]
    fn test_rate_limited_services_count_toward_spread() {
        let confirmed: Vec<String> = (0..10).map(|i| format!("s{}.com", i)).collect();
        let limited: Vec<String> = (0..5).map(|i| format!("r{}.com", i)).collect();
        let ctx = NarrativeContext::new("alice@example.com", ScanKind::Email, vec![], confirmed, vec![])
            .with_reference_year(2025);
        assert_eq!(ctx.risk_metrics().score, 0);

        let ctx = ctx.with_rate_limited(limited);
        let metrics = ctx.risk_metrics();
        assert_eq!(metrics.score, 1);
        assert_eq!(metrics.factors, vec!["wide digital footprint"]);
    }
}
