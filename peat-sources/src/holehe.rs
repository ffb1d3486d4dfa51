//! Service registration probe backed by the holehe runner script.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use peat_core::error::{PeatError, Result};
use peat_core::traits::RegistrationProbe;
use peat_core::types::ServiceRegistration;

use crate::process::{run_command, stream_text};
use crate::ProbeConfig;

const PROBE: &str = "holehe";

/// JSON report printed by the runner script.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HoleheReport {
    /// Probed email, echoed back
    #[serde(default)]
    pub email: Option<String>,
    /// Services the email is registered on
    #[serde(default)]
    pub used_on: Vec<String>,
    /// Services that rate limited the probe
    #[serde(default)]
    pub rate_limited: Vec<String>,
    /// Whether the scan completed
    #[serde(default)]
    pub success: Option<bool>,
    /// Error message from the script
    #[serde(default)]
    pub error: Option<String>,
}

impl HoleheReport {
    /// Returns the registrations of a successful report.
    ///
    /// Confirmed services come first. A rate-limited service is kept only if
    /// it was not also confirmed.
    pub fn into_registrations(self) -> Result<Vec<ServiceRegistration>> {
        if self.email.as_deref().map_or(true, str::is_empty) {
            return Err(probe_failed("invalid response from runner script"));
        }
        if self.success == Some(false) {
            return Err(probe_failed(
                self.error.unwrap_or_else(|| "scan failed".into()),
            ));
        }
        if !self.rate_limited.is_empty() {
            debug!(rate_limited = self.rate_limited.len(), "holehe probe partially rate limited");
        }

        let mut seen = HashSet::new();
        let confirmed = self.used_on.into_iter().map(|s| (s, false));
        let limited = self.rate_limited.into_iter().map(|s| (s, true));

        Ok(confirmed
            .chain(limited)
            .filter_map(|(service, rate_limited)| {
                let service = service.trim().to_string();
                if service.is_empty() || !seen.insert(service.clone()) {
                    return None;
                }
                Some(ServiceRegistration {
                    service,
                    rate_limited,
                })
            })
            .collect())
    }
}

/// Parses the runner script's stdout.
pub fn parse_holehe_output(stdout: &str) -> Result<HoleheReport> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(probe_failed("empty output from runner script"));
    }
    serde_json::from_str(trimmed)
        .map_err(|e| probe_failed(format!("failed to parse runner output: {}", e)))
}

fn probe_failed(reason: impl Into<String>) -> PeatError {
    PeatError::ProbeFailed {
        probe: PROBE.into(),
        reason: reason.into(),
    }
}

/// Registration probe running `python <holehe_runner.py> <email>`.
pub struct HoleheProbe {
    config: ProbeConfig,
}

impl HoleheProbe {
    /// Creates a probe with the given config.
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RegistrationProbe for HoleheProbe {
    #[instrument(skip(self, email))]
    async fn probe(&self, email: &str) -> Result<Vec<ServiceRegistration>> {
        let mut command = Command::new(&self.config.python_bin);
        command.arg(&self.config.holehe_script).arg(email);

        let timeout = Duration::from_secs(self.config.holehe_timeout_seconds);
        let output = run_command(PROBE, command, timeout).await?;

        let stdout = stream_text(&output.stdout);
        let stderr = stream_text(&output.stderr);
        if !stderr.is_empty() {
            warn!(stderr = %stderr, "holehe wrote to stderr");
        }

        if !output.status.success() {
            // The script reports its own failures as JSON on stdout.
            let reason = parse_holehe_output(&stdout)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("exited with {}: {}", output.status, stderr));
            return Err(probe_failed(reason));
        }

        let services = parse_holehe_output(&stdout)?.into_registrations()?;
        debug!(
            count = services.iter().filter(|s| !s.rate_limited).count(),
            "registrations found"
        );
        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let report = parse_holehe_output(
            r#"{"email":"alice@example.com","used_on":["spotify.com","twitter.com"],"rate_limited":["instagram.com"],"success":true,"count":2}"#,
        )
        .unwrap();
        assert_eq!(report.rate_limited, vec!["instagram.com"]);
        assert_eq!(
            report.into_registrations().unwrap(),
            vec![
                ServiceRegistration::confirmed("spotify.com"),
                ServiceRegistration::confirmed("twitter.com"),
                ServiceRegistration::rate_limited("instagram.com"),
            ]
        );
    }

    #[test]
    fn test_registrations_deduplicated_in_order() {
        let report = parse_holehe_output(
            r#"{"email":"alice@example.com","used_on":["spotify.com","twitter.com"," ","spotify.com"],"rate_limited":["instagram.com","twitter.com","instagram.com"],"success":true}"#,
        )
        .unwrap();
        assert_eq!(
            report.into_registrations().unwrap(),
            vec![
                ServiceRegistration::confirmed("spotify.com"),
                ServiceRegistration::confirmed("twitter.com"),
                ServiceRegistration::rate_limited("instagram.com"),
            ]
        );
    }

    #[test]
    fn test_parse_reported_failure() {
        let report = parse_holehe_output(
            r#"{"email":"alice@example.com","used_on":[],"success":false,"error":"holehe not installed"}"#,
        )
        .unwrap();
        let err = report.into_registrations().unwrap_err();
        assert!(err.to_string().contains("holehe not installed"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_holehe_output("").is_err());
        assert!(parse_holehe_output("Traceback (most recent call last)").is_err());
        assert!(parse_holehe_output(r#"{"used_on":["x.com"]}"#)
            .unwrap()
            .into_registrations()
            .is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_runs_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("runner.sh");
        std::fs::write(
            &script,
            "echo '{\"email\":\"'\"$1\"'\",\"used_on\":[\"github.com\"],\"success\":true}'\n",
        )
        .unwrap();

        let config = ProbeConfig::default()
            .with_python_bin("sh")
            .with_holehe_script(&script);
        let services = HoleheProbe::new(config).probe("alice@example.com").await.unwrap();
        assert_eq!(services, vec![ServiceRegistration::confirmed("github.com")]);
    }
}
