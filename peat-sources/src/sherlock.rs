//! Username presence probe backed by sherlock.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};
use url::Url;

use peat_core::error::{PeatError, Result};
use peat_core::traits::UsernamePresenceProbe;
use peat_core::types::UsernameHit;

use crate::process::{run_command, stream_text};
use crate::ProbeConfig;

const PROBE: &str = "sherlock";

/// Extracts profile hits from sherlock's `--print-found` output.
///
/// Lines without a URL are ignored. The platform is the URL host without a
/// leading `www.`; duplicate URLs are reported once.
pub fn parse_sherlock_output(stdout: &str) -> Vec<UsernameHit> {
    let mut seen = HashSet::new();
    stdout
        .lines()
        .filter_map(|line| line.find("http").map(|idx| line[idx..].trim()))
        .filter(|url| seen.insert(url.to_string()))
        .map(|url| UsernameHit::new(platform_of(url), url))
        .collect()
}

fn platform_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

/// Presence probe running `python -m sherlock_project <usernames…> --print-found`.
pub struct SherlockProbe {
    config: ProbeConfig,
}

impl SherlockProbe {
    /// Creates a probe with the given config.
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UsernamePresenceProbe for SherlockProbe {
    #[instrument(skip(self), fields(count = usernames.len()))]
    async fn probe(&self, usernames: &[String]) -> Result<Vec<UsernameHit>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let mut command = Command::new(&self.config.python_bin);
        command
            .args(["-m", "sherlock_project"])
            .args(usernames)
            .arg("--print-found");
        if let Some(dir) = &self.config.sherlock_dir {
            command.current_dir(dir);
        }

        let timeout = Duration::from_secs(self.config.sherlock_timeout_seconds);
        let output = run_command(PROBE, command, timeout).await?;

        if !output.status.success() {
            return Err(PeatError::ProbeFailed {
                probe: PROBE.into(),
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    stream_text(&output.stderr)
                ),
            });
        }

        let hits = parse_sherlock_output(&String::from_utf8_lossy(&output.stdout));
        debug!(hits = hits.len(), "profiles found");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_print_found_output() {
        let stdout = "\
[*] Checking username alice on:

[+] GitHub: https://www.github.com/alice
[+] Reddit: https://www.reddit.com/user/alice
[+] GitHub: https://www.github.com/alice
[+] Keybase: https://keybase.io/alice

[*] Search completed with 3 results
";
        let hits = parse_sherlock_output(stdout);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0], UsernameHit::new("github.com", "https://www.github.com/alice"));
        assert_eq!(hits[1].platform, "reddit.com");
        assert_eq!(hits[2].platform, "keybase.io");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_sherlock_output("").is_empty());
        assert!(parse_sherlock_output("[*] Search completed with 0 results\n").is_empty());
    }

    #[test_case("https://www.twitter.com/alice", "twitter.com" ; "strips www")]
    #[test_case("https://gitlab.com/alice", "gitlab.com" ; "plain host")]
    #[test_case("https://alice.tumblr.com", "alice.tumblr.com" ; "subdomain")]
    #[test_case("http-not-a-url", "unknown" ; "unparseable")]
    fn test_platform_of(url: &str, expected: &str) {
        assert_eq!(platform_of(url), expected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_probe_failure() {
        let config = ProbeConfig::default().with_python_bin("false");
        let err = SherlockProbe::new(config)
            .probe(&["alice".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PeatError::ProbeFailed { .. }));
    }

    #[tokio::test]
    async fn test_empty_username_list_skips_probe() {
        let config = ProbeConfig::default().with_python_bin("/nonexistent/python");
        let hits = SherlockProbe::new(config).probe(&[]).await.unwrap();
        assert!(hits.is_empty());
    }
}
