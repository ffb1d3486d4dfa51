//! Deterministic, locally rendered narrative reports.

use async_trait::async_trait;

use peat_core::error::Result;
use peat_core::narrative::NarrativeContext;
use peat_core::traits::NarrativeGenerator;
use peat_core::types::ScanKind;

const SOCIAL_PLATFORMS: &[&str] = &["instagram", "twitter", "facebook", "tiktok", "snapchat", "reddit"];
const PROFESSIONAL_PLATFORMS: &[&str] = &["linkedin", "github", "behance", "dribbble"];

/// Narrative generator that renders a markdown report without external calls.
///
/// Used for every username scan and for email scans when no language model
/// is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    /// Creates a template narrator.
    pub fn new() -> Self {
        Self
    }

    /// Renders the report for a context.
    pub fn render(&self, ctx: &NarrativeContext) -> String {
        match ctx.kind {
            ScanKind::Username => render_username(ctx),
            ScanKind::Email => render_email(ctx),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for TemplateNarrator {
    async fn generate(&self, context: &NarrativeContext) -> Result<String> {
        Ok(self.render(context))
    }
}

fn count_matching(platforms: &[String], table: &[&str]) -> usize {
    platforms
        .iter()
        .filter(|p| {
            let p = p.to_lowercase();
            table.iter().any(|t| p.contains(t))
        })
        .count()
}

fn render_username(ctx: &NarrativeContext) -> String {
    let platforms: Vec<String> = ctx.username_hits.iter().map(|h| h.platform.clone()).collect();
    let count = platforms.len();
    let social = count_matching(&platforms, SOCIAL_PLATFORMS);
    let professional = count_matching(&platforms, PROFESSIONAL_PLATFORMS);

    let mut out = String::from("## Profile Discovery Results\n\n");
    if count == 0 {
        out.push_str(&format!(
            "No public profiles found for {}. Your username keeps excellent privacy.\n\n",
            ctx.subject
        ));
    } else {
        let sample = platforms.iter().take(4).cloned().collect::<Vec<_>>().join(", ");
        let presence = match count {
            8.. => "You have an active digital presence across multiple platforms.",
            4..=7 => "You maintain a moderate online presence.",
            _ => "You have a selective digital presence.",
        };
        out.push_str(&format!(
            "Found your username on **{} platform{}** including {}. {}\n\n",
            count,
            if count == 1 { "" } else { "s" },
            sample,
            presence
        ));
    }

    out.push_str("## Digital Presence Audit\n\n");
    if count == 0 {
        out.push_str("No accounts found means nobody can link this username to you.\n\n");
    } else {
        out.push_str("Review these accounts: do you recognize all of them? Some may be old accounts you forgot about.");
        if social >= 2 {
            out.push_str(" Your social media accounts are part of your digital identity.");
        }
        if professional >= 1 {
            out.push_str(" Professional profiles can showcase your skills and experience.");
        }
        if count >= 3 {
            out.push_str(" Reusing one username across platforms makes you easy to find and correlate.");
        }
        out.push_str("\n\n");
    }

    out.push_str("## Your Action Plan\n\n");
    let mut steps = Vec::new();
    if count >= 1 {
        steps.push("**Audit your accounts**: make sure you recognize every discovered platform.");
    }
    if count >= 3 {
        steps.push("**Clean up dormant accounts**: delete accounts you no longer use.");
    }
    steps.push("**Review what's public**: check privacy settings on every profile.");
    if count >= 1 {
        steps.push("**Request data deletion**: most platforms let you remove your data entirely.");
    }
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    out
}

fn render_email(ctx: &NarrativeContext) -> String {
    let insights = ctx.insights();
    let metrics = ctx.risk_metrics();
    let breach_count = ctx.breaches.len();
    let profiles = ctx.username_hits.len();
    let recent: Vec<&str> = ctx.breaches.iter().take(3).map(|b| b.title.as_str()).collect();
    let recent = if recent.is_empty() {
        "recent breaches".to_string()
    } else {
        recent.join(", ")
    };

    let mut out = String::from("## Immediate Risks\n\n");
    if breach_count > 0 {
        let exposed = if insights.sensitive_data.is_empty() {
            "personal account data".to_string()
        } else {
            insights.sensitive_data.iter().take(2).cloned().collect::<Vec<_>>().join(" and ")
        };
        out.push_str(&format!(
            "Your {} breach{} including {} exposed {}. ",
            breach_count,
            if breach_count == 1 { "" } else { "es" },
            recent,
            exposed
        ));
        match insights.oldest_year {
            Some(year) if insights.years_old >= 4 => out.push_str(&format!(
                "With breaches dating back to {}, any reused password is exposed to credential stuffing. ",
                year
            )),
            _ => out.push_str("Recent exposures raise the risk of targeted phishing. "),
        }
    } else {
        out.push_str("No known data breaches were found for your email address. ");
    }
    out.push_str(&format!("Overall risk level: **{}** ({}/10).\n\n", metrics.level, metrics.score));

    out.push_str("## Platform-Specific Risks\n\n");
    // Rate-limited services may hold an account too.
    let services: Vec<String> = ctx
        .registrations
        .iter()
        .chain(ctx.rate_limited.iter())
        .take(3)
        .cloned()
        .collect();
    let services = if services.is_empty() {
        "various".to_string()
    } else {
        services.join(", ")
    };
    out.push_str(&format!(
        "Your presence on {} services combined with {} public profile{} creates {}.\n\n",
        services,
        profiles,
        if profiles == 1 { "" } else { "s" },
        if profiles >= 5 {
            "a detailed digital fingerprint attackers can research"
        } else {
            "a manageable digital presence"
        }
    ));

    out.push_str("## Action Plan\n\n");
    if breach_count > 0 {
        out.push_str(&format!(
            "1. **Change passwords** for {} and any account sharing those credentials.\n",
            recent
        ));
    } else {
        out.push_str("1. **Keep strong, unique passwords** on every service.\n");
    }
    out.push_str("2. **Enable two-factor authentication** on your email, banking and social accounts.\n");
    out.push_str("3. **Review privacy settings** on your public profiles.\n\n");

    out.push_str("## Risk Factors\n\n");
    for factor in &metrics.factors {
        out.push_str(&format!("- {}\n", factor));
    }
    out
}
