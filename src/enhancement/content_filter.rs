//! Regex-based content risk classification and sanitization.
//!
//! Checks run in fixed category order (phishing, profanity/harassment,
//! spam) and the verdict carries the highest risk matched. High and
//! Critical verdicts block delivery; lower risks pass with sanitized text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Risk classification of free-text content
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// High and Critical content never reaches a provider.
    pub fn is_blocking(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

/// One classification result
#[derive(Debug, Clone)]
pub struct FilterVerdict {
    pub risk: RiskLevel,
    /// Labels of the pattern categories that matched
    pub matched: Vec<&'static str>,
}

static PATTERNS: LazyLock<Vec<(&'static str, RiskLevel, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "phishing",
            RiskLevel::Critical,
            Regex::new(
                r"(?i)\b(verify your account|confirm your (password|identity)|account (has been |was )?suspended|unusual (sign.?in )?activity|claim your (prize|reward)|reset your password)\b",
            )
            .unwrap(),
        ),
        (
            "malicious_link",
            RiskLevel::Critical,
            Regex::new(r"(?i)\b(bit\.ly|tinyurl\.com|goo\.gl|t\.co)/\S+").unwrap(),
        ),
        (
            "harassment",
            RiskLevel::High,
            Regex::new(
                r"(?i)\b(kill yourself|kys|you suck|harass|bully|intimidate|threaten|stalk(ing)?)\b",
            )
            .unwrap(),
        ),
        (
            "profanity",
            RiskLevel::High,
            Regex::new(r"(?i)\b(fuck|shit|bitch|asshole|bastard|slur)\b").unwrap(),
        ),
        (
            "spam",
            RiskLevel::Medium,
            Regex::new(
                r"(?i)\b(buy now|click here|free money|get rich|make money fast|limited time|viagra|casino|lottery|congratulations.{0,40}won)\b",
            )
            .unwrap(),
        ),
    ]
});

static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Links in one message beyond which it counts as spam
const LINK_SPAM_THRESHOLD: usize = 3;
/// Same-character run length that counts as spam
const REPEAT_SPAM_RUN: usize = 11;

/// Stateless content classifier
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentFilter;

impl ContentFilter {
    pub fn new() -> Self {
        Self
    }

    /// Classifies free text, returning the highest matched risk.
    pub fn analyze(&self, text: &str) -> FilterVerdict {
        let mut risk = RiskLevel::Low;
        let mut matched = Vec::new();

        for (label, level, pattern) in PATTERNS.iter() {
            if pattern.is_match(text) {
                matched.push(*label);
                risk = risk.max(*level);
            }
        }

        if LINK.find_iter(text).count() >= LINK_SPAM_THRESHOLD {
            matched.push("link_flood");
            risk = risk.max(RiskLevel::Medium);
        }
        if has_repeated_run(text, REPEAT_SPAM_RUN) {
            matched.push("repeated_characters");
            risk = risk.max(RiskLevel::Medium);
        }

        FilterVerdict { risk, matched }
    }

    /// Strips scripts and HTML tags and collapses whitespace.
    pub fn sanitize(&self, text: &str) -> String {
        let without_scripts = SCRIPT.replace_all(text, " ");
        let without_tags = HTML_TAG.replace_all(&without_scripts, " ");
        WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
    }
}

fn has_repeated_run(text: &str, run: usize) -> bool {
    let mut count = 0;
    let mut previous: Option<char> = None;
    for c in text.chars() {
        if Some(c) == previous {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            previous = Some(c);
            count = 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_content_is_low_risk() {
        let verdict = ContentFilter::new().analyze("Alice commented on your post");
        assert_eq!(verdict.risk, RiskLevel::Low);
        assert!(verdict.matched.is_empty());
        assert!(!verdict.risk.is_blocking());
    }

    #[test]
    fn phishing_is_critical_and_blocking() {
        let verdict =
            ContentFilter::new().analyze("Please verify your account to avoid suspension");
        assert_eq!(verdict.risk, RiskLevel::Critical);
        assert!(verdict.matched.contains(&"phishing"));
        assert!(verdict.risk.is_blocking());
    }

    #[test]
    fn link_shorteners_are_critical() {
        let verdict = ContentFilter::new().analyze("check this out bit.ly/x9k2");
        assert_eq!(verdict.risk, RiskLevel::Critical);
        assert!(verdict.matched.contains(&"malicious_link"));
    }

    #[test]
    fn harassment_is_high_risk() {
        let verdict = ContentFilter::new().analyze("nobody likes you, kys");
        assert_eq!(verdict.risk, RiskLevel::High);
        assert!(verdict.risk.is_blocking());
    }

    #[test]
    fn spam_keywords_are_medium_and_pass() {
        let verdict = ContentFilter::new().analyze("Buy now! Limited time offer");
        assert_eq!(verdict.risk, RiskLevel::Medium);
        assert!(!verdict.risk.is_blocking());
    }

    #[test]
    fn link_flood_is_spam() {
        let verdict = ContentFilter::new().analyze(
            "see http://a.example http://b.example http://c.example",
        );
        assert_eq!(verdict.risk, RiskLevel::Medium);
        assert!(verdict.matched.contains(&"link_flood"));
    }

    #[test]
    fn repeated_characters_are_spam() {
        let verdict = ContentFilter::new().analyze("wooooooooooow nice");
        assert_eq!(verdict.risk, RiskLevel::Medium);
        assert!(verdict.matched.contains(&"repeated_characters"));
    }

    #[test]
    fn highest_risk_wins() {
        let verdict =
            ContentFilter::new().analyze("click here to verify your account");
        assert_eq!(verdict.risk, RiskLevel::Critical);
        assert!(verdict.matched.contains(&"spam"));
        assert!(verdict.matched.contains(&"phishing"));
    }

    #[test]
    fn sanitize_strips_scripts_and_tags() {
        let filter = ContentFilter::new();
        let dirty = "<p>Hello <b>world</b></p><script>alert('x')</script> friend";
        assert_eq!(filter.sanitize(dirty), "Hello world friend");
    }

    #[test]
    fn sanitize_keeps_plain_text_unchanged() {
        let filter = ContentFilter::new();
        assert_eq!(filter.sanitize("just a message"), "just a message");
    }
}
