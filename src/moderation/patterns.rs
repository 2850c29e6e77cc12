//! Static pattern sets for the regex tiers

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

/// Benign topics that lexically overlap with sensitive vocabulary
const WHITELIST: &[&str] = &[
    r"(?i)\bwhat(?:'s| is) the weather\b",
    r"(?i)\bweather (?:forecast|today|tomorrow|in)\b",
    r"(?i)\b(?:solar|immune|nervous|operating|digestive|metric|number) systems?\b",
    r"(?i)\bsystems? of (?:equations|linear equations)\b",
    r"(?i)\b(?:recipe|recipes|how (?:do|to) (?:i )?cook)\b",
    r"(?i)\bprompt (?:payment|delivery|reply|response time)\b",
];

/// High-confidence injection and leak attempts
const CRITICAL: &[&str] = &[
    r"(?i)\b(?:ignore|disregard|forget|override)\s+(?:all\s+|any\s+|the\s+|your\s+)*(?:previous|prior|above|earlier|preceding)\s+(?:instructions|rules|prompts?|directions|messages)",
    r"(?i)\b(?:reveal|show|print|display|output|repeat|leak|dump|give)\b.{0,40}\b(?:system|hidden|initial|original|secret)\s+(?:prompt|instructions|rules|message)",
    r"(?i)\bwhat\s+(?:are|were|is)\s+your\s+(?:system\s+prompt|instructions|initial\s+prompt|rules)\b",
    r"(?i)\b(?:repeat|recite|echo)\s+(?:the\s+|all\s+)?(?:text|words|everything)\s+above\b",
    r"(?i)\byou\s+are\s+now\s+(?:dan|in\s+developer\s+mode|jailbroken|unrestricted)\b",
    r"(?i)\b(?:enable|enter|activate)\s+(?:developer|god|jailbreak)\s+mode\b",
    r"(?i)\b(?:base64|rot13|hex)[\s-]*encode\s+your\s+(?:instructions|prompt|rules)\b",
    r"(?i)\bpretend\s+(?:that\s+)?you\s+(?:have|had)\s+no\s+(?:rules|restrictions|guidelines)\b",
];

pub static WHITELIST_SET: Lazy<RegexSet> =
    Lazy::new(|| RegexSet::new(WHITELIST).expect("whitelist patterns compile"));

pub static CRITICAL_SET: Lazy<RegexSet> =
    Lazy::new(|| RegexSet::new(CRITICAL).expect("critical patterns compile"));

/// Individual critical regexes, used to locate matches inside responses
pub static CRITICAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    CRITICAL
        .iter()
        .map(|p| Regex::new(p).expect("critical patterns compile"))
        .collect()
});

pub fn is_whitelisted(text: &str) -> bool {
    WHITELIST_SET.is_match(text)
}

pub fn is_critical(text: &str) -> bool {
    CRITICAL_SET.is_match(text)
}
