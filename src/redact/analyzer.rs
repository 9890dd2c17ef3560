//! Local PII entity recognition.
//!
//! Regex-based recognizers compiled once and shared through an explicit
//! [`PiiAnalyzer`] handle. The analyzer has no global state; the
//! orchestrator creates one per run and passes it into the redactor.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Entity types the analyzer can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PiiEntity {
    Email,
    Phone,
    Ssn,
    CreditCard,
    IpAddress,
    Person,
}

impl PiiEntity {
    /// Label used in report counters.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Ssn => "SSN",
            Self::CreditCard => "CREDIT_CARD",
            Self::IpAddress => "IP_ADDRESS",
            Self::Person => "PERSON",
        }
    }

    /// Typed placeholder that replaces a masked span.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Email => "<EMAIL>",
            Self::Phone => "<PHONE>",
            Self::Ssn => "<SSN>",
            Self::CreditCard => "<CREDIT_CARD>",
            Self::IpAddress => "<IP_ADDRESS>",
            Self::Person => "<PERSON>",
        }
    }
}

/// One detected PII span within a cell.
///
/// Byte offsets into the cell's text. Findings exist only between
/// detection and masking; nothing is persisted across cells.
#[derive(Debug, Clone, PartialEq)]
pub struct PiiFinding {
    pub column: String,
    pub row: usize,
    pub start: usize,
    pub end: usize,
    pub entity: PiiEntity,
    pub confidence: f64,
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-. ])?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}").expect("valid phone regex")
});

static SSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn regex"));

static CREDIT_CARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").expect("valid card regex")
});

static IP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid ip regex")
});

static PERSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?")
        .expect("valid person regex")
});

/// Minimum cell length worth scanning.
const MIN_CELL_LEN: usize = 3;

/// Span with entity and confidence, before it is attached to a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub entity: PiiEntity,
    pub confidence: f64,
}

/// Regex-based recognizer set.
///
/// Detection confidences are fixed per recognizer, reflecting how
/// specific each pattern is.
#[derive(Debug, Default, Clone)]
pub struct PiiAnalyzer;

impl PiiAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Scan a cell for PII spans.
    ///
    /// Overlapping matches are resolved in favour of the more confident
    /// recognizer. Returns spans in ascending start order.
    pub fn analyze(&self, text: &str) -> Vec<Span> {
        if text.len() < MIN_CELL_LEN {
            return Vec::new();
        }

        let mut spans = Vec::new();
        // More specific patterns first so ties resolve toward them.
        for (regex, entity, confidence) in [
            (&*EMAIL_RE, PiiEntity::Email, 0.95),
            (&*SSN_RE, PiiEntity::Ssn, 0.9),
            (&*CREDIT_CARD_RE, PiiEntity::CreditCard, 0.85),
            (&*IP_RE, PiiEntity::IpAddress, 0.8),
            (&*PHONE_RE, PiiEntity::Phone, 0.7),
            (&*PERSON_RE, PiiEntity::Person, 0.65),
        ] {
            for m in regex.find_iter(text) {
                spans.push(Span {
                    start: m.start(),
                    end: m.end(),
                    entity,
                    confidence,
                });
            }
        }

        // Drop spans that overlap a more confident one.
        spans.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.start.cmp(&b.start))
        });
        let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            if !kept
                .iter()
                .any(|k| span.start < k.end && k.start < span.end)
            {
                kept.push(span);
            }
        }

        kept.sort_by_key(|s| s.start);
        kept
    }
}
