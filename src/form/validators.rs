//! Answer validators — named predicates over raw reply text.
//!
//! Each variant is an independent check; `Validator::and` composes them
//! and stops at the first one that rejects.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Punctuation allowed by [`Validator::CharWhitelist`] besides letters,
/// digits and whitespace. `<`, `>` and `&` are left out so whitelisted
/// answers can go into HTML posts untouched.
pub const ALLOWED_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '\'', '"', '(', ')', '[', ']', '-', '_', '/', '@', '#', '+',
    '*', '%', '=', '€', '$', '’',
];

/// Year used to check `DD/MM` values. A leap year, so 29/02 is accepted.
const REFERENCE_YEAR: i32 = 2000;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})/(\d{2})(?:-(\d{2})/(\d{2}))?$").expect("date regex is valid")
});

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/?#]+\.[^\s/?#]+\S*$").expect("link regex is valid"));

// One emoji grapheme: a flag pair, a keycap, or a pictographic sequence
// with optional skin tone and ZWJ joins. The leading pictograph must render
// as an emoji: emoji presentation by default, or forced with U+FE0F.
// Text-default symbols such as © or ™ alone are rejected.
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[\x{1F1E6}-\x{1F1FF}]{2}|[0-9#*]\x{FE0F}?\x{20E3}|(?:[\p{Emoji_Presentation}--[\x{1F1E6}-\x{1F1FF}]]\x{FE0F}?|\p{Extended_Pictographic}\x{FE0F})\p{Emoji_Modifier}?(?:\x{200D}\p{Extended_Pictographic}[\x{FE0E}\x{FE0F}]?\p{Emoji_Modifier}?)*)$",
    )
    .expect("emoji regex is valid")
});

/// A single date or an ordered pair of dates, as typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

/// Parse `DD/MM` or `DD/MM-DD/MM`.
///
/// Returns `None` for any other shape, for impossible calendar values and
/// for ranges whose start is not strictly before their end.
pub fn parse_date_range(raw: &str) -> Option<DateRange> {
    let caps = DATE_RE.captures(raw)?;
    let day_month = |d: usize, m: usize| -> Option<NaiveDate> {
        let day = caps.get(d)?.as_str().parse().ok()?;
        let month = caps.get(m)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(REFERENCE_YEAR, month, day)
    };

    let start = day_month(1, 2)?;
    let end = match caps.get(3) {
        Some(_) => Some(day_month(3, 4)?),
        None => None,
    };

    if let Some(end) = end {
        if start >= end {
            return None;
        }
    }

    Some(DateRange { start, end })
}

/// A named answer check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Character count strictly below the bound.
    MaxLength(usize),
    /// Only alphanumerics, whitespace and [`ALLOWED_PUNCTUATION`].
    CharWhitelist,
    /// Exactly one emoji grapheme and nothing else.
    SingleEmoji,
    /// `DD/MM` or `DD/MM-DD/MM`, start before end.
    Date,
    /// An http(s) URL with a host.
    Link,
    /// Every inner validator must accept, checked in order.
    All(Vec<Validator>),
}

impl Validator {
    /// Combine validators with logical AND.
    pub fn and(validators: impl IntoIterator<Item = Validator>) -> Self {
        Self::All(validators.into_iter().collect())
    }

    pub fn validate(&self, raw: &str) -> bool {
        match self {
            Self::MaxLength(max) => raw.chars().count() < *max,
            Self::CharWhitelist => raw
                .chars()
                .all(|c| c.is_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(&c)),
            Self::SingleEmoji => EMOJI_RE.is_match(raw),
            Self::Date => parse_date_range(raw).is_some(),
            Self::Link => LINK_RE.is_match(raw),
            Self::All(inner) => inner.iter().all(|v| v.validate(raw)),
        }
    }
}
