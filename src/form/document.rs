//! Document builder — renders a finished conversation into the HTML post
//! sent to the publishing channel.

use chrono::{Locale, NaiveDate};

use super::model::{Conversation, FieldKey};
use super::validators::{DateRange, parse_date_range};
use crate::error::FlowError;

/// Link label used for the post's hyperlink.
const LINK_LABEL: &str = "Read more";

/// Renders posts with a fixed display locale for dates.
#[derive(Debug, Clone, Copy)]
pub struct DocumentBuilder {
    locale: Locale,
}

impl DocumentBuilder {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// Render the post. Every field must already have an answer.
    pub fn render(&self, conversation: &Conversation) -> Result<String, FlowError> {
        let answer = |key: FieldKey| conversation.answer(key).ok_or(FlowError::MissingAnswer(key));

        let title = answer(FieldKey::Title)?;
        let emoji = answer(FieldKey::Emoji)?;
        let raw_date = answer(FieldKey::Date)?;
        let description = answer(FieldKey::Description)?;
        let link = answer(FieldKey::Link)?;
        let contact = answer(FieldKey::Contact)?;

        let range = parse_date_range(raw_date).ok_or_else(|| FlowError::UnrenderableAnswer {
            key: FieldKey::Date,
            value: raw_date.to_string(),
        })?;

        let mut parts = vec![format!("<b>{}</b> {}", escape_html(title), emoji)];
        parts.push(format!("📅 {}", self.format_range(&range)));
        parts.push(escape_html(description));
        parts.push(format!(
            "🔗 <a href=\"{}\">{LINK_LABEL}</a>",
            escape_html(link)
        ));
        parts.push(format!("📞 Contact: {}", escape_html(contact)));

        Ok(parts.join("\n\n"))
    }

    /// "12 November" or "12 November - 16 December".
    pub fn format_range(&self, range: &DateRange) -> String {
        match range.end {
            Some(end) => format!("{} - {}", self.format_date(range.start), self.format_date(end)),
            None => self.format_date(range.start),
        }
    }

    fn format_date(&self, date: NaiveDate) -> String {
        date.and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .format_localized("%-d %B", self.locale)
            .to_string()
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(Locale::en_US)
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::model::ChatTarget;

    fn filled() -> Conversation {
        let mut conv = Conversation::new("cli:local", ChatTarget::new("cli", "local"));
        for (key, value) in [
            (FieldKey::Title, "PolyNite"),
            (FieldKey::Emoji, "👀"),
            (FieldKey::Date, "12/11-16/12"),
            (FieldKey::Description, "Teuf avec plein de monde"),
            (FieldKey::Link, "https://agepoly.ch"),
            (FieldKey::Contact, "@eliorpap"),
        ] {
            conv.answers.insert(key, value.to_string());
        }
        conv
    }

    #[test]
    fn render_full_post() {
        let doc = DocumentBuilder::default().render(&filled()).unwrap();
        assert_eq!(
            doc,
            "<b>PolyNite</b> 👀\n\n\
             📅 12 November - 16 December\n\n\
             Teuf avec plein de monde\n\n\
             🔗 <a href=\"https://agepoly.ch\">Read more</a>\n\n\
             📞 Contact: @eliorpap"
        );
    }

    #[test]
    fn render_is_deterministic() {
        let builder = DocumentBuilder::default();
        let conv = filled();
        assert_eq!(builder.render(&conv).unwrap(), builder.render(&conv).unwrap());
    }

    #[test]
    fn render_single_date() {
        let mut conv = filled();
        conv.answers.insert(FieldKey::Date, "01/03".into());
        let doc = DocumentBuilder::default().render(&conv).unwrap();
        assert!(doc.contains("📅 1 March\n"));
        assert!(!doc.contains(" - "));
    }

    #[test]
    fn render_uses_locale_month_names() {
        let doc = DocumentBuilder::new(Locale::fr_FR).render(&filled()).unwrap();
        assert!(doc.contains("12 novembre - 16 décembre"), "got: {doc}");
    }

    #[test]
    fn render_escapes_description_markup() {
        let mut conv = filled();
        conv.answers
            .insert(FieldKey::Description, "Drinks & snacks <free>".into());
        let doc = DocumentBuilder::default().render(&conv).unwrap();
        assert!(doc.contains("Drinks &amp; snacks &lt;free&gt;"));
    }

    #[test]
    fn render_missing_field_is_an_error() {
        let mut conv = filled();
        conv.answers.remove(&FieldKey::Link);
        let err = DocumentBuilder::default().render(&conv).unwrap_err();
        assert!(matches!(err, FlowError::MissingAnswer(FieldKey::Link)));
    }

    #[test]
    fn render_bad_stored_date_is_an_error() {
        let mut conv = filled();
        conv.answers.insert(FieldKey::Date, "someday".into());
        let err = DocumentBuilder::default().render(&conv).unwrap_err();
        assert!(matches!(
            err,
            FlowError::UnrenderableAnswer {
                key: FieldKey::Date,
                ..
            }
        ));
    }

    #[test]
    fn escape_html_passes_plain_text() {
        assert_eq!(escape_html("PolyNite"), "PolyNite");
        assert_eq!(escape_html("a \"b\""), "a &quot;b&quot;");
    }
}
