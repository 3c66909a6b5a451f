//! Field registry — the ordered questions of the post form.

use super::model::FieldKey;
use super::validators::Validator;

/// One question/answer slot of the form.
#[derive(Debug, Clone)]
pub struct Field {
    pub key: FieldKey,
    pub prompt: &'static str,
    /// Answers must be strictly shorter than this many characters.
    pub max_len: Option<usize>,
    /// Format reminder appended to the question.
    pub hint: Option<&'static str>,
    pub validator: Validator,
}

impl Field {
    /// The full question sent to the user.
    pub fn question(&self) -> String {
        let mut question = self.prompt.to_string();
        if let Some(max) = self.max_len {
            question.push_str(&format!("\n(max {} characters)", max.saturating_sub(1)));
        }
        if let Some(hint) = self.hint {
            question.push_str(&format!("\nFormat: {hint}"));
        }
        question
    }

    pub fn validate(&self, raw: &str) -> bool {
        self.validator.validate(raw)
    }
}

/// Immutable, ordered set of fields. Shared read-only between conversations.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<Field>,
}

impl FieldRegistry {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// The event post form: title, emoji, date, description, link, contact.
    pub fn event_post() -> Self {
        let title_max = 64;
        let description_max = 1024;
        let link_max = 256;
        let contact_max = 64;

        Self::new(vec![
            Field {
                key: FieldKey::Title,
                prompt: "What is the title of the event?",
                max_len: Some(title_max),
                hint: None,
                validator: Validator::and([
                    Validator::MaxLength(title_max),
                    Validator::CharWhitelist,
                ]),
            },
            Field {
                key: FieldKey::Emoji,
                prompt: "Which emoji best represents the event?",
                max_len: None,
                hint: Some("a single emoji"),
                validator: Validator::SingleEmoji,
            },
            Field {
                key: FieldKey::Date,
                prompt: "When does the event take place?",
                max_len: None,
                hint: Some("DD/MM or DD/MM-DD/MM"),
                validator: Validator::Date,
            },
            Field {
                key: FieldKey::Description,
                prompt: "What is the description of the event?",
                max_len: Some(description_max),
                hint: None,
                validator: Validator::MaxLength(description_max),
            },
            Field {
                key: FieldKey::Link,
                prompt: "What is the link for more information?",
                max_len: Some(link_max),
                hint: Some("must start with http:// or https://"),
                validator: Validator::and([Validator::MaxLength(link_max), Validator::Link]),
            },
            Field {
                key: FieldKey::Contact,
                prompt: "Who should people contact about the event?",
                max_len: Some(contact_max),
                hint: None,
                validator: Validator::and([
                    Validator::MaxLength(contact_max),
                    Validator::CharWhitelist,
                ]),
            },
        ])
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_at(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn get(&self, key: FieldKey) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Question text for a field, with length limit and format hint.
    pub fn question_for(&self, key: FieldKey) -> Option<String> {
        self.get(key).map(Field::question)
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::event_post()
    }
}
