//! Fixed texts the bot sends around the form questions.

use super::state::ConfirmChoice;

pub const INTRO: &str = "Hi! I will ask you a few questions about the post you want to create. \
Please answer each one carefully: every answer is checked, and I will ask again if it does not fit. \
You can use /cancel to stop talking to me.";

pub const PUBLISHED: &str = "Thanks for the information! I will send the post to the channel now.";

pub const DISCARDED: &str = "Thanks for the information! I will not send the post to the channel.";

pub const FAREWELL: &str = "Bye! I hope we can talk again some day.";

pub const EXPIRED: &str = "This post was left unfinished for too long and has been discarded. \
Use /post to start again.";

pub const GREETING: &str = "Hi! I collect event posts for the channel. Use /post to create one.";

pub const HELP: &str = "/post - create a new event post\n\
/cancel - abandon the post in progress\n\
/help - show this message";

pub const NO_CONVERSATION: &str = "There is no post in progress. Use /post to create one.";

pub const ALREADY_RUNNING: &str = "A post is already in progress. Answer the question below, \
or use /cancel to start over.";

pub const BUSY: &str = "Too many posts are being written right now. Please try /post again later.";

pub const PUBLISH_FAILED: &str = "Sorry, I could not send the post to the channel. \
Reply Yes to try again or /cancel to give up.";

/// Summary shown before the Yes/No choice.
pub fn confirmation_prompt(document: &str) -> String {
    format!(
        "Please confirm the post:\n\n{document}\n\nIs this correct? Answer {} or {}.",
        ConfirmChoice::ACCEPT_TOKEN,
        ConfirmChoice::REJECT_TOKEN
    )
}

/// The two keyboard choices offered at confirmation.
pub fn confirmation_choices() -> Vec<String> {
    vec![
        ConfirmChoice::ACCEPT_TOKEN.to_string(),
        ConfirmChoice::REJECT_TOKEN.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_prompt_wraps_document() {
        let prompt = confirmation_prompt("<b>Party</b>");
        assert!(prompt.starts_with("Please confirm the post:\n\n<b>Party</b>\n\n"));
        assert!(prompt.ends_with("Answer Yes or No."));
    }

    #[test]
    fn choices_parse_back() {
        for choice in confirmation_choices() {
            assert!(ConfirmChoice::parse(&choice).is_some());
        }
    }

    #[test]
    fn html_sensitive_characters_absent_from_fixed_texts() {
        // These go out with HTML parse mode.
        for text in [INTRO, PUBLISHED, DISCARDED, FAREWELL, EXPIRED, GREETING, HELP, BUSY] {
            assert!(!text.contains('<') && !text.contains('&'), "{text}");
        }
    }
}
