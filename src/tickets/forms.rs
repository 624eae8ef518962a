use serde::Deserialize;

use super::model::{Severity, Status, Ticket, TicketInput};
use crate::forms::{
    invalid_choice_message, max_length_message, require_trimmed, required_message, FormErrors,
};

pub const TITLE_MAX_LENGTH: usize = 100;

/// Raw ticket form as submitted. Every field is optional on the wire so a
/// missing field becomes a field error instead of a rejected request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TicketForm {
    pub title: String,
    pub description: String,
    pub severity: String,
    pub status: String,
}

impl TicketForm {
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            severity: ticket.severity.to_string(),
            status: ticket.status.clone(),
        }
    }

    pub fn validate(&self) -> Result<TicketInput, FormErrors> {
        let mut errors = FormErrors::new();

        let title = require_trimmed(&mut errors, "title", &self.title);
        if let Some(title) = title {
            let length = title.chars().count();
            if length > TITLE_MAX_LENGTH {
                errors.add("title", max_length_message(TITLE_MAX_LENGTH, length));
            }
        }

        let description = require_trimmed(&mut errors, "description", &self.description);
        let severity = choice(&mut errors, "severity", &self.severity, Severity::parse);
        let status = choice(&mut errors, "status", &self.status, Status::parse);

        match (title, description, severity, status) {
            (Some(title), Some(description), Some(severity), Some(status)) if errors.is_empty() => {
                Ok(TicketInput {
                    title: title.to_string(),
                    description: description.to_string(),
                    severity,
                    status,
                })
            }
            _ => Err(errors),
        }
    }
}

fn choice<T>(
    errors: &mut FormErrors,
    field: &'static str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, required_message());
        return None;
    }

    let parsed = parse(value);
    if parsed.is_none() {
        errors.add(field, invalid_choice_message(value));
    }
    parsed
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    /// Returns the trimmed comment text.
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let text = require_trimmed(&mut errors, "text", &self.text).map(str::to_string);
        match text {
            Some(text) => Ok(text),
            None => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> TicketForm {
        TicketForm {
            title: "Form Test Ticket".into(),
            description: "Testing the ticket form".into(),
            severity: "3".into(),
            status: "Open".into(),
        }
    }

    #[test]
    fn test_valid_ticket_form() {
        let input = valid_form().validate().expect("form should validate");
        assert_eq!(input.title, "Form Test Ticket");
        assert_eq!(input.severity, Severity::Medium);
        assert_eq!(input.status, Status::Open);
    }

    #[test]
    fn test_missing_fields_are_required() {
        let form = TicketForm {
            title: "Only a title".into(),
            ..TicketForm::default()
        };
        let errors = form.validate().expect_err("form should fail");

        assert!(!errors.has("title"));
        assert_eq!(errors.get("description"), ["This field is required.".to_string()]);
        assert!(errors.has("severity"));
        assert!(errors.has("status"));
    }

    #[test]
    fn test_title_is_trimmed_and_bounded() {
        let mut form = valid_form();
        form.title = format!("  {}  ", "a".repeat(100));
        assert_eq!(form.validate().expect("100 chars fits").title.len(), 100);

        form.title = "é".repeat(101);
        let errors = form.validate().expect_err("101 chars is too long");
        assert_eq!(
            errors.get("title"),
            ["Ensure this value has at most 100 characters (it has 101).".to_string()]
        );
    }

    #[test]
    fn test_blank_title_is_required() {
        let mut form = valid_form();
        form.title = "   ".into();
        let errors = form.validate().expect_err("blank title");
        assert_eq!(errors.get("title"), ["This field is required.".to_string()]);
    }

    #[test]
    fn test_invalid_choices() {
        let mut form = valid_form();
        form.severity = "9".into();
        form.status = "Pending".into();
        let errors = form.validate().expect_err("bad choices");

        assert_eq!(
            errors.get("severity"),
            ["Select a valid choice. 9 is not one of the available choices.".to_string()]
        );
        assert_eq!(
            errors.get("status"),
            ["Select a valid choice. Pending is not one of the available choices.".to_string()]
        );
    }

    #[test]
    fn test_severity_must_match_a_choice_exactly() {
        for raw in ["02", "+2", "2.0"] {
            let mut form = valid_form();
            form.severity = raw.into();
            let errors = form.validate().expect_err("not an offered choice");
            assert_eq!(
                errors.get("severity"),
                [format!("Select a valid choice. {raw} is not one of the available choices.")]
            );
        }
    }

    #[test]
    fn test_from_ticket_round_trips_through_validation() {
        let ticket = Ticket {
            id: 5,
            title: "Existing".into(),
            description: "Already stored".into(),
            severity: 2,
            status: "In Progress".into(),
        };
        let input = TicketForm::from_ticket(&ticket).validate().expect("valid");
        assert_eq!(input.severity, Severity::High);
        assert_eq!(input.status, Status::InProgress);
    }

    #[test]
    fn test_comment_form() {
        let form = CommentForm {
            text: "  looks good  ".into(),
        };
        assert_eq!(form.validate().expect("valid"), "looks good");

        let blank = CommentForm { text: "  ".into() };
        let errors = blank.validate().expect_err("blank");
        assert!(errors.has("text"));
    }
}
