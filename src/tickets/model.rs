use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::shared::schema::{comments, tickets};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// `"2 - High"` style label shown in lists and choice widgets.
    pub fn label(self) -> String {
        format!("{} - {}", self.code(), self.name())
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Matches the choice values `"1"` to `"4"` exactly.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code().to_string() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Status {
    pub const ALL: [Status; 4] = [Self::Open, Self::InProgress, Self::Resolved, Self::Closed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tickets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Ticket {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub severity: i32,
    pub status: String,
}

impl Ticket {
    pub fn severity_label(&self) -> String {
        Severity::from_code(self.severity)
            .map(Severity::label)
            .unwrap_or_else(|| self.severity.to_string())
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

/// Validated ticket fields, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketInput {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: Status,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct TicketRecord<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub severity: i32,
    pub status: &'a str,
}

impl<'a> From<&'a TicketInput> for TicketRecord<'a> {
    fn from(input: &'a TicketInput) -> Self {
        Self {
            title: &input.title,
            description: &input.description,
            severity: input.severity.code(),
            status: input.status.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Comment {
    pub id: i32,
    pub ticket_id: i32,
    pub author_id: Option<i32>,
    pub text: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment<'a> {
    pub ticket_id: i32,
    pub author_id: Option<i32>,
    pub text: &'a str,
    pub created_at: NaiveDateTime,
}

/// A comment joined with its author's username, if the author still exists.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentView {
    pub comment: Comment,
    pub author: Option<String>,
}

impl CommentView {
    pub fn author_name(&self) -> &str {
        self.author.as_deref().unwrap_or("[deleted]")
    }
}

impl std::fmt::Display for CommentView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Comment by {} on Ticket {}",
            self.author_name(),
            self.comment.ticket_id
        )
    }
}
