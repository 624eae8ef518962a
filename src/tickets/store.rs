use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;

use super::model::{Comment, CommentView, NewComment, Ticket, TicketInput, TicketRecord};
use crate::shared::schema::{comments, tickets, users};

/// Every ticket, newest first.
pub fn list_tickets(conn: &mut SqliteConnection) -> QueryResult<Vec<Ticket>> {
    tickets::table
        .order(tickets::id.desc())
        .select(Ticket::as_select())
        .load(conn)
}

pub fn find_ticket(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Ticket>> {
    tickets::table
        .find(id)
        .select(Ticket::as_select())
        .first(conn)
        .optional()
}

pub fn insert_ticket(conn: &mut SqliteConnection, input: &TicketInput) -> QueryResult<Ticket> {
    diesel::insert_into(tickets::table)
        .values(TicketRecord::from(input))
        .returning(Ticket::as_returning())
        .get_result(conn)
}

/// Overwrites all mutable fields in a single statement. `None` when the
/// ticket does not exist.
pub fn update_ticket(
    conn: &mut SqliteConnection,
    id: i32,
    input: &TicketInput,
) -> QueryResult<Option<Ticket>> {
    diesel::update(tickets::table.find(id))
        .set(TicketRecord::from(input))
        .returning(Ticket::as_returning())
        .get_result(conn)
        .optional()
}

/// Removes the ticket and all of its comments atomically, returning the
/// deleted ticket.
pub fn delete_ticket(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Ticket>> {
    conn.transaction(|conn| {
        let Some(ticket) = find_ticket(conn, id)? else {
            return Ok(None);
        };

        diesel::delete(comments::table.filter(comments::ticket_id.eq(id))).execute(conn)?;
        diesel::delete(tickets::table.find(id)).execute(conn)?;

        Ok(Some(ticket))
    })
}

/// Comments of `ticket` in creation order, oldest first.
pub fn list_comments(
    conn: &mut SqliteConnection,
    ticket: &Ticket,
) -> QueryResult<Vec<CommentView>> {
    let rows: Vec<(Comment, Option<String>)> = comments::table
        .left_join(users::table)
        .filter(comments::ticket_id.eq(ticket.id))
        .order((comments::created_at.asc(), comments::id.asc()))
        .select((Comment::as_select(), users::username.nullable()))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(comment, author)| CommentView { comment, author })
        .collect())
}

pub fn insert_comment(
    conn: &mut SqliteConnection,
    ticket_id: i32,
    author_id: Option<i32>,
    text: &str,
) -> QueryResult<Comment> {
    diesel::insert_into(comments::table)
        .values(NewComment {
            ticket_id,
            author_id,
            text,
            created_at: Utc::now().naive_utc(),
        })
        .returning(Comment::as_returning())
        .get_result(conn)
}

pub fn count_comments(conn: &mut SqliteConnection, ticket_id: i32) -> QueryResult<i64> {
    comments::table
        .filter(comments::ticket_id.eq(ticket_id))
        .count()
        .get_result(conn)
}
