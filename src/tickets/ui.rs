use super::forms::TicketForm;
use super::model::{CommentView, Severity, Status, Ticket};
use crate::forms::FormErrors;
use crate::web::pages::{
    escape_attr, escape_text, render_field_errors, render_input, render_non_field_errors,
};

fn status_badge(status: &str) -> String {
    let class = match Status::parse(status) {
        Some(Status::Open) => "badge-primary",
        Some(Status::InProgress) => "badge-warning",
        Some(Status::Resolved) => "badge-success",
        Some(Status::Closed) => "badge-secondary",
        None => "badge",
    };
    format!("<span class=\"badge {class}\">{}</span>", escape_text(status))
}

fn severity_badge(ticket: &Ticket) -> String {
    let class = match Severity::from_code(ticket.severity) {
        Some(Severity::Critical) => "badge-danger",
        Some(Severity::High) => "badge-warning",
        Some(Severity::Medium) => "badge-info",
        Some(Severity::Low) => "badge-secondary",
        None => "badge",
    };
    format!(
        "<span class=\"badge {class}\">{}</span>",
        escape_text(&ticket.severity_label())
    )
}

fn render_empty_state(title: &str, description: &str) -> String {
    format!(
        "<div class=\"empty-state\">\
            <h3>{}</h3>\
            <p>{}</p>\
        </div>",
        title, description
    )
}

fn render_ticket_row(ticket: &Ticket) -> String {
    format!(
        "<tr class=\"ticket-row\" data-id=\"{id}\">\
            <td class=\"ticket-id\">{id}</td>\
            <td class=\"ticket-title\"><a href=\"/tickets/{id}/\">{title}</a></td>\
            <td class=\"ticket-severity\">{severity}</td>\
            <td class=\"ticket-status\">{status}</td>\
        </tr>",
        id = ticket.id,
        title = escape_text(&ticket.title),
        severity = severity_badge(ticket),
        status = status_badge(&ticket.status),
    )
}

pub fn render_ticket_list(tickets: &[Ticket]) -> String {
    let mut html = String::from(
        "<h2>Tickets</h2><p><a class=\"btn\" href=\"/tickets/create/\">Create ticket</a></p>",
    );

    if tickets.is_empty() {
        html.push_str(&render_empty_state(
            "No tickets yet",
            "Create your first ticket to get started.",
        ));
        return html;
    }

    html.push_str(
        "<table class=\"tickets-table\">\
            <thead>\
                <tr>\
                    <th>#</th>\
                    <th>Title</th>\
                    <th>Severity</th>\
                    <th>Status</th>\
                </tr>\
            </thead>\
            <tbody>",
    );
    for ticket in tickets {
        html.push_str(&render_ticket_row(ticket));
    }
    html.push_str("</tbody></table>");
    html
}

fn render_comment(comment: &CommentView) -> String {
    let created = comment.comment.created_at.format("%Y-%m-%d %H:%M").to_string();
    format!(
        "<li class=\"comment\" data-id=\"{id}\">\
            <div class=\"comment-meta\"><strong>{author}</strong> <time>{created}</time></div>\
            <div class=\"comment-text\">{text}</div>\
        </li>",
        id = comment.comment.id,
        author = escape_text(comment.author_name()),
        created = created,
        text = escape_text(&comment.comment.text),
    )
}

/// Detail page with the comment list and the comment form. `draft` is the
/// comment text to put back in the form after a failed submission.
pub fn render_ticket_detail(
    ticket: &Ticket,
    comments: &[CommentView],
    draft: &str,
    errors: &FormErrors,
    can_delete: bool,
) -> String {
    let comments_html = if comments.is_empty() {
        "<p class=\"no-comments\">No comments yet.</p>".to_string()
    } else {
        let items: String = comments.iter().map(render_comment).collect();
        format!("<ol class=\"comments\">{items}</ol>")
    };

    let delete_link = if can_delete {
        format!("<a class=\"btn btn-danger\" href=\"/tickets/{}/delete/\">Delete</a>", ticket.id)
    } else {
        String::new()
    };

    format!(
        "<article class=\"ticket\" data-id=\"{id}\">\
            <h2>{title}</h2>\
            <dl>\
                <dt>Severity</dt><dd>{severity}</dd>\
                <dt>Status</dt><dd>{status}</dd>\
            </dl>\
            <div class=\"ticket-description\">{description}</div>\
            <p class=\"ticket-actions\">\
                <a class=\"btn\" href=\"/tickets/{id}/update/\">Edit</a> {delete_link}\
                <a href=\"/tickets/\">Back to list</a>\
            </p>\
        </article>\
        <section class=\"ticket-comments\">\
            <h3>Comments</h3>\
            {comments_html}\
            <form method=\"post\" action=\"/tickets/{id}/\">\
                {non_field}\
                <p>\
                    <label for=\"id_text\">Add a comment:</label>\
                    <textarea name=\"text\" id=\"id_text\" rows=\"4\">{draft}</textarea>\
                    {text_errors}\
                </p>\
                <button type=\"submit\">Post comment</button>\
            </form>\
        </section>",
        id = ticket.id,
        title = escape_text(&ticket.title),
        severity = severity_badge(ticket),
        status = status_badge(&ticket.status),
        description = escape_text(&ticket.description),
        delete_link = delete_link,
        comments_html = comments_html,
        non_field = render_non_field_errors(errors),
        draft = escape_text(draft),
        text_errors = render_field_errors(errors, "text"),
    )
}

fn render_select(
    name: &str,
    label: &str,
    options: &[(String, String)],
    selected: &str,
    errors: &FormErrors,
) -> String {
    let mut html = format!(
        "<p><label for=\"id_{name}\">{label}:</label> <select name=\"{name}\" id=\"id_{name}\">\
            <option value=\"\">---------</option>",
        name = escape_attr(name),
        label = escape_text(label),
    );
    for (value, text) in options {
        let marker = if value == selected.trim() { " selected" } else { "" };
        html.push_str(&format!(
            "<option value=\"{}\"{marker}>{}</option>",
            escape_attr(value),
            escape_text(text)
        ));
    }
    html.push_str("</select>");
    html.push_str(&render_field_errors(errors, name));
    html.push_str("</p>");
    html
}

/// Create/update form. Values come straight from `form`, so a rejected
/// submission is shown exactly as it was typed.
pub fn render_ticket_form(
    heading: &str,
    action: &str,
    submit_label: &str,
    form: &TicketForm,
    errors: &FormErrors,
) -> String {
    let severities: Vec<(String, String)> = Severity::ALL
        .iter()
        .map(|s| (s.code().to_string(), s.label()))
        .collect();
    let statuses: Vec<(String, String)> = Status::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), s.as_str().to_string()))
        .collect();

    format!(
        "<h2>{heading}</h2>\
        <form method=\"post\" action=\"{action}\" class=\"ticket-form\">\
            {non_field}\
            {title}\
            <p>\
                <label for=\"id_description\">Description:</label>\
                <textarea name=\"description\" id=\"id_description\" rows=\"8\">{description}</textarea>\
                {description_errors}\
            </p>\
            {severity}\
            {status}\
            <button type=\"submit\">{submit}</button>\
            <a href=\"/tickets/\">Cancel</a>\
        </form>",
        heading = escape_text(heading),
        action = escape_attr(action),
        non_field = render_non_field_errors(errors),
        title = render_input("title", "Title", "text", &form.title, errors),
        description = escape_text(&form.description),
        description_errors = render_field_errors(errors, "description"),
        severity = render_select("severity", "Severity", &severities, &form.severity, errors),
        status = render_select("status", "Status", &statuses, &form.status, errors),
        submit = escape_text(submit_label),
    )
}

pub fn render_delete_confirm(ticket: &Ticket) -> String {
    format!(
        "<h2>Delete ticket</h2>\
        <p>Are you sure you want to delete the ticket \"{title}\"? \
        Its comments will be deleted as well.</p>\
        <form method=\"post\" action=\"/tickets/{id}/delete/\">\
            <button type=\"submit\" class=\"btn-danger\">Yes, delete</button>\
            <a href=\"/tickets/{id}/\">Cancel</a>\
        </form>",
        id = ticket.id,
        title = escape_text(&ticket.title),
    )
}
