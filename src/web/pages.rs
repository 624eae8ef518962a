use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};
use tower_cookies::Cookies;

use crate::forms::FormErrors;
use crate::web::auth::RequestContext;
use crate::web::flash::{self, FlashMessage};

pub const SITE_NAME: &str = "Ticket Desk";

/// Escapes text content. Quotes are left alone so messages read naturally.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s)
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn render_nav(ctx: &RequestContext) -> String {
    match ctx.username() {
        Some(username) => format!(
            "<nav>\
                <a href=\"/\">Home</a> \
                <a href=\"/tickets/\">Tickets</a> \
                <a href=\"/tickets/create/\">New ticket</a> \
                <span class=\"user\">Signed in as {username}</span> \
                <form method=\"post\" action=\"/logout/\" class=\"inline\">\
                    <button type=\"submit\">Log out</button>\
                </form>\
            </nav>",
            username = escape_text(username),
        ),
        None => "<nav>\
                <a href=\"/\">Home</a> \
                <a href=\"/login/\">Log in</a> \
                <a href=\"/register/\">Register</a>\
            </nav>"
            .to_string(),
    }
}

pub fn render_messages(messages: &[FlashMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let items: String = messages
        .iter()
        .map(|m| {
            format!(
                "<li class=\"message {}\">{}</li>",
                m.level.css_class(),
                escape_text(&m.text)
            )
        })
        .collect();
    format!("<ul class=\"messages\">{items}</ul>")
}

pub fn render_layout(
    title: &str,
    ctx: &RequestContext,
    messages: &[FlashMessage],
    body: &str,
) -> String {
    format!(
        "<!DOCTYPE html>\
        <html lang=\"en\">\
        <head>\
            <meta charset=\"utf-8\">\
            <title>{title} | {site}</title>\
        </head>\
        <body>\
            <header><h1><a href=\"/\">{site}</a></h1>{nav}</header>\
            {messages}\
            <main>{body}</main>\
        </body>\
        </html>",
        title = escape_text(title),
        site = SITE_NAME,
        nav = render_nav(ctx),
        messages = render_messages(messages),
        body = body,
    )
}

/// Renders `body` in the layout, flushing queued messages plus `extra`.
pub fn page(
    title: &str,
    ctx: &RequestContext,
    cookies: &Cookies,
    extra: Option<FlashMessage>,
    body: &str,
) -> Html<String> {
    let mut messages = flash::take(cookies);
    messages.extend(extra);
    Html(render_layout(title, ctx, &messages, body))
}

pub fn render_field_errors(errors: &FormErrors, field: &str) -> String {
    let messages = errors.get(field);
    if messages.is_empty() {
        return String::new();
    }

    let items: String = messages
        .iter()
        .map(|m| format!("<li>{}</li>", escape_text(m)))
        .collect();
    format!("<ul class=\"errorlist\" data-field=\"{}\">{items}</ul>", escape_attr(field))
}

pub fn render_non_field_errors(errors: &FormErrors) -> String {
    let messages = errors.non_field();
    if messages.is_empty() {
        return String::new();
    }

    let items: String = messages
        .iter()
        .map(|m| format!("<li>{}</li>", escape_text(m)))
        .collect();
    format!("<ul class=\"errorlist nonfield\">{items}</ul>")
}

/// `<p>` wrapping a labelled single-line input plus its errors.
pub fn render_input(
    name: &str,
    label: &str,
    input_type: &str,
    value: &str,
    errors: &FormErrors,
) -> String {
    format!(
        "<p>\
            <label for=\"id_{name}\">{label}:</label> \
            <input type=\"{input_type}\" name=\"{name}\" id=\"id_{name}\" value=\"{value}\">\
            {errors}\
        </p>",
        name = escape_attr(name),
        label = escape_text(label),
        input_type = input_type,
        value = escape_attr(value),
        errors = render_field_errors(errors, name),
    )
}

pub fn render_home(ctx: &RequestContext) -> String {
    let intro = match ctx.username() {
        Some(username) => format!(
            "<p>Welcome back, {}.</p><p><a href=\"/tickets/\">Go to the ticket list</a></p>",
            escape_text(username)
        ),
        None => "<p>Track issues, discuss them in comments and see them through to resolution.</p>\
            <p><a href=\"/login/\">Log in</a> or <a href=\"/register/\">create an account</a> to get started.</p>"
            .to_string(),
    };
    format!("<h2>Welcome to {SITE_NAME}</h2>{intro}")
}

pub fn render_forbidden() -> String {
    "<h2>Access denied</h2>\
    <p>You do not have permission to perform this action.</p>\
    <p><a href=\"/tickets/\">Back to tickets</a></p>"
        .to_string()
}

pub fn render_not_found(what: &str) -> String {
    render_layout(
        "Not found",
        &RequestContext::default(),
        &[],
        &format!(
            "<h2>Not found</h2><p>{} could not be found.</p><p><a href=\"/\">Home</a></p>",
            escape_text(what)
        ),
    )
}

pub fn render_server_error() -> String {
    render_layout(
        "Server error",
        &RequestContext::default(),
        &[],
        "<h2>Server error</h2><p>Something went wrong on our side. Please try again.</p>",
    )
}

pub async fn home(ctx: RequestContext, cookies: Cookies) -> Html<String> {
    page("Home", &ctx, &cookies, None, &render_home(&ctx))
}

pub async fn forbidden(ctx: RequestContext, cookies: Cookies) -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        page("Forbidden", &ctx, &cookies, None, &render_forbidden()),
    )
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(render_not_found("The page")))
}
