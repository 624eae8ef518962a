pub mod forms;
pub mod model;
pub mod store;
pub mod ui;

use axum::{
    extract::{Path, State},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tower_cookies::Cookies;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::forms::FormErrors;
use crate::shared::state::AppState;
use crate::web::auth::{require_login, require_staff, RequestContext};
use crate::web::flash::{self, FlashMessage};
use crate::web::pages::page;

use self::forms::{CommentForm, TicketForm};
use self::model::Ticket;

pub use model::{Comment, CommentView, Severity, Status, TicketInput};

pub const DELETE_DENIED_MESSAGE: &str = "You do not have permission to delete tickets.";

/// Non-numeric ids cannot name a ticket, so they are a plain 404.
fn parse_id(raw: &str) -> AppResult<i32> {
    raw.parse()
        .map_err(|_| AppError::NotFound("Ticket".to_string()))
}

fn load_ticket(state: &AppState, raw_id: &str) -> AppResult<Ticket> {
    let id = parse_id(raw_id)?;
    let mut conn = state.conn.get()?;
    store::find_ticket(&mut conn, id)?.ok_or_else(|| AppError::NotFound("Ticket".to_string()))
}

fn detail_url(id: i32) -> String {
    format!("/tickets/{id}/")
}

pub async fn list_tickets(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
) -> AppResult<Html<String>> {
    let mut conn = state.conn.get()?;
    let tickets = store::list_tickets(&mut conn)?;

    Ok(page(
        "Tickets",
        &ctx,
        &cookies,
        None,
        &ui::render_ticket_list(&tickets),
    ))
}

fn render_detail(
    state: &AppState,
    ctx: &RequestContext,
    cookies: &Cookies,
    ticket: &Ticket,
    draft: &str,
    errors: &FormErrors,
    extra: Option<FlashMessage>,
) -> AppResult<Html<String>> {
    let mut conn = state.conn.get()?;
    let comments = store::list_comments(&mut conn, ticket)?;

    Ok(page(
        &ticket.title,
        ctx,
        cookies,
        extra,
        &ui::render_ticket_detail(ticket, &comments, draft, errors, ctx.is_staff()),
    ))
}

pub async fn ticket_detail(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let ticket = load_ticket(&state, &id)?;
    render_detail(&state, &ctx, &cookies, &ticket, "", &FormErrors::new(), None)
}

pub async fn add_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let ticket = load_ticket(&state, &id)?;

    match form.validate() {
        Ok(text) => {
            let mut conn = state.conn.get()?;
            let comment = store::insert_comment(&mut conn, ticket.id, ctx.user_id(), &text)?;
            info!("Comment {} added to ticket {}", comment.id, ticket.id);

            flash::push(&cookies, FlashMessage::success("Comment added successfully!"));
            Ok(Redirect::to(&detail_url(ticket.id)).into_response())
        }
        Err(errors) => {
            let html = render_detail(
                &state,
                &ctx,
                &cookies,
                &ticket,
                &form.text,
                &errors,
                Some(FlashMessage::error(
                    "Error adding comment. Please check your input.",
                )),
            )?;
            Ok(html.into_response())
        }
    }
}

pub async fn create_ticket_page(ctx: RequestContext, cookies: Cookies) -> Html<String> {
    page(
        "Create ticket",
        &ctx,
        &cookies,
        None,
        &ui::render_ticket_form(
            "Create ticket",
            "/tickets/create/",
            "Create",
            &TicketForm::default(),
            &FormErrors::new(),
        ),
    )
}

pub async fn create_ticket(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    Form(form): Form<TicketForm>,
) -> AppResult<Response> {
    match form.validate() {
        Ok(input) => {
            let mut conn = state.conn.get()?;
            let ticket = store::insert_ticket(&mut conn, &input)?;
            info!(
                "Ticket {} created by {}",
                ticket.id,
                ctx.username().unwrap_or("unknown")
            );

            flash::push(&cookies, FlashMessage::success("Ticket created successfully!"));
            Ok(Redirect::to(&detail_url(ticket.id)).into_response())
        }
        Err(errors) => Ok(page(
            "Create ticket",
            &ctx,
            &cookies,
            Some(FlashMessage::error("Error creating ticket. Please check the form.")),
            &ui::render_ticket_form("Create ticket", "/tickets/create/", "Create", &form, &errors),
        )
        .into_response()),
    }
}

fn update_form_html(ticket: &Ticket, form: &TicketForm, errors: &FormErrors) -> String {
    ui::render_ticket_form(
        &format!("Edit ticket #{}", ticket.id),
        &format!("/tickets/{}/update/", ticket.id),
        "Save changes",
        form,
        errors,
    )
}

pub async fn update_ticket_page(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let ticket = load_ticket(&state, &id)?;
    let form = TicketForm::from_ticket(&ticket);

    Ok(page(
        "Edit ticket",
        &ctx,
        &cookies,
        None,
        &update_form_html(&ticket, &form, &FormErrors::new()),
    ))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    Path(id): Path<String>,
    Form(form): Form<TicketForm>,
) -> AppResult<Response> {
    let ticket = load_ticket(&state, &id)?;

    match form.validate() {
        Ok(input) => {
            let mut conn = state.conn.get()?;
            let updated = store::update_ticket(&mut conn, ticket.id, &input)?
                .ok_or_else(|| AppError::NotFound("Ticket".to_string()))?;
            info!("Ticket {} updated", updated.id);

            flash::push(&cookies, FlashMessage::success("Ticket updated successfully!"));
            Ok(Redirect::to(&detail_url(updated.id)).into_response())
        }
        Err(errors) => Ok(page(
            "Edit ticket",
            &ctx,
            &cookies,
            Some(FlashMessage::error("Error updating ticket. Please check the form.")),
            &update_form_html(&ticket, &form, &errors),
        )
        .into_response()),
    }
}

pub async fn delete_ticket_page(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let ticket = load_ticket(&state, &id)?;

    Ok(page(
        "Delete ticket",
        &ctx,
        &cookies,
        None,
        &ui::render_delete_confirm(&ticket),
    ))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let mut conn = state.conn.get()?;
    let ticket = store::delete_ticket(&mut conn, id)?
        .ok_or_else(|| AppError::NotFound("Ticket".to_string()))?;
    info!(
        "Ticket {} deleted by {}",
        ticket.id,
        ctx.username().unwrap_or("unknown")
    );

    flash::push(
        &cookies,
        FlashMessage::success(format!("Ticket \"{}\" deleted successfully!", ticket.title)),
    );
    Ok(Redirect::to("/tickets/").into_response())
}

/// Ticket routes. Everything needs a login; deletion also needs staff, and
/// the login guard runs first so anonymous visitors land on the login page.
pub fn configure_tickets_routes() -> Router<AppState> {
    let staff_only = Router::new()
        .route(
            "/tickets/:id/delete/",
            get(delete_ticket_page).post(delete_ticket),
        )
        .route_layer(middleware::from_fn_with_state(
            DELETE_DENIED_MESSAGE,
            require_staff,
        ));

    Router::new()
        .route("/tickets/", get(list_tickets))
        .route(
            "/tickets/create/",
            get(create_ticket_page).post(create_ticket),
        )
        .route("/tickets/:id/", get(ticket_detail).post(add_comment))
        .route(
            "/tickets/:id/update/",
            get(update_ticket_page).post(update_ticket),
        )
        .merge(staff_only)
        .route_layer(middleware::from_fn(require_login))
}
