//! Registration, login and logout.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::forms::FormErrors;
use crate::shared::state::AppState;
use crate::users::{
    self,
    forms::{LoginForm, RegistrationForm, LOGIN_FAILED_MESSAGE},
    ui, User,
};
use crate::web::auth::{safe_next, RequestContext};
use crate::web::flash::{self, FlashMessage};
use crate::web::pages::page;

pub const DEFAULT_LOGIN_REDIRECT: &str = "/tickets/";

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
}

/// Issues a fresh session for `user`, discarding the one the request came
/// in with so a session id never survives a login.
async fn start_session(
    state: &AppState,
    ctx: &RequestContext,
    cookies: &Cookies,
    user: &User,
    user_agent: Option<&str>,
) -> AppResult<()> {
    if let Some(previous) = ctx.session_id.as_deref() {
        state.sessions.destroy_session(previous).await?;
    }

    let session = state.sessions.create_session(user.id, user_agent).await?;
    cookies.add(state.sessions.build_cookie(&session));
    Ok(())
}

pub async fn register_page(ctx: RequestContext, cookies: Cookies) -> Html<String> {
    page(
        "Register",
        &ctx,
        &cookies,
        None,
        &ui::render_registration_form(&RegistrationForm::default(), &FormErrors::new()),
    )
}

pub async fn register_submit(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    headers: HeaderMap,
    Form(form): Form<RegistrationForm>,
) -> AppResult<Response> {
    let outcome = {
        let mut conn = state.conn.get()?;
        match form.validate(&mut conn, &state.passwords)? {
            Ok(account) => Ok(users::create_user(&mut conn, &state.passwords, &account)?),
            Err(errors) => Err(errors),
        }
    };

    match outcome {
        Ok(user) => {
            start_session(&state, &ctx, &cookies, &user, user_agent(&headers)).await?;
            info!("Registered user {}", user.username);

            flash::push(
                &cookies,
                FlashMessage::success(format!(
                    "Registration successful! Welcome, {}.",
                    user.username
                )),
            );
            Ok(Redirect::to("/").into_response())
        }
        Err(errors) => Ok(page(
            "Register",
            &ctx,
            &cookies,
            None,
            &ui::render_registration_form(&form, &errors),
        )
        .into_response()),
    }
}

pub async fn login_page(
    ctx: RequestContext,
    cookies: Cookies,
    Query(query): Query<LoginQuery>,
) -> Html<String> {
    let form = LoginForm {
        next: query.next.unwrap_or_default(),
        ..LoginForm::default()
    };

    page(
        "Log in",
        &ctx,
        &cookies,
        None,
        &ui::render_login_form(&form, &FormErrors::new()),
    )
}

pub async fn login_submit(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let errors = match form.validate() {
        Ok((username, password)) => {
            let user = {
                let mut conn = state.conn.get()?;
                let user = users::authenticate(&mut conn, &state.passwords, username, password)?;
                if let Some(user) = &user {
                    users::touch_last_login(&mut conn, user.id)?;
                }
                user
            };

            if let Some(user) = user {
                start_session(&state, &ctx, &cookies, &user, user_agent(&headers)).await?;
                info!("User {} logged in", user.username);

                let destination =
                    safe_next(Some(form.next.as_str())).unwrap_or(DEFAULT_LOGIN_REDIRECT);
                return Ok(Redirect::to(destination).into_response());
            }

            warn!("Failed login attempt for {username}");
            let mut errors = FormErrors::new();
            errors.add_non_field(LOGIN_FAILED_MESSAGE);
            errors
        }
        Err(errors) => errors,
    };

    Ok(page(
        "Log in",
        &ctx,
        &cookies,
        None,
        &ui::render_login_form(&form, &errors),
    )
    .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    cookies: Cookies,
) -> AppResult<Response> {
    if let Some(session_id) = ctx.session_id.as_deref() {
        state.sessions.destroy_session(session_id).await?;
    }
    cookies.remove(state.sessions.build_removal_cookie());
    info!("User {} logged out", ctx.username().unwrap_or("unknown"));

    flash::push(&cookies, FlashMessage::info("You have been logged out."));
    Ok(Redirect::to("/").into_response())
}
