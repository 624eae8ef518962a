//! Request context, session lookup and the access-control guards.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use tower_cookies::Cookies;
use tracing::{debug, error};

use crate::error::AppError;
use crate::shared::state::AppState;
use crate::users::{self, User};
use crate::web::flash::{self, FlashMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
        }
    }
}

/// Everything a handler needs to know about who is asking.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<CurrentUser>,
    pub session_id: Option<String>,
}

impl RequestContext {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_staff)
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    pub fn user_id(&self) -> Option<i32> {
        self.user.as_ref().map(|u| u.id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Resolves the session cookie into a [`RequestContext`] extension. Stale or
/// unknown session cookies are cleared and the request continues anonymously.
pub async fn context_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mut context = RequestContext::default();

    if let Some(session_id) = cookies
        .get(state.sessions.cookie_name())
        .map(|c| c.value().to_string())
    {
        match load_user(&state, &session_id).await {
            Ok(Some(user)) => {
                context.user = Some(CurrentUser::from(&user));
                context.session_id = Some(session_id);
            }
            Ok(None) => {
                debug!("Dropping stale session cookie");
                cookies.remove(state.sessions.build_removal_cookie());
            }
            Err(e) => error!("Failed to resolve session: {e}"),
        }
    }

    request.extensions_mut().insert(context);
    next.run(request).await
}

async fn load_user(state: &AppState, session_id: &str) -> Result<Option<User>, AppError> {
    let Some(session) = state.sessions.validate_session(session_id).await? else {
        return Ok(None);
    };

    let mut conn = state.conn.get()?;
    let user = users::find_by_id(&mut conn, session.user_id)?;
    Ok(user.filter(|u| u.is_active))
}

/// Lets authenticated requests through and sends everyone else to the login
/// page with the original destination in `next`.
pub async fn require_login(request: Request<Body>, next: Next) -> Response {
    let authenticated = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(RequestContext::is_authenticated);

    if authenticated {
        return next.run(request).await;
    }

    let destination = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    AppError::AuthenticationRequired {
        next: encode_next(destination),
    }
    .into_response()
}

/// Lets staff through. Anyone else is sent to the forbidden page with
/// `denied_message` queued for display.
pub async fn require_staff(
    State(denied_message): State<&'static str>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_staff = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(RequestContext::is_staff);

    if is_staff {
        return next.run(request).await;
    }

    flash::push(&cookies, FlashMessage::error(denied_message));
    AppError::Forbidden.into_response()
}

/// Percent-encodes a destination for the `next` query parameter, keeping
/// `/` readable.
pub fn encode_next(destination: &str) -> String {
    urlencoding::encode(destination).replace("%2F", "/")
}

/// Accepts only local absolute paths so `next` cannot send the visitor to
/// another site.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}
