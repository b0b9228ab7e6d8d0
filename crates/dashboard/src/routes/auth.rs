//! Login and logout handlers.
//!
//! Credentials are verified by the backend's `/auth/login`; the dashboard
//! only stores the issued bearer token and the user's identity in the
//! session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

/// Display the login page.
pub async fn login_page() -> impl IntoResponse {
    LoginTemplate { error: None }
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.backend().login(&form.username, &form.password).await {
        Ok(login) => {
            let user = CurrentUser {
                id: login.usuario.id,
                username: login.usuario.username,
                role: login.usuario.rol,
                route_id: login.usuario.reparto_id,
                token: login.token.into(),
            };

            if let Err(e) = set_current_user(&session, &user).await {
                tracing::error!("Failed to set session: {}", e);
                return LoginTemplate {
                    error: Some("No se pudo iniciar la sesión. Intente nuevamente.".to_string()),
                }
                .into_response();
            }

            set_sentry_user(&user.id, &user.username);
            Redirect::to("/").into_response()
        }
        Err(e) => {
            tracing::warn!("Login failed: {}", e);
            LoginTemplate {
                error: Some(e.user_message()),
            }
            .into_response()
        }
    }
}

/// Handle logout.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    clear_sentry_user();
    Redirect::to("/login").into_response()
}
