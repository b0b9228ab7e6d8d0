//! Delivery route (reparto) screens.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use espiga_core::types::RouteId;

use crate::backend::ListQuery;
use crate::backend::types::{NewReparto, Reparto};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Query parameters for the listing.
#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub search: Option<String>,
    pub error: Option<String>,
}

/// Delivery route form data.
#[derive(Debug, Deserialize)]
pub struct RepartoForm {
    pub nombre: String,
    pub tercerizado: String,
    pub estado: String,
}

/// Route listing template.
#[derive(Template, WebTemplate)]
#[template(path = "repartos/index.html")]
pub struct RepartosIndexTemplate {
    pub user: CurrentUser,
    pub repartos: Vec<Reparto>,
    pub search: String,
    pub error: Option<String>,
}

/// Route create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "repartos/form.html")]
pub struct RepartoFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub editing: bool,
    pub nombre: String,
    pub tercerizado: String,
    pub estado: String,
    pub error: Option<String>,
}

/// `GET /repartos` - route listing with search.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<IndexQuery>,
) -> Result<RepartosIndexTemplate> {
    let search = query.search.unwrap_or_default();
    let list_query = ListQuery {
        search: (!search.is_empty()).then(|| search.clone()),
        page_size: Some(200),
        offset: None,
    };
    let repartos = state.backend().list_repartos(&user.token, &list_query).await?;
    Ok(RepartosIndexTemplate {
        user,
        repartos,
        search,
        error: query.error,
    })
}

/// `GET /repartos/nuevo` - empty route form.
pub async fn new_form(RequireAdmin(user): RequireAdmin) -> impl IntoResponse {
    RepartoFormTemplate {
        user,
        action: "/repartos".to_string(),
        editing: false,
        nombre: String::new(),
        tercerizado: "No".to_string(),
        estado: "Activo".to_string(),
        error: None,
    }
}

/// `POST /repartos` - create a route.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Form(form): Form<RepartoForm>,
) -> Response {
    let Some(payload) = to_payload(&form) else {
        return rerender(user, "/repartos".to_string(), false, &form,
            "El nombre es obligatorio.".to_string());
    };

    match state.backend().create_reparto(&user.token, &payload).await {
        Ok(_) => Redirect::to("/repartos").into_response(),
        Err(e) => rerender(user, "/repartos".to_string(), false, &form, e.user_message()),
    }
}

/// `GET /repartos/{id}/editar` - prefilled route form.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<RepartoFormTemplate> {
    let reparto = state.backend().get_reparto(&user.token, RouteId::new(id)).await?;
    Ok(RepartoFormTemplate {
        user,
        action: format!("/repartos/{id}"),
        editing: true,
        nombre: reparto.nombre,
        tercerizado: reparto.tercerizado,
        estado: reparto.estado,
        error: None,
    })
}

/// `POST /repartos/{id}` - update a route.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
    Form(form): Form<RepartoForm>,
) -> Response {
    let Some(payload) = to_payload(&form) else {
        return rerender(user, format!("/repartos/{id}"), true, &form,
            "El nombre es obligatorio.".to_string());
    };

    match state
        .backend()
        .update_reparto(&user.token, RouteId::new(id), &payload)
        .await
    {
        Ok(()) => Redirect::to("/repartos").into_response(),
        Err(e) => rerender(user, format!("/repartos/{id}"), true, &form, e.user_message()),
    }
}

/// `POST /repartos/{id}/eliminar` - delete a route.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Response {
    match state.backend().delete_reparto(&user.token, RouteId::new(id)).await {
        Ok(()) => Redirect::to("/repartos").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/repartos?error={message}")).into_response()
        }
    }
}

fn rerender(
    user: CurrentUser,
    action: String,
    editing: bool,
    form: &RepartoForm,
    error: String,
) -> Response {
    RepartoFormTemplate {
        user,
        action,
        editing,
        nombre: form.nombre.clone(),
        tercerizado: form.tercerizado.clone(),
        estado: form.estado.clone(),
        error: Some(error),
    }
    .into_response()
}

fn to_payload(form: &RepartoForm) -> Option<NewReparto> {
    let nombre = form.nombre.trim();
    if nombre.is_empty() {
        return None;
    }
    Some(NewReparto {
        nombre: nombre.to_string(),
        tercerizado: form.tercerizado.clone(),
        estado: form.estado.clone(),
    })
}
