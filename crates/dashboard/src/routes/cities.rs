//! City screens.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use espiga_core::types::CityId;

use crate::backend::ListQuery;
use crate::backend::types::{Ciudad, NewCiudad};
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

/// City form data.
#[derive(Debug, Deserialize)]
pub struct CiudadForm {
    pub nombre: String,
}

/// City listing template.
#[derive(Template, WebTemplate)]
#[template(path = "cities/index.html")]
pub struct CitiesIndexTemplate {
    pub user: CurrentUser,
    pub ciudades: Vec<Ciudad>,
    pub search: String,
    pub error: Option<String>,
}

/// City create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "cities/form.html")]
pub struct CityFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub editing: bool,
    pub nombre: String,
    pub error: Option<String>,
}

/// `GET /ciudades` - city listing with search.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<IndexQuery>,
) -> Result<CitiesIndexTemplate> {
    let search = query.search.unwrap_or_default();
    let list_query = ListQuery {
        search: (!search.is_empty()).then(|| search.clone()),
        page_size: Some(200),
        offset: None,
    };
    let ciudades = state.backend().list_ciudades(&user.token, &list_query).await?;
    Ok(CitiesIndexTemplate {
        user,
        ciudades,
        search,
        error: query.error,
    })
}

/// `GET /ciudades/nuevo` - empty city form.
pub async fn new_form(RequireAdmin(user): RequireAdmin) -> impl IntoResponse {
    CityFormTemplate {
        user,
        action: "/ciudades".to_string(),
        editing: false,
        nombre: String::new(),
        error: None,
    }
}

/// `POST /ciudades` - create a city.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Form(form): Form<CiudadForm>,
) -> Response {
    let nombre = form.nombre.trim().to_string();
    if nombre.is_empty() {
        return CityFormTemplate {
            user,
            action: "/ciudades".to_string(),
            editing: false,
            nombre,
            error: Some("El nombre es obligatorio.".to_string()),
        }
        .into_response();
    }

    match state
        .backend()
        .create_ciudad(&user.token, &NewCiudad { nombre: nombre.clone() })
        .await
    {
        Ok(_) => Redirect::to("/ciudades").into_response(),
        Err(e) => CityFormTemplate {
            user,
            action: "/ciudades".to_string(),
            editing: false,
            nombre,
            error: Some(e.user_message()),
        }
        .into_response(),
    }
}

/// `GET /ciudades/{id}/editar` - prefilled city form.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<CityFormTemplate> {
    let ciudad = state.backend().get_ciudad(&user.token, CityId::new(id)).await?;
    Ok(CityFormTemplate {
        user,
        action: format!("/ciudades/{id}"),
        editing: true,
        nombre: ciudad.nombre,
        error: None,
    })
}

/// `POST /ciudades/{id}` - update a city.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
    Form(form): Form<CiudadForm>,
) -> Response {
    let nombre = form.nombre.trim().to_string();
    if nombre.is_empty() {
        return CityFormTemplate {
            user,
            action: format!("/ciudades/{id}"),
            editing: true,
            nombre,
            error: Some("El nombre es obligatorio.".to_string()),
        }
        .into_response();
    }

    match state
        .backend()
        .update_ciudad(&user.token, CityId::new(id), &NewCiudad { nombre: nombre.clone() })
        .await
    {
        Ok(()) => Redirect::to("/ciudades").into_response(),
        Err(e) => CityFormTemplate {
            user,
            action: format!("/ciudades/{id}"),
            editing: true,
            nombre,
            error: Some(e.user_message()),
        }
        .into_response(),
    }
}

/// `POST /ciudades/{id}/eliminar` - delete a city.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Response {
    match state.backend().delete_ciudad(&user.token, CityId::new(id)).await {
        Ok(()) => Redirect::to("/ciudades").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/ciudades?error={message}")).into_response()
        }
    }
}
