//! Client screens.
//!
//! The client form needs the city listing for its dropdown; a failed city
//! load renders the form with an empty dropdown and a banner instead of
//! failing the whole page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use espiga_core::types::{CityId, ClientId};

use crate::backend::ListQuery;
use crate::backend::types::{Ciudad, Cliente, NewCliente};
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

/// Client form data.
#[derive(Debug, Deserialize)]
pub struct ClienteForm {
    pub nombre: String,
    pub ciudad_id: Option<String>,
}

/// Client listing template.
#[derive(Template, WebTemplate)]
#[template(path = "clients/index.html")]
pub struct ClientsIndexTemplate {
    pub user: CurrentUser,
    pub clientes: Vec<Cliente>,
    pub search: String,
    pub error: Option<String>,
}

/// Client create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "clients/form.html")]
pub struct ClientFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub editing: bool,
    pub nombre: String,
    pub ciudad_id: Option<i32>,
    pub ciudades: Vec<Ciudad>,
    pub error: Option<String>,
}

impl ClientFormTemplate {
    fn ciudad_selected(&self, ciudad: &Ciudad) -> bool {
        self.ciudad_id == Some(ciudad.id.as_i32())
    }
}

/// `GET /clientes` - client listing with search.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<IndexQuery>,
) -> Result<ClientsIndexTemplate> {
    let search = query.search.unwrap_or_default();
    let list_query = ListQuery {
        search: (!search.is_empty()).then(|| search.clone()),
        page_size: Some(200),
        offset: None,
    };
    let clientes = state.backend().list_clientes(&user.token, &list_query).await?;
    Ok(ClientsIndexTemplate {
        user,
        clientes,
        search,
        error: query.error,
    })
}

/// Load the cities dropdown, degrading to a banner on failure.
async fn load_ciudades(state: &AppState, user: &CurrentUser) -> (Vec<Ciudad>, Option<String>) {
    match state.backend().list_ciudades(&user.token, &ListQuery::all()).await {
        Ok(ciudades) => (ciudades, None),
        Err(e) => {
            tracing::warn!(error = %e, "city dropdown load failed");
            (Vec::new(), Some("No se pudieron cargar las ciudades.".to_string()))
        }
    }
}

/// `GET /clientes/nuevo` - empty client form.
pub async fn new_form(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> impl IntoResponse {
    let (ciudades, error) = load_ciudades(&state, &user).await;
    ClientFormTemplate {
        user,
        action: "/clientes".to_string(),
        editing: false,
        nombre: String::new(),
        ciudad_id: None,
        ciudades,
        error,
    }
}

/// `POST /clientes` - create a client.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Form(form): Form<ClienteForm>,
) -> Response {
    let Some(payload) = to_payload(&form) else {
        let (ciudades, _) = load_ciudades(&state, &user).await;
        return ClientFormTemplate {
            user,
            action: "/clientes".to_string(),
            editing: false,
            nombre: form.nombre,
            ciudad_id: None,
            ciudades,
            error: Some("El nombre es obligatorio.".to_string()),
        }
        .into_response();
    };

    match state.backend().create_cliente(&user.token, &payload).await {
        Ok(_) => Redirect::to("/clientes").into_response(),
        Err(e) => {
            let (ciudades, _) = load_ciudades(&state, &user).await;
            ClientFormTemplate {
                user,
                action: "/clientes".to_string(),
                editing: false,
                nombre: payload.nombre,
                ciudad_id: payload.ciudad_id.map(CityId::as_i32),
                ciudades,
                error: Some(e.user_message()),
            }
            .into_response()
        }
    }
}

/// `GET /clientes/{id}/editar` - prefilled client form.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<ClientFormTemplate> {
    let cliente = state.backend().get_cliente(&user.token, ClientId::new(id)).await?;
    let (ciudades, error) = load_ciudades(&state, &user).await;
    Ok(ClientFormTemplate {
        user,
        action: format!("/clientes/{id}"),
        editing: true,
        nombre: cliente.nombre,
        ciudad_id: cliente.ciudad_id.map(CityId::as_i32),
        ciudades,
        error,
    })
}

/// `POST /clientes/{id}` - update a client.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
    Form(form): Form<ClienteForm>,
) -> Response {
    let Some(payload) = to_payload(&form) else {
        let (ciudades, _) = load_ciudades(&state, &user).await;
        return ClientFormTemplate {
            user,
            action: format!("/clientes/{id}"),
            editing: true,
            nombre: form.nombre,
            ciudad_id: None,
            ciudades,
            error: Some("El nombre es obligatorio.".to_string()),
        }
        .into_response();
    };

    match state
        .backend()
        .update_cliente(&user.token, ClientId::new(id), &payload)
        .await
    {
        Ok(()) => Redirect::to("/clientes").into_response(),
        Err(e) => {
            let (ciudades, _) = load_ciudades(&state, &user).await;
            ClientFormTemplate {
                user,
                action: format!("/clientes/{id}"),
                editing: true,
                nombre: payload.nombre,
                ciudad_id: payload.ciudad_id.map(CityId::as_i32),
                ciudades,
                error: Some(e.user_message()),
            }
            .into_response()
        }
    }
}

/// `POST /clientes/{id}/eliminar` - delete a client.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Response {
    match state.backend().delete_cliente(&user.token, ClientId::new(id)).await {
        Ok(()) => Redirect::to("/clientes").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/clientes?error={message}")).into_response()
        }
    }
}

fn to_payload(form: &ClienteForm) -> Option<NewCliente> {
    let nombre = form.nombre.trim();
    if nombre.is_empty() {
        return None;
    }
    let ciudad_id = form
        .ciudad_id
        .as_deref()
        .and_then(|raw| raw.parse::<i32>().ok())
        .map(CityId::new);
    Some(NewCliente {
        nombre: nombre.to_string(),
        ciudad_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_payload_parses_city() {
        let form = ClienteForm {
            nombre: "Almacén Sur".to_string(),
            ciudad_id: Some("3".to_string()),
        };
        let payload = to_payload(&form).expect("payload");
        assert_eq!(payload.ciudad_id, Some(CityId::new(3)));
    }

    #[test]
    fn test_to_payload_empty_city_is_none() {
        let form = ClienteForm {
            nombre: "Almacén Sur".to_string(),
            ciudad_id: Some(String::new()),
        };
        let payload = to_payload(&form).expect("payload");
        assert_eq!(payload.ciudad_id, None);
    }
}
