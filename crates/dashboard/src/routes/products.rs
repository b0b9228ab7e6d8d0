//! Product catalog screens.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use espiga_core::types::ProductId;

use crate::backend::ListQuery;
use crate::backend::types::{NewProducto, Producto};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::CurrentUser;
use crate::routes::line_form::parse_decimal;
use crate::state::AppState;

/// Query parameters for the listing.
#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub search: Option<String>,
    pub error: Option<String>,
}

/// Product form data.
#[derive(Debug, Deserialize)]
pub struct ProductoForm {
    pub nombre: String,
    pub peso: Option<String>,
}

/// Product listing template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub user: CurrentUser,
    pub productos: Vec<Producto>,
    pub search: String,
    pub error: Option<String>,
}

/// Product create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub editing: bool,
    pub nombre: String,
    pub peso: String,
    pub error: Option<String>,
}

/// `GET /productos` - product listing with search.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<IndexQuery>,
) -> Result<ProductsIndexTemplate> {
    let search = query.search.unwrap_or_default();
    let list_query = ListQuery {
        search: (!search.is_empty()).then(|| search.clone()),
        page_size: Some(200),
        offset: None,
    };
    let productos = state.backend().list_productos(&user.token, &list_query).await?;
    Ok(ProductsIndexTemplate {
        user,
        productos,
        search,
        error: query.error,
    })
}

/// `GET /productos/nuevo` - empty product form.
pub async fn new_form(RequireAdmin(user): RequireAdmin) -> impl IntoResponse {
    ProductFormTemplate {
        user,
        action: "/productos".to_string(),
        editing: false,
        nombre: String::new(),
        peso: String::new(),
        error: None,
    }
}

/// `POST /productos` - create a product.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Form(form): Form<ProductoForm>,
) -> Response {
    let rerender = |user: CurrentUser, form: &ProductoForm, error: String| {
        ProductFormTemplate {
            user,
            action: "/productos".to_string(),
            editing: false,
            nombre: form.nombre.clone(),
            peso: form.peso.clone().unwrap_or_default(),
            error: Some(error),
        }
        .into_response()
    };

    let Some(payload) = to_payload(&form) else {
        return rerender(user, &form, "El nombre es obligatorio.".to_string());
    };

    match state.backend().create_producto(&user.token, &payload).await {
        Ok(_) => Redirect::to("/productos").into_response(),
        Err(e) => rerender(user, &form, e.user_message()),
    }
}

/// `GET /productos/{id}/editar` - prefilled product form.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<ProductFormTemplate> {
    let producto = state
        .backend()
        .get_producto(&user.token, ProductId::new(id))
        .await?;
    Ok(ProductFormTemplate {
        user,
        action: format!("/productos/{id}"),
        editing: true,
        nombre: producto.nombre,
        peso: producto.peso.map(|peso| peso.to_string()).unwrap_or_default(),
        error: None,
    })
}

/// `POST /productos/{id}` - update a product.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
    Form(form): Form<ProductoForm>,
) -> Response {
    let rerender = |user: CurrentUser, form: &ProductoForm, error: String| {
        ProductFormTemplate {
            user,
            action: format!("/productos/{id}"),
            editing: true,
            nombre: form.nombre.clone(),
            peso: form.peso.clone().unwrap_or_default(),
            error: Some(error),
        }
        .into_response()
    };

    let Some(payload) = to_payload(&form) else {
        return rerender(user, &form, "El nombre es obligatorio.".to_string());
    };

    match state
        .backend()
        .update_producto(&user.token, ProductId::new(id), &payload)
        .await
    {
        Ok(()) => Redirect::to("/productos").into_response(),
        Err(e) => rerender(user, &form, e.user_message()),
    }
}

/// `POST /productos/{id}/eliminar` - delete a product.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Response {
    match state
        .backend()
        .delete_producto(&user.token, ProductId::new(id))
        .await
    {
        Ok(()) => Redirect::to("/productos").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/productos?error={message}")).into_response()
        }
    }
}

fn to_payload(form: &ProductoForm) -> Option<NewProducto> {
    let nombre = form.nombre.trim();
    if nombre.is_empty() {
        return None;
    }
    Some(NewProducto {
        nombre: nombre.to_string(),
        peso: parse_decimal(form.peso.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_payload_requires_name() {
        let form = ProductoForm {
            nombre: "  ".to_string(),
            peso: None,
        };
        assert!(to_payload(&form).is_none());
    }

    #[test]
    fn test_to_payload_parses_weight() {
        let form = ProductoForm {
            nombre: "Pan flauta".to_string(),
            peso: Some("250.5".to_string()),
        };
        let payload = to_payload(&form).expect("payload");
        assert_eq!(payload.nombre, "Pan flauta");
        assert_eq!(payload.peso, Some(dec!(250.5)));
    }

    #[test]
    fn test_to_payload_ignores_invalid_weight() {
        let form = ProductoForm {
            nombre: "Pan flauta".to_string(),
            peso: Some("abc".to_string()),
        };
        let payload = to_payload(&form).expect("payload");
        assert_eq!(payload.peso, None);
    }
}
