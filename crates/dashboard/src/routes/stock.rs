//! Stock lot (existencia) screens.
//!
//! The listing filters by product, route and date range; the form assigns a
//! quantity of a product to a route with production and expiry dates.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;

use espiga_core::types::{LotId, ProductId, RouteId};

use crate::backend::ExistenciaFilter;
use crate::backend::types::{Existencia, NewExistencia, Producto, Reparto};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Query parameters for the listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub producto_id: Option<String>,
    pub reparto_id: Option<String>,
    pub fecha_e: Option<String>,
    pub fecha_v: Option<String>,
    pub error: Option<String>,
}

/// Stock lot form data.
#[derive(Debug, Deserialize)]
pub struct ExistenciaForm {
    pub producto_id: Option<String>,
    pub reparto_id: Option<String>,
    pub cantidad: Option<String>,
    pub fecha_e: Option<String>,
    pub fecha_v: Option<String>,
}

/// Stock listing template.
#[derive(Template, WebTemplate)]
#[template(path = "stock/index.html")]
pub struct StockIndexTemplate {
    pub user: CurrentUser,
    pub existencias: Vec<Existencia>,
    pub productos: Vec<Producto>,
    pub repartos: Vec<Reparto>,
    pub producto_id: Option<i32>,
    pub reparto_id: Option<i32>,
    pub fecha_e: String,
    pub fecha_v: String,
    pub error: Option<String>,
}

/// Stock lot create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "stock/form.html")]
pub struct StockFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub editing: bool,
    pub productos: Vec<Producto>,
    pub repartos: Vec<Reparto>,
    pub producto_id: Option<i32>,
    pub reparto_id: Option<i32>,
    pub cantidad: String,
    pub fecha_e: String,
    pub fecha_v: String,
    pub error: Option<String>,
}

impl StockIndexTemplate {
    fn producto_selected(&self, producto: &Producto) -> bool {
        self.producto_id == Some(producto.id.as_i32())
    }

    fn reparto_selected(&self, reparto: &Reparto) -> bool {
        self.reparto_id == Some(reparto.id.as_i32())
    }
}

impl StockFormTemplate {
    fn producto_selected(&self, producto: &Producto) -> bool {
        self.producto_id == Some(producto.id.as_i32())
    }

    fn reparto_selected(&self, reparto: &Reparto) -> bool {
        self.reparto_id == Some(reparto.id.as_i32())
    }
}

fn parse_id(raw: Option<&str>) -> Option<i32> {
    raw.and_then(|value| value.parse::<i32>().ok())
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
}

/// Load the dropdowns, degrading to a banner on failure.
async fn load_references(
    state: &AppState,
    user: &CurrentUser,
) -> (Vec<Producto>, Vec<Reparto>, Option<String>) {
    let productos = state.backend().reference_productos(&user.token).await;
    let repartos = state.backend().reference_repartos(&user.token).await;
    match (productos, repartos) {
        (Ok(productos), Ok(repartos)) => ((*productos).clone(), (*repartos).clone(), None),
        (productos, repartos) => {
            tracing::warn!("reference dropdown load failed for stock screen");
            (
                productos.map(|p| (*p).clone()).unwrap_or_default(),
                repartos.map(|r| (*r).clone()).unwrap_or_default(),
                Some("No se pudieron cargar los datos de referencia.".to_string()),
            )
        }
    }
}

/// `GET /existencias` - stock listing with filters.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<IndexQuery>,
) -> Result<StockIndexTemplate> {
    let filter = ExistenciaFilter {
        producto_id: parse_id(query.producto_id.as_deref()).map(ProductId::new),
        reparto_id: parse_id(query.reparto_id.as_deref()).map(RouteId::new),
        fecha_e: parse_date(query.fecha_e.as_deref()),
        fecha_v: parse_date(query.fecha_v.as_deref()),
        page_size: Some(200),
    };
    let existencias = state.backend().list_existencias(&user.token, &filter).await?;
    let (productos, repartos, reference_error) = load_references(&state, &user).await;

    Ok(StockIndexTemplate {
        user,
        existencias,
        productos,
        repartos,
        producto_id: filter.producto_id.map(ProductId::as_i32),
        reparto_id: filter.reparto_id.map(RouteId::as_i32),
        fecha_e: query.fecha_e.unwrap_or_default(),
        fecha_v: query.fecha_v.unwrap_or_default(),
        error: query.error.or(reference_error),
    })
}

/// `GET /existencias/nuevo` - empty stock lot form.
pub async fn new_form(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> impl IntoResponse {
    let (productos, repartos, error) = load_references(&state, &user).await;
    StockFormTemplate {
        user,
        action: "/existencias".to_string(),
        editing: false,
        productos,
        repartos,
        producto_id: None,
        reparto_id: None,
        cantidad: String::new(),
        fecha_e: String::new(),
        fecha_v: String::new(),
        error,
    }
}

/// `POST /existencias` - create a stock lot.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Form(form): Form<ExistenciaForm>,
) -> Response {
    match to_payload(&form) {
        Ok(payload) => match state.backend().create_existencia(&user.token, &payload).await {
            Ok(_) => Redirect::to("/existencias").into_response(),
            Err(e) => {
                rerender(&state, user, "/existencias".to_string(), false, &form, e.user_message())
                    .await
            }
        },
        Err(message) => {
            rerender(&state, user, "/existencias".to_string(), false, &form, message).await
        }
    }
}

/// `GET /existencias/{id}/editar` - prefilled stock lot form.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<StockFormTemplate> {
    let existencia = state.backend().get_existencia(&user.token, LotId::new(id)).await?;
    let (productos, repartos, error) = load_references(&state, &user).await;
    Ok(StockFormTemplate {
        user,
        action: format!("/existencias/{id}"),
        editing: true,
        productos,
        repartos,
        producto_id: Some(existencia.producto_id.as_i32()),
        reparto_id: Some(existencia.reparto_id.as_i32()),
        cantidad: existencia.cantidad.to_string(),
        fecha_e: existencia.fecha_e.to_string(),
        fecha_v: existencia.fecha_v.to_string(),
        error,
    })
}

/// `POST /existencias/{id}` - update a stock lot.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
    Form(form): Form<ExistenciaForm>,
) -> Response {
    match to_payload(&form) {
        Ok(payload) => match state
            .backend()
            .update_existencia(&user.token, LotId::new(id), &payload)
            .await
        {
            Ok(()) => Redirect::to("/existencias").into_response(),
            Err(e) => {
                rerender(&state, user, format!("/existencias/{id}"), true, &form, e.user_message())
                    .await
            }
        },
        Err(message) => {
            rerender(&state, user, format!("/existencias/{id}"), true, &form, message).await
        }
    }
}

/// `POST /existencias/{id}/eliminar` - delete a stock lot.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Response {
    match state.backend().delete_existencia(&user.token, LotId::new(id)).await {
        Ok(()) => Redirect::to("/existencias").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/existencias?error={message}")).into_response()
        }
    }
}

async fn rerender(
    state: &AppState,
    user: CurrentUser,
    action: String,
    editing: bool,
    form: &ExistenciaForm,
    error: String,
) -> Response {
    let (productos, repartos, _) = load_references(state, &user).await;
    StockFormTemplate {
        user,
        action,
        editing,
        productos,
        repartos,
        producto_id: parse_id(form.producto_id.as_deref()),
        reparto_id: parse_id(form.reparto_id.as_deref()),
        cantidad: form.cantidad.clone().unwrap_or_default(),
        fecha_e: form.fecha_e.clone().unwrap_or_default(),
        fecha_v: form.fecha_v.clone().unwrap_or_default(),
        error: Some(error),
    }
    .into_response()
}

fn to_payload(form: &ExistenciaForm) -> std::result::Result<NewExistencia, String> {
    let producto_id = parse_id(form.producto_id.as_deref())
        .ok_or_else(|| "Seleccione un producto.".to_string())?;
    let reparto_id = parse_id(form.reparto_id.as_deref())
        .ok_or_else(|| "Seleccione un reparto.".to_string())?;
    let cantidad = form
        .cantidad
        .as_deref()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|cantidad| *cantidad > 0)
        .ok_or_else(|| "La cantidad debe ser mayor a cero.".to_string())?;
    let fecha_e = parse_date(form.fecha_e.as_deref())
        .ok_or_else(|| "Ingrese la fecha de elaboración.".to_string())?;
    let fecha_v = parse_date(form.fecha_v.as_deref())
        .ok_or_else(|| "Ingrese la fecha de vencimiento.".to_string())?;
    if fecha_v < fecha_e {
        return Err("La fecha de vencimiento no puede ser anterior a la de elaboración.".to_string());
    }
    Ok(NewExistencia {
        producto_id: ProductId::new(producto_id),
        reparto_id: RouteId::new(reparto_id),
        cantidad,
        fecha_e,
        fecha_v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> ExistenciaForm {
        ExistenciaForm {
            producto_id: Some("1".to_string()),
            reparto_id: Some("2".to_string()),
            cantidad: Some("24".to_string()),
            fecha_e: Some("2024-05-10".to_string()),
            fecha_v: Some("2024-05-14".to_string()),
        }
    }

    #[test]
    fn test_to_payload_valid() {
        let payload = to_payload(&valid_form()).expect("payload");
        assert_eq!(payload.cantidad, 24);
        assert_eq!(payload.producto_id, ProductId::new(1));
    }

    #[test]
    fn test_to_payload_rejects_zero_quantity() {
        let mut form = valid_form();
        form.cantidad = Some("0".to_string());
        assert!(to_payload(&form).is_err());
    }

    #[test]
    fn test_to_payload_rejects_inverted_dates() {
        let mut form = valid_form();
        form.fecha_v = Some("2024-05-01".to_string());
        let err = to_payload(&form).expect_err("inverted dates");
        assert!(err.contains("vencimiento"));
    }

    #[test]
    fn test_to_payload_requires_product() {
        let mut form = valid_form();
        form.producto_id = Some(String::new());
        assert!(to_payload(&form).is_err());
    }
}
