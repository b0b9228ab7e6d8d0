//! Delivery receipt (remito) screens. This is the landing page.
//!
//! The receipt form only offers products that are actually loaded on the
//! selected route: the route's stock lots are fetched, collapsed per product
//! and the requested quantities are validated against the totals. The
//! backend depletes the physical lots itself when the receipt is created.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{RawForm, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;

use espiga_core::line_items::LineItemEditor;
use espiga_core::pricing::PriceTier;
use espiga_core::stock::{AggregatedStock, aggregate_by_product};
use espiga_core::types::{ClientId, ProductId, ReceiptId, RouteId, format_currency};
use espiga_core::validate::validate_submission;

use crate::backend::types::{
    Cliente, NewLineaRemito, NewRemito, Producto, Remito, Reparto,
};
use crate::backend::{ExistenciaFilter, RemitoFilter};
use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::CurrentUser;
use crate::routes::line_form::{
    FormValues, LineRowInput, LineView, build_editor, line_views, requested_products, total_view,
};
use crate::state::AppState;

/// Query parameters for the listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub reparto_id: Option<String>,
    pub fecha: Option<String>,
    pub error: Option<String>,
}

/// Query parameters for the receipt form.
#[derive(Debug, Default, Deserialize)]
pub struct NewFormQuery {
    pub reparto_id: Option<String>,
}

/// One receipt row as the listing renders it.
pub struct RemitoRow {
    pub id: i32,
    pub fecha: String,
    pub cliente: String,
    pub reparto: String,
    pub total: String,
}

impl RemitoRow {
    fn from_remito(remito: &Remito) -> Self {
        Self {
            id: remito.id.as_i32(),
            fecha: remito.fecha.to_string(),
            cliente: remito
                .cliente
                .as_ref()
                .map_or_else(String::new, |cliente| cliente.nombre.clone()),
            reparto: remito
                .reparto
                .as_ref()
                .map_or_else(String::new, |reparto| reparto.nombre.clone()),
            total: format_currency(remito.total),
        }
    }
}

/// One receipt line as the detail page renders it.
pub struct RemitoLineaRow {
    pub descripcion: String,
    pub cantidad: u32,
    pub precio: String,
    pub subtotal: String,
}

/// A product option on the receipt form, with its available quantity.
pub struct ProductOption {
    pub id: i32,
    pub nombre: String,
    pub disponible: u64,
}

/// Receipt listing template.
#[derive(Template, WebTemplate)]
#[template(path = "receipts/index.html")]
pub struct ReceiptsIndexTemplate {
    pub user: CurrentUser,
    pub remitos: Vec<RemitoRow>,
    pub repartos: Vec<Reparto>,
    pub reparto_id: Option<i32>,
    pub fecha: String,
    pub error: Option<String>,
}

/// Receipt detail template.
#[derive(Template, WebTemplate)]
#[template(path = "receipts/show.html")]
pub struct ReceiptShowTemplate {
    pub user: CurrentUser,
    pub remito: RemitoRow,
    pub lineas: Vec<RemitoLineaRow>,
}

/// Receipt create form template.
#[derive(Template, WebTemplate)]
#[template(path = "receipts/form.html")]
pub struct ReceiptFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub clientes: Vec<Cliente>,
    pub repartos: Vec<Reparto>,
    pub productos: Vec<ProductOption>,
    pub cliente_id: Option<i32>,
    pub reparto_id: Option<i32>,
    pub route_locked: bool,
    pub fecha: String,
    pub tier: String,
    pub lineas: Vec<LineView>,
    pub total: String,
    pub errors: Vec<String>,
    pub banner: Option<String>,
}

impl ReceiptsIndexTemplate {
    fn reparto_selected(&self, reparto: &Reparto) -> bool {
        self.reparto_id == Some(reparto.id.as_i32())
    }
}

impl ReceiptFormTemplate {
    fn cliente_selected(&self, cliente: &Cliente) -> bool {
        self.cliente_id == Some(cliente.id.as_i32())
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

struct FormReferences {
    clientes: Vec<Cliente>,
    repartos: Vec<Reparto>,
    banner: Option<String>,
}

async fn load_references(state: &AppState, user: &CurrentUser) -> FormReferences {
    let clientes = state.backend().reference_clientes(&user.token).await;
    let repartos = state.backend().reference_repartos(&user.token).await;

    let failed = clientes.is_err() || repartos.is_err();
    if failed {
        tracing::warn!("reference dropdown load failed for receipt form");
    }
    FormReferences {
        clientes: clientes.map(|c| (*c).clone()).unwrap_or_default(),
        repartos: repartos.map(|r| (*r).clone()).unwrap_or_default(),
        banner: failed.then(|| "No se pudieron cargar los datos de referencia.".to_string()),
    }
}

/// Fetch and collapse the route's stock, degrading to empty on failure.
async fn load_stock(
    state: &AppState,
    user: &CurrentUser,
    reparto_id: Option<RouteId>,
) -> (HashMap<ProductId, AggregatedStock>, Option<String>) {
    let Some(reparto_id) = reparto_id else {
        return (HashMap::new(), None);
    };
    let filter = ExistenciaFilter {
        producto_id: None,
        reparto_id: Some(reparto_id),
        fecha_e: None,
        fecha_v: None,
        page_size: Some(1000),
    };
    match state.backend().list_existencias(&user.token, &filter).await {
        Ok(existencias) => {
            let lots: Vec<_> = existencias
                .iter()
                .map(crate::backend::types::Existencia::to_stock_lot)
                .collect();
            (aggregate_by_product(&lots), None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "stock load failed for receipt form");
            (
                HashMap::new(),
                Some("No se pudieron cargar las existencias del reparto.".to_string()),
            )
        }
    }
}

/// Dropdown options from aggregated stock, sorted by product name.
fn product_options(stock: &HashMap<ProductId, AggregatedStock>) -> Vec<ProductOption> {
    let mut options: Vec<ProductOption> = stock
        .values()
        .map(|entry| ProductOption {
            id: entry.product.as_i32(),
            nombre: entry.name.clone(),
            disponible: entry.total_quantity,
        })
        .collect();
    options.sort_by(|a, b| a.nombre.cmp(&b.nombre));
    options
}

/// Catalog slice matching the route's stock, for editor construction.
fn stock_catalog(stock: &HashMap<ProductId, AggregatedStock>) -> Vec<Producto> {
    stock
        .values()
        .map(|entry| Producto {
            id: entry.product,
            nombre: entry.name.clone(),
            peso: None,
        })
        .collect()
}

struct ReceiptHeader {
    cliente_id: Option<ClientId>,
    reparto_id: Option<RouteId>,
    fecha: Option<NaiveDate>,
    tier: PriceTier,
    rows: Vec<LineRowInput>,
}

fn parse_header(form: &FormValues, user: &CurrentUser) -> ReceiptHeader {
    let reparto_id = user
        .route_id
        .or_else(|| parse_id(form.value("reparto_id")).map(RouteId::new));
    ReceiptHeader {
        cliente_id: parse_id(form.value("cliente_id")).map(ClientId::new),
        reparto_id,
        fecha: parse_date(form.value("fecha")),
        tier: PriceTier::from_form_value(form.value("tipo_precio").unwrap_or("reventa")),
        rows: form.line_rows(),
    }
}

fn header_errors(header: &ReceiptHeader) -> Vec<String> {
    let mut errors = Vec::new();
    if header.reparto_id.is_none() {
        errors.push("Seleccione un reparto.".to_string());
    }
    if header.fecha.is_none() {
        errors.push("Ingrese la fecha.".to_string());
    }
    errors
}

fn editor_to_lineas_remito(editor: &LineItemEditor) -> Vec<NewLineaRemito> {
    editor
        .lines()
        .iter()
        .filter_map(|line| {
            line.product().map(|producto_id| NewLineaRemito {
                producto_id,
                cantidad: line.quantity(),
                precio_unitario: line.unit_price(),
                subtotal: line.subtotal(),
            })
        })
        .collect()
}

/// `GET /` - receipt listing with route and date filters.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<IndexQuery>,
) -> Result<ReceiptsIndexTemplate> {
    // Delivery users only ever see their own route's receipts
    let reparto_id = user
        .route_id
        .or_else(|| parse_id(query.reparto_id.as_deref()).map(RouteId::new));
    let fecha = parse_date(query.fecha.as_deref());
    let filter = RemitoFilter {
        reparto_id,
        fecha,
        page_size: Some(100),
    };
    let remitos = state.backend().list_remitos(&user.token, &filter).await?;

    let repartos = match state.backend().reference_repartos(&user.token).await {
        Ok(repartos) => (*repartos).clone(),
        Err(e) => {
            tracing::warn!(error = %e, "route dropdown load failed for receipt listing");
            Vec::new()
        }
    };

    Ok(ReceiptsIndexTemplate {
        user,
        remitos: remitos.iter().map(RemitoRow::from_remito).collect(),
        repartos,
        reparto_id: reparto_id.map(RouteId::as_i32),
        fecha: query.fecha.unwrap_or_default(),
        error: query.error,
    })
}

/// `GET /remitos/{id}` - receipt detail with lines.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<ReceiptShowTemplate> {
    let remito = state.backend().get_remito(&user.token, ReceiptId::new(id)).await?;
    let lineas = remito
        .lineas
        .iter()
        .map(|linea| RemitoLineaRow {
            descripcion: linea
                .producto
                .as_ref()
                .map_or_else(String::new, |producto| producto.nombre.clone()),
            cantidad: linea.cantidad,
            precio: linea
                .precio_unitario
                .map_or_else(String::new, format_currency),
            subtotal: format_currency(linea.subtotal),
        })
        .collect();
    Ok(ReceiptShowTemplate {
        user,
        remito: RemitoRow::from_remito(&remito),
        lineas,
    })
}

/// `GET /remitos/nuevo` - receipt form scoped to one route's stock.
///
/// Admins pick the route via `?reparto_id=` and the form reloads with that
/// route's products; delivery users land directly on their own route.
pub async fn new_form(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<NewFormQuery>,
) -> impl IntoResponse {
    let reparto_id = user
        .route_id
        .or_else(|| parse_id(query.reparto_id.as_deref()).map(RouteId::new));

    let references = load_references(&state, &user).await;
    let (stock, stock_banner) = load_stock(&state, &user, reparto_id).await;

    let mut editor = LineItemEditor::new();
    editor.add_line();
    let rows = vec![LineRowInput {
        linea_id: None,
        producto_id: None,
        cantidad: String::new(),
    }];

    ReceiptFormTemplate {
        route_locked: user.route_id.is_some(),
        reparto_id: reparto_id.map(RouteId::as_i32),
        user,
        action: "/remitos".to_string(),
        clientes: references.clientes,
        repartos: references.repartos,
        productos: product_options(&stock),
        cliente_id: None,
        fecha: chrono::Local::now().date_naive().to_string(),
        tier: "reventa".to_string(),
        lineas: line_views(&editor, &rows),
        total: total_view(&editor),
        errors: Vec::new(),
        banner: stock_banner.or(references.banner),
    }
}

async fn rerender_form(
    state: &AppState,
    user: CurrentUser,
    header: &ReceiptHeader,
    stock: &HashMap<ProductId, AggregatedStock>,
    editor: &LineItemEditor,
    errors: Vec<String>,
    banner: Option<String>,
) -> Response {
    let references = load_references(state, &user).await;
    ReceiptFormTemplate {
        route_locked: user.route_id.is_some(),
        user,
        action: "/remitos".to_string(),
        clientes: references.clientes,
        repartos: references.repartos,
        productos: product_options(stock),
        cliente_id: header.cliente_id.map(ClientId::as_i32),
        reparto_id: header.reparto_id.map(RouteId::as_i32),
        fecha: header.fecha.map_or_else(String::new, |fecha| fecha.to_string()),
        tier: header.tier.wire_name().to_string(),
        lineas: line_views(editor, &header.rows),
        total: total_view(editor),
        errors,
        banner: banner.or(references.banner),
    }
    .into_response()
}

/// `POST /remitos` - validate against the route's stock and create.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    RawForm(body): RawForm,
) -> Response {
    let form = FormValues::parse(&body);
    let header = parse_header(&form, &user);

    let (stock, stock_banner) = load_stock(&state, &user, header.reparto_id).await;
    let catalog = stock_catalog(&stock);

    let fecha = header.fecha.unwrap_or_else(|| chrono::Local::now().date_naive());
    let requested = requested_products(&header.rows);
    let prices = state
        .backend()
        .resolve_prices(&user.token, &requested, fecha, header.tier)
        .await;
    let editor = build_editor(&header.rows, &catalog, &prices);

    let mut errors = header_errors(&header);
    errors.extend(
        validate_submission(&editor, Some(&stock))
            .iter()
            .map(ToString::to_string),
    );
    if !errors.is_empty() {
        return rerender_form(&state, user, &header, &stock, &editor, errors, stock_banner).await;
    }

    let (Some(reparto_id), Some(fecha)) = (header.reparto_id, header.fecha) else {
        return rerender_form(
            &state,
            user,
            &header,
            &stock,
            &editor,
            vec!["Datos incompletos.".to_string()],
            None,
        )
        .await;
    };

    let remito = NewRemito {
        cliente_id: header.cliente_id,
        reparto_id,
        fecha,
        total: editor.total(),
        lineas: editor_to_lineas_remito(&editor),
    };

    match state.backend().create_remito(&user.token, &remito).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => {
            let message = e.user_message();
            rerender_form(&state, user, &header, &stock, &editor, Vec::new(), Some(message)).await
        }
    }
}

/// `POST /remitos/{id}/eliminar` - delete a receipt. Stock is not restored.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i32>,
) -> Response {
    match state.backend().delete_remito(&user.token, ReceiptId::new(id)).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/?error={message}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espiga_core::pricing::PriceLookup;
    use espiga_core::types::Role;
    use rust_decimal_macros::dec;

    fn stock_with(entries: &[(i32, &str, u64)]) -> HashMap<ProductId, AggregatedStock> {
        entries
            .iter()
            .map(|(id, name, quantity)| {
                (
                    ProductId::new(*id),
                    AggregatedStock {
                        product: ProductId::new(*id),
                        name: (*name).to_string(),
                        total_quantity: *quantity,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_product_options_sorted_by_name() {
        let stock = stock_with(&[(2, "Facturas", 5), (1, "Criollos", 12)]);
        let options = product_options(&stock);
        assert_eq!(options[0].nombre, "Criollos");
        assert_eq!(options[0].disponible, 12);
        assert_eq!(options[1].nombre, "Facturas");
    }

    #[test]
    fn test_submission_rejected_when_stock_exceeded() {
        let stock = stock_with(&[(1, "Criollos", 3)]);
        let catalog = stock_catalog(&stock);
        let rows = vec![LineRowInput {
            linea_id: None,
            producto_id: Some(ProductId::new(1)),
            cantidad: "5".to_string(),
        }];
        let prices = HashMap::from([(ProductId::new(1), PriceLookup::Found(dec!(10)))]);
        let editor = build_editor(&rows, &catalog, &prices);

        let errors = validate_submission(&editor, Some(&stock));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Criollos"));
    }

    #[test]
    fn test_delivery_user_route_wins_over_form() {
        let form = FormValues::parse(b"reparto_id=7&fecha=2024-05-10");
        let user = CurrentUser {
            id: espiga_core::types::UserId::new(4),
            username: "raul".to_string(),
            role: Role::Delivery,
            route_id: Some(RouteId::new(2)),
            token: crate::backend::AuthToken::from("tok".to_string()),
        };
        let header = parse_header(&form, &user);
        assert_eq!(header.reparto_id, Some(RouteId::new(2)));
    }

    #[test]
    fn test_editor_to_lineas_remito_carries_prices() {
        let stock = stock_with(&[(1, "Criollos", 30)]);
        let catalog = stock_catalog(&stock);
        let rows = vec![LineRowInput {
            linea_id: None,
            producto_id: Some(ProductId::new(1)),
            cantidad: "12".to_string(),
        }];
        let prices = HashMap::from([(ProductId::new(1), PriceLookup::Found(dec!(7.5)))]);
        let editor = build_editor(&rows, &catalog, &prices);

        let lineas = editor_to_lineas_remito(&editor);
        assert_eq!(lineas.len(), 1);
        assert_eq!(lineas[0].cantidad, 12);
        assert_eq!(lineas[0].subtotal, dec!(90.0));
    }
}
