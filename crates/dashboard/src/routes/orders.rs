//! Order (pedido) screens.
//!
//! Creation writes the whole document in one request. Editing patches the
//! header and then applies a per-line plan (create/update/delete against
//! `/lineas-pedido`), compensated by the backend client on failure. Prices
//! are always re-resolved server-side at submit time; whatever the browser
//! showed while editing is advisory only.

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
use espiga_core::types::{ClientId, OrderId, ProductId, RouteId, format_currency};
use espiga_core::validate::validate_submission;

use crate::backend::types::{Cliente, Linea, NewLinea, NewPedido, Pedido, PedidoPatch, Producto, Reparto};
use crate::backend::{LineOp, ListQuery};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::routes::line_form::{
    FormValues, LineRowInput, LineView, build_editor, editor_to_lineas, line_views,
    requested_products, total_view,
};
use crate::state::AppState;

/// Query parameters for the listing.
#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub search: Option<String>,
    pub error: Option<String>,
}

/// One order row as the listing renders it.
pub struct PedidoRow {
    pub id: i32,
    pub fecha_emision: String,
    pub fecha_entrega: String,
    pub cliente: String,
    pub reparto: String,
    pub total: String,
    pub estado: String,
}

impl PedidoRow {
    fn from_pedido(pedido: &Pedido) -> Self {
        Self {
            id: pedido.id.as_i32(),
            fecha_emision: pedido.fecha_emision.to_string(),
            fecha_entrega: pedido.fecha_entrega.to_string(),
            cliente: pedido
                .cliente
                .as_ref()
                .map_or_else(String::new, |cliente| cliente.nombre.clone()),
            reparto: pedido
                .reparto
                .as_ref()
                .map_or_else(String::new, |reparto| reparto.nombre.clone()),
            total: format_currency(pedido.total),
            estado: pedido.estado.clone(),
        }
    }
}

/// One document line as the detail page renders it.
pub struct LineaRow {
    pub descripcion: String,
    pub cantidad: u32,
    pub precio: String,
    pub subtotal: String,
}

impl LineaRow {
    pub(crate) fn from_linea(linea: &Linea) -> Self {
        Self {
            descripcion: linea.descripcion.clone(),
            cantidad: linea.cantidad,
            precio: format_currency(linea.precio_unitario),
            subtotal: format_currency(linea.subtotal),
        }
    }
}

/// Order listing template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub user: CurrentUser,
    pub pedidos: Vec<PedidoRow>,
    pub search: String,
    pub error: Option<String>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub user: CurrentUser,
    pub pedido: PedidoRow,
    pub lineas: Vec<LineaRow>,
}

/// Order create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/form.html")]
pub struct OrderFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub editing: bool,
    pub clientes: Vec<Cliente>,
    pub repartos: Vec<Reparto>,
    pub productos: Vec<Producto>,
    pub cliente_id: Option<i32>,
    pub reparto_id: Option<i32>,
    pub route_locked: bool,
    pub fecha_emision: String,
    pub fecha_entrega: String,
    pub tier: String,
    pub lineas: Vec<LineView>,
    pub total: String,
    pub errors: Vec<String>,
    pub banner: Option<String>,
}

impl OrderFormTemplate {
    fn cliente_selected(&self, cliente: &Cliente) -> bool {
        self.cliente_id == Some(cliente.id.as_i32())
    }

    fn reparto_selected(&self, reparto: &Reparto) -> bool {
        self.reparto_id == Some(reparto.id.as_i32())
    }
}

/// Everything the form screens need from the backend.
struct FormReferences {
    clientes: Vec<Cliente>,
    repartos: Vec<Reparto>,
    productos: Vec<Producto>,
    banner: Option<String>,
}

async fn load_references(state: &AppState, user: &CurrentUser) -> FormReferences {
    let clientes = state.backend().reference_clientes(&user.token).await;
    let repartos = state.backend().reference_repartos(&user.token).await;
    let productos = state.backend().reference_productos(&user.token).await;

    let failed = clientes.is_err() || repartos.is_err() || productos.is_err();
    if failed {
        tracing::warn!("reference dropdown load failed for order form");
    }
    FormReferences {
        clientes: clientes.map(|c| (*c).clone()).unwrap_or_default(),
        repartos: repartos.map(|r| (*r).clone()).unwrap_or_default(),
        productos: productos.map(|p| (*p).clone()).unwrap_or_default(),
        banner: failed.then(|| "No se pudieron cargar los datos de referencia.".to_string()),
    }
}

/// Submitted header fields, before validation.
struct OrderHeader {
    cliente_id: Option<ClientId>,
    reparto_id: Option<RouteId>,
    fecha_emision: Option<NaiveDate>,
    fecha_entrega: Option<NaiveDate>,
    tier: PriceTier,
    rows: Vec<LineRowInput>,
}

fn parse_header(form: &FormValues, user: &CurrentUser) -> OrderHeader {
    // Delivery users cannot pick a route; theirs applies regardless of input
    let reparto_id = user.route_id.or_else(|| {
        form.value("reparto_id")
            .and_then(|raw| raw.parse::<i32>().ok())
            .map(RouteId::new)
    });
    OrderHeader {
        cliente_id: form
            .value("cliente_id")
            .and_then(|raw| raw.parse::<i32>().ok())
            .map(ClientId::new),
        reparto_id,
        fecha_emision: form
            .value("fecha_emision")
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()),
        fecha_entrega: form
            .value("fecha_entrega")
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()),
        tier: PriceTier::from_form_value(form.value("tipo_precio").unwrap_or("reventa")),
        rows: form.line_rows(),
    }
}

/// Header-level problems, in the same banner list as line validation.
fn header_errors(header: &OrderHeader) -> Vec<String> {
    let mut errors = Vec::new();
    if header.cliente_id.is_none() {
        errors.push("Seleccione un cliente.".to_string());
    }
    if header.reparto_id.is_none() {
        errors.push("Seleccione un reparto.".to_string());
    }
    if header.fecha_emision.is_none() {
        errors.push("Ingrese la fecha de emisión.".to_string());
    }
    if header.fecha_entrega.is_none() {
        errors.push("Ingrese la fecha de entrega.".to_string());
    }
    errors
}

/// `GET /pedidos` - order listing.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<IndexQuery>,
) -> Result<OrdersIndexTemplate> {
    let search = query.search.unwrap_or_default();
    let list_query = ListQuery {
        search: (!search.is_empty()).then(|| search.clone()),
        page_size: Some(100),
        offset: None,
    };
    let pedidos = state.backend().list_pedidos(&user.token, &list_query).await?;
    Ok(OrdersIndexTemplate {
        user,
        pedidos: pedidos.iter().map(PedidoRow::from_pedido).collect(),
        search,
        error: query.error,
    })
}

/// `GET /pedidos/{id}` - order detail with lines.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<OrderShowTemplate> {
    let pedido = state.backend().get_pedido(&user.token, OrderId::new(id)).await?;
    Ok(OrderShowTemplate {
        user,
        pedido: PedidoRow::from_pedido(&pedido),
        lineas: pedido.lineas.iter().map(LineaRow::from_linea).collect(),
    })
}

/// `GET /pedidos/nuevo` - empty order form with one blank line.
pub async fn new_form(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    let references = load_references(&state, &user).await;
    let mut editor = LineItemEditor::new();
    editor.add_line();
    let rows = vec![LineRowInput {
        linea_id: None,
        producto_id: None,
        cantidad: String::new(),
    }];
    let today = chrono::Local::now().date_naive();

    OrderFormTemplate {
        route_locked: user.route_id.is_some(),
        reparto_id: user.route_id.map(RouteId::as_i32),
        user,
        action: "/pedidos".to_string(),
        editing: false,
        clientes: references.clientes,
        repartos: references.repartos,
        productos: references.productos,
        cliente_id: None,
        fecha_emision: today.to_string(),
        fecha_entrega: today.to_string(),
        tier: "reventa".to_string(),
        lineas: line_views(&editor, &rows),
        total: total_view(&editor),
        errors: Vec::new(),
        banner: references.banner,
    }
}

/// Re-render the form with the submitted values and problems.
#[allow(clippy::too_many_arguments)]
async fn rerender_form(
    state: &AppState,
    user: CurrentUser,
    action: String,
    editing: bool,
    header: &OrderHeader,
    editor: &LineItemEditor,
    errors: Vec<String>,
    banner: Option<String>,
) -> Response {
    let references = load_references(state, &user).await;
    OrderFormTemplate {
        route_locked: user.route_id.is_some(),
        user,
        action,
        editing,
        clientes: references.clientes,
        repartos: references.repartos,
        productos: references.productos,
        cliente_id: header.cliente_id.map(ClientId::as_i32),
        reparto_id: header.reparto_id.map(RouteId::as_i32),
        fecha_emision: header
            .fecha_emision
            .map_or_else(String::new, |fecha| fecha.to_string()),
        fecha_entrega: header
            .fecha_entrega
            .map_or_else(String::new, |fecha| fecha.to_string()),
        tier: header.tier.wire_name().to_string(),
        lineas: line_views(editor, &header.rows),
        total: total_view(editor),
        errors,
        banner: banner.or(references.banner),
    }
    .into_response()
}

/// Resolve prices and build the editor for a submission.
async fn resolve_submission(
    state: &AppState,
    user: &CurrentUser,
    header: &OrderHeader,
    productos: &[Producto],
    fecha: NaiveDate,
) -> LineItemEditor {
    let requested = requested_products(&header.rows);
    let prices = state
        .backend()
        .resolve_prices(&user.token, &requested, fecha, header.tier)
        .await;
    build_editor(&header.rows, productos, &prices)
}

/// `POST /pedidos` - validate and create an order.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    RawForm(body): RawForm,
) -> Response {
    let form = FormValues::parse(&body);
    let header = parse_header(&form, &user);
    let references = load_references(&state, &user).await;

    let fecha = header
        .fecha_emision
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let editor = resolve_submission(&state, &user, &header, &references.productos, fecha).await;

    let mut errors = header_errors(&header);
    errors.extend(
        validate_submission(&editor, None)
            .iter()
            .map(ToString::to_string),
    );
    if !errors.is_empty() {
        return rerender_form(&state, user, "/pedidos".to_string(), false, &header, &editor, errors, None)
            .await;
    }

    // Checked non-empty by header_errors/validate_submission above
    let (Some(cliente_id), Some(reparto_id), Some(fecha_emision), Some(fecha_entrega)) = (
        header.cliente_id,
        header.reparto_id,
        header.fecha_emision,
        header.fecha_entrega,
    ) else {
        return rerender_form(
            &state,
            user,
            "/pedidos".to_string(),
            false,
            &header,
            &editor,
            vec!["Datos incompletos.".to_string()],
            None,
        )
        .await;
    };

    let pedido = NewPedido {
        cliente_id,
        reparto_id,
        fecha_emision,
        fecha_entrega,
        estado: "Pendiente".to_string(),
        total: editor.total(),
        lineas: editor_to_lineas(&editor),
    };

    match state.backend().create_pedido(&user.token, &pedido).await {
        Ok(_) => Redirect::to("/pedidos").into_response(),
        Err(e) => {
            let message = e.user_message();
            rerender_form(
                &state,
                user,
                "/pedidos".to_string(),
                false,
                &header,
                &editor,
                Vec::new(),
                Some(message),
            )
            .await
        }
    }
}

/// `GET /pedidos/{id}/editar` - order form prefilled from the backend.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<OrderFormTemplate> {
    let pedido = state.backend().get_pedido(&user.token, OrderId::new(id)).await?;
    let references = load_references(&state, &user).await;

    // Rebuild the editor from the stored lines with their stored prices
    let mut editor = LineItemEditor::new();
    let mut rows = Vec::with_capacity(pedido.lineas.len());
    for linea in &pedido.lineas {
        let line_id = editor.add_line();
        editor.set_line_product(line_id, linea.producto_id, &linea.descripcion);
        editor.set_line_price(
            line_id,
            espiga_core::pricing::PriceLookup::Found(linea.precio_unitario),
        );
        editor.set_line_quantity(line_id, &linea.cantidad.to_string());
        rows.push(LineRowInput {
            linea_id: linea.id,
            producto_id: Some(linea.producto_id),
            cantidad: linea.cantidad.to_string(),
        });
    }

    Ok(OrderFormTemplate {
        route_locked: user.route_id.is_some(),
        user,
        action: format!("/pedidos/{id}/editar"),
        editing: true,
        clientes: references.clientes,
        repartos: references.repartos,
        productos: references.productos,
        cliente_id: Some(pedido.cliente_id.as_i32()),
        reparto_id: Some(pedido.reparto_id.as_i32()),
        fecha_emision: pedido.fecha_emision.to_string(),
        fecha_entrega: pedido.fecha_entrega.to_string(),
        tier: "reventa".to_string(),
        lineas: line_views(&editor, &rows),
        total: total_view(&editor),
        errors: Vec::new(),
        banner: references.banner,
    })
}

/// Diff stored lines against the submitted draft into a line plan.
///
/// Rows carrying a `linea_id` update their stored line; stored lines absent
/// from the submission are deleted; rows without a `linea_id` are created.
pub(crate) fn plan_line_ops(stored: &[Linea], editor: &LineItemEditor, rows: &[LineRowInput]) -> Vec<LineOp> {
    let submitted: Vec<(Option<i32>, NewLinea)> = editor
        .lines()
        .iter()
        .zip(rows.iter())
        .filter_map(|(line, row)| {
            line.product().map(|producto_id| {
                (
                    row.linea_id,
                    NewLinea {
                        producto_id,
                        cantidad: line.quantity(),
                        precio_unitario: line.unit_price(),
                        subtotal: line.subtotal(),
                        descripcion: line.description().to_owned(),
                    },
                )
            })
        })
        .collect();

    let previous: HashMap<i32, NewLinea> = stored
        .iter()
        .filter_map(|linea| {
            linea.id.map(|id| {
                (
                    id,
                    NewLinea {
                        producto_id: linea.producto_id,
                        cantidad: linea.cantidad,
                        precio_unitario: linea.precio_unitario,
                        subtotal: linea.subtotal,
                        descripcion: linea.descripcion.clone(),
                    },
                )
            })
        })
        .collect();

    let mut ops = Vec::new();
    let mut kept: Vec<i32> = Vec::new();

    for (linea_id, nueva) in submitted {
        match linea_id.and_then(|id| previous.get(&id).map(|prev| (id, prev))) {
            Some((id, prev)) => {
                kept.push(id);
                if *prev != nueva {
                    ops.push(LineOp::Update {
                        id,
                        linea: nueva,
                        previous: prev.clone(),
                    });
                }
            }
            None => ops.push(LineOp::Create(nueva)),
        }
    }

    for (id, prev) in &previous {
        if !kept.contains(id) {
            ops.push(LineOp::Delete {
                id: *id,
                previous: prev.clone(),
            });
        }
    }

    ops
}

/// `POST /pedidos/{id}/editar` - validate and apply an order edit.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    RawForm(body): RawForm,
) -> Response {
    let order_id = OrderId::new(id);
    let action = format!("/pedidos/{id}/editar");

    let stored = match state.backend().get_pedido(&user.token, order_id).await {
        Ok(pedido) => pedido,
        Err(e) => return crate::error::AppError::from(e).into_response(),
    };

    let form = FormValues::parse(&body);
    let header = parse_header(&form, &user);
    let references = load_references(&state, &user).await;

    let fecha = header.fecha_emision.unwrap_or(stored.fecha_emision);
    let editor = resolve_submission(&state, &user, &header, &references.productos, fecha).await;

    let mut errors = header_errors(&header);
    errors.extend(
        validate_submission(&editor, None)
            .iter()
            .map(ToString::to_string),
    );
    if !errors.is_empty() {
        return rerender_form(&state, user, action, true, &header, &editor, errors, None).await;
    }

    let (Some(cliente_id), Some(reparto_id), Some(fecha_emision), Some(fecha_entrega)) = (
        header.cliente_id,
        header.reparto_id,
        header.fecha_emision,
        header.fecha_entrega,
    ) else {
        return rerender_form(
            &state,
            user,
            action,
            true,
            &header,
            &editor,
            vec!["Datos incompletos.".to_string()],
            None,
        )
        .await;
    };

    let patch = PedidoPatch {
        cliente_id,
        reparto_id,
        fecha_emision,
        fecha_entrega,
        total: editor.total(),
    };
    let ops = plan_line_ops(&stored.lineas, &editor, &header.rows);

    match state
        .backend()
        .update_pedido(&user.token, order_id, &patch, ops)
        .await
    {
        Ok(()) => Redirect::to("/pedidos").into_response(),
        Err(e) => {
            let message = e.user_message();
            rerender_form(&state, user, action, true, &header, &editor, Vec::new(), Some(message))
                .await
        }
    }
}

/// `POST /pedidos/{id}/eliminar` - delete an order.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Response {
    match state.backend().delete_pedido(&user.token, OrderId::new(id)).await {
        Ok(()) => Redirect::to("/pedidos").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/pedidos?error={message}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espiga_core::pricing::PriceLookup;
    use rust_decimal_macros::dec;

    fn stored_linea(id: i32, producto: i32, cantidad: u32, precio: rust_decimal::Decimal) -> Linea {
        Linea {
            id: Some(id),
            producto_id: ProductId::new(producto),
            cantidad,
            precio_unitario: precio,
            subtotal: rust_decimal::Decimal::from(cantidad) * precio,
            descripcion: format!("Producto {producto}"),
        }
    }

    fn editor_with(rows: &[(Option<i32>, i32, u32, rust_decimal::Decimal)]) -> (LineItemEditor, Vec<LineRowInput>) {
        let mut editor = LineItemEditor::new();
        let mut inputs = Vec::new();
        for (linea_id, producto, cantidad, precio) in rows {
            let id = editor.add_line();
            editor.set_line_product(id, ProductId::new(*producto), &format!("Producto {producto}"));
            editor.set_line_price(id, PriceLookup::Found(*precio));
            editor.set_line_quantity(id, &cantidad.to_string());
            inputs.push(LineRowInput {
                linea_id: *linea_id,
                producto_id: Some(ProductId::new(*producto)),
                cantidad: cantidad.to_string(),
            });
        }
        (editor, inputs)
    }

    #[test]
    fn test_plan_unchanged_line_produces_no_op() {
        let stored = vec![stored_linea(10, 1, 3, dec!(5))];
        let (editor, rows) = editor_with(&[(Some(10), 1, 3, dec!(5))]);
        let ops = plan_line_ops(&stored, &editor, &rows);
        assert!(ops.is_empty());
    }

    #[test]
    fn test_plan_detects_update_create_delete() {
        let stored = vec![
            stored_linea(10, 1, 3, dec!(5)),
            stored_linea(11, 2, 1, dec!(8)),
        ];
        // Line 10 edited, line 11 dropped, one new line added
        let (editor, rows) = editor_with(&[(Some(10), 1, 5, dec!(5)), (None, 3, 2, dec!(4))]);
        let ops = plan_line_ops(&stored, &editor, &rows);

        assert_eq!(ops.len(), 3);
        assert!(ops.iter().any(|op| matches!(op, LineOp::Update { id: 10, .. })));
        assert!(ops.iter().any(|op| matches!(op, LineOp::Create(linea) if linea.producto_id == ProductId::new(3))));
        assert!(ops.iter().any(|op| matches!(op, LineOp::Delete { id: 11, .. })));
    }

    #[test]
    fn test_plan_update_carries_previous_for_rollback() {
        let stored = vec![stored_linea(10, 1, 3, dec!(5))];
        let (editor, rows) = editor_with(&[(Some(10), 1, 7, dec!(5))]);
        let ops = plan_line_ops(&stored, &editor, &rows);
        match ops.first() {
            Some(LineOp::Update { previous, linea, .. }) => {
                assert_eq!(previous.cantidad, 3);
                assert_eq!(linea.cantidad, 7);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_row_with_unknown_linea_id_becomes_create() {
        // Stale edit form referencing a line deleted elsewhere
        let stored = vec![];
        let (editor, rows) = editor_with(&[(Some(99), 1, 2, dec!(5))]);
        let ops = plan_line_ops(&stored, &editor, &rows);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops.first(), Some(LineOp::Create(_))));
    }
}
