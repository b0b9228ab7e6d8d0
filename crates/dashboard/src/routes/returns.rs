//! Return (devolución) screens.
//!
//! Same line-item form as orders, plus a reason field and a single date.
//! The backend stores the date as a datetime, so the form's date is pinned
//! to noon UTC to stay on the same calendar day in nearby timezones.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{RawForm, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use espiga_core::line_items::LineItemEditor;
use espiga_core::pricing::{PriceLookup, PriceTier};
use espiga_core::types::{ClientId, ProductId, ReturnId, RouteId, format_currency};
use espiga_core::validate::validate_submission;

use crate::backend::types::{
    Cliente, Devolucion, DevolucionPatch, NewDevolucion, Producto, Reparto,
};
use crate::backend::ListQuery;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::routes::line_form::{
    FormValues, LineRowInput, LineView, build_editor, editor_to_lineas, line_views,
    requested_products, total_view,
};
use crate::routes::orders::{LineaRow, plan_line_ops};
use crate::state::AppState;

/// Query parameters for the listing.
#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub search: Option<String>,
    pub error: Option<String>,
}

/// One return row as the listing renders it.
pub struct DevolucionRow {
    pub id: i32,
    pub fecha: String,
    pub cliente: String,
    pub reparto: String,
    pub razon: String,
    pub total: String,
}

impl DevolucionRow {
    fn from_devolucion(devolucion: &Devolucion) -> Self {
        Self {
            id: devolucion.id.as_i32(),
            fecha: devolucion.fecha.date_naive().to_string(),
            cliente: devolucion
                .cliente
                .as_ref()
                .map_or_else(String::new, |cliente| cliente.nombre.clone()),
            reparto: devolucion
                .reparto
                .as_ref()
                .map_or_else(String::new, |reparto| reparto.nombre.clone()),
            razon: devolucion.razon.clone(),
            total: format_currency(devolucion.total),
        }
    }
}

/// Return listing template.
#[derive(Template, WebTemplate)]
#[template(path = "returns/index.html")]
pub struct ReturnsIndexTemplate {
    pub user: CurrentUser,
    pub devoluciones: Vec<DevolucionRow>,
    pub search: String,
    pub error: Option<String>,
}

/// Return detail template.
#[derive(Template, WebTemplate)]
#[template(path = "returns/show.html")]
pub struct ReturnShowTemplate {
    pub user: CurrentUser,
    pub devolucion: DevolucionRow,
    pub lineas: Vec<LineaRow>,
}

/// Return create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "returns/form.html")]
pub struct ReturnFormTemplate {
    pub user: CurrentUser,
    pub action: String,
    pub editing: bool,
    pub clientes: Vec<Cliente>,
    pub repartos: Vec<Reparto>,
    pub productos: Vec<Producto>,
    pub cliente_id: Option<i32>,
    pub reparto_id: Option<i32>,
    pub route_locked: bool,
    pub fecha: String,
    pub razon: String,
    pub tier: String,
    pub lineas: Vec<LineView>,
    pub total: String,
    pub errors: Vec<String>,
    pub banner: Option<String>,
}

impl ReturnFormTemplate {
    fn cliente_selected(&self, cliente: &Cliente) -> bool {
        self.cliente_id == Some(cliente.id.as_i32())
    }

    fn reparto_selected(&self, reparto: &Reparto) -> bool {
        self.reparto_id == Some(reparto.id.as_i32())
    }
}

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
        tracing::warn!("reference dropdown load failed for return form");
    }
    FormReferences {
        clientes: clientes.map(|c| (*c).clone()).unwrap_or_default(),
        repartos: repartos.map(|r| (*r).clone()).unwrap_or_default(),
        productos: productos.map(|p| (*p).clone()).unwrap_or_default(),
        banner: failed.then(|| "No se pudieron cargar los datos de referencia.".to_string()),
    }
}

struct ReturnHeader {
    cliente_id: Option<ClientId>,
    reparto_id: Option<RouteId>,
    fecha: Option<NaiveDate>,
    razon: String,
    tier: PriceTier,
    rows: Vec<LineRowInput>,
}

fn parse_header(form: &FormValues, user: &CurrentUser) -> ReturnHeader {
    let reparto_id = user.route_id.or_else(|| {
        form.value("reparto_id")
            .and_then(|raw| raw.parse::<i32>().ok())
            .map(RouteId::new)
    });
    ReturnHeader {
        cliente_id: form
            .value("cliente_id")
            .and_then(|raw| raw.parse::<i32>().ok())
            .map(ClientId::new),
        reparto_id,
        fecha: form
            .value("fecha")
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()),
        razon: form.value("razon").unwrap_or_default().trim().to_string(),
        tier: PriceTier::from_form_value(form.value("tipo_precio").unwrap_or("reventa")),
        rows: form.line_rows(),
    }
}

fn header_errors(header: &ReturnHeader) -> Vec<String> {
    let mut errors = Vec::new();
    if header.cliente_id.is_none() {
        errors.push("Seleccione un cliente.".to_string());
    }
    if header.reparto_id.is_none() {
        errors.push("Seleccione un reparto.".to_string());
    }
    if header.fecha.is_none() {
        errors.push("Ingrese la fecha.".to_string());
    }
    if header.razon.is_empty() {
        errors.push("Ingrese la razón de la devolución.".to_string());
    }
    errors
}

/// Midday UTC keeps the stored datetime on the chosen calendar day.
fn to_wire_fecha(fecha: NaiveDate) -> DateTime<Utc> {
    fecha
        .and_hms_opt(12, 0, 0)
        .map_or_else(Utc::now, |datetime| datetime.and_utc())
}

/// `GET /devoluciones` - return listing.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<IndexQuery>,
) -> Result<ReturnsIndexTemplate> {
    let search = query.search.unwrap_or_default();
    let list_query = ListQuery {
        search: (!search.is_empty()).then(|| search.clone()),
        page_size: Some(100),
        offset: None,
    };
    let devoluciones = state
        .backend()
        .list_devoluciones(&user.token, &list_query)
        .await?;
    Ok(ReturnsIndexTemplate {
        user,
        devoluciones: devoluciones
            .iter()
            .map(DevolucionRow::from_devolucion)
            .collect(),
        search,
        error: query.error,
    })
}

/// `GET /devoluciones/{id}` - return detail with lines.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<ReturnShowTemplate> {
    let devolucion = state
        .backend()
        .get_devolucion(&user.token, ReturnId::new(id))
        .await?;
    Ok(ReturnShowTemplate {
        user,
        devolucion: DevolucionRow::from_devolucion(&devolucion),
        lineas: devolucion.lineas.iter().map(LineaRow::from_linea).collect(),
    })
}

/// `GET /devoluciones/nuevo` - empty return form with one blank line.
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

    ReturnFormTemplate {
        route_locked: user.route_id.is_some(),
        reparto_id: user.route_id.map(RouteId::as_i32),
        user,
        action: "/devoluciones".to_string(),
        editing: false,
        clientes: references.clientes,
        repartos: references.repartos,
        productos: references.productos,
        cliente_id: None,
        fecha: chrono::Local::now().date_naive().to_string(),
        razon: String::new(),
        tier: "reventa".to_string(),
        lineas: line_views(&editor, &rows),
        total: total_view(&editor),
        errors: Vec::new(),
        banner: references.banner,
    }
}

#[allow(clippy::too_many_arguments)]
async fn rerender_form(
    state: &AppState,
    user: CurrentUser,
    action: String,
    editing: bool,
    header: &ReturnHeader,
    editor: &LineItemEditor,
    errors: Vec<String>,
    banner: Option<String>,
) -> Response {
    let references = load_references(state, &user).await;
    ReturnFormTemplate {
        route_locked: user.route_id.is_some(),
        user,
        action,
        editing,
        clientes: references.clientes,
        repartos: references.repartos,
        productos: references.productos,
        cliente_id: header.cliente_id.map(ClientId::as_i32),
        reparto_id: header.reparto_id.map(RouteId::as_i32),
        fecha: header.fecha.map_or_else(String::new, |fecha| fecha.to_string()),
        razon: header.razon.clone(),
        tier: header.tier.wire_name().to_string(),
        lineas: line_views(editor, &header.rows),
        total: total_view(editor),
        errors,
        banner: banner.or(references.banner),
    }
    .into_response()
}

async fn resolve_submission(
    state: &AppState,
    user: &CurrentUser,
    header: &ReturnHeader,
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

/// `POST /devoluciones` - validate and create a return.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    RawForm(body): RawForm,
) -> Response {
    let form = FormValues::parse(&body);
    let header = parse_header(&form, &user);
    let references = load_references(&state, &user).await;

    let fecha = header.fecha.unwrap_or_else(|| chrono::Local::now().date_naive());
    let editor = resolve_submission(&state, &user, &header, &references.productos, fecha).await;

    let mut errors = header_errors(&header);
    errors.extend(
        validate_submission(&editor, None)
            .iter()
            .map(ToString::to_string),
    );
    if !errors.is_empty() {
        return rerender_form(
            &state,
            user,
            "/devoluciones".to_string(),
            false,
            &header,
            &editor,
            errors,
            None,
        )
        .await;
    }

    let (Some(cliente_id), Some(reparto_id), Some(fecha)) =
        (header.cliente_id, header.reparto_id, header.fecha)
    else {
        return rerender_form(
            &state,
            user,
            "/devoluciones".to_string(),
            false,
            &header,
            &editor,
            vec!["Datos incompletos.".to_string()],
            None,
        )
        .await;
    };

    let devolucion = NewDevolucion {
        cliente_id,
        reparto_id,
        fecha: to_wire_fecha(fecha),
        razon: header.razon.clone(),
        total: editor.total(),
        lineas: editor_to_lineas(&editor),
    };

    match state.backend().create_devolucion(&user.token, &devolucion).await {
        Ok(_) => Redirect::to("/devoluciones").into_response(),
        Err(e) => {
            let message = e.user_message();
            rerender_form(
                &state,
                user,
                "/devoluciones".to_string(),
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

/// `GET /devoluciones/{id}/editar` - return form prefilled from the backend.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<ReturnFormTemplate> {
    let devolucion = state
        .backend()
        .get_devolucion(&user.token, ReturnId::new(id))
        .await?;
    let references = load_references(&state, &user).await;

    let mut editor = LineItemEditor::new();
    let mut rows = Vec::with_capacity(devolucion.lineas.len());
    for linea in &devolucion.lineas {
        let line_id = editor.add_line();
        editor.set_line_product(line_id, linea.producto_id, &linea.descripcion);
        editor.set_line_price(line_id, PriceLookup::Found(linea.precio_unitario));
        editor.set_line_quantity(line_id, &linea.cantidad.to_string());
        rows.push(LineRowInput {
            linea_id: linea.id,
            producto_id: Some(linea.producto_id),
            cantidad: linea.cantidad.to_string(),
        });
    }

    Ok(ReturnFormTemplate {
        route_locked: user.route_id.is_some(),
        user,
        action: format!("/devoluciones/{id}/editar"),
        editing: true,
        clientes: references.clientes,
        repartos: references.repartos,
        productos: references.productos,
        cliente_id: Some(devolucion.cliente_id.as_i32()),
        reparto_id: Some(devolucion.reparto_id.as_i32()),
        fecha: devolucion.fecha.date_naive().to_string(),
        razon: devolucion.razon.clone(),
        tier: "reventa".to_string(),
        lineas: line_views(&editor, &rows),
        total: total_view(&editor),
        errors: Vec::new(),
        banner: references.banner,
    })
}

/// `POST /devoluciones/{id}/editar` - validate and apply a return edit.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    RawForm(body): RawForm,
) -> Response {
    let return_id = ReturnId::new(id);
    let action = format!("/devoluciones/{id}/editar");

    let stored = match state.backend().get_devolucion(&user.token, return_id).await {
        Ok(devolucion) => devolucion,
        Err(e) => return crate::error::AppError::from(e).into_response(),
    };

    let form = FormValues::parse(&body);
    let header = parse_header(&form, &user);
    let references = load_references(&state, &user).await;

    let fecha = header.fecha.unwrap_or_else(|| stored.fecha.date_naive());
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

    let (Some(cliente_id), Some(reparto_id), Some(fecha)) =
        (header.cliente_id, header.reparto_id, header.fecha)
    else {
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

    let patch = DevolucionPatch {
        cliente_id,
        reparto_id,
        fecha: to_wire_fecha(fecha),
        razon: header.razon.clone(),
        total: editor.total(),
    };
    let ops = plan_line_ops(&stored.lineas, &editor, &header.rows);

    match state
        .backend()
        .update_devolucion(&user.token, return_id, &patch, ops)
        .await
    {
        Ok(()) => Redirect::to("/devoluciones").into_response(),
        Err(e) => {
            let message = e.user_message();
            rerender_form(&state, user, action, true, &header, &editor, Vec::new(), Some(message))
                .await
        }
    }
}

/// `POST /devoluciones/{id}/eliminar` - delete a return.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Response {
    match state
        .backend()
        .delete_devolucion(&user.token, ReturnId::new(id))
        .await
    {
        Ok(()) => Redirect::to("/devoluciones").into_response(),
        Err(e) => {
            let message = urlencoding::encode(&e.user_message()).into_owned();
            Redirect::to(&format!("/devoluciones?error={message}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_fecha_is_noon_utc() {
        let fecha = NaiveDate::from_ymd_opt(2024, 5, 10).expect("date");
        let wire = to_wire_fecha(fecha);
        assert_eq!(wire.to_rfc3339(), "2024-05-10T12:00:00+00:00");
    }

    #[test]
    fn test_header_requires_reason() {
        let form = FormValues::parse(b"cliente_id=1&reparto_id=2&fecha=2024-05-10&razon=");
        let user = CurrentUser {
            id: espiga_core::types::UserId::new(1),
            username: "maria".to_string(),
            role: espiga_core::types::Role::Admin,
            route_id: None,
            token: crate::backend::AuthToken::from("tok".to_string()),
        };
        let header = parse_header(&form, &user);
        let errors = header_errors(&header);
        assert!(errors.iter().any(|error| error.contains("razón")));
    }

    #[test]
    fn test_delivery_route_overrides_form_value() {
        let form = FormValues::parse(b"reparto_id=9");
        let user = CurrentUser {
            id: espiga_core::types::UserId::new(1),
            username: "raul".to_string(),
            role: espiga_core::types::Role::Delivery,
            route_id: Some(RouteId::new(2)),
            token: crate::backend::AuthToken::from("tok".to_string()),
        };
        let header = parse_header(&form, &user);
        assert_eq!(header.reparto_id, Some(RouteId::new(2)));
    }
}
