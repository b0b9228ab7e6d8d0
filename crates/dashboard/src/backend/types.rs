//! Wire types for the bakery REST backend.
//!
//! Field names mirror the backend's JSON exactly (Spanish, camelCase, with
//! capitalized keys for included associations). Inconsistent casings the
//! backend emits for nested objects are absorbed here with serde aliases so
//! the rest of the dashboard never sees them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use espiga_core::stock::StockLot;
use espiga_core::types::{
    CityId, ClientId, LotId, OrderId, ProductId, ReceiptId, ReturnId, Role, RouteId, UserId,
};

/// Response envelope the backend uses inconsistently.
///
/// List endpoints answer either a bare value or `{"data": <value>}`
/// depending on the route. Decoded exactly once, here at the boundary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope<T> {
    /// `{"data": <value>}` shape.
    Wrapped {
        /// The payload.
        data: T,
    },
    /// The value with no wrapper.
    Bare(T),
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload regardless of shape.
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

/// Login request body for `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    /// Account name.
    pub username: &'a str,
    /// Plain-text password; the backend does the hashing.
    pub password: &'a str,
}

/// Successful login response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The authenticated account.
    pub usuario: Usuario,
}

/// Backend user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usuario {
    pub id: UserId,
    pub username: String,
    pub rol: Role,
    /// Route a delivery user is bound to; absent for administrators.
    #[serde(default)]
    pub reparto_id: Option<RouteId>,
}

// =============================================================================
// Reference entities
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Producto {
    pub id: ProductId,
    pub nombre: String,
    /// Unit weight in grams, when the product is sold by weight.
    #[serde(default)]
    pub peso: Option<Decimal>,
}

/// Create/update payload for a product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProducto {
    pub nombre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peso: Option<Decimal>,
}

/// A city clients belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ciudad {
    pub id: CityId,
    pub nombre: String,
}

/// Create/update payload for a city.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCiudad {
    pub nombre: String,
}

/// A client (shop or end consumer) documents are issued to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cliente {
    pub id: ClientId,
    pub nombre: String,
    #[serde(default)]
    pub ciudad_id: Option<CityId>,
    /// Included association when the backend expands it.
    #[serde(default, rename = "Ciudad", alias = "ciudad")]
    pub ciudad: Option<Ciudad>,
}

impl Cliente {
    /// City name for listings; empty when the association was not expanded.
    #[must_use]
    pub fn ciudad_nombre(&self) -> &str {
        self.ciudad.as_ref().map_or("", |ciudad| ciudad.nombre.as_str())
    }
}

/// Create/update payload for a client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCliente {
    pub nombre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciudad_id: Option<CityId>,
}

/// A delivery route (reparto).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reparto {
    pub id: RouteId,
    pub nombre: String,
    /// "Sí" / "No" - whether the route is outsourced.
    pub tercerizado: String,
    /// "Activo" / "Inactivo".
    pub estado: String,
}

/// Create/update payload for a delivery route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReparto {
    pub nombre: String,
    pub tercerizado: String,
    pub estado: String,
}

/// Minimal `{id, nombre}` shape for included associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
    pub id: i32,
    pub nombre: String,
}

// =============================================================================
// Stock (existencias)
// =============================================================================

/// A stock lot assigned to a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Existencia {
    pub id: LotId,
    pub producto_id: ProductId,
    pub reparto_id: RouteId,
    pub cantidad: u64,
    /// Production date.
    #[serde(rename = "fechaE")]
    pub fecha_e: NaiveDate,
    /// Expiry date.
    #[serde(rename = "fechaV")]
    pub fecha_v: NaiveDate,
    #[serde(default, rename = "Producto", alias = "producto")]
    pub producto: Option<NamedRef>,
    #[serde(default, rename = "Reparto", alias = "reparto")]
    pub reparto: Option<NamedRef>,
}

impl Existencia {
    /// Convert to the domain lot used by stock aggregation.
    #[must_use]
    pub fn to_stock_lot(&self) -> StockLot {
        StockLot {
            id: self.id,
            product: self.producto_id,
            product_name: self
                .producto
                .as_ref()
                .map_or_else(String::new, |producto| producto.nombre.clone()),
            route: self.reparto_id,
            quantity: self.cantidad,
            produced_on: self.fecha_e,
            expires_on: self.fecha_v,
        }
    }
}

/// Create/update payload for a stock lot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExistencia {
    pub producto_id: ProductId,
    pub reparto_id: RouteId,
    pub cantidad: u64,
    #[serde(rename = "fechaE")]
    pub fecha_e: NaiveDate,
    #[serde(rename = "fechaV")]
    pub fecha_v: NaiveDate,
}

// =============================================================================
// Pricing
// =============================================================================

/// `GET /precio-productos/vigente/:id` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecioVigente {
    /// Unit price in force for the product/date/tier.
    pub valor: Decimal,
}

// =============================================================================
// Orders (pedidos)
// =============================================================================

/// A line of an order or return as the backend stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linea {
    #[serde(default)]
    pub id: Option<i32>,
    pub producto_id: ProductId,
    pub cantidad: u32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
    /// Product name snapshot at the time the line was written.
    #[serde(default)]
    pub descripcion: String,
}

/// Line payload for document creation and line writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLinea {
    pub producto_id: ProductId,
    pub cantidad: u32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
    pub descripcion: String,
}

/// A customer order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pedido {
    pub id: OrderId,
    pub fecha_emision: NaiveDate,
    pub fecha_entrega: NaiveDate,
    pub cliente_id: ClientId,
    pub reparto_id: RouteId,
    pub total: Decimal,
    pub estado: String,
    #[serde(default, rename = "Cliente", alias = "cliente")]
    pub cliente: Option<NamedRef>,
    #[serde(default, rename = "Reparto", alias = "reparto")]
    pub reparto: Option<NamedRef>,
    #[serde(default, rename = "lineasPedido", alias = "lineas")]
    pub lineas: Vec<Linea>,
}

/// Create payload for an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPedido {
    pub cliente_id: ClientId,
    pub reparto_id: RouteId,
    pub fecha_emision: NaiveDate,
    pub fecha_entrega: NaiveDate,
    pub estado: String,
    pub total: Decimal,
    pub lineas: Vec<NewLinea>,
}

/// Header-field patch for an order; lines travel separately.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoPatch {
    pub cliente_id: ClientId,
    pub reparto_id: RouteId,
    pub fecha_emision: NaiveDate,
    pub fecha_entrega: NaiveDate,
    pub total: Decimal,
}

// =============================================================================
// Returns (devoluciones)
// =============================================================================

/// A merchandise return.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Devolucion {
    pub id: ReturnId,
    pub fecha: DateTime<Utc>,
    pub cliente_id: ClientId,
    pub reparto_id: RouteId,
    pub razon: String,
    pub total: Decimal,
    #[serde(default, rename = "Cliente", alias = "cliente")]
    pub cliente: Option<NamedRef>,
    #[serde(default, rename = "Reparto", alias = "reparto")]
    pub reparto: Option<NamedRef>,
    #[serde(default, rename = "lineasDevolucion", alias = "lineas")]
    pub lineas: Vec<Linea>,
}

/// Create payload for a return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevolucion {
    pub cliente_id: ClientId,
    pub reparto_id: RouteId,
    pub fecha: DateTime<Utc>,
    pub razon: String,
    pub total: Decimal,
    pub lineas: Vec<NewLinea>,
}

/// Header-field patch for a return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevolucionPatch {
    pub cliente_id: ClientId,
    pub reparto_id: RouteId,
    pub fecha: DateTime<Utc>,
    pub razon: String,
    pub total: Decimal,
}

// =============================================================================
// Receipts (remitos)
// =============================================================================

/// A line of a delivery receipt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineaRemito {
    pub id: i32,
    pub cantidad: u32,
    #[serde(default)]
    pub precio_unitario: Option<Decimal>,
    pub subtotal: Decimal,
    #[serde(default, rename = "Producto", alias = "producto")]
    pub producto: Option<NamedRef>,
}

/// A delivery receipt issued against a route's stock.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remito {
    pub id: ReceiptId,
    pub fecha: NaiveDate,
    pub total: Decimal,
    #[serde(default)]
    pub cliente_id: Option<ClientId>,
    pub reparto_id: RouteId,
    #[serde(default, rename = "Cliente", alias = "cliente")]
    pub cliente: Option<NamedRef>,
    #[serde(default, rename = "Reparto", alias = "reparto")]
    pub reparto: Option<NamedRef>,
    #[serde(default, rename = "lineasRemito", alias = "lineas")]
    pub lineas: Vec<LineaRemito>,
}

/// Line payload for receipt creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineaRemito {
    pub producto_id: ProductId,
    pub cantidad: u32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
}

/// Create payload for a receipt. Stock depletion happens backend-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemito {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cliente_id: Option<ClientId>,
    pub reparto_id: RouteId,
    pub fecha: NaiveDate,
    pub total: Decimal,
    pub lineas: Vec<NewLineaRemito>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_envelope_decodes_both_shapes() {
        let wrapped: ApiEnvelope<Vec<Producto>> =
            serde_json::from_str(r#"{"data": [{"id": 1, "nombre": "Pan flauta"}]}"#)
                .expect("wrapped");
        assert_eq!(wrapped.into_inner().len(), 1);

        let bare: ApiEnvelope<Vec<Producto>> =
            serde_json::from_str(r#"[{"id": 1, "nombre": "Pan flauta"}]"#).expect("bare");
        assert_eq!(bare.into_inner().len(), 1);
    }

    #[test]
    fn test_cliente_accepts_both_association_casings() {
        let upper: Cliente = serde_json::from_str(
            r#"{"id": 1, "nombre": "Almacén Sur", "ciudadId": 2, "Ciudad": {"id": 2, "nombre": "Rosario"}}"#,
        )
        .expect("upper");
        assert_eq!(upper.ciudad_nombre(), "Rosario");

        let lower: Cliente = serde_json::from_str(
            r#"{"id": 1, "nombre": "Almacén Sur", "ciudad": {"id": 2, "nombre": "Rosario"}}"#,
        )
        .expect("lower");
        assert_eq!(lower.ciudad_nombre(), "Rosario");
    }

    #[test]
    fn test_existencia_to_stock_lot() {
        let existencia: Existencia = serde_json::from_str(
            r#"{
                "id": 9,
                "productoId": 3,
                "repartoId": 1,
                "cantidad": 24,
                "fechaE": "2024-05-10",
                "fechaV": "2024-05-14",
                "Producto": {"id": 3, "nombre": "Criollos"}
            }"#,
        )
        .expect("existencia");
        let lot = existencia.to_stock_lot();
        assert_eq!(lot.product_name, "Criollos");
        assert_eq!(lot.quantity, 24);
        assert_eq!(lot.produced_on.to_string(), "2024-05-10");
    }

    #[test]
    fn test_usuario_role_wire_names() {
        let usuario: Usuario = serde_json::from_str(
            r#"{"id": 5, "username": "raul", "rol": "REPARTIDOR", "repartoId": 2}"#,
        )
        .expect("usuario");
        assert_eq!(usuario.rol, Role::Delivery);
        assert_eq!(usuario.reparto_id, Some(RouteId::new(2)));
    }

    #[test]
    fn test_precio_vigente_decodes_number() {
        let envelope: ApiEnvelope<Option<PrecioVigente>> =
            serde_json::from_str(r#"{"data": {"valor": 125.5}}"#).expect("precio");
        let precio = envelope.into_inner().expect("some");
        assert_eq!(precio.valor, dec!(125.5));
    }

    #[test]
    fn test_pedido_line_aliases() {
        let pedido: Pedido = serde_json::from_str(
            r#"{
                "id": 1,
                "fechaEmision": "2024-05-10",
                "fechaEntrega": "2024-05-11",
                "clienteId": 1,
                "repartoId": 1,
                "total": 100.0,
                "estado": "Pendiente",
                "lineasPedido": [
                    {"id": 7, "productoId": 3, "cantidad": 2, "precioUnitario": 50.0, "subtotal": 100.0, "descripcion": "Criollos"}
                ]
            }"#,
        )
        .expect("pedido");
        assert_eq!(pedido.lineas.len(), 1);
        assert_eq!(pedido.lineas[0].id, Some(7));
    }
}
