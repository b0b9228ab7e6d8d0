//! HTTP client for the bakery REST backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use espiga_core::pricing::{PriceLookup, PriceTier};
use espiga_core::types::{
    CityId, ClientId, LotId, OrderId, ProductId, ReceiptId, ReturnId, RouteId,
};

use super::types::{
    ApiEnvelope, Ciudad, Cliente, Devolucion, DevolucionPatch, Existencia, Linea, LoginRequest,
    LoginResponse, NewCiudad, NewCliente, NewDevolucion, NewExistencia, NewLinea, NewPedido,
    NewProducto, NewRemito, NewReparto, Pedido, PedidoPatch, PrecioVigente, Producto, Remito,
    Reparto,
};
use super::{AuthToken, BackendError, ErrorBody};

/// How long reference listings stay cached.
const REFERENCE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Placeholder for requests without query parameters.
const NO_QUERY: [(&str, &str); 0] = [];

/// Common listing parameters (`search`, `pageSize`, `offset`).
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ListQuery {
    /// Query returning everything, for dropdowns and reference data.
    #[must_use]
    pub fn all() -> Self {
        Self {
            search: None,
            page_size: Some(1000),
            offset: None,
        }
    }
}

/// Filters for the stock lot listing.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistenciaFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producto_id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reparto_id: Option<RouteId>,
    #[serde(rename = "fechaE", skip_serializing_if = "Option::is_none")]
    pub fecha_e: Option<NaiveDate>,
    #[serde(rename = "fechaV", skip_serializing_if = "Option::is_none")]
    pub fecha_v: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Filters for the receipt listing.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemitoFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reparto_id: Option<RouteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// One step of a document line-write plan.
///
/// `Update` and `Delete` carry the line's previous payload so a failed plan
/// can be compensated in reverse order.
#[derive(Debug, Clone)]
pub enum LineOp {
    /// Add a new line to the document.
    Create(NewLinea),
    /// Overwrite an existing line.
    Update {
        /// Backend line ID.
        id: i32,
        /// The new payload.
        linea: NewLinea,
        /// Payload before the edit, for rollback.
        previous: NewLinea,
    },
    /// Remove an existing line.
    Delete {
        /// Backend line ID.
        id: i32,
        /// Payload before the delete, for rollback.
        previous: NewLinea,
    },
}

/// A plan step that has already hit the backend.
enum AppliedOp {
    Created { id: Option<i32> },
    Updated { id: i32, previous: NewLinea },
    Deleted { previous: NewLinea },
}

/// Client for the bakery REST backend.
///
/// Cheaply cloneable via `Arc`. Reference listings used by form dropdowns
/// are cached for [`REFERENCE_CACHE_TTL`] and invalidated on mutation.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    http: reqwest::Client,
    base_url: Url,
    productos_cache: Cache<(), Arc<Vec<Producto>>>,
    clientes_cache: Cache<(), Arc<Vec<Cliente>>>,
    repartos_cache: Cache<(), Arc<Vec<Reparto>>>,
}

impl BackendClient {
    /// Create a new backend client for the given base URL.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        fn build_cache<V: Clone + Send + Sync + 'static>() -> Cache<(), V> {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(REFERENCE_CACHE_TTL)
                .build()
        }

        Self {
            inner: Arc::new(BackendClientInner {
                http: reqwest::Client::new(),
                base_url,
                productos_cache: build_cache(),
                clientes_cache: build_cache(),
                repartos_cache: build_cache(),
            }),
        }
    }

    /// Build a URL under the backend base, preserving any base path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Authenticate against the backend and obtain a bearer token.
    ///
    /// # Errors
    ///
    /// Invalid credentials come back as [`BackendError::Status`] carrying the
    /// backend's own message, so the login form can show it verbatim.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, BackendError> {
        let url = self.endpoint(&["auth", "login"])?;
        let response = self
            .inner
            .http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| "Usuario o contraseña incorrectos.".to_string());
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<LoginResponse> = serde_json::from_str(&body)?;
        Ok(envelope.into_inner())
    }

    // =========================================================================
    // Productos
    // =========================================================================

    /// List products, with optional search and paging.
    pub async fn list_productos(
        &self,
        token: &AuthToken,
        query: &ListQuery,
    ) -> Result<Vec<Producto>, BackendError> {
        self.get_json(token, &["productos"], query, "productos").await
    }

    /// Full product listing for dropdowns, served from cache when fresh.
    pub async fn reference_productos(
        &self,
        token: &AuthToken,
    ) -> Result<Arc<Vec<Producto>>, BackendError> {
        if let Some(cached) = self.inner.productos_cache.get(&()).await {
            debug!("productos served from cache");
            return Ok(cached);
        }
        let productos = Arc::new(self.list_productos(token, &ListQuery::all()).await?);
        self.inner
            .productos_cache
            .insert((), Arc::clone(&productos))
            .await;
        Ok(productos)
    }

    /// Fetch one product.
    pub async fn get_producto(
        &self,
        token: &AuthToken,
        id: ProductId,
    ) -> Result<Producto, BackendError> {
        self.get_json(token, &["productos", &id.to_string()], &NO_QUERY, "el producto")
            .await
    }

    /// Create a product.
    pub async fn create_producto(
        &self,
        token: &AuthToken,
        producto: &NewProducto,
    ) -> Result<Producto, BackendError> {
        let created = self.post_json(token, &["productos"], producto, "el producto").await;
        self.inner.productos_cache.invalidate(&()).await;
        created
    }

    /// Update a product.
    pub async fn update_producto(
        &self,
        token: &AuthToken,
        id: ProductId,
        producto: &NewProducto,
    ) -> Result<(), BackendError> {
        self.patch(token, &["productos", &id.to_string()], producto, "el producto")
            .await?;
        self.inner.productos_cache.invalidate(&()).await;
        Ok(())
    }

    /// Delete a product.
    pub async fn delete_producto(&self, token: &AuthToken, id: ProductId) -> Result<(), BackendError> {
        self.delete(token, &["productos", &id.to_string()], "el producto")
            .await?;
        self.inner.productos_cache.invalidate(&()).await;
        Ok(())
    }

    // =========================================================================
    // Ciudades
    // =========================================================================

    /// List cities.
    pub async fn list_ciudades(
        &self,
        token: &AuthToken,
        query: &ListQuery,
    ) -> Result<Vec<Ciudad>, BackendError> {
        self.get_json(token, &["ciudades"], query, "ciudades").await
    }

    /// Fetch one city.
    pub async fn get_ciudad(&self, token: &AuthToken, id: CityId) -> Result<Ciudad, BackendError> {
        self.get_json(token, &["ciudades", &id.to_string()], &NO_QUERY, "la ciudad")
            .await
    }

    /// Create a city.
    pub async fn create_ciudad(
        &self,
        token: &AuthToken,
        ciudad: &NewCiudad,
    ) -> Result<Ciudad, BackendError> {
        self.post_json(token, &["ciudades"], ciudad, "la ciudad").await
    }

    /// Update a city.
    pub async fn update_ciudad(
        &self,
        token: &AuthToken,
        id: CityId,
        ciudad: &NewCiudad,
    ) -> Result<(), BackendError> {
        self.patch(token, &["ciudades", &id.to_string()], ciudad, "la ciudad")
            .await
    }

    /// Delete a city.
    pub async fn delete_ciudad(&self, token: &AuthToken, id: CityId) -> Result<(), BackendError> {
        self.delete(token, &["ciudades", &id.to_string()], "la ciudad")
            .await
    }

    // =========================================================================
    // Clientes
    // =========================================================================

    /// List clients.
    pub async fn list_clientes(
        &self,
        token: &AuthToken,
        query: &ListQuery,
    ) -> Result<Vec<Cliente>, BackendError> {
        self.get_json(token, &["clientes"], query, "clientes").await
    }

    /// Full client listing for dropdowns, served from cache when fresh.
    pub async fn reference_clientes(
        &self,
        token: &AuthToken,
    ) -> Result<Arc<Vec<Cliente>>, BackendError> {
        if let Some(cached) = self.inner.clientes_cache.get(&()).await {
            debug!("clientes served from cache");
            return Ok(cached);
        }
        let clientes = Arc::new(self.list_clientes(token, &ListQuery::all()).await?);
        self.inner
            .clientes_cache
            .insert((), Arc::clone(&clientes))
            .await;
        Ok(clientes)
    }

    /// Fetch one client.
    pub async fn get_cliente(&self, token: &AuthToken, id: ClientId) -> Result<Cliente, BackendError> {
        self.get_json(token, &["clientes", &id.to_string()], &NO_QUERY, "el cliente")
            .await
    }

    /// Create a client.
    pub async fn create_cliente(
        &self,
        token: &AuthToken,
        cliente: &NewCliente,
    ) -> Result<Cliente, BackendError> {
        let created = self.post_json(token, &["clientes"], cliente, "el cliente").await;
        self.inner.clientes_cache.invalidate(&()).await;
        created
    }

    /// Update a client.
    pub async fn update_cliente(
        &self,
        token: &AuthToken,
        id: ClientId,
        cliente: &NewCliente,
    ) -> Result<(), BackendError> {
        self.patch(token, &["clientes", &id.to_string()], cliente, "el cliente")
            .await?;
        self.inner.clientes_cache.invalidate(&()).await;
        Ok(())
    }

    /// Delete a client.
    pub async fn delete_cliente(&self, token: &AuthToken, id: ClientId) -> Result<(), BackendError> {
        self.delete(token, &["clientes", &id.to_string()], "el cliente")
            .await?;
        self.inner.clientes_cache.invalidate(&()).await;
        Ok(())
    }

    // =========================================================================
    // Repartos
    // =========================================================================

    /// List delivery routes.
    pub async fn list_repartos(
        &self,
        token: &AuthToken,
        query: &ListQuery,
    ) -> Result<Vec<Reparto>, BackendError> {
        self.get_json(token, &["repartos"], query, "repartos").await
    }

    /// Full route listing for dropdowns, served from cache when fresh.
    pub async fn reference_repartos(
        &self,
        token: &AuthToken,
    ) -> Result<Arc<Vec<Reparto>>, BackendError> {
        if let Some(cached) = self.inner.repartos_cache.get(&()).await {
            debug!("repartos served from cache");
            return Ok(cached);
        }
        let repartos = Arc::new(self.list_repartos(token, &ListQuery::all()).await?);
        self.inner
            .repartos_cache
            .insert((), Arc::clone(&repartos))
            .await;
        Ok(repartos)
    }

    /// Fetch one delivery route.
    pub async fn get_reparto(&self, token: &AuthToken, id: RouteId) -> Result<Reparto, BackendError> {
        self.get_json(token, &["repartos", &id.to_string()], &NO_QUERY, "el reparto")
            .await
    }

    /// Create a delivery route.
    pub async fn create_reparto(
        &self,
        token: &AuthToken,
        reparto: &NewReparto,
    ) -> Result<Reparto, BackendError> {
        let created = self.post_json(token, &["repartos"], reparto, "el reparto").await;
        self.inner.repartos_cache.invalidate(&()).await;
        created
    }

    /// Update a delivery route.
    pub async fn update_reparto(
        &self,
        token: &AuthToken,
        id: RouteId,
        reparto: &NewReparto,
    ) -> Result<(), BackendError> {
        self.patch(token, &["repartos", &id.to_string()], reparto, "el reparto")
            .await?;
        self.inner.repartos_cache.invalidate(&()).await;
        Ok(())
    }

    /// Delete a delivery route.
    pub async fn delete_reparto(&self, token: &AuthToken, id: RouteId) -> Result<(), BackendError> {
        self.delete(token, &["repartos", &id.to_string()], "el reparto")
            .await?;
        self.inner.repartos_cache.invalidate(&()).await;
        Ok(())
    }

    // =========================================================================
    // Existencias
    // =========================================================================

    /// List stock lots matching the filter.
    pub async fn list_existencias(
        &self,
        token: &AuthToken,
        filter: &ExistenciaFilter,
    ) -> Result<Vec<Existencia>, BackendError> {
        self.get_json(token, &["existencias"], filter, "existencias")
            .await
    }

    /// Fetch one stock lot.
    pub async fn get_existencia(
        &self,
        token: &AuthToken,
        id: LotId,
    ) -> Result<Existencia, BackendError> {
        self.get_json(token, &["existencias", &id.to_string()], &NO_QUERY, "la existencia")
            .await
    }

    /// Create a stock lot.
    pub async fn create_existencia(
        &self,
        token: &AuthToken,
        existencia: &NewExistencia,
    ) -> Result<Existencia, BackendError> {
        self.post_json(token, &["existencias"], existencia, "la existencia")
            .await
    }

    /// Update a stock lot.
    pub async fn update_existencia(
        &self,
        token: &AuthToken,
        id: LotId,
        existencia: &NewExistencia,
    ) -> Result<(), BackendError> {
        self.patch(
            token,
            &["existencias", &id.to_string()],
            existencia,
            "la existencia",
        )
        .await
    }

    /// Delete a stock lot.
    pub async fn delete_existencia(&self, token: &AuthToken, id: LotId) -> Result<(), BackendError> {
        self.delete(token, &["existencias", &id.to_string()], "la existencia")
            .await
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Resolve the unit price in force for a product on a date under a tier.
    ///
    /// This never fails: a missing price and a broken lookup both come back
    /// as distinct [`PriceLookup`] states for validation to judge.
    #[instrument(skip(self, token))]
    pub async fn precio_vigente(
        &self,
        token: &AuthToken,
        producto: ProductId,
        fecha: NaiveDate,
        tier: PriceTier,
    ) -> PriceLookup {
        match self.fetch_precio(token, producto, fecha, tier).await {
            Ok(Some(precio)) => PriceLookup::Found(precio.valor),
            Ok(None) | Err(BackendError::NotFound(_)) => PriceLookup::NotFound,
            Err(err) => {
                warn!(error = %err, producto = producto.as_i32(), "price lookup failed");
                PriceLookup::Failed
            }
        }
    }

    /// Resolve prices for a set of products under the same date and tier.
    pub async fn resolve_prices(
        &self,
        token: &AuthToken,
        productos: &[ProductId],
        fecha: NaiveDate,
        tier: PriceTier,
    ) -> HashMap<ProductId, PriceLookup> {
        let mut prices = HashMap::with_capacity(productos.len());
        for producto in productos {
            let price = self.precio_vigente(token, *producto, fecha, tier).await;
            prices.insert(*producto, price);
        }
        prices
    }

    async fn fetch_precio(
        &self,
        token: &AuthToken,
        producto: ProductId,
        fecha: NaiveDate,
        tier: PriceTier,
    ) -> Result<Option<PrecioVigente>, BackendError> {
        let url = self.endpoint(&["precio-productos", "vigente", &producto.to_string()])?;
        let response = self
            .inner
            .http
            .get(url)
            .query(&[
                ("fecha", fecha.format("%Y-%m-%d").to_string()),
                ("nombre", tier.wire_name().to_string()),
            ])
            .bearer_auth(token.as_str())
            .send()
            .await?;
        decode_response(response, "el precio vigente").await
    }

    // =========================================================================
    // Pedidos
    // =========================================================================

    /// List orders.
    pub async fn list_pedidos(
        &self,
        token: &AuthToken,
        query: &ListQuery,
    ) -> Result<Vec<Pedido>, BackendError> {
        self.get_json(token, &["pedidos"], query, "pedidos").await
    }

    /// Fetch one order with its lines.
    pub async fn get_pedido(&self, token: &AuthToken, id: OrderId) -> Result<Pedido, BackendError> {
        self.get_json(token, &["pedidos", &id.to_string()], &NO_QUERY, "el pedido")
            .await
    }

    /// Create an order with all of its lines in one request.
    pub async fn create_pedido(
        &self,
        token: &AuthToken,
        pedido: &NewPedido,
    ) -> Result<Pedido, BackendError> {
        self.post_json(token, &["pedidos"], pedido, "el pedido").await
    }

    /// Update an order's header and apply its line plan.
    ///
    /// The header patch goes first; line operations follow one by one. If a
    /// line operation fails, previously applied operations are compensated
    /// in reverse order and the error reports whether that rollback
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::LineWrite`] when a line step fails.
    pub async fn update_pedido(
        &self,
        token: &AuthToken,
        id: OrderId,
        patch: &PedidoPatch,
        ops: Vec<LineOp>,
    ) -> Result<(), BackendError> {
        self.patch(token, &["pedidos", &id.to_string()], patch, "el pedido")
            .await?;
        self.apply_line_ops(token, "lineas-pedido", "pedidoId", id.as_i32(), ops)
            .await
    }

    /// Delete an order.
    pub async fn delete_pedido(&self, token: &AuthToken, id: OrderId) -> Result<(), BackendError> {
        self.delete(token, &["pedidos", &id.to_string()], "el pedido")
            .await
    }

    // =========================================================================
    // Devoluciones
    // =========================================================================

    /// List returns.
    pub async fn list_devoluciones(
        &self,
        token: &AuthToken,
        query: &ListQuery,
    ) -> Result<Vec<Devolucion>, BackendError> {
        self.get_json(token, &["devoluciones"], query, "devoluciones")
            .await
    }

    /// Fetch one return with its lines.
    pub async fn get_devolucion(
        &self,
        token: &AuthToken,
        id: ReturnId,
    ) -> Result<Devolucion, BackendError> {
        self.get_json(token, &["devoluciones", &id.to_string()], &NO_QUERY, "la devolución")
            .await
    }

    /// Create a return with all of its lines in one request.
    pub async fn create_devolucion(
        &self,
        token: &AuthToken,
        devolucion: &NewDevolucion,
    ) -> Result<Devolucion, BackendError> {
        self.post_json(token, &["devoluciones"], devolucion, "la devolución")
            .await
    }

    /// Update a return's header and apply its line plan.
    ///
    /// Same compensation semantics as [`update_pedido`](Self::update_pedido).
    pub async fn update_devolucion(
        &self,
        token: &AuthToken,
        id: ReturnId,
        patch: &DevolucionPatch,
        ops: Vec<LineOp>,
    ) -> Result<(), BackendError> {
        self.patch(token, &["devoluciones", &id.to_string()], patch, "la devolución")
            .await?;
        self.apply_line_ops(token, "lineas-devolucion", "devolucionId", id.as_i32(), ops)
            .await
    }

    /// Delete a return.
    pub async fn delete_devolucion(
        &self,
        token: &AuthToken,
        id: ReturnId,
    ) -> Result<(), BackendError> {
        self.delete(token, &["devoluciones", &id.to_string()], "la devolución")
            .await
    }

    // =========================================================================
    // Remitos
    // =========================================================================

    /// List receipts matching the filter.
    pub async fn list_remitos(
        &self,
        token: &AuthToken,
        filter: &RemitoFilter,
    ) -> Result<Vec<Remito>, BackendError> {
        self.get_json(token, &["remitos"], filter, "remitos").await
    }

    /// Fetch one receipt with its lines.
    pub async fn get_remito(&self, token: &AuthToken, id: ReceiptId) -> Result<Remito, BackendError> {
        self.get_json(token, &["remitos", &id.to_string()], &NO_QUERY, "el remito")
            .await
    }

    /// Create a receipt. The backend depletes the route's lots itself.
    pub async fn create_remito(
        &self,
        token: &AuthToken,
        remito: &NewRemito,
    ) -> Result<Remito, BackendError> {
        self.post_json(token, &["remitos"], remito, "el remito").await
    }

    /// Delete a receipt.
    pub async fn delete_remito(&self, token: &AuthToken, id: ReceiptId) -> Result<(), BackendError> {
        self.delete(token, &["remitos", &id.to_string()], "el remito")
            .await
    }

    // =========================================================================
    // Line plans
    // =========================================================================

    /// Apply a line plan step by step, compensating on failure.
    #[instrument(skip(self, token, ops), fields(ops = ops.len()))]
    async fn apply_line_ops(
        &self,
        token: &AuthToken,
        path: &'static str,
        parent_key: &'static str,
        parent: i32,
        ops: Vec<LineOp>,
    ) -> Result<(), BackendError> {
        let mut applied: Vec<AppliedOp> = Vec::new();

        for (index, op) in ops.into_iter().enumerate() {
            let result = match op {
                LineOp::Create(linea) => self
                    .create_line(token, path, parent_key, parent, &linea)
                    .await
                    .map(|id| applied.push(AppliedOp::Created { id })),
                LineOp::Update { id, linea, previous } => self
                    .patch_line(token, path, id, &linea)
                    .await
                    .map(|()| applied.push(AppliedOp::Updated { id, previous })),
                LineOp::Delete { id, previous } => self
                    .delete_line(token, path, id)
                    .await
                    .map(|()| applied.push(AppliedOp::Deleted { previous })),
            };

            if let Err(err) = result {
                let rolled_back = self
                    .rollback_lines(token, path, parent_key, parent, applied)
                    .await;
                return Err(BackendError::LineWrite {
                    step: format!("la línea {}", index + 1),
                    rolled_back,
                    source: Box::new(err),
                });
            }
        }

        Ok(())
    }

    /// Undo applied steps in reverse order. Returns whether every
    /// compensation succeeded.
    async fn rollback_lines(
        &self,
        token: &AuthToken,
        path: &'static str,
        parent_key: &'static str,
        parent: i32,
        applied: Vec<AppliedOp>,
    ) -> bool {
        let mut complete = true;
        for op in applied.into_iter().rev() {
            let result = match op {
                AppliedOp::Created { id: Some(id) } => self.delete_line(token, path, id).await,
                AppliedOp::Created { id: None } => {
                    warn!(path, "created line came back without an ID, cannot roll back");
                    complete = false;
                    continue;
                }
                AppliedOp::Updated { id, previous } => {
                    self.patch_line(token, path, id, &previous).await
                }
                AppliedOp::Deleted { previous } => self
                    .create_line(token, path, parent_key, parent, &previous)
                    .await
                    .map(|_| ()),
            };
            if let Err(err) = result {
                warn!(error = %err, path, "line rollback step failed");
                complete = false;
            }
        }
        complete
    }

    async fn create_line(
        &self,
        token: &AuthToken,
        path: &'static str,
        parent_key: &'static str,
        parent: i32,
        linea: &NewLinea,
    ) -> Result<Option<i32>, BackendError> {
        let mut body = serde_json::to_value(linea)?;
        if let serde_json::Value::Object(map) = &mut body {
            map.insert(parent_key.to_string(), serde_json::Value::from(parent));
        }
        let created: Linea = self.post_json(token, &[path], &body, "la línea").await?;
        Ok(created.id)
    }

    async fn patch_line(
        &self,
        token: &AuthToken,
        path: &'static str,
        id: i32,
        linea: &NewLinea,
    ) -> Result<(), BackendError> {
        self.patch(token, &[path, &id.to_string()], linea, "la línea")
            .await
    }

    async fn delete_line(
        &self,
        token: &AuthToken,
        path: &'static str,
        id: i32,
    ) -> Result<(), BackendError> {
        self.delete(token, &[path, &id.to_string()], "la línea").await
    }

    // =========================================================================
    // HTTP plumbing
    // =========================================================================

    async fn get_json<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        token: &AuthToken,
        segments: &[&str],
        query: &Q,
        what: &str,
    ) -> Result<T, BackendError> {
        let url = self.endpoint(segments)?;
        let response = self
            .inner
            .http
            .get(url)
            .query(query)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        decode_response(response, what).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        token: &AuthToken,
        segments: &[&str],
        body: &B,
        what: &str,
    ) -> Result<T, BackendError> {
        let url = self.endpoint(segments)?;
        let response = self
            .inner
            .http
            .post(url)
            .json(body)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        decode_response(response, what).await
    }

    async fn patch<B: Serialize + ?Sized>(
        &self,
        token: &AuthToken,
        segments: &[&str],
        body: &B,
        what: &str,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(segments)?;
        let response = self
            .inner
            .http
            .patch(url)
            .json(body)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        expect_success(response, what).await
    }

    async fn delete(
        &self,
        token: &AuthToken,
        segments: &[&str],
        what: &str,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(segments)?;
        let response = self
            .inner
            .http
            .delete(url)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        expect_success(response, what).await
    }
}

/// Map a response to a typed payload, unwrapping the envelope.
async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, BackendError> {
    let status = check_status(&response, what)?;
    // Body as text first for better parse-error diagnostics
    let body = response.text().await?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
    Ok(envelope.into_inner())
}

/// Like [`decode_response`] but discards any success body.
async fn expect_success(response: reqwest::Response, what: &str) -> Result<(), BackendError> {
    let status = check_status(&response, what)?;
    if !status.is_success() {
        let body = response.text().await?;
        return Err(status_error(status, &body));
    }
    Ok(())
}

fn check_status(response: &reqwest::Response, what: &str) -> Result<StatusCode, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(BackendError::Unauthorized);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound(what.to_string()));
    }
    Ok(status)
}

fn status_error(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    BackendError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_preserves_base_path() {
        let client = BackendClient::new("http://localhost:4000/api/".parse().unwrap());
        let url = client.endpoint(&["productos", "3"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/api/productos/3");
    }

    #[test]
    fn test_endpoint_without_base_path() {
        let client = BackendClient::new("http://localhost:4000".parse().unwrap());
        let url = client.endpoint(&["auth", "login"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/auth/login");
    }

    #[test]
    fn test_list_query_serializes_camel_case() {
        let query = ListQuery {
            search: Some("pan".to_string()),
            page_size: Some(10),
            offset: Some(20),
        };
        let encoded = serde_urlencoded_like(&query);
        assert!(encoded.contains("pageSize"));
        assert!(encoded.contains("offset"));
    }

    // Minimal stand-in for the query-string encoding reqwest applies.
    fn serde_urlencoded_like<T: Serialize>(value: &T) -> String {
        serde_json::to_string(value).unwrap()
    }
}
