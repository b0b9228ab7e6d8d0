//! HTTP route handlers for the dashboard.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                        - Receipt listing (landing page)
//! GET  /health                  - Health check
//!
//! # Auth
//! GET  /login                   - Login page
//! POST /login                   - Login action
//! POST /logout                  - Logout action
//!
//! # Receipts (remitos)
//! GET  /remitos/nuevo           - Receipt form (stock-scoped)
//! POST /remitos                 - Create receipt
//! GET  /remitos/{id}            - Receipt detail
//! POST /remitos/{id}/eliminar   - Delete receipt (admin)
//!
//! # Orders (pedidos)
//! GET  /pedidos                 - Order listing
//! GET  /pedidos/nuevo           - Order form
//! POST /pedidos                 - Create order
//! GET  /pedidos/{id}            - Order detail
//! GET  /pedidos/{id}/editar     - Edit form
//! POST /pedidos/{id}/editar     - Apply edit
//! POST /pedidos/{id}/eliminar   - Delete order
//!
//! # Returns (devoluciones) - same shape as orders
//!
//! # Admin screens (productos, clientes, ciudades, repartos, existencias)
//! GET  /<entidad>               - Listing with search/filters
//! GET  /<entidad>/nuevo         - Create form
//! POST /<entidad>               - Create action
//! GET  /<entidad>/{id}/editar   - Edit form
//! POST /<entidad>/{id}          - Update action
//! POST /<entidad>/{id}/eliminar - Delete action
//!
//! # API
//! GET  /api/precio-vigente      - Current price for product/date/tier
//! ```

pub mod api;
pub mod auth;
pub mod cities;
pub mod clients;
pub mod line_form;
pub mod orders;
pub mod products;
pub mod receipts;
pub mod repartos;
pub mod returns;
pub mod stock;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the receipt routes router.
pub fn receipt_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(receipts::create))
        .route("/nuevo", get(receipts::new_form))
        .route("/{id}", get(receipts::show))
        .route("/{id}/eliminar", post(receipts::delete))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/nuevo", get(orders::new_form))
        .route("/{id}", get(orders::show))
        .route("/{id}/editar", get(orders::edit_form).post(orders::update))
        .route("/{id}/eliminar", post(orders::delete))
}

/// Create the return routes router.
pub fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(returns::index).post(returns::create))
        .route("/nuevo", get(returns::new_form))
        .route("/{id}", get(returns::show))
        .route("/{id}/editar", get(returns::edit_form).post(returns::update))
        .route("/{id}/eliminar", post(returns::delete))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/nuevo", get(products::new_form))
        .route("/{id}", post(products::update))
        .route("/{id}/editar", get(products::edit_form))
        .route("/{id}/eliminar", post(products::delete))
}

/// Create the client routes router.
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(clients::index).post(clients::create))
        .route("/nuevo", get(clients::new_form))
        .route("/{id}", post(clients::update))
        .route("/{id}/editar", get(clients::edit_form))
        .route("/{id}/eliminar", post(clients::delete))
}

/// Create the city routes router.
pub fn city_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cities::index).post(cities::create))
        .route("/nuevo", get(cities::new_form))
        .route("/{id}", post(cities::update))
        .route("/{id}/editar", get(cities::edit_form))
        .route("/{id}/eliminar", post(cities::delete))
}

/// Create the delivery route routes router.
pub fn reparto_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(repartos::index).post(repartos::create))
        .route("/nuevo", get(repartos::new_form))
        .route("/{id}", post(repartos::update))
        .route("/{id}/editar", get(repartos::edit_form))
        .route("/{id}/eliminar", post(repartos::delete))
}

/// Create the stock routes router.
pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stock::index).post(stock::create))
        .route("/nuevo", get(stock::new_form))
        .route("/{id}", post(stock::update))
        .route("/{id}/editar", get(stock::edit_form))
        .route("/{id}/eliminar", post(stock::delete))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/precio-vigente", get(api::precio_vigente))
}

/// Create all routes for the dashboard.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Landing page: receipt listing
        .route("/", get(receipts::index))
        // Documents
        .nest("/remitos", receipt_routes())
        .nest("/pedidos", order_routes())
        .nest("/devoluciones", return_routes())
        // Admin screens
        .nest("/productos", product_routes())
        .nest("/clientes", client_routes())
        .nest("/ciudades", city_routes())
        .nest("/repartos", reparto_routes())
        .nest("/existencias", stock_routes())
        // Auth
        .merge(auth_routes())
        // JSON API
        .nest("/api", api_routes())
}
