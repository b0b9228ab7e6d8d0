//! JSON endpoints backing the form pages' inline updates.
//!
//! The document forms refresh line prices as the user edits; this endpoint
//! answers those lookups. Submitted documents never trust these values -
//! prices are re-resolved server-side at submit time.

use axum::{Json, extract::{Query, State}};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use espiga_core::pricing::{PriceLookup, PriceTier};
use espiga_core::types::{ProductId, format_currency};

use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Query parameters for a price lookup.
#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub producto_id: i32,
    /// Document date, `YYYY-MM-DD`. Defaults to today.
    pub fecha: Option<String>,
    /// Price tier form value; defaults to resale.
    pub tipo_precio: Option<String>,
}

/// Price lookup response.
#[derive(Debug, Serialize)]
pub struct PriceResponse {
    /// `"ok"`, `"sin-precio"` or `"error"`.
    pub estado: &'static str,
    /// Unit price when the lookup succeeded.
    pub valor: Option<Decimal>,
    /// Formatted price, or an empty string.
    pub display: String,
}

/// `GET /api/precio-vigente` - current price for a product/date/tier.
pub async fn precio_vigente(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<PriceQuery>,
) -> Json<PriceResponse> {
    let fecha = query
        .fecha
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let tier = PriceTier::from_form_value(query.tipo_precio.as_deref().unwrap_or("reventa"));

    let lookup = state
        .backend()
        .precio_vigente(&user.token, ProductId::new(query.producto_id), fecha, tier)
        .await;

    Json(match lookup {
        PriceLookup::Found(valor) => PriceResponse {
            estado: "ok",
            valor: Some(valor),
            display: format_currency(valor),
        },
        PriceLookup::NotFound | PriceLookup::Pending => PriceResponse {
            estado: "sin-precio",
            valor: None,
            display: String::new(),
        },
        PriceLookup::Failed => PriceResponse {
            estado: "error",
            valor: None,
            display: String::new(),
        },
    })
}
