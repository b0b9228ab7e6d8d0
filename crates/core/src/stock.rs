//! Per-product aggregation of stock lots.
//!
//! A reparto's stock arrives from the backend as individual lots
//! (existencias), each with production and expiry dates. The receipt form
//! only needs "how much of each product is on the truck", so lots are
//! collapsed per product. Which physical lot gets depleted is the backend's
//! decision; no FIFO selection happens here.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{LotId, ProductId, RouteId};

/// One stock lot of a product, tied to a delivery route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLot {
    /// Lot identifier.
    pub id: LotId,
    /// Product in the lot.
    pub product: ProductId,
    /// Product display name (denormalized by the backend).
    pub product_name: String,
    /// Route carrying the lot.
    pub route: RouteId,
    /// Units on hand.
    pub quantity: u64,
    /// Production date.
    pub produced_on: NaiveDate,
    /// Expiry date.
    pub expires_on: NaiveDate,
}

/// Total available quantity of one product across lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedStock {
    /// Product identifier.
    pub product: ProductId,
    /// Product display name.
    pub name: String,
    /// Quantity summed across all lots of the product.
    pub total_quantity: u64,
}

/// Collapse lots into one entry per product with summed quantities.
///
/// Pure function of its input; the caller recomputes whenever the lot list
/// changes (e.g. after selecting a different reparto). No ordering guarantee
/// beyond grouping correctness.
#[must_use]
pub fn aggregate_by_product(lots: &[StockLot]) -> HashMap<ProductId, AggregatedStock> {
    let mut aggregated: HashMap<ProductId, AggregatedStock> = HashMap::new();
    for lot in lots {
        aggregated
            .entry(lot.product)
            .and_modify(|entry| entry.total_quantity += lot.quantity)
            .or_insert_with(|| AggregatedStock {
                product: lot.product,
                name: lot.product_name.clone(),
                total_quantity: lot.quantity,
            });
    }
    aggregated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(id: i32, product: i32, name: &str, quantity: u64) -> StockLot {
        StockLot {
            id: LotId::new(id),
            product: ProductId::new(product),
            product_name: name.to_owned(),
            route: RouteId::new(1),
            quantity,
            produced_on: NaiveDate::from_ymd_opt(2024, 5, 10).expect("valid date"),
            expires_on: NaiveDate::from_ymd_opt(2024, 5, 14).expect("valid date"),
        }
    }

    #[test]
    fn test_aggregate_sums_per_product() {
        let lots = [
            lot(1, 1, "Pan flauta", 3),
            lot(2, 1, "Pan flauta", 2),
            lot(3, 2, "Facturas", 5),
        ];
        let aggregated = aggregate_by_product(&lots);
        assert_eq!(aggregated.len(), 2);
        assert_eq!(
            aggregated.get(&ProductId::new(1)).expect("product 1").total_quantity,
            5
        );
        assert_eq!(
            aggregated.get(&ProductId::new(2)).expect("product 2").total_quantity,
            5
        );
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let mut lots = vec![
            lot(1, 1, "Pan flauta", 3),
            lot(2, 2, "Facturas", 5),
            lot(3, 1, "Pan flauta", 2),
        ];
        let forward = aggregate_by_product(&lots);
        lots.reverse();
        let backward = aggregate_by_product(&lots);
        assert_eq!(
            forward.get(&ProductId::new(1)).map(|a| a.total_quantity),
            backward.get(&ProductId::new(1)).map(|a| a.total_quantity)
        );
        assert_eq!(forward.len(), backward.len());
    }

    #[test]
    fn test_aggregate_keeps_product_name() {
        let lots = [lot(1, 4, "Criollos", 12)];
        let aggregated = aggregate_by_product(&lots);
        let entry = aggregated.get(&ProductId::new(4)).expect("entry");
        assert_eq!(entry.name, "Criollos");
        assert_eq!(entry.total_quantity, 12);
    }

    #[test]
    fn test_aggregate_empty_input() {
        assert!(aggregate_by_product(&[]).is_empty());
    }
}
