//! Pre-submission validation of a line-item form.
//!
//! Every check here runs before any write reaches the backend; a form with
//! validation errors never produces network traffic. Messages are
//! user-facing and rendered as-is in the form banner.

use std::collections::HashMap;

use thiserror::Error;

use crate::line_items::LineItemEditor;
use crate::pricing::PriceLookup;
use crate::stock::AggregatedStock;
use crate::types::ProductId;

/// A reason the draft cannot be submitted.
///
/// Line numbers are 1-based, matching what the user sees on screen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The draft has no lines at all.
    #[error("Debe agregar al menos una línea de producto.")]
    Empty,

    /// A line has no product selected.
    #[error("La línea {line} no tiene producto seleccionado.")]
    MissingProduct {
        /// 1-based line number.
        line: usize,
    },

    /// A line has quantity zero (including coerced invalid input).
    #[error("La línea {line} debe tener una cantidad mayor a cero.")]
    ZeroQuantity {
        /// 1-based line number.
        line: usize,
    },

    /// The backend has no vigent price for the product/date/tier.
    #[error("No se encontró precio vigente para {description}.")]
    NoCurrentPrice {
        /// Product name shown on the line.
        description: String,
    },

    /// The price lookup itself failed; the price is unknown, not zero.
    #[error("No se pudo consultar el precio de {description}.")]
    PriceLookupFailed {
        /// Product name shown on the line.
        description: String,
    },

    /// Requested quantity across all lines exceeds the aggregated stock.
    #[error("Stock insuficiente de {name}: solicitado {requested}, disponible {available}.")]
    StockExceeded {
        /// Product whose stock is short.
        product: ProductId,
        /// Product display name.
        name: String,
        /// Total quantity requested across lines.
        requested: u64,
        /// Quantity available across the route's lots.
        available: u64,
    },
}

/// Validate a draft against its lines and, when given, the available stock.
///
/// `stock` is the per-product aggregation of the selected route's lots; the
/// receipt form passes it so requested quantities are capped by what is on
/// the truck. Order and return forms pass `None` - they are not stock-bound.
///
/// Returns every problem found, in line order, stock checks last.
#[must_use]
pub fn validate_submission(
    editor: &LineItemEditor,
    stock: Option<&HashMap<ProductId, AggregatedStock>>,
) -> Vec<SubmissionError> {
    let mut errors = Vec::new();

    if editor.is_empty() {
        errors.push(SubmissionError::Empty);
        return errors;
    }

    for (index, line) in editor.lines().iter().enumerate() {
        let number = index + 1;
        if line.product().is_none() {
            errors.push(SubmissionError::MissingProduct { line: number });
            continue;
        }
        if line.quantity() == 0 {
            errors.push(SubmissionError::ZeroQuantity { line: number });
        }
        match line.price() {
            PriceLookup::Found(_) => {}
            PriceLookup::NotFound => errors.push(SubmissionError::NoCurrentPrice {
                description: line.description().to_owned(),
            }),
            PriceLookup::Failed | PriceLookup::Pending => {
                errors.push(SubmissionError::PriceLookupFailed {
                    description: line.description().to_owned(),
                });
            }
        }
    }

    if let Some(stock) = stock {
        for (product, requested) in editor.requested_by_product() {
            let available = stock.get(&product).map_or(0, |entry| entry.total_quantity);
            if requested > available {
                let name = stock.get(&product).map_or_else(
                    || {
                        editor
                            .lines()
                            .iter()
                            .find(|line| line.product() == Some(product))
                            .map_or_else(String::new, |line| line.description().to_owned())
                    },
                    |entry| entry.name.clone(),
                );
                errors.push(SubmissionError::StockExceeded {
                    product,
                    name,
                    requested,
                    available,
                });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn priced_editor(rows: &[(i32, &str, &str)]) -> LineItemEditor {
        let mut editor = LineItemEditor::new();
        for (product, name, quantity) in rows {
            let id = editor.add_line();
            editor.set_line_product(id, ProductId::new(*product), name);
            editor.set_line_price(id, PriceLookup::Found(dec!(10)));
            editor.set_line_quantity(id, quantity);
        }
        editor
    }

    fn stock_of(entries: &[(i32, &str, u64)]) -> HashMap<ProductId, AggregatedStock> {
        entries
            .iter()
            .map(|(product, name, quantity)| {
                (
                    ProductId::new(*product),
                    AggregatedStock {
                        product: ProductId::new(*product),
                        name: (*name).to_owned(),
                        total_quantity: *quantity,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_draft_is_rejected() {
        let editor = LineItemEditor::new();
        assert_eq!(
            validate_submission(&editor, None),
            vec![SubmissionError::Empty]
        );
    }

    #[test]
    fn test_valid_draft_passes() {
        let editor = priced_editor(&[(1, "Pan flauta", "3")]);
        assert!(validate_submission(&editor, None).is_empty());
    }

    #[test]
    fn test_missing_product_blocks_submission() {
        let mut editor = priced_editor(&[(1, "Pan flauta", "3")]);
        editor.add_line();
        let errors = validate_submission(&editor, None);
        assert_eq!(errors, vec![SubmissionError::MissingProduct { line: 2 }]);
    }

    #[test]
    fn test_zero_quantity_blocks_submission() {
        let editor = priced_editor(&[(1, "Pan flauta", "0")]);
        let errors = validate_submission(&editor, None);
        assert!(errors.contains(&SubmissionError::ZeroQuantity { line: 1 }));
    }

    #[test]
    fn test_price_states_reported_separately() {
        let mut editor = LineItemEditor::new();
        let a = editor.add_line();
        editor.set_line_product(a, ProductId::new(1), "Pan flauta");
        editor.set_line_price(a, PriceLookup::NotFound);
        editor.set_line_quantity(a, "2");
        let b = editor.add_line();
        editor.set_line_product(b, ProductId::new(2), "Facturas");
        editor.set_line_price(b, PriceLookup::Failed);
        editor.set_line_quantity(b, "1");

        let errors = validate_submission(&editor, None);
        assert_eq!(
            errors,
            vec![
                SubmissionError::NoCurrentPrice {
                    description: "Pan flauta".to_owned()
                },
                SubmissionError::PriceLookupFailed {
                    description: "Facturas".to_owned()
                },
            ]
        );
    }

    #[test]
    fn test_stock_quota_across_lines() {
        // Two lines of the same product: 4 + 6 requested, 6 available
        let editor = priced_editor(&[(1, "Pan flauta", "4"), (1, "Pan flauta", "6")]);
        let stock = stock_of(&[(1, "Pan flauta", 6)]);
        let errors = validate_submission(&editor, Some(&stock));
        assert_eq!(
            errors,
            vec![SubmissionError::StockExceeded {
                product: ProductId::new(1),
                name: "Pan flauta".to_owned(),
                requested: 10,
                available: 6,
            }]
        );
        // The message names the product and the available amount
        let message = errors.first().expect("error").to_string();
        assert!(message.contains("Pan flauta"));
        assert!(message.contains('6'));
    }

    #[test]
    fn test_stock_quota_satisfied() {
        let editor = priced_editor(&[(1, "Pan flauta", "2"), (2, "Facturas", "5")]);
        let stock = stock_of(&[(1, "Pan flauta", 2), (2, "Facturas", 5)]);
        assert!(validate_submission(&editor, Some(&stock)).is_empty());
    }

    #[test]
    fn test_product_absent_from_stock_has_zero_available() {
        let editor = priced_editor(&[(3, "Criollos", "1")]);
        let stock = stock_of(&[(1, "Pan flauta", 10)]);
        let errors = validate_submission(&editor, Some(&stock));
        assert_eq!(
            errors,
            vec![SubmissionError::StockExceeded {
                product: ProductId::new(3),
                name: "Criollos".to_owned(),
                requested: 1,
                available: 0,
            }]
        );
    }

    #[test]
    fn test_no_stock_check_without_stock() {
        let editor = priced_editor(&[(1, "Pan flauta", "999")]);
        assert!(validate_submission(&editor, None).is_empty());
    }
}
