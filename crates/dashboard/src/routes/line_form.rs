//! Parsing and rebuilding of line-item forms.
//!
//! The document forms (orders, returns, receipts) post repeated fields -
//! one `producto_id` and one `cantidad` per row, plus a hidden `linea_id`
//! on edit forms. `axum::Form` cannot express repeated keys, so the raw
//! body is parsed here and the rows are paired up by position.

use std::collections::HashMap;

use rust_decimal::Decimal;
use url::form_urlencoded;

use espiga_core::line_items::LineItemEditor;
use espiga_core::pricing::PriceLookup;
use espiga_core::types::{ProductId, format_currency};

use crate::backend::types::{NewLinea, Producto};

/// All key/value pairs of a form body, in submission order.
#[derive(Debug)]
pub struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    /// Parse a `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let pairs = form_urlencoded::parse(bytes)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value for a key, if present.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for a key, in order.
    #[must_use]
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Reassemble the form's line rows.
    ///
    /// Row count follows the longest of the repeated fields, so a row with
    /// an unselected product (empty `producto_id`) still occupies its slot.
    #[must_use]
    pub fn line_rows(&self) -> Vec<LineRowInput> {
        let linea_ids = self.values("linea_id");
        let productos = self.values("producto_id");
        let cantidades = self.values("cantidad");

        let count = productos.len().max(cantidades.len());
        (0..count)
            .map(|index| LineRowInput {
                linea_id: linea_ids
                    .get(index)
                    .and_then(|raw| raw.parse::<i32>().ok()),
                producto_id: productos
                    .get(index)
                    .and_then(|raw| raw.parse::<i32>().ok())
                    .map(ProductId::new),
                cantidad: cantidades
                    .get(index)
                    .map_or_else(String::new, |raw| (*raw).to_string()),
            })
            .collect()
    }
}

/// One submitted row, before price resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRowInput {
    /// Backend line ID carried through edit forms; `None` for new rows.
    pub linea_id: Option<i32>,
    /// Selected product, if any.
    pub producto_id: Option<ProductId>,
    /// Raw quantity input, coerced later by the editor.
    pub cantidad: String,
}

/// Build an editor from submitted rows, attaching resolved prices.
///
/// `prices` maps each product to its authoritative lookup result for the
/// document's date and tier; products absent from the catalog are left
/// unselected so validation reports them.
#[must_use]
pub fn build_editor(
    rows: &[LineRowInput],
    productos: &[Producto],
    prices: &HashMap<ProductId, PriceLookup>,
) -> LineItemEditor {
    let names: HashMap<ProductId, &str> = productos
        .iter()
        .map(|producto| (producto.id, producto.nombre.as_str()))
        .collect();

    let mut editor = LineItemEditor::new();
    for row in rows {
        let id = editor.add_line();
        if let Some(producto_id) = row.producto_id {
            if let Some(nombre) = names.get(&producto_id) {
                editor.set_line_product(id, producto_id, nombre);
                let price = prices.get(&producto_id).copied().unwrap_or(PriceLookup::Failed);
                editor.set_line_price(id, price);
            }
        }
        editor.set_line_quantity(id, &row.cantidad);
    }
    editor
}

/// Products referenced by the submitted rows, deduplicated.
#[must_use]
pub fn requested_products(rows: &[LineRowInput]) -> Vec<ProductId> {
    let mut seen = Vec::new();
    for row in rows {
        if let Some(producto_id) = row.producto_id {
            if !seen.contains(&producto_id) {
                seen.push(producto_id);
            }
        }
    }
    seen
}

/// Convert a validated editor into backend line payloads.
///
/// Lines without a product are skipped; validation has already rejected
/// drafts where that matters.
#[must_use]
pub fn editor_to_lineas(editor: &LineItemEditor) -> Vec<NewLinea> {
    editor
        .lines()
        .iter()
        .filter_map(|line| {
            line.product().map(|producto_id| NewLinea {
                producto_id,
                cantidad: line.quantity(),
                precio_unitario: line.unit_price(),
                subtotal: line.subtotal(),
                descripcion: line.description().to_owned(),
            })
        })
        .collect()
}

/// One row as the templates render it.
#[derive(Debug, Clone)]
pub struct LineView {
    /// Backend line ID for edit forms.
    pub linea_id: Option<i32>,
    /// Selected product.
    pub producto_id: Option<i32>,
    /// Quantity as entered (already coerced).
    pub cantidad: u32,
    /// Formatted unit price.
    pub precio: String,
    /// Formatted subtotal.
    pub subtotal: String,
    /// Whether the price lookup came back without a usable price.
    pub sin_precio: bool,
}

impl LineView {
    /// Whether `id` is this row's selected product. Used by the templates.
    #[must_use]
    pub fn producto_selected(&self, id: i32) -> bool {
        self.producto_id == Some(id)
    }
}

/// Pair the editor's lines back with their submitted row metadata.
#[must_use]
pub fn line_views(editor: &LineItemEditor, rows: &[LineRowInput]) -> Vec<LineView> {
    editor
        .lines()
        .iter()
        .zip(rows.iter())
        .map(|(line, row)| LineView {
            linea_id: row.linea_id,
            producto_id: line.product().map(ProductId::as_i32),
            cantidad: line.quantity(),
            precio: format_currency(line.unit_price()),
            subtotal: format_currency(line.subtotal()),
            sin_precio: !line.price().is_found() && line.product().is_some(),
        })
        .collect()
}

/// Formatted grand total of the draft.
#[must_use]
pub fn total_view(editor: &LineItemEditor) -> String {
    format_currency(editor.total())
}

/// Parse an optional decimal form field.
#[must_use]
pub fn parse_decimal(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            trimmed.parse::<Decimal>().ok()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn producto(id: i32, nombre: &str) -> Producto {
        Producto {
            id: ProductId::new(id),
            nombre: nombre.to_string(),
            peso: None,
        }
    }

    #[test]
    fn test_form_values_repeated_fields_keep_order() {
        let body = b"cliente_id=4&producto_id=1&cantidad=3&producto_id=2&cantidad=5";
        let form = FormValues::parse(body);
        assert_eq!(form.value("cliente_id"), Some("4"));
        assert_eq!(form.values("producto_id"), vec!["1", "2"]);

        let rows = form.line_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].producto_id, Some(ProductId::new(1)));
        assert_eq!(rows[0].cantidad, "3");
        assert_eq!(rows[1].producto_id, Some(ProductId::new(2)));
    }

    #[test]
    fn test_line_rows_with_unselected_product() {
        let body = b"producto_id=&cantidad=3&producto_id=2&cantidad=1";
        let form = FormValues::parse(body);
        let rows = form.line_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].producto_id, None);
        assert_eq!(rows[1].producto_id, Some(ProductId::new(2)));
    }

    #[test]
    fn test_line_rows_carry_linea_ids_on_edit() {
        let body = b"linea_id=10&producto_id=1&cantidad=3&linea_id=&producto_id=2&cantidad=1";
        let form = FormValues::parse(body);
        let rows = form.line_rows();
        assert_eq!(rows[0].linea_id, Some(10));
        assert_eq!(rows[1].linea_id, None);
    }

    #[test]
    fn test_build_editor_resolves_names_and_prices() {
        let productos = [producto(1, "Pan flauta"), producto(2, "Facturas")];
        let rows = vec![
            LineRowInput {
                linea_id: None,
                producto_id: Some(ProductId::new(1)),
                cantidad: "4".to_string(),
            },
            LineRowInput {
                linea_id: None,
                producto_id: Some(ProductId::new(2)),
                cantidad: "x".to_string(),
            },
        ];
        let prices = HashMap::from([
            (ProductId::new(1), PriceLookup::Found(dec!(10))),
            (ProductId::new(2), PriceLookup::NotFound),
        ]);

        let editor = build_editor(&rows, &productos, &prices);
        assert_eq!(editor.lines().len(), 2);
        assert_eq!(editor.lines()[0].description(), "Pan flauta");
        assert_eq!(editor.lines()[0].subtotal(), dec!(40));
        // Invalid quantity coerced to zero
        assert_eq!(editor.lines()[1].quantity(), 0);
        assert_eq!(editor.total(), dec!(40));
    }

    #[test]
    fn test_build_editor_unknown_product_stays_unselected() {
        let productos = [producto(1, "Pan flauta")];
        let rows = vec![LineRowInput {
            linea_id: None,
            producto_id: Some(ProductId::new(99)),
            cantidad: "1".to_string(),
        }];
        let editor = build_editor(&rows, &productos, &HashMap::new());
        assert_eq!(editor.lines()[0].product(), None);
    }

    #[test]
    fn test_editor_to_lineas_skips_productless_rows() {
        let productos = [producto(1, "Pan flauta")];
        let rows = vec![
            LineRowInput {
                linea_id: None,
                producto_id: Some(ProductId::new(1)),
                cantidad: "2".to_string(),
            },
            LineRowInput {
                linea_id: None,
                producto_id: None,
                cantidad: "9".to_string(),
            },
        ];
        let prices = HashMap::from([(ProductId::new(1), PriceLookup::Found(dec!(7.5)))]);
        let editor = build_editor(&rows, &productos, &prices);

        let lineas = editor_to_lineas(&editor);
        assert_eq!(lineas.len(), 1);
        assert_eq!(lineas[0].subtotal, dec!(15.0));
        assert_eq!(lineas[0].descripcion, "Pan flauta");
    }

    #[test]
    fn test_requested_products_dedups() {
        let rows = vec![
            LineRowInput {
                linea_id: None,
                producto_id: Some(ProductId::new(1)),
                cantidad: "1".to_string(),
            },
            LineRowInput {
                linea_id: None,
                producto_id: Some(ProductId::new(1)),
                cantidad: "2".to_string(),
            },
            LineRowInput {
                linea_id: None,
                producto_id: Some(ProductId::new(2)),
                cantidad: "3".to_string(),
            },
        ];
        assert_eq!(
            requested_products(&rows),
            vec![ProductId::new(1), ProductId::new(2)]
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(Some("12.5")), Some(dec!(12.5)));
        assert_eq!(parse_decimal(Some("  ")), None);
        assert_eq!(parse_decimal(Some("abc")), None);
        assert_eq!(parse_decimal(None), None);
    }
}
