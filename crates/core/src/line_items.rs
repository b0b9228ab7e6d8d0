//! The line-item editor behind the order, return and receipt forms.
//!
//! Every document form edits the same draft shape: an ordered list of
//! `{product, quantity, unit price, subtotal}` rows plus a derived total.
//! The editor owns that draft. It is deliberately free of I/O: resolving a
//! unit price means asking the backend, so the caller performs the lookup
//! and feeds the [`PriceLookup`] result back in.
//!
//! Invariants:
//! - `subtotal = quantity x unit_price` for every line, always.
//! - The total is derived from the lines on demand, never stored.
//! - Line IDs are handed out once and never reused within an editor, so an
//!   operation against a removed line is a no-op rather than a misdirected
//!   edit.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::pricing::PriceLookup;
use crate::types::{LineId, ProductId};

/// One draft row of an in-progress document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    id: LineId,
    product: Option<ProductId>,
    description: String,
    quantity: u32,
    price: PriceLookup,
}

impl LineItem {
    /// The editor-local identifier of this row.
    #[must_use]
    pub const fn id(&self) -> LineId {
        self.id
    }

    /// Selected product, if any.
    #[must_use]
    pub const fn product(&self) -> Option<ProductId> {
        self.product
    }

    /// Product name snapshot taken when the product was selected.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Requested quantity.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// State of the last price lookup for this row.
    #[must_use]
    pub const fn price(&self) -> PriceLookup {
        self.price
    }

    /// Unit price used for arithmetic and display.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.price.unit_price()
    }

    /// `quantity x unit_price`, recomputed from its inputs.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price.unit_price()
    }
}

/// Ordered collection of draft lines with consistent subtotals.
#[derive(Debug, Clone, Default)]
pub struct LineItemEditor {
    next_id: u32,
    lines: Vec<LineItem>,
}

impl LineItemEditor {
    /// Create an empty editor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            lines: Vec::new(),
        }
    }

    /// Append an empty line (no product, zero quantity and price).
    ///
    /// Always succeeds and returns the new line's ID.
    pub fn add_line(&mut self) -> LineId {
        let id = LineId::new(self.next_id);
        self.next_id += 1;
        self.lines.push(LineItem {
            id,
            product: None,
            description: String::new(),
            quantity: 0,
            price: PriceLookup::Pending,
        });
        id
    }

    /// Remove a line. Removing an already-removed line is a no-op.
    pub fn remove_line(&mut self, id: LineId) {
        self.lines.retain(|line| line.id != id);
    }

    /// Select a product on a line, snapshotting its display name.
    ///
    /// The price state resets to [`PriceLookup::Pending`]; the caller is
    /// expected to resolve the vigent price and apply it with
    /// [`set_line_price`](Self::set_line_price).
    pub fn set_line_product(&mut self, id: LineId, product: ProductId, description: &str) {
        if let Some(line) = self.line_mut(id) {
            line.product = Some(product);
            line.description = description.to_owned();
            line.price = PriceLookup::Pending;
        }
    }

    /// Set a line's quantity from raw form input.
    ///
    /// Anything that does not parse as a non-negative integer (including
    /// negative numbers) coerces to 0.
    pub fn set_line_quantity(&mut self, id: LineId, raw: &str) {
        let quantity = parse_quantity(raw);
        if let Some(line) = self.line_mut(id) {
            line.quantity = quantity;
        }
    }

    /// Record the result of a price lookup for a line.
    pub fn set_line_price(&mut self, id: LineId, price: PriceLookup) {
        if let Some(line) = self.line_mut(id) {
            line.price = price;
        }
    }

    /// Re-price every line that has a product, e.g. after a tier switch.
    ///
    /// Quantities and product selections are untouched. A line whose product
    /// is missing from `prices` is marked [`PriceLookup::Failed`] rather
    /// than keeping a price from the old tier.
    pub fn apply_prices(&mut self, prices: &HashMap<ProductId, PriceLookup>) {
        for line in &mut self.lines {
            if let Some(product) = line.product {
                line.price = prices.get(&product).copied().unwrap_or(PriceLookup::Failed);
            }
        }
    }

    /// Look up a line by ID.
    #[must_use]
    pub fn line(&self, id: LineId) -> Option<&LineItem> {
        self.lines.iter().find(|line| line.id == id)
    }

    /// All lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Whether the editor has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all line subtotals. Derived, never cached.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(LineItem::subtotal).sum()
    }

    /// Total quantity requested per product across all lines.
    ///
    /// Used to check requested quantities against aggregated stock. The map
    /// is ordered by product ID so validation errors come out in a stable
    /// order.
    #[must_use]
    pub fn requested_by_product(&self) -> BTreeMap<ProductId, u64> {
        let mut requested = BTreeMap::new();
        for line in &self.lines {
            if let Some(product) = line.product {
                *requested.entry(product).or_insert(0) += u64::from(line.quantity);
            }
        }
        requested
    }

    fn line_mut(&mut self, id: LineId) -> Option<&mut LineItem> {
        self.lines.iter_mut().find(|line| line.id == id)
    }
}

/// Parse raw quantity input; invalid or negative input coerces to 0.
#[must_use]
pub fn parse_quantity(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn editor_with_priced_line(price: Decimal, quantity: &str) -> (LineItemEditor, LineId) {
        let mut editor = LineItemEditor::new();
        let id = editor.add_line();
        editor.set_line_product(id, ProductId::new(1), "Pan flauta");
        editor.set_line_price(id, PriceLookup::Found(price));
        editor.set_line_quantity(id, quantity);
        (editor, id)
    }

    #[test]
    fn test_new_line_is_zeroed() {
        let mut editor = LineItemEditor::new();
        let id = editor.add_line();
        let line = editor.line(id).expect("line exists");
        assert_eq!(line.product(), None);
        assert_eq!(line.quantity(), 0);
        assert_eq!(line.subtotal(), Decimal::ZERO);
        assert_eq!(editor.total(), Decimal::ZERO);
    }

    #[test]
    fn test_subtotal_is_quantity_times_price() {
        let (editor, id) = editor_with_priced_line(dec!(12.50), "4");
        assert_eq!(editor.line(id).expect("line").subtotal(), dec!(50.00));
        assert_eq!(editor.total(), dec!(50.00));
    }

    #[test]
    fn test_total_tracks_every_edit() {
        let mut editor = LineItemEditor::new();
        let a = editor.add_line();
        let b = editor.add_line();
        editor.set_line_product(a, ProductId::new(1), "Pan flauta");
        editor.set_line_price(a, PriceLookup::Found(dec!(10)));
        editor.set_line_quantity(a, "3");
        editor.set_line_product(b, ProductId::new(2), "Facturas");
        editor.set_line_price(b, PriceLookup::Found(dec!(5.5)));
        editor.set_line_quantity(b, "2");
        assert_eq!(editor.total(), dec!(41.0));

        editor.set_line_quantity(a, "1");
        assert_eq!(editor.total(), dec!(21.0));

        editor.remove_line(b);
        assert_eq!(editor.total(), dec!(10.0));

        // Total always equals the sum of present lines' subtotals
        let sum: Decimal = editor.lines().iter().map(LineItem::subtotal).sum();
        assert_eq!(editor.total(), sum);
    }

    #[test]
    fn test_invalid_quantity_coerces_to_zero() {
        for raw in ["", "abc", "-3", "1.5", "  "] {
            let (editor, id) = editor_with_priced_line(dec!(10), raw);
            let line = editor.line(id).expect("line");
            assert_eq!(line.quantity(), 0, "input {raw:?}");
            assert_eq!(line.subtotal(), Decimal::ZERO, "input {raw:?}");
        }
    }

    #[test]
    fn test_remove_line_is_idempotent() {
        let mut editor = LineItemEditor::new();
        let id = editor.add_line();
        editor.remove_line(id);
        editor.remove_line(id);
        assert!(editor.is_empty());
        // Edits against the removed line are no-ops
        editor.set_line_quantity(id, "5");
        assert!(editor.is_empty());
    }

    #[test]
    fn test_line_ids_never_reused() {
        let mut editor = LineItemEditor::new();
        let first = editor.add_line();
        editor.remove_line(first);
        let second = editor.add_line();
        assert_ne!(first, second);
    }

    #[test]
    fn test_selecting_product_resets_price() {
        let (mut editor, id) = editor_with_priced_line(dec!(10), "2");
        editor.set_line_product(id, ProductId::new(9), "Pan lactal");
        let line = editor.line(id).expect("line");
        assert_eq!(line.price(), PriceLookup::Pending);
        assert_eq!(line.subtotal(), Decimal::ZERO);
        // Quantity survives the product change
        assert_eq!(line.quantity(), 2);
    }

    #[test]
    fn test_apply_prices_keeps_products_and_quantities() {
        let mut editor = LineItemEditor::new();
        let a = editor.add_line();
        let b = editor.add_line();
        editor.set_line_product(a, ProductId::new(1), "Pan flauta");
        editor.set_line_price(a, PriceLookup::Found(dec!(10)));
        editor.set_line_quantity(a, "3");
        editor.set_line_product(b, ProductId::new(2), "Facturas");
        editor.set_line_price(b, PriceLookup::Found(dec!(4)));
        editor.set_line_quantity(b, "5");

        // Tier switch: new prices for both products
        let prices = HashMap::from([
            (ProductId::new(1), PriceLookup::Found(dec!(12))),
            (ProductId::new(2), PriceLookup::NotFound),
        ]);
        editor.apply_prices(&prices);

        let line_a = editor.line(a).expect("line a");
        assert_eq!(line_a.product(), Some(ProductId::new(1)));
        assert_eq!(line_a.quantity(), 3);
        assert_eq!(line_a.subtotal(), dec!(36));

        let line_b = editor.line(b).expect("line b");
        assert_eq!(line_b.price(), PriceLookup::NotFound);
        assert_eq!(line_b.subtotal(), Decimal::ZERO);

        assert_eq!(editor.total(), dec!(36));
    }

    #[test]
    fn test_apply_prices_marks_missing_products_failed() {
        let mut editor = LineItemEditor::new();
        let id = editor.add_line();
        editor.set_line_product(id, ProductId::new(7), "Criollos");
        editor.set_line_price(id, PriceLookup::Found(dec!(8)));
        editor.apply_prices(&HashMap::new());
        assert_eq!(editor.line(id).expect("line").price(), PriceLookup::Failed);
    }

    #[test]
    fn test_requested_by_product_sums_across_lines() {
        let mut editor = LineItemEditor::new();
        for (product, qty) in [(1, "3"), (1, "2"), (2, "5")] {
            let id = editor.add_line();
            editor.set_line_product(id, ProductId::new(product), "x");
            editor.set_line_quantity(id, qty);
        }
        let requested = editor.requested_by_product();
        assert_eq!(requested.get(&ProductId::new(1)), Some(&5));
        assert_eq!(requested.get(&ProductId::new(2)), Some(&5));
    }
}
