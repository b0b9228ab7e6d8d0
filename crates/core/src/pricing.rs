//! Price tiers and price-lookup results.
//!
//! The backend resolves a "precio vigente" - the unit price applicable to a
//! product on a date under a named tier. The lookup is performed by the
//! dashboard crate; this module only defines the vocabulary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Named pricing tier understood by the backend's price lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PriceTier {
    /// "reventa" - resale price for shops buying to re-sell.
    #[default]
    Resale,
    /// "consumidor final" - end-consumer price.
    EndConsumer,
}

impl PriceTier {
    /// The tier name as the backend expects it in the lookup query.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Resale => "reventa",
            Self::EndConsumer => "consumidor final",
        }
    }

    /// Parse a tier from a form value. Unknown values fall back to resale,
    /// matching the forms' default selection.
    #[must_use]
    pub fn from_form_value(value: &str) -> Self {
        match value {
            "consumidor final" | "consumidor-final" => Self::EndConsumer,
            _ => Self::Resale,
        }
    }
}

/// Outcome of a unit-price lookup.
///
/// The original dashboard collapsed "no price configured" and "the lookup
/// blew up" into a unit price of 0, which made a free item indistinguishable
/// from a failure. The three states keep them apart; display code may still
/// render both as $0.00, but validation reports them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PriceLookup {
    /// A price is configured for the product/date/tier.
    Found(Decimal),
    /// The backend answered, but no price applies.
    NotFound,
    /// The lookup itself failed (transport error, backend fault).
    Failed,
    /// No lookup attempted yet (line has no product selected).
    #[default]
    Pending,
}

impl PriceLookup {
    /// Unit price for display and subtotal arithmetic.
    ///
    /// Anything but `Found` contributes 0; whether that blocks submission is
    /// decided by validation, not here.
    #[must_use]
    pub fn unit_price(self) -> Decimal {
        match self {
            Self::Found(price) => price,
            Self::NotFound | Self::Failed | Self::Pending => Decimal::ZERO,
        }
    }

    /// Whether a successful lookup produced this state.
    #[must_use]
    pub const fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_wire_names() {
        assert_eq!(PriceTier::Resale.wire_name(), "reventa");
        assert_eq!(PriceTier::EndConsumer.wire_name(), "consumidor final");
    }

    #[test]
    fn test_tier_from_form_value() {
        assert_eq!(PriceTier::from_form_value("reventa"), PriceTier::Resale);
        assert_eq!(
            PriceTier::from_form_value("consumidor final"),
            PriceTier::EndConsumer
        );
        // Unknown input keeps the default tier
        assert_eq!(PriceTier::from_form_value("mayorista"), PriceTier::Resale);
    }

    #[test]
    fn test_unit_price_zero_unless_found() {
        assert_eq!(PriceLookup::Found(dec!(12.5)).unit_price(), dec!(12.5));
        assert_eq!(PriceLookup::NotFound.unit_price(), Decimal::ZERO);
        assert_eq!(PriceLookup::Failed.unit_price(), Decimal::ZERO);
        assert_eq!(PriceLookup::Pending.unit_price(), Decimal::ZERO);
    }
}
