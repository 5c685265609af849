use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gala_core::WorkflowError;
use gala_shared::money::{is_minor_exact, percent_of, round_minor};

use crate::models::QuoteItem;

/// Vendor-supplied line item, before pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuoteItem {
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount_percentage: Decimal,
}

/// Quote-level amounts, all at minor-unit precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
}

fn percentage_in_range(value: Decimal, what: &str) -> Result<(), WorkflowError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(WorkflowError::validation(format!(
            "{what} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

fn validate_item(item: &NewQuoteItem) -> Result<(), WorkflowError> {
    if item.name.trim().is_empty() {
        return Err(WorkflowError::validation("item name must not be empty"));
    }
    if item.quantity <= Decimal::ZERO {
        return Err(WorkflowError::validation(format!(
            "item '{}': quantity must be positive",
            item.name
        )));
    }
    if item.unit_price < Decimal::ZERO {
        return Err(WorkflowError::validation(format!(
            "item '{}': unit price must not be negative",
            item.name
        )));
    }
    if !is_minor_exact(item.unit_price) {
        return Err(WorkflowError::validation(format!(
            "item '{}': unit price has sub-minor-unit digits",
            item.name
        )));
    }
    percentage_in_range(item.discount_percentage, "item discount percentage")
}

/// `quantity * unit_price * (1 - discount/100)`, rounded to minor units.
pub fn line_total(quantity: Decimal, unit_price: Decimal, discount_percentage: Decimal) -> Decimal {
    let gross = quantity * unit_price;
    round_minor(gross - gross * discount_percentage / Decimal::ONE_HUNDRED)
}

/// Validate and price the given items. Returns the priced lines and their
/// subtotal.
pub fn price_items(items: &[NewQuoteItem]) -> Result<(Vec<QuoteItem>, Decimal), WorkflowError> {
    if items.is_empty() {
        return Err(WorkflowError::validation("a quote requires at least one item"));
    }

    let mut priced = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    for item in items {
        validate_item(item)?;
        let total = line_total(item.quantity, item.unit_price, item.discount_percentage);
        subtotal += total;
        priced.push(QuoteItem {
            id: Uuid::new_v4(),
            name: item.name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount_percentage: item.discount_percentage,
            line_total: total,
        });
    }
    Ok((priced, subtotal))
}

/// Derive tax, total and deposit from a subtotal. The identity
/// `total = subtotal - discount + tax` holds exactly; tax applies to the
/// subtotal before the quote-level discount.
pub fn compute_totals(
    subtotal: Decimal,
    tax_rate: Decimal,
    discount_amount: Decimal,
    deposit_percentage: Decimal,
) -> Result<QuoteTotals, WorkflowError> {
    percentage_in_range(tax_rate, "tax rate")?;
    percentage_in_range(deposit_percentage, "deposit percentage")?;
    if discount_amount < Decimal::ZERO {
        return Err(WorkflowError::validation("discount must not be negative"));
    }
    if !is_minor_exact(discount_amount) {
        return Err(WorkflowError::validation(
            "discount has sub-minor-unit digits",
        ));
    }
    if discount_amount > subtotal {
        return Err(WorkflowError::invariant(format!(
            "discount {discount_amount} exceeds subtotal {subtotal}"
        )));
    }

    let tax_amount = percent_of(subtotal, tax_rate);
    let total_amount = subtotal - discount_amount + tax_amount;
    let deposit_amount = percent_of(total_amount, deposit_percentage);

    Ok(QuoteTotals { subtotal, tax_amount, total_amount, deposit_amount })
}
