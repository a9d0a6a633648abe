//! Inventory ledger: cart validation against stock.
//!
//! Validation is pure. It resolves each requested codename against the
//! products loaded by the caller and either yields priced lines grouped by
//! shop, or a map of per-line errors. Stock is only decremented later, by the
//! store, inside the placement transaction.

use std::collections::BTreeMap;

use harvest_core::{Codename, ShopId};

use crate::models::{NewOrderLine, NewShopOrder, Product};

/// A cart line as requested by the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Product codename exactly as sent.
    pub codename: String,
    /// Units requested.
    pub quantity: i32,
}

/// Per-line errors keyed by the requested codename.
pub type LineErrors = BTreeMap<String, String>;

/// A cart after duplicate lines have been merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    /// One line per distinct codename, in first-seen order.
    pub lines: Vec<CartLine>,
    /// Codenames with a non-positive quantity on any requested line.
    pub rejected: LineErrors,
}

impl Cart {
    /// Check the merged lines against `products`.
    ///
    /// A codename rejected during merging fails the cart even when its
    /// merged quantity would be valid.
    ///
    /// # Errors
    ///
    /// Returns every failing codename at once.
    pub fn check(&self, products: &[Product]) -> Result<Vec<(ShopId, NewOrderLine)>, LineErrors> {
        let checked = check_lines(&self.lines, products);
        if self.rejected.is_empty() {
            return checked;
        }

        let mut errors = checked.err().unwrap_or_default();
        for (codename, message) in &self.rejected {
            errors
                .entry(codename.clone())
                .or_insert_with(|| message.clone());
        }
        Err(errors)
    }
}

/// Sum the quantities of lines that name the same product.
///
/// Each requested line must carry at least one unit on its own, so a negative
/// line cannot cancel out part of another. First-seen order is kept so error
/// maps and line order stay predictable.
#[must_use]
pub fn merge_lines(lines: Vec<CartLine>) -> Cart {
    let mut cart = Cart::default();
    for line in lines {
        if line.quantity < 1 {
            cart.rejected
                .insert(line.codename.clone(), "quantity must be at least 1".to_string());
        }
        match cart.lines.iter_mut().find(|m| m.codename == line.codename) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => cart.lines.push(line),
        }
    }
    cart
}

/// Codenames worth looking up; malformed ones cannot match any product.
#[must_use]
pub fn lookup_codenames(lines: &[CartLine]) -> Vec<Codename> {
    lines
        .iter()
        .filter_map(|line| Codename::parse(&line.codename).ok())
        .collect()
}

/// Check every line against `products`.
///
/// # Errors
///
/// Returns every failing line at once. A single bad line fails the cart.
pub fn check_lines(lines: &[CartLine], products: &[Product]) -> Result<Vec<(ShopId, NewOrderLine)>, LineErrors> {
    let mut errors = LineErrors::new();
    let mut resolved = Vec::with_capacity(lines.len());

    for line in lines {
        let product = products
            .iter()
            .find(|p| p.codename.as_str() == line.codename);

        let outcome = match product {
            None => Err("product not found".to_string()),
            Some(_) if line.quantity < 1 => Err("quantity must be at least 1".to_string()),
            Some(p) if !p.public => Err("product is not available".to_string()),
            Some(p) if line.quantity > p.quantity => {
                Err(format!("product only has {} available units", p.quantity))
            }
            Some(p) => Ok((
                p.shop_id,
                NewOrderLine {
                    product_id: p.id,
                    codename: p.codename.clone(),
                    quantity: line.quantity,
                    unit_price: p.price,
                },
            )),
        };

        match outcome {
            Ok(line) => resolved.push(line),
            Err(message) => {
                errors.insert(line.codename.clone(), message);
            }
        }
    }

    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(errors)
    }
}

/// Group validated lines into one shop-order per shop.
#[must_use]
pub fn group_by_shop(lines: Vec<(ShopId, NewOrderLine)>) -> Vec<NewShopOrder> {
    let mut shops: Vec<NewShopOrder> = Vec::new();
    for (shop_id, line) in lines {
        match shops.iter_mut().find(|so| so.shop_id == shop_id) {
            Some(shop_order) => shop_order.lines.push(line),
            None => shops.push(NewShopOrder {
                shop_id,
                lines: vec![line],
            }),
        }
    }
    shops
}
