//! Monetary resolution service
//!
//! Computes what a bike, order, quick service or receipt contributes to
//! revenue. A bike's service pricing may be stored in up to three legacy
//! shapes at once; each service name is priced by the first shape that knows
//! it (detail map, then flat map, then line list), so the same service is
//! never counted twice. Parts are always added on top.

use serde::Serialize;
use std::collections::HashSet;

use crate::types::{BikeEntry, PricingShape, Receipt, ServiceOrder, StandaloneServiceEntry};

/// Which stored shape priced a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Detail,
    Flat,
    Line,
}

impl ShapeKind {
    fn of(shape: &PricingShape) -> Self {
        match shape {
            PricingShape::DetailMap(_) => Self::Detail,
            PricingShape::FlatMap(_) => Self::Flat,
            PricingShape::LineList(_) => Self::Line,
        }
    }
}

/// A service priced once, in canonical form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedService {
    pub name: String,
    pub quantity: f64,
    pub total: f64,
    pub shape: ShapeKind,
}

/// Resolve a bike's services into canonical form, in first-seen name order.
pub fn resolve_services(bike: &BikeEntry) -> Vec<ResolvedService> {
    let mut resolved: Vec<ResolvedService> = Vec::new();

    for kind in [ShapeKind::Detail, ShapeKind::Flat, ShapeKind::Line] {
        // Names priced by a higher-priority shape are closed to this one
        let claimed: HashSet<String> = resolved.iter().map(|s| s.name.clone()).collect();

        for shape in bike.pricing.iter().filter(|s| ShapeKind::of(s) == kind) {
            for (name, quantity, unit) in shape_lines(bike, shape) {
                if claimed.contains(&name) {
                    continue;
                }
                match resolved.iter_mut().find(|s| s.name == name) {
                    // Repeated line for the same service within one shape
                    Some(existing) => {
                        existing.quantity += quantity;
                        existing.total += unit * quantity;
                    }
                    None => resolved.push(ResolvedService {
                        name,
                        quantity,
                        total: unit * quantity,
                        shape: kind,
                    }),
                }
            }
        }
    }

    resolved
}

/// (name, quantity, unit value) triples a single shape prices
fn shape_lines(bike: &BikeEntry, shape: &PricingShape) -> Vec<(String, f64, f64)> {
    match shape {
        PricingShape::DetailMap(details) => details
            .iter()
            .filter_map(|(name, d)| {
                let unit = d.final_value.or(d.base_value)?;
                let quantity = d.quantity.or_else(|| bike.quantity_of(name)).unwrap_or(1.0);
                Some((name.clone(), quantity, unit))
            })
            .collect(),
        PricingShape::FlatMap(prices) => prices
            .iter()
            .map(|(name, value)| {
                let quantity = bike.quantity_of(name).unwrap_or(1.0);
                (name.clone(), quantity, *value)
            })
            .collect(),
        PricingShape::LineList(lines) => lines
            .iter()
            .map(|line| (line.name.clone(), line.quantity.unwrap_or(1.0), line.value))
            .collect(),
    }
}

pub fn resolve_parts_total(bike: &BikeEntry) -> f64 {
    bike.parts
        .iter()
        .map(|p| p.value * p.quantity.unwrap_or(1.0))
        .sum()
}

pub fn resolve_bike_total(bike: &BikeEntry) -> f64 {
    let services: f64 = resolve_services(bike).iter().map(|s| s.total).sum();
    services + resolve_parts_total(bike)
}

/// Recomputed order total. Authoritative over the stored `declared_total`.
pub fn resolve_order_total(order: &ServiceOrder) -> f64 {
    order.bikes.iter().map(resolve_bike_total).sum()
}

pub fn resolve_standalone_total(entry: &StandaloneServiceEntry) -> f64 {
    entry.unit_value * entry.quantity
}

/// Stored total when present, else line items less discount (never negative)
pub fn resolve_receipt_total(receipt: &Receipt) -> f64 {
    receipt.total.unwrap_or_else(|| {
        let items: f64 = receipt
            .items
            .iter()
            .map(|i| i.quantity * i.unit_value)
            .sum();
        (items - receipt.discount).max(0.0)
    })
}

/// Disagreement between an order's stored total and its recomputation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalDrift {
    pub order_id: String,
    pub code: String,
    pub declared: f64,
    pub computed: f64,
    pub difference: f64,
}

pub fn declared_total_drift(order: &ServiceOrder, tolerance: f64) -> Option<TotalDrift> {
    let declared = order.declared_total?;
    let computed = resolve_order_total(order);
    let difference = declared - computed;
    (difference.abs() > tolerance).then(|| TotalDrift {
        order_id: order.id.clone(),
        code: order.code.clone(),
        declared,
        computed,
        difference,
    })
}

/// Orders whose stored total drifted from the recomputed one, largest first
pub fn audit_declared_totals(orders: &[ServiceOrder], tolerance: f64) -> Vec<TotalDrift> {
    let mut drifts: Vec<TotalDrift> = orders
        .iter()
        .filter_map(|o| declared_total_drift(o, tolerance))
        .collect();
    drifts.sort_by(|a, b| b.difference.abs().total_cmp(&a.difference.abs()));
    drifts
}
