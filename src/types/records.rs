//! Operational record types read from the record store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loosely-typed record as delivered by the store
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Operational state of a service order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Done,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [Self::Pending, Self::InProgress, Self::Done];

    /// Map a raw stored status onto the closed set.
    ///
    /// Case, accents, spaces, hyphens and underscores are ignored. Anything
    /// unrecognised (including an empty string) is treated as `Pending`.
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .map(fold_accent)
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "inprogress" | "emandamento" | "andamento" | "emprogresso" | "started"
            | "working" | "emexecucao" => Self::InProgress,
            "done" | "completed" | "complete" | "finished" | "concluido" | "concluida"
            | "finalizado" | "finalizada" | "entregue" => Self::Done,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'Á' | 'À' | 'Â' | 'Ã' => 'a',
        'é' | 'ê' | 'É' | 'Ê' => 'e',
        'í' | 'Í' => 'i',
        'ó' | 'ô' | 'õ' | 'Ó' | 'Ô' | 'Õ' => 'o',
        'ú' | 'Ú' => 'u',
        'ç' | 'Ç' => 'c',
        other => other,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Per-service detail of pricing shape (a)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub base_value: Option<f64>,
    pub final_value: Option<f64>,
    pub quantity: Option<f64>,
}

/// One line of pricing shape (c)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub name: String,
    pub value: f64,
    pub quantity: Option<f64>,
}

/// The historical ways a bike's service pricing has been stored.
///
/// A single bike may carry more than one shape; resolution picks the first
/// shape that prices a given service name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PricingShape {
    /// name → `{baseValue, finalValue, quantity}`
    DetailMap(Vec<(String, ServiceDetail)>),
    /// name → value
    FlatMap(Vec<(String, f64)>),
    /// list of self-contained service lines
    LineList(Vec<ServiceLine>),
}

impl PricingShape {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::DetailMap(m) => m.is_empty(),
            Self::FlatMap(m) => m.is_empty(),
            Self::LineList(l) => l.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub value: f64,
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BikeEntry {
    pub brand: String,
    pub model: String,
    pub color: String,
    /// Service name → quantity, shared by the detail and flat shapes
    pub quantities: Vec<(String, f64)>,
    pub pricing: Vec<PricingShape>,
    pub parts: Vec<Part>,
}

impl BikeEntry {
    pub fn quantity_of(&self, service: &str) -> Option<f64> {
        self.quantities
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, q)| *q)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: String,
    pub code: String,
    pub client: Client,
    pub status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub observations: String,
    /// Mechanic assigned to the whole order, when recorded
    pub mechanic_id: Option<String>,
    pub bikes: Vec<BikeEntry>,
    /// Total stored on the record. Display-only; never aggregated.
    pub declared_total: Option<f64>,
}

impl ServiceOrder {
    /// Date used to place a completed order in time:
    /// completion, else last update, else creation.
    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.updated_at).or(self.created_at)
    }
}

/// Billable work not attached to any order ("quick service")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandaloneServiceEntry {
    pub id: String,
    pub mechanic_id: String,
    pub service_name: String,
    pub quantity: f64,
    pub unit_value: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub observations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub description: String,
    pub quantity: f64,
    pub unit_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub number: String,
    pub client: Client,
    pub order_id: Option<String>,
    pub items: Vec<ReceiptItem>,
    pub discount: f64,
    pub total: Option<f64>,
    pub payment_method: String,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mechanic {
    pub id: String,
    pub name: String,
}
