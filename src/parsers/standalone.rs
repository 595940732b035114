//! Quick-service (standalone entry) parser

use serde_json::Value;

use crate::services::normalizer::{
    date_field, field, opt_number_field, record_id, text, text_field,
};
use crate::types::{RawRecord, StandaloneServiceEntry};

use super::RecordParser;

/// Newer entries are stamped `timestamp`, older ones `createdAt`/`data`
pub const STANDALONE_DATE_FIELDS: &[&str] = &["timestamp", "createdAt", "data", "dataCriacao"];

const QUANTITY: &[&str] = &["quantity", "quantidade", "qtd"];
const UNIT_VALUE: &[&str] = &["unitValue", "valorUnitario", "valor", "value", "preco"];

pub struct StandaloneParser;

impl RecordParser for StandaloneParser {
    type Output = StandaloneServiceEntry;

    fn name(&self) -> &str {
        "standalone"
    }

    fn parse_record(&self, record: &RawRecord) -> Option<StandaloneServiceEntry> {
        if record.is_empty() {
            return None;
        }

        let quantity = opt_number_field(record, QUANTITY)
            .filter(|q| *q >= 1.0)
            .unwrap_or(1.0);

        // Some entries only kept the line total
        let unit_value = match opt_number_field(record, UNIT_VALUE) {
            Some(v) => v,
            None => opt_number_field(record, &["total", "valorTotal"]).unwrap_or(0.0) / quantity,
        };

        Some(StandaloneServiceEntry {
            id: record_id(record),
            mechanic_id: mechanic_id(record),
            service_name: text_field(record, &["serviceName", "servico", "nomeServico", "service"]),
            quantity,
            unit_value,
            timestamp: date_field(record, STANDALONE_DATE_FIELDS),
            observations: text_field(record, &["observations", "observacoes", "obs"]),
        })
    }
}

/// Mechanic is an id string, or an embedded `{id, name}` object
fn mechanic_id(record: &RawRecord) -> String {
    match field(record, &["mechanicId", "mecanicoId", "mechanic", "mecanico"]) {
        Some(Value::Object(obj)) => text_field(obj, &["id", "_id", "uid"]),
        other => text(other),
    }
}
