//! Parsers turning raw store records into typed records

mod mechanic;
mod order;
mod receipt;
mod standalone;

pub use mechanic::MechanicParser;
pub use order::{OrderParser, ORDER_DATE_FIELDS};
pub use receipt::{ReceiptParser, RECEIPT_DATE_FIELDS};
pub use standalone::{StandaloneParser, STANDALONE_DATE_FIELDS};

use crate::services::normalizer::{field, text, text_field};
use crate::types::{Client, RawRecord};
use rayon::prelude::*;
use serde_json::Value;

/// Trait for parsing one kind of loosely-typed record
pub trait RecordParser: Send + Sync {
    type Output: Send;

    /// Parser name (e.g., "orders")
    fn name(&self) -> &str;

    /// Parse a single record. `None` means the record carries nothing usable.
    fn parse_record(&self, record: &RawRecord) -> Option<Self::Output>;

    /// Parse a batch in parallel, keeping input order
    fn parse_all(&self, records: &[RawRecord]) -> Vec<Self::Output> {
        let parsed: Vec<Self::Output> = records
            .par_iter()
            .filter_map(|r| self.parse_record(r))
            .collect();

        let skipped = records.len() - parsed.len();
        if skipped > 0 {
            tracing::debug!(parser = self.name(), skipped, "skipped unusable records");
        }
        parsed
    }
}

/// Client data is stored either as a nested object, a bare name string, or
/// flat fields on the record itself.
pub(crate) fn parse_client(record: &RawRecord) -> Client {
    match field(record, &["client", "cliente", "customer"]) {
        Some(Value::Object(obj)) => Client {
            name: text_field(obj, &["name", "nome"]),
            phone: text_field(obj, &["phone", "telefone", "celular"]),
            address: text_field(obj, &["address", "endereco"]),
        },
        Some(scalar) => Client {
            name: text(Some(scalar)),
            phone: text_field(record, &["clientPhone", "telefone", "phone"]),
            address: text_field(record, &["clientAddress", "endereco", "address"]),
        },
        None => Client {
            name: text_field(record, &["clientName", "nomeCliente"]),
            phone: text_field(record, &["clientPhone", "telefone", "phone"]),
            address: text_field(record, &["clientAddress", "endereco", "address"]),
        },
    }
}

/// Objects inside an array, silently skipping anything else
pub(crate) fn object_items(value: Option<&Value>) -> impl Iterator<Item = &RawRecord> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_client_nested() {
        let r = record(json!({"cliente": {"nome": "Ana", "telefone": "9999", "endereco": "Rua A"}}));
        let client = parse_client(&r);
        assert_eq!(client.name, "Ana");
        assert_eq!(client.phone, "9999");
        assert_eq!(client.address, "Rua A");
    }

    #[test]
    fn test_parse_client_bare_name() {
        let r = record(json!({"client": "Bruno", "telefone": "1234"}));
        let client = parse_client(&r);
        assert_eq!(client.name, "Bruno");
        assert_eq!(client.phone, "1234");
    }

    #[test]
    fn test_parse_client_flat_fields() {
        let r = record(json!({"clientName": "Carla"}));
        assert_eq!(parse_client(&r).name, "Carla");
    }

    #[test]
    fn test_object_items_skips_non_objects() {
        let value = json!([{"a": 1}, 3, "x", {"b": 2}]);
        assert_eq!(object_items(Some(&value)).count(), 2);
        assert_eq!(object_items(None).count(), 0);
    }

    #[test]
    fn test_parse_all_keeps_input_order() {
        let records: Vec<RawRecord> = (0..50)
            .map(|i| record(json!({"id": format!("m{i}"), "nome": format!("Mech {i}")})))
            .collect();
        let parsed = MechanicParser.parse_all(&records);
        assert_eq!(parsed.len(), 50);
        assert_eq!(parsed[0].id, "m0");
        assert_eq!(parsed[49].id, "m49");
    }
}
