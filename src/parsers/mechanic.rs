//! Mechanic record parser

use crate::services::normalizer::{record_id, text_field};
use crate::types::{Mechanic, RawRecord};

use super::RecordParser;

pub struct MechanicParser;

impl RecordParser for MechanicParser {
    type Output = Mechanic;

    fn name(&self) -> &str {
        "mechanics"
    }

    fn parse_record(&self, record: &RawRecord) -> Option<Mechanic> {
        let id = record_id(record);
        if id.is_empty() {
            return None;
        }
        Some(Mechanic {
            id,
            name: text_field(record, &["name", "nome"]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mechanic() {
        let r = json!({"id": "m1", "nome": "Zé"}).as_object().cloned().unwrap();
        let m = MechanicParser.parse_record(&r).unwrap();
        assert_eq!(m.id, "m1");
        assert_eq!(m.name, "Zé");
    }

    #[test]
    fn test_mechanic_without_id_is_skipped() {
        let r = json!({"nome": "Zé"}).as_object().cloned().unwrap();
        assert!(MechanicParser.parse_record(&r).is_none());
    }
}
