//! Service order parser
//!
//! Orders carry bikes whose service pricing was stored in one of three
//! legacy shapes, sometimes several at once. The parser keeps every shape it
//! finds; choosing between them is the resolver's job.

use serde_json::Value;

use crate::services::normalizer::{
    date_field, field, opt_number_field, record_id, text, text_field, to_number,
};
use crate::types::{
    BikeEntry, OrderStatus, Part, PricingShape, RawRecord, ServiceDetail, ServiceLine,
    ServiceOrder,
};

use super::{object_items, parse_client, RecordParser};

const CREATED_AT: &[&str] = &["createdAt", "dataCriacao", "criadoEm", "dataAbertura"];
const UPDATED_AT: &[&str] = &["updatedAt", "atualizadoEm", "dataAtualizacao"];
const COMPLETED_AT: &[&str] = &["completedAt", "dataConclusao", "concluidoEm", "finishedAt"];
const SCHEDULED_AT: &[&str] = &["scheduledAt", "dataAgendamento", "agendadoPara"];
const DUE_DATE: &[&str] = &["dueDate", "dataEntrega", "prazo", "previsaoEntrega"];

/// Every field an order may be dated by, for coarse range reads
pub const ORDER_DATE_FIELDS: &[&str] = &[
    "completedAt",
    "dataConclusao",
    "concluidoEm",
    "finishedAt",
    "updatedAt",
    "atualizadoEm",
    "dataAtualizacao",
    "createdAt",
    "dataCriacao",
    "criadoEm",
    "dataAbertura",
];

const QUANTITY: &[&str] = &["quantity", "quantidade", "qtd"];
const NAME: &[&str] = &["name", "nome", "servico", "descricao"];
const VALUE: &[&str] = &["value", "valor", "preco", "price"];

const QUANTITY_MAP: &[&str] = &["services", "servicos"];
const DETAIL_MAP: &[&str] = &["serviceDetails", "servicosDetalhados", "detalhesServicos"];
const FLAT_MAP: &[&str] = &["servicePrices", "valoresServicos", "precosServicos"];
const LINE_LIST: &[&str] = &["serviceLines", "listaServicos", "servicesList"];
const PARTS: &[&str] = &["parts", "pecas"];

pub struct OrderParser;

impl RecordParser for OrderParser {
    type Output = ServiceOrder;

    fn name(&self) -> &str {
        "orders"
    }

    fn parse_record(&self, record: &RawRecord) -> Option<ServiceOrder> {
        if record.is_empty() {
            return None;
        }

        let bikes = match field(record, &["bikes", "bicicletas"]) {
            Some(value) => object_items(Some(value)).map(parse_bike).collect(),
            // Oldest orders stored a single bike inline on the order
            None if has_inline_bike(record) => vec![parse_bike(record)],
            None => Vec::new(),
        };

        let mechanic_id = text_field(record, &["mechanicId", "mecanicoId"]);

        Some(ServiceOrder {
            id: record_id(record),
            code: text_field(record, &["code", "codigo", "numero", "number"]),
            client: parse_client(record),
            status: OrderStatus::parse(&text_field(record, &["status", "situacao"])),
            created_at: date_field(record, CREATED_AT),
            updated_at: date_field(record, UPDATED_AT),
            completed_at: date_field(record, COMPLETED_AT),
            scheduled_at: date_field(record, SCHEDULED_AT),
            due_date: date_field(record, DUE_DATE),
            observations: text_field(record, &["observations", "observacoes", "obs"]),
            mechanic_id: (!mechanic_id.is_empty()).then_some(mechanic_id),
            bikes,
            declared_total: opt_number_field(record, &["total", "valorTotal", "declaredTotal"]),
        })
    }
}

fn has_inline_bike(record: &RawRecord) -> bool {
    [QUANTITY_MAP, DETAIL_MAP, FLAT_MAP, LINE_LIST, PARTS]
        .iter()
        .any(|aliases| field(record, aliases).is_some())
}

fn parse_bike(obj: &RawRecord) -> BikeEntry {
    let mut quantities = Vec::new();
    let mut lines = Vec::new();

    // `services` is a quantity map in shape (a)/(b) but a line list in some exports
    match field(obj, QUANTITY_MAP) {
        Some(Value::Object(map)) => {
            quantities = map
                .iter()
                .map(|(name, q)| (name.clone(), to_number(q)))
                .collect();
        }
        Some(value @ Value::Array(_)) => lines.extend(object_items(Some(value)).map(parse_line)),
        _ => {}
    }
    lines.extend(object_items(field(obj, LINE_LIST)).map(parse_line));

    let details: Vec<(String, ServiceDetail)> = field(obj, DETAIL_MAP)
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(name, v)| {
            let detail = v.as_object()?;
            Some((
                name.clone(),
                ServiceDetail {
                    base_value: opt_number_field(detail, &["baseValue", "valorBase"]),
                    final_value: opt_number_field(detail, &["finalValue", "valorFinal"]),
                    quantity: opt_number_field(detail, QUANTITY),
                },
            ))
        })
        .collect();

    let flat: Vec<(String, f64)> = field(obj, FLAT_MAP)
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .map(|(name, v)| (name.clone(), to_number(v)))
        .collect();

    let pricing = [
        PricingShape::DetailMap(details),
        PricingShape::FlatMap(flat),
        PricingShape::LineList(lines),
    ]
    .into_iter()
    .filter(|shape| !shape.is_empty())
    .collect();

    BikeEntry {
        brand: text_field(obj, &["brand", "marca"]),
        model: text_field(obj, &["model", "modelo"]),
        color: text_field(obj, &["color", "cor"]),
        quantities,
        pricing,
        parts: parse_parts(field(obj, PARTS)),
    }
}

fn parse_line(obj: &RawRecord) -> ServiceLine {
    ServiceLine {
        name: text_field(obj, NAME),
        value: field(obj, VALUE).map(to_number).unwrap_or(0.0),
        quantity: opt_number_field(obj, QUANTITY),
    }
}

/// Parts come as a list of objects, or as a name → value map
fn parse_parts(value: Option<&Value>) -> Vec<Part> {
    match value {
        Some(Value::Array(_)) => object_items(value)
            .map(|obj| Part {
                name: text_field(obj, &["name", "nome", "descricao"]),
                value: field(obj, VALUE).map(to_number).unwrap_or(0.0),
                quantity: opt_number_field(obj, QUANTITY),
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, v)| Part {
                name: name.clone(),
                value: to_number(v),
                quantity: None,
            })
            .collect(),
        Some(other) => {
            let name = text(Some(other));
            tracing::debug!(parts = %name, "ignoring scalar parts field");
            Vec::new()
        }
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    fn parse(value: Value) -> ServiceOrder {
        let record = value.as_object().cloned().unwrap();
        OrderParser.parse_record(&record).unwrap()
    }

    #[test]
    fn test_parse_order_basic_fields() {
        let order = parse(json!({
            "id": "os-1",
            "codigo": "2024-03-007",
            "cliente": {"nome": "Ana"},
            "status": "Em andamento",
            "dataCriacao": {"seconds": 1709769600, "nanoseconds": 0},
            "dataEntrega": "2024-03-10",
            "valorTotal": "R$ 150,00",
            "mecanicoId": "m1",
        }));

        assert_eq!(order.id, "os-1");
        assert_eq!(order.code, "2024-03-007");
        assert_eq!(order.client.name, "Ana");
        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.created_at.unwrap().day(), 7);
        assert_eq!(order.due_date.unwrap().day(), 10);
        assert_eq!(order.declared_total, Some(150.0));
        assert_eq!(order.mechanic_id.as_deref(), Some("m1"));
        assert!(order.bikes.is_empty());
    }

    #[test]
    fn test_parse_bike_detail_and_quantity_maps() {
        let order = parse(json!({
            "bikes": [{
                "marca": "Caloi",
                "servicos": {"Revisão": 2},
                "servicosDetalhados": {"Revisão": {"valorBase": 40, "valorFinal": "35,00"}},
            }]
        }));

        let bike = &order.bikes[0];
        assert_eq!(bike.brand, "Caloi");
        assert_eq!(bike.quantity_of("Revisão"), Some(2.0));
        assert_eq!(bike.pricing.len(), 1);
        match &bike.pricing[0] {
            PricingShape::DetailMap(details) => {
                assert_eq!(details[0].0, "Revisão");
                assert_eq!(details[0].1.final_value, Some(35.0));
                assert_eq!(details[0].1.base_value, Some(40.0));
                assert_eq!(details[0].1.quantity, None);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_parse_bike_services_as_line_list() {
        let order = parse(json!({
            "bikes": [{
                "services": [{"name": "Lavagem", "value": 20, "quantity": 1}],
                "parts": [{"name": "Câmara", "value": "15"}],
            }]
        }));

        let bike = &order.bikes[0];
        assert!(bike.quantities.is_empty());
        assert!(matches!(&bike.pricing[0], PricingShape::LineList(l) if l[0].name == "Lavagem"));
        assert_eq!(bike.parts[0].value, 15.0);
        assert_eq!(bike.parts[0].quantity, None);
    }

    #[test]
    fn test_parse_all_three_shapes_in_order() {
        let order = parse(json!({
            "bikes": [{
                "serviceDetails": {"A": {"baseValue": 10}},
                "servicePrices": {"A": 10},
                "serviceLines": [{"name": "A", "value": 10}],
            }]
        }));

        let kinds: Vec<&str> = order.bikes[0]
            .pricing
            .iter()
            .map(|s| match s {
                PricingShape::DetailMap(_) => "detail",
                PricingShape::FlatMap(_) => "flat",
                PricingShape::LineList(_) => "lines",
            })
            .collect();
        assert_eq!(kinds, vec!["detail", "flat", "lines"]);
    }

    #[test]
    fn test_parse_inline_single_bike() {
        let order = parse(json!({
            "id": "old",
            "marca": "Monark",
            "valoresServicos": {"Freio": 25},
        }));
        assert_eq!(order.bikes.len(), 1);
        assert_eq!(order.bikes[0].brand, "Monark");
    }

    #[test]
    fn test_parse_parts_as_map() {
        let order = parse(json!({"bikes": [{"pecas": {"Corrente": 60, "Pedal": "R$ 30"}}]}));
        let parts = &order.bikes[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "Corrente");
        assert_eq!(parts[1].value, 30.0);
    }

    #[test]
    fn test_unknown_status_defaults_pending() {
        let order = parse(json!({"id": "x", "status": "arquivado"}));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_empty_record_is_skipped() {
        assert!(OrderParser.parse_record(&RawRecord::new()).is_none());
    }
}
