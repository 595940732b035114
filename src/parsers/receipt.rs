//! Receipt parser

use crate::services::normalizer::{
    date_field, field, number_field, opt_number_field, record_id, text_field,
};
use crate::types::{RawRecord, Receipt, ReceiptItem};

use super::{object_items, parse_client, RecordParser};

pub const RECEIPT_DATE_FIELDS: &[&str] = &["issuedAt", "dataEmissao", "emitidoEm", "createdAt", "data"];

pub struct ReceiptParser;

impl RecordParser for ReceiptParser {
    type Output = Receipt;

    fn name(&self) -> &str {
        "receipts"
    }

    fn parse_record(&self, record: &RawRecord) -> Option<Receipt> {
        let items: Vec<ReceiptItem> = object_items(field(record, &["items", "itens"]))
            .map(|item| ReceiptItem {
                description: text_field(item, &["description", "descricao", "name", "nome"]),
                quantity: opt_number_field(item, &["quantity", "quantidade", "qtd"]).unwrap_or(1.0),
                unit_value: number_field(
                    item,
                    &["unitValue", "valorUnitario", "valor", "value", "preco"],
                ),
            })
            .collect();
        let total = opt_number_field(record, &["total", "valorTotal"]);

        // Nothing to count: no lines and no total
        if items.is_empty() && total.is_none() {
            return None;
        }

        Some(Receipt {
            id: record_id(record),
            number: text_field(record, &["number", "numero", "receiptNumber"]),
            client: parse_client(record),
            order_id: Some(text_field(record, &["orderId", "ordemId", "osId"]))
                .filter(|id| !id.is_empty()),
            items,
            discount: number_field(record, &["discount", "desconto"]),
            total,
            payment_method: text_field(record, &["paymentMethod", "formaPagamento", "pagamento"]),
            issued_at: date_field(record, RECEIPT_DATE_FIELDS),
        })
    }
}
