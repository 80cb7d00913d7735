//! Renders an order into descriptive text for embedding and for grounding

use std::borrow::Cow;

use serde_json::Value;

use super::{OrderRecord, ProductLine};
use crate::utils::TextUtils;

const PRODUCTS_LABEL: &str = "Productos";
const GROUNDING_HEADER: &str = "Información del pedido:";

/// Output layout. Both styles walk the same fields in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorStyle {
    /// Single line for the embedding model, whitespace collapsed.
    Flat,
    /// Multi-line block handed to the chat model for one turn.
    Grounding,
}

impl DescriptorStyle {
    fn product_separator(&self) -> &'static str {
        match self {
            DescriptorStyle::Flat => " | ",
            DescriptorStyle::Grounding => "; ",
        }
    }
}

enum FieldValue<'a> {
    Text(Cow<'a, str>),
    Products(&'a [ProductLine]),
}

pub struct DescriptorBuilder;

impl DescriptorBuilder {
    /// Text embedded by the ingestion pipeline.
    pub fn flat(record: &OrderRecord) -> String {
        Self::render(record, DescriptorStyle::Flat)
    }

    /// Context block for the turn that mentions this order.
    pub fn grounding(record: &OrderRecord) -> String {
        Self::render(record, DescriptorStyle::Grounding)
    }

    pub fn render(record: &OrderRecord, style: DescriptorStyle) -> String {
        let lines: Vec<String> = Self::fields(record)
            .into_iter()
            .map(|(key, value)| match value {
                FieldValue::Products(products) => {
                    format!("{}: {}", PRODUCTS_LABEL, Self::render_products(products, style))
                }
                FieldValue::Text(text) => format!("{}: {}", Self::label(key), text),
            })
            .collect();

        match style {
            DescriptorStyle::Flat => TextUtils::normalize_whitespace(&lines.join(" ")).into_owned(),
            DescriptorStyle::Grounding => format!("{}\n{}", GROUNDING_HEADER, lines.join("\n")),
        }
    }

    /// `fecha_entrega_real` -> `Fecha entrega real`
    pub fn label(key: &str) -> String {
        TextUtils::capitalize_first(&key.replace('_', " "))
    }

    fn render_products(products: &[ProductLine], style: DescriptorStyle) -> String {
        products
            .iter()
            .map(|p| format!("{} ({}, dev_aceptada: {})", p.name, p.category, p.return_accepted))
            .collect::<Vec<_>>()
            .join(style.product_separator())
    }

    // Source key order, then any extra keys in their stored order.
    fn fields(record: &OrderRecord) -> Vec<(&str, FieldValue<'_>)> {
        let text = |s: &str| FieldValue::Text(Cow::Owned(s.to_string()));
        let number = |n: Option<f64>| {
            FieldValue::Text(n.map(|v| Cow::Owned(v.to_string())).unwrap_or(Cow::Borrowed("")))
        };

        let mut fields = vec![
            ("tracking_number", text(&record.tracking_number)),
            ("estado", text(&record.status)),
            ("fecha_estimada", text(&record.estimated_delivery)),
            ("fecha_entrega_real", text(&record.actual_delivery)),
            ("destino", text(&record.destination)),
            ("transportadora", text(&record.carrier)),
            ("enlace_rastreo", text(&record.tracking_link)),
            ("cliente", text(&record.customer)),
            ("peso_kg", number(record.weight_kg)),
            ("valor_usd", number(record.value_usd)),
            ("motivo_retraso", text(&record.delay_reason)),
            ("motivo_cancelacion", text(&record.cancellation_reason)),
            ("punto_retiro", text(&record.pickup_point)),
            ("productos", FieldValue::Products(&record.products)),
        ];

        for (key, value) in &record.extra {
            let rendered = match value {
                Value::Null => Cow::Borrowed(""),
                Value::String(s) => Cow::Borrowed(s.as_str()),
                other => Cow::Owned(other.to_string()),
            };
            fields.push((key.as_str(), FieldValue::Text(rendered)));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_record() -> OrderRecord {
        let mut record = OrderRecord::new("123456");
        record.status = "en tránsito".to_string();
        record.estimated_delivery = "2025-03-10".to_string();
        record.destination = "Medellín".to_string();
        record.carrier = "Coordinadora".to_string();
        record.weight_kg = Some(2.5);
        record.products = vec![
            ProductLine {
                name: "Botella reutilizable".to_string(),
                category: "Hogar".to_string(),
                return_accepted: true,
            },
            ProductLine {
                name: "Jabón artesanal".to_string(),
                category: "Cuidado personal".to_string(),
                return_accepted: false,
            },
        ];
        record
    }

    #[test]
    fn test_label_from_key() {
        assert_eq!(DescriptorBuilder::label("fecha_entrega_real"), "Fecha entrega real");
        assert_eq!(DescriptorBuilder::label("tracking_number"), "Tracking number");
        assert_eq!(DescriptorBuilder::label("estado"), "Estado");
    }

    #[test]
    fn test_grounding_is_multiline_with_header() {
        let text = DescriptorBuilder::grounding(&sample_record());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Información del pedido:");
        assert_eq!(lines[1], "Tracking number: 123456");
        assert!(lines.contains(&"Estado: en tránsito"));
        assert!(lines.contains(&"Peso kg: 2.5"));
        assert!(lines.contains(&"Motivo retraso: "));
        assert!(lines.contains(
            &"Productos: Botella reutilizable (Hogar, dev_aceptada: true); Jabón artesanal (Cuidado personal, dev_aceptada: false)"
        ));
    }

    #[test]
    fn test_flat_is_single_line() {
        let mut record = sample_record();
        record.delay_reason = "lluvias\nintensas   en la vía".to_string();
        let text = DescriptorBuilder::flat(&record);

        assert!(!text.contains('\n'));
        assert!(!text.contains("  "));
        assert!(text.starts_with("Tracking number: 123456 Estado: en tránsito"));
        assert!(text.contains("Motivo retraso: lluvias intensas en la vía"));
        assert!(text.contains("Botella reutilizable (Hogar, dev_aceptada: true) | Jabón artesanal"));
    }

    #[test]
    fn test_both_styles_share_field_order() {
        let record = sample_record();
        let grounding = DescriptorBuilder::grounding(&record);
        let flat = DescriptorBuilder::flat(&record);

        let labels: Vec<&str> = grounding
            .lines()
            .skip(1)
            .filter_map(|line| line.split(':').next())
            .collect();
        let mut cursor = 0;
        for label in labels {
            let found = flat[cursor..].find(&format!("{}:", label));
            assert!(found.is_some(), "label {} out of order", label);
            cursor += found.unwrap();
        }
    }

    #[test]
    fn test_empty_record_renders_without_failing() {
        let text = DescriptorBuilder::grounding(&OrderRecord::new(""));
        assert!(text.contains("Tracking number: \n"));
        assert!(text.ends_with("Productos: "));
    }

    #[test]
    fn test_extra_fields_follow_known_fields() {
        let record: OrderRecord = serde_json::from_value(json!({
            "tracking_number": "77777",
            "canal_venta": "web",
            "prioridad": 2
        }))
        .unwrap();
        let text = DescriptorBuilder::grounding(&record);
        let products_at = text.find("Productos:").unwrap();

        assert!(text.find("Canal venta: web").unwrap() > products_at);
        assert!(text.contains("Prioridad: 2"));
    }

    proptest! {
        #[test]
        fn prop_descriptor_is_idempotent(
            tracking in "[0-9]{5,8}",
            status in "\\PC{0,20}",
            reason in "\\PC{0,30}",
        ) {
            let mut record = OrderRecord::new(tracking);
            record.status = status;
            record.delay_reason = reason;

            prop_assert_eq!(DescriptorBuilder::flat(&record), DescriptorBuilder::flat(&record));
            prop_assert_eq!(DescriptorBuilder::grounding(&record), DescriptorBuilder::grounding(&record));
            prop_assert!(!DescriptorBuilder::flat(&record).contains('\n'));
        }
    }
}
