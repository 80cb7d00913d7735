//! Order records - typed model of the record source, the in-memory store and
//! the descriptor text rendered from each order

pub mod descriptor;
pub mod store;

pub use descriptor::{DescriptorBuilder, DescriptorStyle};
pub use store::RecordStore;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One shipment/order as found in the record source.
///
/// Optional text fields are always present after loading: an absent or `null`
/// value becomes the empty string, so nothing downstream has to guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Surrounding whitespace is stripped on load; this is the lookup key.
    #[serde(default, deserialize_with = "key_field")]
    pub tracking_number: String,
    #[serde(rename = "estado", default, deserialize_with = "text_field")]
    pub status: String,
    #[serde(rename = "fecha_estimada", default, deserialize_with = "text_field")]
    pub estimated_delivery: String,
    #[serde(rename = "fecha_entrega_real", default, deserialize_with = "text_field")]
    pub actual_delivery: String,
    #[serde(rename = "destino", default, deserialize_with = "text_field")]
    pub destination: String,
    #[serde(rename = "transportadora", default, deserialize_with = "text_field")]
    pub carrier: String,
    #[serde(rename = "enlace_rastreo", default, deserialize_with = "text_field")]
    pub tracking_link: String,
    #[serde(rename = "cliente", default, deserialize_with = "text_field")]
    pub customer: String,
    #[serde(rename = "peso_kg", default)]
    pub weight_kg: Option<f64>,
    #[serde(rename = "valor_usd", default)]
    pub value_usd: Option<f64>,
    #[serde(rename = "motivo_retraso", default, deserialize_with = "text_field")]
    pub delay_reason: String,
    #[serde(rename = "motivo_cancelacion", default, deserialize_with = "text_field")]
    pub cancellation_reason: String,
    #[serde(rename = "punto_retiro", default, deserialize_with = "text_field")]
    pub pickup_point: String,
    #[serde(rename = "productos", default, deserialize_with = "product_list")]
    pub products: Vec<ProductLine>,
    /// Keys the typed model does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    #[serde(rename = "nombre", default, deserialize_with = "text_field")]
    pub name: String,
    #[serde(rename = "categoria", default, deserialize_with = "text_field")]
    pub category: String,
    #[serde(rename = "dev_aceptada", default, deserialize_with = "flag_field")]
    pub return_accepted: bool,
}

impl OrderRecord {
    /// Record with only its key set; every other field takes its empty value.
    pub fn new(tracking_number: impl Into<String>) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            status: String::new(),
            estimated_delivery: String::new(),
            actual_delivery: String::new(),
            destination: String::new(),
            carrier: String::new(),
            tracking_link: String::new(),
            customer: String::new(),
            weight_kg: None,
            value_usd: None,
            delay_reason: String::new(),
            cancellation_reason: String::new(),
            pickup_point: String::new(),
            products: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Accepts strings, numbers and `null` for a text field.
fn text_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected text, found {}",
            other
        ))),
    }
}

fn key_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = text_field(deserializer)?;
    Ok(raw.trim().to_string())
}

fn flag_field<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn product_list<'de, D>(deserializer: D) -> Result<Vec<ProductLine>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ProductLine>>::deserialize(deserializer)?.unwrap_or_default())
}
