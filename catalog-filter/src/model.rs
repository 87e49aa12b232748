use crate::error::ValidationError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;

const DEFAULT_CURRENCY: &str = "USD";

/// One discrete, filterable attribute value such as a size code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeValue(String);

impl AttributeValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A validated catalog item. Immutable once it is part of a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub installments: u32,
    pub free_shipping: bool,
    pub attributes: BTreeSet<AttributeValue>,
}

impl CatalogEntry {
    pub fn has_attribute(&self, value: &AttributeValue) -> bool {
        self.attributes.contains(value)
    }
}

/// An entry exactly as a data source delivered it, before validation.
///
/// Every field is kept loosely typed so that one bad entry is rejected on its
/// own instead of failing the whole payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub currency: Option<Value>,
    #[serde(default)]
    pub installments: Option<Value>,
    #[serde(default)]
    pub free_shipping: Option<Value>,
    #[serde(default, alias = "attributes")]
    pub sizes: Option<Value>,
}

impl RawEntry {
    /// Convenience constructor for a well-formed entry.
    pub fn new(id: impl Into<String>, title: impl Into<String>, price: f64) -> Self {
        Self {
            id: Some(Value::String(id.into())),
            title: Some(Value::String(title.into())),
            price: Some(Value::from(price)),
            ..Default::default()
        }
    }

    pub fn with_sizes<I, S>(mut self, sizes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = sizes
            .into_iter()
            .map(|size| Value::String(size.into()))
            .collect();
        self.sizes = Some(Value::Array(values));
        self
    }

    /// Interpret an arbitrary JSON value as a raw entry. Non-objects become an
    /// empty entry, which validation rejects for its missing identifier.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Outcome of validating one fetched batch.
#[derive(Debug, Default)]
pub struct ValidatedBatch {
    pub entries: Vec<CatalogEntry>,
    pub rejected: Vec<ValidationError>,
}

/// Validate a fetched batch, keeping source order and dropping bad entries.
///
/// Identifiers must be unique; the first occurrence wins.
pub fn validate_entries(raw: Vec<RawEntry>) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    let mut seen: HashSet<String> = HashSet::new();
    for (position, entry) in raw.into_iter().enumerate() {
        match validate_entry(position, entry) {
            Ok(entry) => {
                if seen.insert(entry.id.clone()) {
                    batch.entries.push(entry);
                } else {
                    batch
                        .rejected
                        .push(ValidationError::DuplicateIdentifier { id: entry.id });
                }
            }
            Err(err) => batch.rejected.push(err),
        }
    }
    batch
}

fn validate_entry(position: usize, raw: RawEntry) -> Result<CatalogEntry, ValidationError> {
    let id = parse_identifier(position, raw.id)?;
    let title = match raw.title {
        Some(Value::String(title)) if !title.trim().is_empty() => title.trim().to_string(),
        _ => return Err(ValidationError::MissingTitle { id }),
    };
    let price = parse_price(&id, raw.price)?;
    let currency = match raw.currency {
        Some(Value::String(code)) if !code.trim().is_empty() => code.trim().to_string(),
        _ => DEFAULT_CURRENCY.to_string(),
    };
    let installments = parse_installments(&id, raw.installments)?;
    let free_shipping = matches!(raw.free_shipping, Some(Value::Bool(true)));
    let attributes = parse_attributes(&id, raw.sizes)?;
    Ok(CatalogEntry {
        id,
        title,
        price,
        currency,
        installments,
        free_shipping,
        attributes,
    })
}

fn parse_identifier(position: usize, value: Option<Value>) -> Result<String, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::MissingIdentifier { position }),
        Some(Value::String(id)) => {
            let trimmed = id.trim();
            if trimmed.is_empty() {
                Err(ValidationError::MissingIdentifier { position })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(Value::Number(number)) if number.is_u64() || number.is_i64() => {
            Ok(number.to_string())
        }
        Some(other) => Err(ValidationError::InvalidIdentifier {
            position,
            reason: format!("expected a string or integer, got {other}"),
        }),
    }
}

fn parse_price(id: &str, value: Option<Value>) -> Result<f64, ValidationError> {
    let parsed = match &value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    let render = || value.as_ref().map_or_else(|| "null".to_string(), Value::to_string);
    match parsed {
        Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
        Some(price) if price.is_finite() => Err(ValidationError::NegativePrice {
            id: id.to_string(),
            value: render(),
        }),
        _ => Err(ValidationError::NonNumericPrice {
            id: id.to_string(),
            value: render(),
        }),
    }
}

fn parse_installments(id: &str, value: Option<Value>) -> Result<u32, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(1),
        Some(Value::Number(number)) => number
            .as_u64()
            .filter(|count| *count >= 1)
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(|| ValidationError::InvalidInstallments {
                id: id.to_string(),
                value: number.to_string(),
            }),
        Some(other) => Err(ValidationError::InvalidInstallments {
            id: id.to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_attributes(
    id: &str,
    value: Option<Value>,
) -> Result<BTreeSet<AttributeValue>, ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedAttributes {
        id: id.to_string(),
        reason,
    };
    let items = match value {
        None | Some(Value::Null) => return Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(malformed(format!("expected a list, got {other}"))),
    };
    let mut attributes = BTreeSet::new();
    for item in items {
        let text = match item {
            Value::String(text) => text,
            Value::Number(number) if number.is_u64() || number.is_i64() => number.to_string(),
            other => return Err(malformed(format!("unsupported value {other}"))),
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty value".to_string()));
        }
        attributes.insert(AttributeValue::from(trimmed));
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: Value) -> RawEntry {
        RawEntry::from_value(value)
    }

    #[test]
    fn well_formed_entry_gets_defaults() {
        let batch = validate_entries(vec![raw(json!({
            "id": 7,
            "title": " Trail shoe ",
            "price": "129.90",
            "sizes": ["40", 41, " 42 ", "40"],
        }))]);

        assert!(batch.rejected.is_empty());
        let entry = &batch.entries[0];
        assert_eq!(entry.id, "7");
        assert_eq!(entry.title, "Trail shoe");
        assert_eq!(entry.price, 129.9);
        assert_eq!(entry.currency, "USD");
        assert_eq!(entry.installments, 1);
        assert!(!entry.free_shipping);
        let sizes: Vec<&str> = entry.attributes.iter().map(AttributeValue::as_str).collect();
        assert_eq!(sizes, vec!["40", "41", "42"]);
    }

    #[test]
    fn attributes_alias_is_accepted() {
        let batch = validate_entries(vec![raw(json!({
            "id": "a",
            "title": "Tee",
            "price": 10,
            "attributes": ["M"],
            "free_shipping": true,
            "installments": 3,
            "currency": "BRL",
        }))]);
        let entry = &batch.entries[0];
        assert!(entry.has_attribute(&AttributeValue::from("M")));
        assert!(entry.free_shipping);
        assert_eq!(entry.installments, 3);
        assert_eq!(entry.currency, "BRL");
    }

    #[test]
    fn bad_entries_are_rejected_individually() {
        let batch = validate_entries(vec![
            raw(json!({"title": "no id", "price": 1})),
            raw(json!({"id": "p", "title": "bad price", "price": "cheap"})),
            raw(json!({"id": "n", "title": "negative", "price": -1})),
            raw(json!({"id": "s", "title": "bad sizes", "price": 1, "sizes": "M"})),
            raw(json!({"id": "e", "title": "empty size", "price": 1, "sizes": [" "]})),
            raw(json!({"id": "i", "title": "zero", "price": 1, "installments": 0})),
            raw(json!({"id": "t", "price": 1})),
            raw(json!({"id": 1.5, "title": "float id", "price": 1})),
            raw(json!("not an object")),
            raw(json!({"id": "ok", "title": "fine", "price": 5})),
        ]);

        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.entries[0].id, "ok");
        assert_eq!(
            batch.rejected,
            vec![
                ValidationError::MissingIdentifier { position: 0 },
                ValidationError::NonNumericPrice {
                    id: "p".to_string(),
                    value: "\"cheap\"".to_string(),
                },
                ValidationError::NegativePrice {
                    id: "n".to_string(),
                    value: "-1".to_string(),
                },
                ValidationError::MalformedAttributes {
                    id: "s".to_string(),
                    reason: "expected a list, got \"M\"".to_string(),
                },
                ValidationError::MalformedAttributes {
                    id: "e".to_string(),
                    reason: "empty value".to_string(),
                },
                ValidationError::InvalidInstallments {
                    id: "i".to_string(),
                    value: "0".to_string(),
                },
                ValidationError::MissingTitle {
                    id: "t".to_string()
                },
                ValidationError::InvalidIdentifier {
                    position: 7,
                    reason: "expected a string or integer, got 1.5".to_string(),
                },
                ValidationError::MissingIdentifier { position: 8 },
            ]
        );
    }

    #[test]
    fn duplicate_identifiers_keep_first() {
        let batch = validate_entries(vec![
            RawEntry::new("x", "first", 1.0),
            RawEntry::new("x", "second", 2.0),
        ]);
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.entries[0].title, "first");
        assert_eq!(
            batch.rejected,
            vec![ValidationError::DuplicateIdentifier {
                id: "x".to_string()
            }]
        );
    }
}
