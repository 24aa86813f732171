#![forbid(unsafe_code)]

//! Property document codec.
//!
//! A node's properties are stored as one JSON document:
//! `{"properties":[{"name":..,"type":..,"multiple":..,"values":[..]}]}`.
//! Binary values are replaced by their byte length and handed back to the
//! caller for out-of-line storage, unless inline encoding is requested, in
//! which case they are embedded as hex text.

use super::error::StoreError;
use cr_core::{BinaryValue, Property, PropertyType, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const EMPTY_DOCUMENT: &str = r#"{"properties":[]}"#;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    properties: Vec<EncodedProperty>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EncodedProperty {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    multiple: bool,
    values: Vec<Json>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedDocument {
    pub document: String,
    /// Payloads of binary properties by property name, in value order.
    pub binaries: BTreeMap<String, Vec<Vec<u8>>>,
}

pub fn encode_properties<'a>(
    properties: impl IntoIterator<Item = &'a Property>,
    inline_binary: bool,
) -> Result<EncodedDocument, StoreError> {
    let mut document = Document::default();
    let mut binaries = BTreeMap::new();

    for property in properties {
        let mut values = Vec::with_capacity(property.values().len());
        let mut payloads = Vec::new();
        for value in property.values() {
            let encoded = match value {
                Value::Binary(binary) if inline_binary => match binary {
                    BinaryValue::Payload(bytes) => Json::from(hex::encode(bytes)),
                    BinaryValue::Stored { length } => Json::from(*length),
                },
                Value::Binary(binary) => {
                    if let Some(bytes) = binary.payload() {
                        payloads.push(bytes.to_vec());
                    }
                    Json::from(binary.len())
                }
                other => encode_value(property.name(), other)?,
            };
            values.push(encoded);
        }

        if !payloads.is_empty() {
            if payloads.len() != property.values().len() {
                return Err(StoreError::FormatViolation(format!(
                    "binary property {} mixes stored values with new payloads",
                    property.name()
                )));
            }
            binaries.insert(property.name().to_string(), payloads);
        }

        document.properties.push(EncodedProperty {
            name: property.name().to_string(),
            kind: property.kind().name().to_string(),
            multiple: property.is_multiple(),
            values,
        });
    }

    let document = serde_json::to_string(&document)
        .map_err(|err| StoreError::FormatViolation(format!("encode document: {err}")))?;
    Ok(EncodedDocument { document, binaries })
}

/// Decodes a document. With a filter, only the named properties are decoded.
pub fn decode_properties(
    document: &str,
    filter: Option<&[&str]>,
) -> Result<Vec<Property>, StoreError> {
    let parsed: Document = serde_json::from_str(document)
        .map_err(|err| StoreError::FormatViolation(format!("decode document: {err}")))?;

    let mut out = Vec::with_capacity(parsed.properties.len());
    for encoded in parsed.properties {
        if filter.is_some_and(|names| !names.contains(&encoded.name.as_str())) {
            continue;
        }
        let kind = PropertyType::from_name(&encoded.kind).ok_or_else(|| {
            StoreError::FormatViolation(format!(
                "property {} has unknown type tag {:?}",
                encoded.name, encoded.kind
            ))
        })?;
        let values = encoded
            .values
            .iter()
            .map(|raw| decode_value(&encoded.name, kind, raw))
            .collect::<Result<Vec<_>, _>>()?;
        let property = Property::try_new(encoded.name.as_str(), kind, encoded.multiple, values)
            .map_err(|err| {
                StoreError::FormatViolation(format!("property {}: {}", encoded.name, err.message()))
            })?;
        out.push(property);
    }
    Ok(out)
}

fn encode_value(name: &str, value: &Value) -> Result<Json, StoreError> {
    Ok(match value {
        Value::String(raw)
        | Value::Name(raw)
        | Value::Path(raw)
        | Value::Reference(raw)
        | Value::WeakReference(raw)
        | Value::Uri(raw)
        | Value::Decimal(raw) => Json::from(raw.as_str()),
        Value::Long(number) => Json::from(*number),
        Value::Boolean(flag) => Json::from(i64::from(*flag)),
        // Display gives the shortest text that parses back to the same f64.
        Value::Double(number) => Json::from(number.to_string()),
        Value::Date(date) => Json::from(date.format(&Rfc3339).map_err(|err| {
            StoreError::FormatViolation(format!("property {name}: date not representable: {err}"))
        })?),
        Value::Binary(binary) => Json::from(binary.len()),
    })
}

fn decode_value(name: &str, kind: PropertyType, raw: &Json) -> Result<Value, StoreError> {
    let mismatch = || {
        StoreError::FormatViolation(format!(
            "property {name}: value {raw} does not match type {kind}"
        ))
    };
    let text = || raw.as_str().map(str::to_string).ok_or_else(mismatch);

    Ok(match kind {
        PropertyType::String => Value::String(text()?),
        PropertyType::Name => Value::Name(text()?),
        PropertyType::Path => Value::Path(text()?),
        PropertyType::Reference => Value::Reference(text()?),
        PropertyType::WeakReference => Value::WeakReference(text()?),
        PropertyType::Uri => Value::Uri(text()?),
        PropertyType::Decimal => Value::Decimal(text()?),
        PropertyType::Long => Value::Long(raw.as_i64().ok_or_else(mismatch)?),
        PropertyType::Boolean => match raw.as_i64() {
            Some(0) => Value::Boolean(false),
            Some(1) => Value::Boolean(true),
            _ => return Err(mismatch()),
        },
        PropertyType::Double => {
            let number = raw
                .as_str()
                .and_then(|value| value.parse::<f64>().ok())
                .ok_or_else(mismatch)?;
            Value::Double(number)
        }
        PropertyType::Date => {
            let date = raw
                .as_str()
                .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
                .ok_or_else(mismatch)?;
            Value::Date(date)
        }
        PropertyType::Binary => match raw {
            Json::Number(_) => Value::Binary(BinaryValue::Stored {
                length: raw.as_u64().ok_or_else(mismatch)?,
            }),
            Json::String(encoded) => {
                Value::Binary(BinaryValue::Payload(hex::decode(encoded).map_err(|_| mismatch())?))
            }
            _ => return Err(mismatch()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn single(name: &str, value: Value) -> Property {
        Property::single(name, value).expect("property")
    }

    #[test]
    fn scalar_types_round_trip() {
        let properties = vec![
            single("s", Value::String("héllo \"quoted\"".to_string())),
            single("n", Value::Name("jcr:title".to_string())),
            single("p", Value::Path("/a/b".to_string())),
            single("r", Value::Reference("0d1c1d3c-aaaa".to_string())),
            single("w", Value::WeakReference("0d1c1d3c-bbbb".to_string())),
            single("u", Value::Uri("https://example.org/x?y=1".to_string())),
            single("dec", Value::Decimal("12345678901234567890.000001".to_string())),
            single("l", Value::Long(-42)),
            single("b", Value::Boolean(true)),
            single("d", Value::Double(0.1)),
            single("date", Value::Date(datetime!(2024-02-29 23:59:59.123 +02:00))),
        ];

        let encoded = encode_properties(&properties, false).expect("encode");
        assert!(encoded.binaries.is_empty());
        let decoded = decode_properties(&encoded.document, None).expect("decode");
        assert_eq!(decoded, properties);
    }

    #[test]
    fn multiplicity_is_explicit() {
        let one = single("tags", Value::String("a".to_string()));
        let many = Property::multiple("tags", PropertyType::String, vec![Value::String("a".into())])
            .expect("multi");

        let one_doc = encode_properties([&one], false).expect("encode").document;
        let many_doc = encode_properties([&many], false).expect("encode").document;
        assert_ne!(one_doc, many_doc);

        assert!(!decode_properties(&one_doc, None).expect("decode")[0].is_multiple());
        assert!(decode_properties(&many_doc, None).expect("decode")[0].is_multiple());
    }

    #[test]
    fn binary_payloads_go_out_of_line() {
        let data = Property::multiple(
            "jcr:data",
            PropertyType::Binary,
            vec![
                Value::Binary(BinaryValue::Payload(vec![1, 2, 3])),
                Value::Binary(BinaryValue::Payload(Vec::new())),
            ],
        )
        .expect("binary");

        let encoded = encode_properties([&data], false).expect("encode");
        assert_eq!(
            encoded.binaries.get("jcr:data"),
            Some(&vec![vec![1, 2, 3], Vec::new()])
        );
        assert!(encoded.document.contains("[3,0]"));

        let decoded = decode_properties(&encoded.document, None).expect("decode");
        assert_eq!(
            decoded[0].values(),
            &[
                Value::Binary(BinaryValue::Stored { length: 3 }),
                Value::Binary(BinaryValue::Stored { length: 0 }),
            ]
        );
    }

    #[test]
    fn inline_binary_uses_hex() {
        let data = single("blob", Value::Binary(BinaryValue::Payload(vec![0xde, 0xad])));
        let encoded = encode_properties([&data], true).expect("encode");
        assert!(encoded.binaries.is_empty());
        assert!(encoded.document.contains("\"dead\""));
        let decoded = decode_properties(&encoded.document, None).expect("decode");
        assert_eq!(decoded, vec![data]);
    }

    #[test]
    fn name_filter_limits_output() {
        let properties = vec![
            single("a", Value::Long(1)),
            single("b", Value::Long(2)),
            single("c", Value::Long(3)),
        ];
        let encoded = encode_properties(&properties, false).expect("encode");
        let decoded = decode_properties(&encoded.document, Some(&["c", "a"][..])).expect("decode");
        let names: Vec<&str> = decoded.iter().map(Property::name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn malformed_documents_are_format_violations() {
        let cases = [
            "not json",
            r#"{"properties":[{"name":"x","type":"Integer","multiple":false,"values":[1]}]}"#,
            r#"{"properties":[{"name":"x","type":"Long","multiple":false,"values":["1"]}]}"#,
            r#"{"properties":[{"name":"x","type":"Boolean","multiple":false,"values":[2]}]}"#,
            r#"{"properties":[{"name":"x","type":"Date","multiple":false,"values":["monday"]}]}"#,
            r#"{"properties":[{"name":"x","type":"String","multiple":false,"values":[]}]}"#,
            r#"{"properties":[{"name":"x","type":"Binary","multiple":false,"values":["zz"]}]}"#,
        ];
        for case in cases {
            let err = decode_properties(case, None).expect_err(case);
            assert_eq!(err.code(), "FORMAT_VIOLATION", "{case}");
        }
    }

    #[test]
    fn empty_document_decodes_to_nothing() {
        assert!(decode_properties(EMPTY_DOCUMENT, None).expect("decode").is_empty());
    }
}
