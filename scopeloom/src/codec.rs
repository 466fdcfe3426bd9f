//! Attribute encoders.
//!
//! - [`compress_encode`] packs any serializable value into a single text
//!   attribute: JSON, zlib, then standard base64.
//! - [`table_to_structured_array`] turns a [`Table`] into one record array
//!   whose fields follow the table's column order.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use scopeloom_core::compress::{zlib_compress, zlib_decompress, DEFAULT_LEVEL};
use scopeloom_core::{LoomError, Result};

use crate::single_cell::ColumnData;
use crate::structured::{Scalar, ScalarType, StructuredArray};
use crate::table::Table;

/// Serialize `value` to JSON, zlib-compress it and base64-encode the result.
pub fn compress_encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(|e| LoomError::Serialization(e.to_string()))?;
    let compressed = zlib_compress(&json, DEFAULT_LEVEL)?;
    Ok(BASE64.encode(compressed))
}

/// Inverse of [`compress_encode`].
pub fn decode_decompress<T: DeserializeOwned>(text: &str) -> Result<T> {
    let compressed = BASE64
        .decode(text.trim().as_bytes())
        .map_err(|e| LoomError::Serialization(format!("invalid base64: {e}")))?;
    let json = zlib_decompress(&compressed)?;
    serde_json::from_slice(&json).map_err(|e| LoomError::Serialization(e.to_string()))
}

/// Element type and per-row values of a column with a fixed-width type.
fn scalar_column(col: &ColumnData) -> Option<(ScalarType, Vec<Scalar>)> {
    match col {
        ColumnData::Numeric(v) => Some((
            ScalarType::Float64,
            v.iter().map(|&x| Scalar::Float64(x)).collect(),
        )),
        ColumnData::Integers(v) => Some((
            ScalarType::Int64,
            v.iter().map(|&x| Scalar::Int64(x)).collect(),
        )),
        ColumnData::Booleans(v) => Some((
            ScalarType::Bool,
            v.iter().map(|&x| Scalar::Bool(x)).collect(),
        )),
        ColumnData::Strings(_) | ColumnData::Categorical { .. } => None,
    }
}

/// Convert a table into an array of `n_rows` records, field `i` carrying the
/// name and element type of column `i`.
///
/// # Errors
///
/// Returns [`LoomError::InvalidInput`] if a column holds variable-length
/// values (strings, categoricals).
pub fn table_to_structured_array(table: &Table) -> Result<StructuredArray> {
    let mut layout = Vec::with_capacity(table.n_cols());
    let mut columns = Vec::with_capacity(table.n_cols());
    for (name, col) in table.columns() {
        let (dtype, values) = scalar_column(col).ok_or_else(|| {
            LoomError::InvalidInput(format!("column '{name}' has no fixed-width element type"))
        })?;
        layout.push((name.to_string(), dtype));
        columns.push(values);
    }

    let mut array = StructuredArray::new(layout, table.n_rows())?;
    for (field, values) in columns.into_iter().enumerate() {
        for (record, value) in values.into_iter().enumerate() {
            array.set(record, field, value)?;
        }
    }
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaData;
    use proptest::prelude::*;

    fn cells(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("cell_{i}")).collect()
    }

    #[test]
    fn encoded_text_is_base64_of_zlib() {
        let text = compress_encode(&MetaData::default()).unwrap();
        let raw = BASE64.decode(&text).unwrap();
        assert!(scopeloom_core::compress::is_zlib(&raw));
        let json = zlib_decompress(&raw).unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"embeddings":[],"annotations":[],"metrics":[]}"#
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_decompress::<MetaData>("%%%not base64%%%").is_err());
        assert!(decode_decompress::<MetaData>(&BASE64.encode(b"plain")).is_err());
    }

    #[test]
    fn structured_array_keeps_column_order_and_types() {
        let table = Table::from_columns(
            cells(3),
            vec![
                ("_Y".into(), ColumnData::Numeric(vec![0.1, 0.2, 0.3])),
                ("_X".into(), ColumnData::Numeric(vec![1.0, 2.0, 3.0])),
                ("count".into(), ColumnData::Integers(vec![7, 8, 9])),
                ("kept".into(), ColumnData::Booleans(vec![true, false, true])),
            ],
        )
        .unwrap();
        let arr = table_to_structured_array(&table).unwrap();

        assert_eq!(arr.len(), 3);
        assert_eq!(arr.field_names(), ["_Y", "_X", "count", "kept"]);
        assert_eq!(arr.column_f64("_X"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(arr.get(2, "count"), Some(Scalar::Int64(9)));
        assert_eq!(arr.get(1, "kept"), Some(Scalar::Bool(false)));
    }

    #[test]
    fn empty_table_gives_fieldless_records() {
        let arr = table_to_structured_array(&Table::new(cells(4))).unwrap();
        assert_eq!(arr.len(), 4);
        assert!(arr.fields().is_empty());
        assert_eq!(arr.record_size(), 0);
    }

    #[test]
    fn variable_length_columns_rejected() {
        let table = Table::from_columns(
            cells(2),
            vec![
                ("x".into(), ColumnData::Numeric(vec![1.0, 2.0])),
                ("label".into(), ColumnData::Strings(vec!["a".into(), "b".into()])),
            ],
        )
        .unwrap();
        let err = table_to_structured_array(&table).unwrap_err();
        assert!(err.to_string().contains("label"));
    }

    fn arb_meta() -> impl Strategy<Value = MetaData> {
        let names = || proptest::collection::vec("[a-zA-Z0-9_ ]{0,12}", 0..8);
        let values = proptest::collection::vec(
            ("[a-z]{1,8}", proptest::collection::vec("[ -~]{0,6}", 0..10)),
            0..6,
        );
        (names(), values, names()).prop_map(|(embeddings, annotations, metrics)| {
            let mut meta = MetaData::default();
            for (i, name) in embeddings.iter().enumerate() {
                meta.register_embedding(&i.to_string(), name);
            }
            for (name, vals) in annotations {
                meta.register_annotation(&name, vals);
            }
            for name in metrics {
                meta.register_metric(&name);
            }
            meta
        })
    }

    proptest! {
        #[test]
        fn metadata_roundtrip(meta in arb_meta()) {
            let text = compress_encode(&meta).unwrap();
            prop_assert!(text.is_ascii());
            let back: MetaData = decode_decompress(&text).unwrap();
            prop_assert_eq!(back, meta);
        }
    }
}
