/// Preprocessing of raw form input into the tensor the mission models expect.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mission::FieldSpec;

/// The raw text of a form, keyed by field name.
/// Updates produce a new record; the original is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues
{
    pub fn new() -> Self
    {
        FormValues(BTreeMap::new())
    }

    /// Returns a copy of this record with one named entry replaced.
    pub fn with_field(&self, name: impl Into<String>, raw: impl Into<String>) -> FormValues
    {
        let mut entries = self.0.clone();
        entries.insert(name.into(), raw.into());
        FormValues(entries)
    }

    pub fn get(&self, name: &str) -> Option<&str>
    {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize
    {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)>
    {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self
    {
        FormValues(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parses one field's raw text. Empty, unparseable and non-finite values are errors;
/// nothing is ever coerced to zero.
pub fn parse_feature(field: &str, raw: &str) -> Result<f32>
{
    let trimmed = raw.trim();
    if trimmed.is_empty()
    {
        return Err(Error::InvalidInput { field: field.to_string(), reason: "value is empty".to_string() });
    }
    let value: f64 = trimmed.parse().map_err(|_| Error::InvalidInput {
        field: field.to_string(),
        reason: format!("{:?} is not a number", raw),
    })?;
    // Checked after narrowing too: a finite f64 can still overflow f32.
    let narrowed = value as f32;
    if !value.is_finite() || !narrowed.is_finite()
    {
        return Err(Error::InvalidInput { field: field.to_string(), reason: format!("{:?} is not a finite number", raw) });
    }
    Ok(narrowed)
}

/// Builds the `[1, fields.len()]` input row, one column per field in the given order.
/// Fails on the first field that is missing or does not parse.
pub fn assemble_feature_vector(fields: &[FieldSpec], values: &FormValues) -> Result<Array2<f32>>
{
    let row = fields.iter()
        .map(|field| {
            let raw = values.get(field.name).ok_or_else(|| Error::InvalidInput {
                field: field.name.to_string(),
                reason: "value is missing".to_string(),
            })?;
            parse_feature(field.name, raw)
        })
        .collect::<Result<Vec<f32>>>()?;

    let columns = row.len();
    Array2::from_shape_vec((1, columns), row)
        .map_err(|e| Error::InvalidInput { field: String::new(), reason: e.to_string() })
}
