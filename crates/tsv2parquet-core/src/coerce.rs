// Type coercion for declared columns
//
// Raw cells become typed Arrow arrays. Per-value failures become null and are
// never surfaced. Integer columns are Int64 or Float64 for the whole member:
// either fixed up front from an `IntegerScan` over every chunk, or taken from
// the first chunk. The choice is committed in the plan and every later chunk
// is coerced to it so the output schema never changes mid-file.

use crate::schema::{ColumnSchema, DeclaredType};
use crate::types::RowChunk;
use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

/// Absolute distance from the nearest whole number still treated as integral
pub const INTEGER_TOLERANCE: f64 = 1e-10;

// i64::MAX is not representable as f64; 2^63 is the first value past the range
const I64_UPPER_EXCLUSIVE: f64 = 9_223_372_036_854_775_808.0;
const I64_LOWER_INCLUSIVE: f64 = -9_223_372_036_854_775_808.0;

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let year = value[0..4].parse::<i32>().ok()?;
    let month = value[5..7].parse::<u32>().ok()?;
    let day = value[8..10].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a cell as a real number. Non-finite results are treated as unparseable.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn in_i64_range(value: f64) -> bool {
    (I64_LOWER_INCLUSIVE..I64_UPPER_EXCLUSIVE).contains(&value)
}

fn is_integral(value: f64) -> bool {
    (value - value.round_ties_even()).abs() <= INTEGER_TOLERANCE && in_i64_range(value)
}

/// A declared INTEGER column materialized for one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum NumericColumn {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
}

impl NumericColumn {
    /// Chunk-local decision: Int64 when every parsed value is integral
    /// (including the all-null case), Float64 otherwise.
    pub fn from_values<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let parsed: Vec<Option<f64>> = values.map(parse_number).collect();
        if parsed.iter().flatten().all(|v| is_integral(*v)) {
            NumericColumn::Integer(
                parsed
                    .into_iter()
                    .map(|v| v.map(|v| v.round_ties_even() as i64))
                    .collect(),
            )
        } else {
            NumericColumn::Float(parsed)
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            NumericColumn::Integer(_) => DataType::Int64,
            NumericColumn::Float(_) => DataType::Float64,
        }
    }

    pub fn into_array(self) -> ArrayRef {
        match self {
            NumericColumn::Integer(values) => Arc::new(Int64Array::from(values)),
            NumericColumn::Float(values) => Arc::new(Float64Array::from(values)),
        }
    }
}

fn date_array<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    let days: Vec<Option<i32>> = values
        .map(|v| parse_date(v).map(Date32Type::from_naive_date))
        .collect();
    Arc::new(Date32Array::from(days))
}

/// Coerce to a committed Int64. Returns the array and how many values had to
/// be rounded or dropped to fit.
fn committed_integer_array<'a>(values: impl Iterator<Item = &'a str>) -> (ArrayRef, usize) {
    let mut adjusted = 0usize;
    let ints: Vec<Option<i64>> = values
        .map(|raw| {
            let value = parse_number(raw)?;
            if !in_i64_range(value) {
                adjusted += 1;
                return None;
            }
            if !is_integral(value) {
                adjusted += 1;
            }
            Some(value.round_ties_even() as i64)
        })
        .collect();
    (Arc::new(Int64Array::from(ints)), adjusted)
}

fn float_array<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    let floats: Vec<Option<f64>> = values.map(parse_number).collect();
    Arc::new(Float64Array::from(floats))
}

/// Whole-member INTEGER type decision.
///
/// Fed every normalized chunk of a member before any of them is coerced, so a
/// chunked member ends up with the same column types as reading it in one go.
#[derive(Debug, Clone)]
pub struct IntegerScan {
    columns: Arc<[String]>,
    // `Some(all values integral so far)` for declared INTEGER columns
    integral: Vec<Option<bool>>,
    rows: u64,
}

impl IntegerScan {
    pub fn new(columns: Arc<[String]>, schema: &ColumnSchema) -> Self {
        let integral = columns
            .iter()
            .map(|name| (schema.declared_type(name) == DeclaredType::Integer).then_some(true))
            .collect();
        Self {
            columns,
            integral,
            rows: 0,
        }
    }

    /// True when no column is declared INTEGER and there is nothing to decide.
    pub fn is_empty(&self) -> bool {
        self.integral.iter().all(Option::is_none)
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn observe(&mut self, chunk: &RowChunk) {
        self.rows += chunk.num_rows() as u64;
        for (index, state) in self.integral.iter_mut().enumerate() {
            if *state == Some(true) {
                let all_integral = chunk
                    .column_values(index)
                    .filter_map(parse_number)
                    .all(is_integral);
                if !all_integral {
                    *state = Some(false);
                }
            }
        }
    }

    /// Decided type per column; `None` for columns not declared INTEGER.
    pub fn data_type(&self, index: usize) -> Option<DataType> {
        self.integral.get(index).copied().flatten().map(|integral| {
            if integral {
                DataType::Int64
            } else {
                DataType::Float64
            }
        })
    }
}

/// Per-member coercion state.
///
/// Created from the member header and the resolved schema. The Arrow schema
/// is derived from the first coerced chunk and reused for every later chunk.
#[derive(Debug)]
pub struct CoercionPlan {
    columns: Arc<[String]>,
    declared: Vec<DeclaredType>,
    fixed: Vec<Option<DataType>>,
    committed: Option<SchemaRef>,
}

impl CoercionPlan {
    pub fn new(columns: Arc<[String]>, schema: &ColumnSchema) -> Self {
        let declared = columns
            .iter()
            .map(|name| schema.declared_type(name))
            .collect();
        let fixed = vec![None; columns.len()];
        Self {
            columns,
            declared,
            fixed,
            committed: None,
        }
    }

    /// Fix INTEGER column types from a whole-member scan instead of the first chunk.
    pub fn fix_integer_types(&mut self, scan: &IntegerScan) -> Result<()> {
        if self.committed.is_some() {
            bail!("integer types fixed after the output schema was committed");
        }
        if scan.columns.as_ref() != self.columns.as_ref() {
            bail!(
                "integer scan header ({} columns) does not match the member header ({} columns)",
                scan.columns.len(),
                self.columns.len()
            );
        }
        self.fixed = (0..self.columns.len()).map(|i| scan.data_type(i)).collect();
        Ok(())
    }

    /// The committed output schema, once the first chunk has been coerced.
    pub fn schema(&self) -> Option<&SchemaRef> {
        self.committed.as_ref()
    }

    pub fn declared_types(&self) -> &[DeclaredType] {
        &self.declared
    }

    /// Coerce one normalized chunk into a record batch.
    pub fn coerce(&mut self, chunk: &RowChunk) -> Result<RecordBatch> {
        if chunk.columns().as_ref() != self.columns.as_ref() {
            bail!(
                "chunk header ({} columns) does not match the member header ({} columns)",
                chunk.num_columns(),
                self.columns.len()
            );
        }

        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());
        for (index, declared) in self.declared.iter().enumerate() {
            let values = chunk.column_values(index);
            let array = match declared {
                DeclaredType::String => Arc::new(StringArray::from_iter_values(values)) as ArrayRef,
                DeclaredType::Date => date_array(values),
                DeclaredType::Integer => {
                    let decided = match &self.committed {
                        Some(schema) => Some(schema.field(index).data_type().clone()),
                        None => self.fixed[index].clone(),
                    };
                    match decided {
                        None => NumericColumn::from_values(values).into_array(),
                        Some(DataType::Int64) => {
                            let (array, adjusted) = committed_integer_array(values);
                            if adjusted > 0 {
                                warn!(
                                    column = %self.columns[index],
                                    adjusted,
                                    "Values do not fit the committed integer column; rounded"
                                );
                            }
                            array
                        }
                        Some(_) => float_array(values),
                    }
                }
            };
            arrays.push(array);
        }

        let schema = match self.committed.clone() {
            Some(schema) => schema,
            None => {
                let fields: Vec<Field> = self
                    .columns
                    .iter()
                    .zip(arrays.iter())
                    .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
                    .collect();
                let schema: SchemaRef = Arc::new(Schema::new(fields));
                debug!(
                    columns = schema.fields().len(),
                    "Committed output schema from first chunk"
                );
                self.committed = Some(Arc::clone(&schema));
                schema
            }
        };

        RecordBatch::try_new(schema, arrays).context("failed to assemble record batch")
    }
}
