//! Collate adapters: assemble a list of per-slot payloads into one
//! batched payload. The buffer core only ever calls [`Collate::collate`]
//! — it never inspects payload structure itself.

use std::collections::BTreeMap;

use crate::device::{Device, HasDevice, Pinnable};
use crate::error::{ReplayError, Result};

/// Given an ordered list of `n` payloads, returns a single collated
/// payload of type `B`.
pub trait Collate<T, B> {
    /// Assemble `items` into a single batched value.
    fn collate(&self, items: Vec<T>) -> Result<B>;
}

impl<T, B, F> Collate<T, B> for F
where
    F: Fn(Vec<T>) -> Result<B>,
{
    fn collate(&self, items: Vec<T>) -> Result<B> {
        self(items)
    }
}

/// Element-wise stack: payloads are fixed-arity tuples of equal-length
/// rows; the output is the tuple of rows stacked along a new leading
/// axis of length `n`. This generalizes `stack_tensors` from the
/// reference implementation, which zips per-field tensor iterators and
/// calls `torch.stack` on each field.
#[derive(Debug, Default, Clone, Copy)]
pub struct StackCollate;

/// A single collated field: `n` rows of equal width, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedField {
    /// Number of rows stacked (the new leading axis length).
    pub rows: usize,
    /// Width shared by every row.
    pub width: usize,
    /// Row-major flattened data, length `rows * width`.
    pub data: Vec<f32>,
}

impl Collate<Vec<Vec<f32>>, Vec<StackedField>> for StackCollate {
    fn collate(&self, items: Vec<Vec<Vec<f32>>>) -> Result<Vec<StackedField>> {
        let n = items.len();
        if n == 0 {
            return Err(ReplayError::invalid_argument("cannot collate an empty batch"));
        }
        let arity = items[0].len();
        let mut fields = Vec::with_capacity(arity);
        for field_idx in 0..arity {
            let width = items[0][field_idx].len();
            let mut data = Vec::with_capacity(n * width);
            for item in &items {
                let row = item.get(field_idx).ok_or_else(|| {
                    ReplayError::invalid_argument("payload tuples have mismatched arity")
                })?;
                if row.len() != width {
                    return Err(ReplayError::invalid_argument(
                        "payload rows have mismatched shape at the same field position",
                    ));
                }
                data.extend_from_slice(row);
            }
            fields.push(StackedField { rows: n, width, data });
        }
        Ok(fields)
    }
}

/// A structured record: named fields, each a row of `f32`s.
pub type Record = BTreeMap<String, Vec<f32>>;

/// Structured-record stack: payloads are records with identical key
/// sets; the output is a record with each field stacked along a new
/// leading axis. Generalizes `TensorDictReplayBuffer`'s use of
/// `stack_td(x, 0, contiguous=True)` in the reference implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordCollate;

impl Collate<Record, BTreeMap<String, StackedField>> for RecordCollate {
    fn collate(&self, items: Vec<Record>) -> Result<BTreeMap<String, StackedField>> {
        let n = items.len();
        if n == 0 {
            return Err(ReplayError::invalid_argument("cannot collate an empty batch"));
        }
        let keys: Vec<String> = items[0].keys().cloned().collect();
        let mut out = BTreeMap::new();
        for key in keys {
            let width = items[0][&key].len();
            let mut data = Vec::with_capacity(n * width);
            for item in &items {
                let row = item
                    .get(&key)
                    .ok_or_else(|| ReplayError::invalid_argument(format!("record missing key {key:?}")))?;
                if row.len() != width {
                    return Err(ReplayError::invalid_argument(format!(
                        "record field {key:?} has mismatched shape across the batch"
                    )));
                }
                data.extend_from_slice(row);
            }
            out.insert(key, StackedField { rows: n, width, data });
        }
        Ok(out)
    }
}

// Both default collate outputs are plain host-resident buffers; they
// report `Device::Cpu` and treat pinning as a no-op, same rationale as
// `Vec<f64>` importance-sampling weights in `device.rs`.
impl HasDevice for Vec<StackedField> {
    fn device(&self) -> Device {
        Device::Cpu
    }
}

impl Pinnable for Vec<StackedField> {
    fn pin_memory(self) -> Result<Self> {
        Ok(self)
    }
}

impl HasDevice for BTreeMap<String, StackedField> {
    fn device(&self) -> Device {
        Device::Cpu
    }
}

impl Pinnable for BTreeMap<String, StackedField> {
    fn pin_memory(self) -> Result<Self> {
        Ok(self)
    }
}
