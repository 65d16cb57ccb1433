//! DMAP decoder.
//!
//! Decoding runs in two passes over a buffer the reader owns:
//!
//! 1. An integrity scan that only follows the `size` field of each record
//!    header. It rejects grossly malformed input before any field is
//!    materialized and yields the [`RecordSpan`] of every record.
//! 2. A per-record decode that reads the scalars, then the arrays, and
//!    checks that exactly `size` bytes were consumed.
//!
//! Every read is bounded by the end of the record it belongs to, so a
//! field that spills into the next record is reported at the field.

use std::path::Path;

use log::{debug, trace};
use ndarray::{ArrayD, IxDyn};

use crate::error::{DmapError, Result};
use crate::record::{Array, ArrayValue, DmapValue, Record, Scalar, ZERO_DIMENSION_FIELD};
use crate::types::{decode_elements, RecordHeader, TypeTag, WireElement, RECORD_HEADER_SIZE};

/// Maximum nesting of records inside records
pub const MAX_NESTING_DEPTH: usize = 64;

/// Location of one top-level record in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
}

impl RecordSpan {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

// =============================================================================
// Integrity scan
// =============================================================================

/// Walk the record sizes of `data` without decoding any field.
///
/// Fails with `CorruptStructure` if a size is non-positive, overruns the
/// buffer, or the sizes do not add up to exactly the buffer length.
pub fn scan_records(data: &[u8]) -> Result<Vec<RecordSpan>> {
    let total = data.len();
    let mut spans = Vec::new();
    let mut offset = 0usize;
    let mut sum = 0usize;

    while offset < total {
        let index = spans.len();
        let corrupt = |message: String| DmapError::CorruptStructure {
            record: index,
            offset,
            message,
        };

        if total - offset < 8 {
            return Err(corrupt(format!(
                "record header needs 8 bytes, {} remain",
                total - offset
            )));
        }
        let size = i32::from_wire(&data[offset + 4..offset + 8]);
        if size <= 0 {
            return Err(corrupt(format!("record size {} is not positive", size)));
        }
        let size = size as usize;
        if size > total - offset {
            return Err(corrupt(format!(
                "record size {} exceeds the {} bytes remaining",
                size,
                total - offset
            )));
        }
        sum += size;
        if sum > total {
            return Err(corrupt(format!(
                "record sizes add up to {} but the buffer holds {} bytes",
                sum, total
            )));
        }

        spans.push(RecordSpan {
            index,
            offset,
            size,
        });
        offset += size;
    }

    if sum != total {
        return Err(DmapError::CorruptStructure {
            record: spans.len(),
            offset,
            message: format!(
                "record sizes add up to {} but the buffer holds {} bytes",
                sum, total
            ),
        });
    }
    Ok(spans)
}

// =============================================================================
// Cursor
// =============================================================================

/// Read position inside the buffer, tagged with the top-level record index
/// for error reporting
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    record: usize,
}

impl<'a> Cursor<'a> {
    fn corrupt(&self, message: impl Into<String>) -> DmapError {
        DmapError::CorruptStructure {
            record: self.record,
            offset: self.pos,
            message: message.into(),
        }
    }

    fn bounds(&self, name: &str, message: impl Into<String>) -> DmapError {
        DmapError::ArrayBounds {
            record: self.record,
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Take `n` bytes, never crossing `end`
    fn take(&mut self, n: usize, end: usize, what: &str) -> Result<&'a [u8]> {
        if n > end.saturating_sub(self.pos) {
            return Err(self.corrupt(format!(
                "{} needs {} bytes, {} remain in record",
                what,
                n,
                end.saturating_sub(self.pos)
            )));
        }
        let data = self.data;
        let bytes = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read<T: WireElement>(&mut self, end: usize, what: &str) -> Result<T> {
        self.take(T::WIDTH, end, what).map(T::from_wire)
    }

    fn read_tag(&mut self, name: &str, end: usize) -> Result<TypeTag> {
        let byte: u8 = self.read(end, "type tag")?;
        TypeTag::from_byte(byte).ok_or_else(|| DmapError::UnknownTypeTag {
            record: self.record,
            name: name.to_string(),
            tag: byte,
        })
    }

    /// Null-terminated UTF-8 text ending before `end`
    fn read_text(&mut self, end: usize) -> Result<String> {
        let start = self.pos;
        let data = self.data;
        let region = &data[start..end.max(start)];
        let len = region
            .iter()
            .position(|&b| b == 0)
            .ok_or(DmapError::TruncatedText {
                record: self.record,
                offset: start,
            })?;
        let text = std::str::from_utf8(&region[..len])
            .map_err(|e| self.corrupt(format!("text is not valid UTF-8: {}", e)))?
            .to_string();
        self.pos = start + len + 1;
        Ok(text)
    }

    fn read_elements<T: WireElement>(
        &mut self,
        name: &str,
        count: usize,
        shape: &[usize],
        end: usize,
    ) -> Result<ArrayD<T>> {
        let bytes = self.take(count * T::WIDTH, end, "array data")?;
        let values = decode_elements::<T>(bytes);
        self.shaped(name, shape, values)
    }

    fn shaped<T>(&self, name: &str, shape: &[usize], values: Vec<T>) -> Result<ArrayD<T>> {
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| self.bounds(name, format!("cannot shape data to {:?}: {}", shape, e)))
    }
}

// =============================================================================
// Record decode
// =============================================================================

/// Decode one record starting at the cursor; `limit` is the end of the
/// enclosing region (buffer or parent record)
fn decode_record(cur: &mut Cursor, limit: usize, depth: usize) -> Result<Record> {
    if depth > MAX_NESTING_DEPTH {
        return Err(cur.corrupt(format!(
            "records nested deeper than {}",
            MAX_NESTING_DEPTH
        )));
    }

    let start = cur.pos;
    let raw = cur.take(RECORD_HEADER_SIZE, limit, "record header")?;
    let header: RecordHeader = bincode::deserialize(raw)
        .map_err(|e| cur.corrupt(format!("unreadable record header: {}", e)))?;

    if header.size <= 0 {
        return Err(cur.corrupt(format!("record size {} is not positive", header.size)));
    }
    let size = header.size as usize;
    if size > limit - start {
        return Err(cur.corrupt(format!(
            "record size {} exceeds the {} bytes remaining",
            size,
            limit - start
        )));
    }
    if size < RECORD_HEADER_SIZE {
        return Err(cur.corrupt(format!("record size {} is smaller than its header", size)));
    }
    if header.num_scalars <= 0 || header.num_arrays <= 0 {
        return Err(cur.corrupt(format!(
            "record declares {} scalars and {} arrays",
            header.num_scalars, header.num_arrays
        )));
    }
    if header.num_scalars as i64 + header.num_arrays as i64 > size as i64 {
        return Err(cur.corrupt(format!(
            "{} fields cannot fit in a record of {} bytes",
            header.num_scalars as i64 + header.num_arrays as i64,
            size
        )));
    }

    let end = start + size;
    trace!(
        "record {} depth {}: {} bytes, {} scalars, {} arrays",
        cur.record,
        depth,
        size,
        header.num_scalars,
        header.num_arrays
    );

    let mut record = Record::new();
    for _ in 0..header.num_scalars {
        let scalar = decode_scalar(cur, end, depth)?;
        if record.scalar(&scalar.name).is_some() {
            return Err(cur.corrupt(format!("duplicate scalar '{}'", scalar.name)));
        }
        record.push_scalar(scalar);
    }
    for _ in 0..header.num_arrays {
        let array = decode_array(cur, end, size, depth)?;
        if record.array(&array.name).is_some() {
            return Err(cur.corrupt(format!("duplicate array '{}'", array.name)));
        }
        record.push_array(array);
    }

    let consumed = cur.pos - start;
    if consumed != size {
        return Err(cur.corrupt(format!(
            "record declares {} bytes but {} were decoded",
            size, consumed
        )));
    }
    Ok(record)
}

fn decode_scalar(cur: &mut Cursor, end: usize, depth: usize) -> Result<Scalar> {
    let name = cur.read_text(end)?;
    let tag = cur.read_tag(&name, end)?;
    let value = match tag {
        TypeTag::Dmap => DmapValue::Record(Box::new(decode_record(cur, end, depth + 1)?)),
        TypeTag::String => DmapValue::String(cur.read_text(end)?),
        TypeTag::Char => DmapValue::Char(cur.read(end, &name)?),
        TypeTag::Short => DmapValue::Short(cur.read(end, &name)?),
        TypeTag::Int => DmapValue::Int(cur.read(end, &name)?),
        TypeTag::Float => DmapValue::Float(cur.read(end, &name)?),
        TypeTag::Double => DmapValue::Double(cur.read(end, &name)?),
        TypeTag::Long => DmapValue::Long(cur.read(end, &name)?),
        TypeTag::UChar => DmapValue::UChar(cur.read(end, &name)?),
        TypeTag::UShort => DmapValue::UShort(cur.read(end, &name)?),
        TypeTag::UInt => DmapValue::UInt(cur.read(end, &name)?),
        TypeTag::ULong => DmapValue::ULong(cur.read(end, &name)?),
    };
    Ok(Scalar { name, value })
}

fn decode_array(cur: &mut Cursor, end: usize, record_size: usize, depth: usize) -> Result<Array> {
    let name = cur.read_text(end)?;
    let tag = cur.read_tag(&name, end)?;

    let rank: i32 = cur.read(end, "array rank")?;
    if rank <= 0 || rank as usize > end - cur.pos {
        return Err(cur.bounds(&name, format!("rank {} out of range", rank)));
    }

    let mut wire_dims = Vec::with_capacity(rank as usize);
    for _ in 0..rank {
        let dim: i32 = cur.read(end, "array dimension")?;
        if dim < 0 || (dim == 0 && name != ZERO_DIMENSION_FIELD) {
            return Err(cur.bounds(&name, format!("dimension {} is not positive", dim)));
        }
        if dim as usize > record_size {
            return Err(cur.bounds(
                &name,
                format!("dimension {} exceeds record size {}", dim, record_size),
            ));
        }
        wire_dims.push(dim as usize);
    }

    let count = wire_dims
        .iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))
        .filter(|&n| n <= record_size as u64)
        .ok_or_else(|| {
            cur.bounds(
                &name,
                format!("{:?} holds more elements than record size {}", wire_dims, record_size),
            )
        })? as usize;

    let remaining = end - cur.pos;
    if count * tag.min_size() > remaining {
        return Err(cur.bounds(
            &name,
            format!(
                "{} {} elements need at least {} bytes, {} remain in record",
                count,
                tag,
                count * tag.min_size(),
                remaining
            ),
        ));
    }

    let shape: Vec<usize> = wire_dims.iter().rev().copied().collect();
    let value = match tag {
        TypeTag::String => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(cur.read_text(end)?);
            }
            ArrayValue::String(cur.shaped(&name, &shape, values)?)
        }
        TypeTag::Dmap => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(decode_record(cur, end, depth + 1)?);
            }
            ArrayValue::Record(cur.shaped(&name, &shape, values)?)
        }
        TypeTag::Char => ArrayValue::Char(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::Short => ArrayValue::Short(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::Int => ArrayValue::Int(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::Float => ArrayValue::Float(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::Double => ArrayValue::Double(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::Long => ArrayValue::Long(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::UChar => ArrayValue::UChar(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::UShort => ArrayValue::UShort(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::UInt => ArrayValue::UInt(cur.read_elements(&name, count, &shape, end)?),
        TypeTag::ULong => ArrayValue::ULong(cur.read_elements(&name, count, &shape, end)?),
    };
    Ok(Array { name, value })
}

// =============================================================================
// Reader
// =============================================================================

/// Decoder over an owned DMAP buffer
pub struct DmapReader {
    source_name: String,
    data: Vec<u8>,
    spans: Option<Vec<RecordSpan>>,
    next: usize,
}

impl DmapReader {
    /// Load a whole file. A missing or zero-length file is `EmptyInput`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DmapError::EmptyInput { source_name });
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Opened {} ({} bytes)", source_name, data.len());
        Self::with_source(data, source_name)
    }

    /// Take ownership of an in-memory stream. Zero length is `EmptyInput`.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::with_source(data.into(), "stream".to_string())
    }

    fn with_source(data: Vec<u8>, source_name: String) -> Result<Self> {
        if data.is_empty() {
            return Err(DmapError::EmptyInput { source_name });
        }
        Ok(Self {
            source_name,
            data,
            spans: None,
            next: 0,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Total bytes in the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Run the integrity scan once and return the located records
    pub fn check_integrity(&mut self) -> Result<&[RecordSpan]> {
        if self.spans.is_none() {
            let spans = scan_records(&self.data)?;
            debug!(
                "{}: integrity scan found {} records in {} bytes",
                self.source_name,
                spans.len(),
                self.data.len()
            );
            self.spans = Some(spans);
        }
        Ok(self.spans.as_deref().unwrap_or(&[]))
    }

    /// Decode one record at a known span. A span reaching outside the
    /// buffer is `CorruptStructure`.
    pub fn decode_span(&self, span: RecordSpan) -> Result<Record> {
        let limit = span
            .offset
            .checked_add(span.size)
            .filter(|&end| span.offset < self.data.len() && end <= self.data.len())
            .ok_or_else(|| DmapError::CorruptStructure {
                record: span.index,
                offset: span.offset,
                message: format!(
                    "span of {} bytes lies outside the {} byte buffer",
                    span.size,
                    self.data.len()
                ),
            })?;
        let mut cur = Cursor {
            data: &self.data,
            pos: span.offset,
            record: span.index,
        };
        decode_record(&mut cur, limit, 0)
    }

    /// Decode the next record, `None` after the last one
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        self.check_integrity()?;
        let span = match self.spans.as_ref().and_then(|s| s.get(self.next)) {
            Some(span) => *span,
            None => return Ok(None),
        };
        let record = self.decode_span(span)?;
        self.next += 1;
        Ok(Some(record))
    }

    /// Start over from the first record
    pub fn rewind(&mut self) {
        self.next = 0;
    }

    /// Decode every record, in order
    pub fn read_records(&mut self) -> Result<Vec<Record>> {
        self.rewind();
        let mut records = Vec::with_capacity(self.check_integrity()?.len());
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        debug!("{}: decoded {} records", self.source_name, records.len());
        Ok(records)
    }
}

/// Decode every record in a file
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    DmapReader::open(path)?.read_records()
}

/// Decode every record in an in-memory buffer
pub fn read_bytes(data: &[u8]) -> Result<Vec<Record>> {
    DmapReader::from_bytes(data)?.read_records()
}
