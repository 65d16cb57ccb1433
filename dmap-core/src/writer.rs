//! DMAP encoder.
//!
//! Each record is assembled in memory from its scalars and arrays, with a
//! 16 byte header carrying [`ENCODING_CODE`], the total size and the two
//! field counts. Records are rejected up front if the decoder would not
//! be able to read them back.

use std::io::Write;
use std::path::Path;

use log::{debug, trace};
use ndarray::ArrayD;

use crate::error::{DmapError, Result};
use crate::reader::MAX_NESTING_DEPTH;
use crate::record::{Array, ArrayValue, DmapValue, Record, Scalar, ZERO_DIMENSION_FIELD};
use crate::types::{RecordHeader, WireElement, ENCODING_CODE};

/// Streams encoded records to any `Write`
pub struct DmapWriter<W: Write> {
    writer: W,
    records_written: usize,
    bytes_written: usize,
}

impl<W: Write> DmapWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// Encode one record and write it
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let bytes = encode_record(record, self.records_written)?;
        self.writer.write_all(&bytes)?;
        trace!(
            "Wrote record {} ({} bytes)",
            self.records_written,
            bytes.len()
        );
        self.records_written += 1;
        self.bytes_written += bytes.len();
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Flush and hand back the underlying writer.
    ///
    /// A writer that never received a record is `NothingToWrite`.
    pub fn finish(mut self) -> Result<W> {
        if self.records_written == 0 {
            return Err(DmapError::NothingToWrite);
        }
        self.writer.flush()?;
        debug!(
            "Finished writing {} records ({} bytes)",
            self.records_written, self.bytes_written
        );
        Ok(self.writer)
    }
}

/// Encode records into one buffer
pub fn to_bytes(records: &[Record]) -> Result<Vec<u8>> {
    if records.is_empty() {
        return Err(DmapError::NothingToWrite);
    }
    let capacity = records.iter().map(Record::encoded_len).sum();
    let mut writer = DmapWriter::new(Vec::with_capacity(capacity));
    for record in records {
        writer.write_record(record)?;
    }
    writer.finish()
}

/// Encode records and write them to `path`.
///
/// Everything is encoded before the file is created, so an invalid
/// record leaves no partial output behind.
pub fn write_file(path: impl AsRef<Path>, records: &[Record]) -> Result<()> {
    let bytes = to_bytes(records)?;
    std::fs::write(path.as_ref(), &bytes)?;
    debug!(
        "Wrote {} records to {} ({} bytes)",
        records.len(),
        path.as_ref().display(),
        bytes.len()
    );
    Ok(())
}

// =============================================================================
// Byte assembly
// =============================================================================

/// Encode one record; `index` is used for error reporting only
pub fn encode_record(record: &Record, index: usize) -> Result<Vec<u8>> {
    encode_nested(record, index, 0)
}

fn encode_nested(record: &Record, index: usize, depth: usize) -> Result<Vec<u8>> {
    let invalid = |message: String| DmapError::InvalidRecord {
        record: index,
        message,
    };

    if depth > MAX_NESTING_DEPTH {
        return Err(invalid(format!(
            "records nested deeper than {}",
            MAX_NESTING_DEPTH
        )));
    }

    if record.num_scalars() == 0 || record.num_arrays() == 0 {
        return Err(invalid(format!(
            "a record needs at least one scalar and one array, got {} and {}",
            record.num_scalars(),
            record.num_arrays()
        )));
    }

    let size = record.encoded_len();
    let header = RecordHeader {
        code: ENCODING_CODE,
        size: to_i32(size).ok_or_else(|| invalid(format!("{} bytes is too large", size)))?,
        num_scalars: to_i32(record.num_scalars())
            .ok_or_else(|| invalid("too many scalars".to_string()))?,
        num_arrays: to_i32(record.num_arrays())
            .ok_or_else(|| invalid("too many arrays".to_string()))?,
    };

    let mut out = Vec::with_capacity(size);
    bincode::serialize_into(&mut out, &header)
        .map_err(|e| invalid(format!("cannot encode header: {}", e)))?;
    for scalar in record.scalars() {
        put_scalar(&mut out, scalar, index, depth)?;
    }
    for array in record.arrays() {
        put_array(&mut out, array, index, size, depth)?;
    }

    debug_assert_eq!(out.len(), size);
    Ok(out)
}

fn to_i32(n: usize) -> Option<i32> {
    i32::try_from(n).ok()
}

fn put_text(out: &mut Vec<u8>, text: &str, field: &str) -> Result<()> {
    if text.as_bytes().contains(&0) {
        return Err(DmapError::invalid_field(field, "text contains a null byte"));
    }
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    Ok(())
}

fn put_scalar(out: &mut Vec<u8>, scalar: &Scalar, index: usize, depth: usize) -> Result<()> {
    put_text(out, &scalar.name, &scalar.name)?;
    out.push(scalar.tag().as_byte());
    match &scalar.value {
        DmapValue::Char(v) => v.put_wire(out),
        DmapValue::Short(v) => v.put_wire(out),
        DmapValue::Int(v) => v.put_wire(out),
        DmapValue::Float(v) => v.put_wire(out),
        DmapValue::Double(v) => v.put_wire(out),
        DmapValue::Long(v) => v.put_wire(out),
        DmapValue::UChar(v) => v.put_wire(out),
        DmapValue::UShort(v) => v.put_wire(out),
        DmapValue::UInt(v) => v.put_wire(out),
        DmapValue::ULong(v) => v.put_wire(out),
        DmapValue::String(s) => put_text(out, s, &scalar.name)?,
        DmapValue::Record(r) => out.extend_from_slice(&encode_nested(r, index, depth + 1)?),
    }
    Ok(())
}

fn put_elements<T: WireElement>(out: &mut Vec<u8>, values: &ArrayD<T>) {
    for &v in values.iter() {
        v.put_wire(out);
    }
}

/// `record_size` is the encoded size of the record holding the array,
/// which bounds every dimension and the element count on decode
fn put_array(
    out: &mut Vec<u8>,
    array: &Array,
    index: usize,
    record_size: usize,
    depth: usize,
) -> Result<()> {
    let name = array.name.as_str();
    if array.rank() == 0 {
        return Err(DmapError::invalid_field(
            name,
            "arrays need at least one dimension",
        ));
    }
    let wire_dims = array.wire_dims();
    if wire_dims.contains(&0) && name != ZERO_DIMENSION_FIELD {
        return Err(DmapError::invalid_field(
            name,
            format!("zero-length dimension in shape {:?}", array.dims()),
        ));
    }
    if wire_dims.iter().any(|&d| d > record_size) {
        return Err(DmapError::invalid_field(
            name,
            format!(
                "shape {:?} has a dimension larger than the {} byte record",
                array.dims(),
                record_size
            ),
        ));
    }
    if array.value.len() > record_size {
        return Err(DmapError::invalid_field(
            name,
            format!(
                "{} elements exceed the {} byte record",
                array.value.len(),
                record_size
            ),
        ));
    }

    put_text(out, name, name)?;
    out.push(array.tag().as_byte());
    to_i32(array.rank())
        .ok_or_else(|| DmapError::invalid_field(name, "rank is too large"))?
        .put_wire(out);
    for dim in wire_dims {
        to_i32(dim)
            .ok_or_else(|| DmapError::invalid_field(name, format!("dimension {} is too large", dim)))?
            .put_wire(out);
    }

    match &array.value {
        ArrayValue::Char(a) => put_elements(out, a),
        ArrayValue::Short(a) => put_elements(out, a),
        ArrayValue::Int(a) => put_elements(out, a),
        ArrayValue::Float(a) => put_elements(out, a),
        ArrayValue::Double(a) => put_elements(out, a),
        ArrayValue::Long(a) => put_elements(out, a),
        ArrayValue::UChar(a) => put_elements(out, a),
        ArrayValue::UShort(a) => put_elements(out, a),
        ArrayValue::UInt(a) => put_elements(out, a),
        ArrayValue::ULong(a) => put_elements(out, a),
        ArrayValue::String(a) => {
            for s in a.iter() {
                put_text(out, s, name)?;
            }
        }
        ArrayValue::Record(a) => {
            for r in a.iter() {
                out.extend_from_slice(&encode_nested(r, index, depth + 1)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::reader::read_bytes;
    use crate::record::{FieldValue, TypeOverrides};
    use crate::types::TypeTag;
    use ndarray::IxDyn;

    fn sample() -> Record {
        Record::from_fields(
            vec![
                ("stid", FieldValue::scalar(5i16)),
                ("xcf", FieldValue::array(vec![4.3f32, 3.5, 2.3])),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_exact_layout() {
        let bytes = to_bytes(&[sample()]).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&65537i32.to_le_bytes());
        expected.extend_from_slice(&49i32.to_le_bytes());
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(b"stid\0");
        expected.push(2);
        expected.extend_from_slice(&5i16.to_le_bytes());
        expected.extend_from_slice(b"xcf\0");
        expected.push(4);
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&3i32.to_le_bytes());
        for v in [4.3f32, 3.5, 2.3] {
            expected.extend_from_slice(&v.to_le_bytes());
        }

        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_round_trip() {
        let mut nested = Record::new();
        nested.add_scalar("lat", 52.16f64).unwrap();
        nested.add_array("beams", vec![0u8, 1, 2]).unwrap();

        let mut rec = sample();
        rec.add_scalar("combf", "normal scan").unwrap();
        rec.add_scalar("site", nested).unwrap();
        rec.add_array("gflg", vec![-1i8, 0, 1]).unwrap();
        rec.add_array(
            "pwr0",
            ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
        )
        .unwrap();
        rec.add_array("names", vec!["a".to_string(), String::new()])
            .unwrap();

        let bytes = to_bytes(&[rec.clone(), sample()]).unwrap();
        let back = read_bytes(&bytes).unwrap();
        assert_eq!(back, vec![rec, sample()]);
    }

    #[test]
    fn test_nothing_to_write() {
        assert_eq!(to_bytes(&[]).unwrap_err().kind(), ErrorKind::NothingToWrite);
        assert_eq!(
            DmapWriter::new(Vec::new()).finish().unwrap_err().kind(),
            ErrorKind::NothingToWrite
        );
    }

    #[test]
    fn test_rejects_unreadable_records() {
        let mut only_scalars = Record::new();
        only_scalars.add_scalar("stid", 5i16).unwrap();
        assert_eq!(
            to_bytes(&[only_scalars]).unwrap_err().kind(),
            ErrorKind::InvalidRecord
        );

        let mut empty_dim = Record::new();
        empty_dim.add_scalar("stid", 5i16).unwrap();
        empty_dim.add_array("pwr0", Vec::<f32>::new()).unwrap();
        assert_eq!(
            to_bytes(&[empty_dim]).unwrap_err().kind(),
            ErrorKind::InvalidField
        );

        let mut null_text = sample();
        null_text.add_scalar("combf", "a\0b").unwrap();
        assert_eq!(
            to_bytes(&[null_text]).unwrap_err().kind(),
            ErrorKind::InvalidField
        );
    }

    #[test]
    fn test_rejects_dimensions_the_decoder_would_refuse() {
        let mut wide_slist = sample();
        wide_slist
            .add_array("slist", ArrayD::<i16>::zeros(IxDyn(&[0, 500])))
            .unwrap();
        assert_eq!(
            to_bytes(&[wide_slist]).unwrap_err().kind(),
            ErrorKind::InvalidField
        );

        let mut narrow_slist = sample();
        narrow_slist
            .add_array("slist", ArrayD::<i16>::zeros(IxDyn(&[0, 5])))
            .unwrap();
        let back = read_bytes(&to_bytes(&[narrow_slist.clone()]).unwrap()).unwrap();
        assert_eq!(back[0], narrow_slist);
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let chain = |levels: usize| {
            let mut rec = sample();
            for _ in 0..levels {
                let mut outer = Record::new();
                outer.add_scalar("inner", rec).unwrap();
                outer.add_array("pad", vec![0u8]).unwrap();
                rec = outer;
            }
            rec
        };

        let deepest = chain(MAX_NESTING_DEPTH);
        assert_eq!(
            read_bytes(&to_bytes(&[deepest.clone()]).unwrap()).unwrap(),
            vec![deepest]
        );
        assert!(matches!(
            to_bytes(&[chain(MAX_NESTING_DEPTH + 1)]),
            Err(DmapError::InvalidRecord { record: 0, .. })
        ));
    }

    #[test]
    fn test_empty_slist_allowed() {
        let mut rec = sample();
        rec.add_array("slist", Vec::<i16>::new()).unwrap();
        let back = read_bytes(&to_bytes(&[rec.clone()]).unwrap()).unwrap();
        assert_eq!(back[0], rec);
    }

    #[test]
    fn test_override_narrows_wire_type() {
        let mut overrides = TypeOverrides::new();
        overrides.insert("cp".to_string(), TypeTag::Short);
        let rec = Record::from_fields(
            vec![
                ("cp", FieldValue::scalar(153i32)),
                ("ptab", FieldValue::array(vec![0i16, 9])),
            ],
            Some(&overrides),
        )
        .unwrap();

        let bytes = to_bytes(&[rec]).unwrap();
        // header + "cp\0" + tag + 2 value bytes + "ptab\0" + tag + rank + dim + 4
        assert_eq!(bytes.len(), 16 + 3 + 1 + 2 + 5 + 1 + 4 + 4 + 4);
        assert_eq!(bytes[16 + 3], TypeTag::Short.as_byte());
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fitacf");
        write_file(&path, &[sample()]).unwrap();
        assert_eq!(crate::reader::read_file(&path).unwrap(), vec![sample()]);
    }
}
