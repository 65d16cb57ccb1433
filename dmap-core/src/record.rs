//! In-memory record model shared by the reader and the writer.
//!
//! A [`Record`] holds an ordered group of named [`Scalar`]s followed by an
//! ordered group of named [`Array`]s. Values are closed variants over the
//! DMAP type table, so the wire tag of every field is known from its value.
//! Nested records are plain owned values (`Box<Record>` for scalars,
//! `ArrayD<Record>` for arrays).
//!
//! Arrays are stored in their logical (outer-to-inner) shape. The wire
//! order of the dimensions is the reverse, see [`Array::wire_dims`].

use std::collections::HashMap;

use ndarray::{Array1, ArrayD};
use num_traits::{NumCast, ToPrimitive};

use crate::error::{DmapError, Result};
use crate::types::{TypeTag, RECORD_HEADER_SIZE};

/// The only array name allowed to carry a zero-length dimension.
///
/// `slist` lists the range gates with valid data and is empty for records
/// where nothing could be fitted.
pub const ZERO_DIMENSION_FIELD: &str = "slist";

/// Per-field type overrides applied when building records
pub type TypeOverrides = HashMap<String, TypeTag>;

// =============================================================================
// Scalar values
// =============================================================================

/// A single typed value
#[derive(Debug, Clone, PartialEq)]
pub enum DmapValue {
    Char(i8),
    Short(i16),
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
    Long(i64),
    UChar(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Record(Box<Record>),
}

impl DmapValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            DmapValue::Char(_) => TypeTag::Char,
            DmapValue::Short(_) => TypeTag::Short,
            DmapValue::Int(_) => TypeTag::Int,
            DmapValue::Float(_) => TypeTag::Float,
            DmapValue::Double(_) => TypeTag::Double,
            DmapValue::String(_) => TypeTag::String,
            DmapValue::Long(_) => TypeTag::Long,
            DmapValue::UChar(_) => TypeTag::UChar,
            DmapValue::UShort(_) => TypeTag::UShort,
            DmapValue::UInt(_) => TypeTag::UInt,
            DmapValue::ULong(_) => TypeTag::ULong,
            DmapValue::Record(_) => TypeTag::Dmap,
        }
    }

    /// Number of value bytes on the wire (excluding name and tag)
    pub fn encoded_len(&self) -> usize {
        match self {
            DmapValue::String(s) => s.len() + 1,
            DmapValue::Record(r) => r.encoded_len(),
            other => other.tag().fixed_size().unwrap_or(0),
        }
    }

    /// Integer view of any integer variant
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DmapValue::Char(v) => Some(*v as i64),
            DmapValue::Short(v) => Some(*v as i64),
            DmapValue::Int(v) => Some(*v as i64),
            DmapValue::Long(v) => Some(*v),
            DmapValue::UChar(v) => Some(*v as i64),
            DmapValue::UShort(v) => Some(*v as i64),
            DmapValue::UInt(v) => Some(*v as i64),
            DmapValue::ULong(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Floating point view of any numeric variant
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DmapValue::Float(v) => Some(*v as f64),
            DmapValue::Double(v) => Some(*v),
            DmapValue::ULong(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DmapValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            DmapValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Convert to another wire type, failing if the value does not fit
    pub fn cast(self, tag: TypeTag, name: &str) -> Result<DmapValue> {
        if self.tag() == tag {
            return Ok(self);
        }
        match self {
            DmapValue::Char(v) => cast_number(v, tag, name),
            DmapValue::Short(v) => cast_number(v, tag, name),
            DmapValue::Int(v) => cast_number(v, tag, name),
            DmapValue::Float(v) => cast_number(v, tag, name),
            DmapValue::Double(v) => cast_number(v, tag, name),
            DmapValue::Long(v) => cast_number(v, tag, name),
            DmapValue::UChar(v) => cast_number(v, tag, name),
            DmapValue::UShort(v) => cast_number(v, tag, name),
            DmapValue::UInt(v) => cast_number(v, tag, name),
            DmapValue::ULong(v) => cast_number(v, tag, name),
            other => Err(DmapError::invalid_field(
                name,
                format!("{} value cannot be stored as {}", other.tag(), tag),
            )),
        }
    }
}

fn cast_number<T: ToPrimitive + Copy>(v: T, tag: TypeTag, name: &str) -> Result<DmapValue> {
    let out_of_range =
        || DmapError::invalid_field(name, format!("value cannot be represented as {}", tag));
    Ok(match tag {
        TypeTag::Char => DmapValue::Char(<i8 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::Short => DmapValue::Short(<i16 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::Int => DmapValue::Int(<i32 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::Float => DmapValue::Float(<f32 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::Double => {
            DmapValue::Double(<f64 as NumCast>::from(v).ok_or_else(out_of_range)?)
        }
        TypeTag::Long => DmapValue::Long(<i64 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::UChar => DmapValue::UChar(<u8 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::UShort => {
            DmapValue::UShort(<u16 as NumCast>::from(v).ok_or_else(out_of_range)?)
        }
        TypeTag::UInt => DmapValue::UInt(<u32 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::ULong => DmapValue::ULong(<u64 as NumCast>::from(v).ok_or_else(out_of_range)?),
        TypeTag::String | TypeTag::Dmap => {
            return Err(DmapError::invalid_field(
                name,
                format!("numeric value cannot be stored as {}", tag),
            ))
        }
    })
}

macro_rules! value_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for DmapValue {
            fn from(v: $t) -> Self {
                DmapValue::$variant(v)
            }
        }
    };
}

value_from!(i8, Char);
value_from!(i16, Short);
value_from!(i32, Int);
value_from!(f32, Float);
value_from!(f64, Double);
value_from!(String, String);
value_from!(i64, Long);
value_from!(u8, UChar);
value_from!(u16, UShort);
value_from!(u32, UInt);
value_from!(u64, ULong);

impl From<&str> for DmapValue {
    fn from(v: &str) -> Self {
        DmapValue::String(v.to_string())
    }
}

/// Booleans have no tag of their own and are stored as `char` 0 or 1
impl From<bool> for DmapValue {
    fn from(v: bool) -> Self {
        DmapValue::Char(v as i8)
    }
}

impl From<Record> for DmapValue {
    fn from(v: Record) -> Self {
        DmapValue::Record(Box::new(v))
    }
}

// =============================================================================
// Array values
// =============================================================================

/// An n-dimensional typed array in logical (row-major) shape
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Char(ArrayD<i8>),
    Short(ArrayD<i16>),
    Int(ArrayD<i32>),
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
    String(ArrayD<String>),
    Long(ArrayD<i64>),
    UChar(ArrayD<u8>),
    UShort(ArrayD<u16>),
    UInt(ArrayD<u32>),
    ULong(ArrayD<u64>),
    Record(ArrayD<Record>),
}

/// Apply the same expression to whichever `ArrayD` an [`ArrayValue`] holds
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayValue::Char($arr) => $body,
            ArrayValue::Short($arr) => $body,
            ArrayValue::Int($arr) => $body,
            ArrayValue::Float($arr) => $body,
            ArrayValue::Double($arr) => $body,
            ArrayValue::String($arr) => $body,
            ArrayValue::Long($arr) => $body,
            ArrayValue::UChar($arr) => $body,
            ArrayValue::UShort($arr) => $body,
            ArrayValue::UInt($arr) => $body,
            ArrayValue::ULong($arr) => $body,
            ArrayValue::Record($arr) => $body,
        }
    };
}

impl ArrayValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            ArrayValue::Char(_) => TypeTag::Char,
            ArrayValue::Short(_) => TypeTag::Short,
            ArrayValue::Int(_) => TypeTag::Int,
            ArrayValue::Float(_) => TypeTag::Float,
            ArrayValue::Double(_) => TypeTag::Double,
            ArrayValue::String(_) => TypeTag::String,
            ArrayValue::Long(_) => TypeTag::Long,
            ArrayValue::UChar(_) => TypeTag::UChar,
            ArrayValue::UShort(_) => TypeTag::UShort,
            ArrayValue::UInt(_) => TypeTag::UInt,
            ArrayValue::ULong(_) => TypeTag::ULong,
            ArrayValue::Record(_) => TypeTag::Dmap,
        }
    }

    /// Logical shape, outermost dimension first
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of element bytes on the wire
    pub fn encoded_data_len(&self) -> usize {
        match self {
            ArrayValue::String(a) => a.iter().map(|s| s.len() + 1).sum(),
            ArrayValue::Record(a) => a.iter().map(Record::encoded_len).sum(),
            other => other.len() * other.tag().fixed_size().unwrap_or(0),
        }
    }

    /// Convert every element to another wire type, failing if any does not fit
    pub fn cast(self, tag: TypeTag, name: &str) -> Result<ArrayValue> {
        if self.tag() == tag {
            return Ok(self);
        }
        match &self {
            ArrayValue::Char(a) => cast_array(a, tag, name),
            ArrayValue::Short(a) => cast_array(a, tag, name),
            ArrayValue::Int(a) => cast_array(a, tag, name),
            ArrayValue::Float(a) => cast_array(a, tag, name),
            ArrayValue::Double(a) => cast_array(a, tag, name),
            ArrayValue::Long(a) => cast_array(a, tag, name),
            ArrayValue::UChar(a) => cast_array(a, tag, name),
            ArrayValue::UShort(a) => cast_array(a, tag, name),
            ArrayValue::UInt(a) => cast_array(a, tag, name),
            ArrayValue::ULong(a) => cast_array(a, tag, name),
            other => Err(DmapError::invalid_field(
                name,
                format!("{} array cannot be stored as {}", other.tag(), tag),
            )),
        }
    }
}

fn convert_elements<T, U>(a: &ArrayD<T>) -> Option<ArrayD<U>>
where
    T: ToPrimitive + Copy,
    U: NumCast,
{
    let values: Option<Vec<U>> = a.iter().map(|&v| <U as NumCast>::from(v)).collect();
    values.and_then(|v| ArrayD::from_shape_vec(a.raw_dim(), v).ok())
}

fn cast_array<T: ToPrimitive + Copy>(a: &ArrayD<T>, tag: TypeTag, name: &str) -> Result<ArrayValue> {
    let out_of_range = || {
        DmapError::invalid_field(
            name,
            format!("array element cannot be represented as {}", tag),
        )
    };
    Ok(match tag {
        TypeTag::Char => ArrayValue::Char(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::Short => ArrayValue::Short(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::Int => ArrayValue::Int(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::Float => ArrayValue::Float(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::Double => ArrayValue::Double(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::Long => ArrayValue::Long(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::UChar => ArrayValue::UChar(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::UShort => ArrayValue::UShort(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::UInt => ArrayValue::UInt(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::ULong => ArrayValue::ULong(convert_elements(a).ok_or_else(out_of_range)?),
        TypeTag::String | TypeTag::Dmap => {
            return Err(DmapError::invalid_field(
                name,
                format!("numeric array cannot be stored as {}", tag),
            ))
        }
    })
}

macro_rules! array_from {
    ($t:ty, $variant:ident) => {
        impl From<ArrayD<$t>> for ArrayValue {
            fn from(a: ArrayD<$t>) -> Self {
                ArrayValue::$variant(a)
            }
        }

        impl From<Vec<$t>> for ArrayValue {
            fn from(v: Vec<$t>) -> Self {
                ArrayValue::$variant(Array1::from_vec(v).into_dyn())
            }
        }
    };
}

array_from!(i8, Char);
array_from!(i16, Short);
array_from!(i32, Int);
array_from!(f32, Float);
array_from!(f64, Double);
array_from!(String, String);
array_from!(i64, Long);
array_from!(u8, UChar);
array_from!(u16, UShort);
array_from!(u32, UInt);
array_from!(u64, ULong);
array_from!(Record, Record);

// =============================================================================
// Fields
// =============================================================================

/// A named scalar
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub name: String,
    pub value: DmapValue,
}

impl Scalar {
    pub fn tag(&self) -> TypeTag {
        self.value.tag()
    }

    /// Bytes on the wire: name, terminator, tag, value
    pub fn encoded_len(&self) -> usize {
        self.name.len() + 1 + 1 + self.value.encoded_len()
    }
}

/// A named n-dimensional array
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub name: String,
    pub value: ArrayValue,
}

impl Array {
    pub fn tag(&self) -> TypeTag {
        self.value.tag()
    }

    pub fn rank(&self) -> usize {
        self.value.shape().len()
    }

    /// Logical dimensions, outermost first
    pub fn dims(&self) -> &[usize] {
        self.value.shape()
    }

    /// Dimensions in the order they are written on the wire (innermost first)
    pub fn wire_dims(&self) -> Vec<usize> {
        self.value.shape().iter().rev().copied().collect()
    }

    /// Bytes on the wire: name, terminator, tag, rank, dimensions, elements
    pub fn encoded_len(&self) -> usize {
        self.name.len() + 1 + 1 + 4 + 4 * self.rank() + self.value.encoded_data_len()
    }
}

/// Value of a field before it is placed in a record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(DmapValue),
    Array(ArrayValue),
}

impl FieldValue {
    pub fn scalar(v: impl Into<DmapValue>) -> Self {
        FieldValue::Scalar(v.into())
    }

    pub fn array(v: impl Into<ArrayValue>) -> Self {
        FieldValue::Array(v.into())
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            FieldValue::Scalar(v) => v.tag(),
            FieldValue::Array(v) => v.tag(),
        }
    }

    /// Apply a type override
    pub fn cast(self, tag: TypeTag, name: &str) -> Result<FieldValue> {
        Ok(match self {
            FieldValue::Scalar(v) => FieldValue::Scalar(v.cast(tag, name)?),
            FieldValue::Array(v) => FieldValue::Array(v.cast(tag, name)?),
        })
    }
}

impl From<DmapValue> for FieldValue {
    fn from(v: DmapValue) -> Self {
        FieldValue::Scalar(v)
    }
}

impl From<ArrayValue> for FieldValue {
    fn from(v: ArrayValue) -> Self {
        FieldValue::Array(v)
    }
}

/// Borrowed view of either kind of field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    Scalar(&'a Scalar),
    Array(&'a Array),
}

impl<'a> FieldRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            FieldRef::Scalar(s) => &s.name,
            FieldRef::Array(a) => &a.name,
        }
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            FieldRef::Scalar(s) => s.tag(),
            FieldRef::Array(a) => a.tag(),
        }
    }
}

// =============================================================================
// Record
// =============================================================================

/// One DMAP record: scalars in insertion order, then arrays in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    scalars: Vec<Scalar>,
    arrays: Vec<Array>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from named values, applying any type overrides.
    ///
    /// Sequence values become arrays, everything else becomes a scalar.
    pub fn from_fields<I, S>(fields: I, overrides: Option<&TypeOverrides>) -> Result<Record>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        let mut record = Record::new();
        for (name, value) in fields {
            let name = name.into();
            let value = match overrides.and_then(|o| o.get(&name)) {
                Some(tag) => value.cast(*tag, &name)?,
                None => value,
            };
            record.insert(name, value)?;
        }
        Ok(record)
    }

    /// Add a field to the group matching its kind
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Result<()> {
        match value {
            FieldValue::Scalar(v) => self.add_scalar(name, v),
            FieldValue::Array(v) => self.add_array(name, v),
        }
    }

    /// Append a scalar; names must be unique among the scalars
    pub fn add_scalar(&mut self, name: impl Into<String>, value: impl Into<DmapValue>) -> Result<()> {
        let name = name.into();
        if self.scalar(&name).is_some() {
            return Err(DmapError::invalid_field(name, "duplicate scalar name"));
        }
        self.scalars.push(Scalar {
            name,
            value: value.into(),
        });
        Ok(())
    }

    /// Append an array; names must be unique among the arrays
    pub fn add_array(&mut self, name: impl Into<String>, value: impl Into<ArrayValue>) -> Result<()> {
        let name = name.into();
        if self.array(&name).is_some() {
            return Err(DmapError::invalid_field(name, "duplicate array name"));
        }
        self.arrays.push(Array {
            name,
            value: value.into(),
        });
        Ok(())
    }

    /// Append without the duplicate check; the caller has already done it
    pub(crate) fn push_scalar(&mut self, scalar: Scalar) {
        self.scalars.push(scalar);
    }

    pub(crate) fn push_array(&mut self, array: Array) {
        self.arrays.push(array);
    }

    pub fn scalars(&self) -> &[Scalar] {
        &self.scalars
    }

    pub fn arrays(&self) -> &[Array] {
        &self.arrays
    }

    pub fn num_scalars(&self) -> usize {
        self.scalars.len()
    }

    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.arrays.is_empty()
    }

    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.scalars.iter().find(|s| s.name == name)
    }

    pub fn array(&self, name: &str) -> Option<&Array> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Look a field up by name, scalars first
    pub fn get(&self, name: &str) -> Option<FieldRef<'_>> {
        self.scalar(name)
            .map(FieldRef::Scalar)
            .or_else(|| self.array(name).map(FieldRef::Array))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every field in wire order: scalars, then arrays
    pub fn fields(&self) -> impl Iterator<Item = FieldRef<'_>> {
        self.scalars
            .iter()
            .map(FieldRef::Scalar)
            .chain(self.arrays.iter().map(FieldRef::Array))
    }

    /// Names of every field in wire order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.scalars
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.arrays.iter().map(|a| a.name.as_str()))
    }

    /// Size of the record on the wire, header included
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE
            + self.scalars.iter().map(Scalar::encoded_len).sum::<usize>()
            + self.arrays.iter().map(Array::encoded_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn sample() -> Record {
        let mut rec = Record::new();
        rec.add_scalar("stid", 5i16).unwrap();
        rec.add_scalar("origin.command", "make_fit").unwrap();
        rec.add_array("xcf", vec![4.3f32, 3.5, 2.3]).unwrap();
        rec
    }

    #[test]
    fn test_lookup_and_order() {
        let rec = sample();
        assert_eq!(rec.num_scalars(), 2);
        assert_eq!(rec.num_arrays(), 1);
        assert_eq!(
            rec.field_names().collect::<Vec<_>>(),
            vec!["stid", "origin.command", "xcf"]
        );
        assert_eq!(rec.scalar("stid").unwrap().value, DmapValue::Short(5));
        assert_eq!(rec.array("xcf").unwrap().dims(), &[3]);
        assert!(matches!(rec.get("xcf"), Some(FieldRef::Array(_))));
        assert!(rec.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected_per_group() {
        let mut rec = sample();
        assert!(rec.add_scalar("stid", 1i16).is_err());
        // The same name may appear once in each group
        assert!(rec.add_array("stid", vec![1i16]).is_ok());
    }

    #[test]
    fn test_encoded_len() {
        let rec = sample();
        // stid: 5 + 1 + 2, origin.command: 15 + 1 + 9, xcf: 4 + 1 + 4 + 4 + 12
        let expected = 16 + (5 + 1 + 2) + (15 + 1 + 9) + (4 + 1 + 4 + 4 + 12);
        assert_eq!(rec.encoded_len(), expected);
    }

    #[test]
    fn test_wire_dims_reversed() {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0i32; 6]).unwrap();
        let arr = Array {
            name: "pwr".to_string(),
            value: data.into(),
        };
        assert_eq!(arr.dims(), &[2, 3]);
        assert_eq!(arr.wire_dims(), vec![3, 2]);
        assert_eq!(arr.rank(), 2);
    }

    #[test]
    fn test_scalar_cast() {
        let v = DmapValue::Int(100).cast(TypeTag::Char, "x").unwrap();
        assert_eq!(v, DmapValue::Char(100));

        let err = DmapValue::Int(300).cast(TypeTag::Char, "x").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidField);

        let err = DmapValue::from("abc").cast(TypeTag::Int, "x").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidField);
    }

    #[test]
    fn test_array_cast_keeps_shape() {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1i32, 2, 3, 4]).unwrap();
        let cast = ArrayValue::from(data).cast(TypeTag::Short, "ptab").unwrap();
        assert_eq!(cast.tag(), TypeTag::Short);
        assert_eq!(cast.shape(), &[2, 2]);

        let negative = ArrayValue::from(vec![-1i32]);
        assert!(negative.cast(TypeTag::UInt, "ptab").is_err());
    }

    #[test]
    fn test_from_fields_with_overrides() {
        let mut overrides = TypeOverrides::new();
        overrides.insert("radar.revision.major".to_string(), TypeTag::Char);
        overrides.insert("ptab".to_string(), TypeTag::Short);

        let rec = Record::from_fields(
            vec![
                ("radar.revision.major", FieldValue::scalar(2i32)),
                ("ptab", FieldValue::array(vec![0i32, 9, 12])),
                ("bmazm", FieldValue::scalar(12.5f32)),
            ],
            Some(&overrides),
        )
        .unwrap();

        assert_eq!(
            rec.scalar("radar.revision.major").unwrap().value,
            DmapValue::Char(2)
        );
        assert_eq!(rec.array("ptab").unwrap().tag(), TypeTag::Short);
        assert_eq!(rec.scalar("bmazm").unwrap().tag(), TypeTag::Float);
    }

    #[test]
    fn test_bool_is_char() {
        assert_eq!(DmapValue::from(true), DmapValue::Char(1));
    }
}
