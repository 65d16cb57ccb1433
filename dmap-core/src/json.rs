//! Conversion between records and JSON objects.
//!
//! A record maps to an object of field name to value, scalars first. Arrays
//! become nested lists in their logical shape and nested records become
//! nested objects.
//!
//! Going the other way, wire types are inferred from the JSON values:
//!
//! | JSON             | Tag                                   |
//! |------------------|---------------------------------------|
//! | integer          | `int` if it fits, else `long`/`ulong` |
//! | fraction         | `float`                               |
//! | `true`/`false`   | `char` 1/0                            |
//! | string           | `string`                              |
//! | object           | `dmap` (nested record)                |
//! | list             | array of the first leaf's type, shaped by nesting |
//!
//! An override table replaces the inferred tag for the fields it names.

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde_json::{Map, Number, Value};

use crate::error::{DmapError, Result};
use crate::record::{ArrayValue, DmapValue, FieldValue, Record, TypeOverrides};
use crate::types::TypeTag;

// =============================================================================
// Record -> JSON
// =============================================================================

/// Render a record as a JSON object, keeping field order
pub fn record_to_json(record: &Record) -> Value {
    let mut object = Map::new();
    for scalar in record.scalars() {
        object.insert(scalar.name.clone(), scalar_to_json(&scalar.value));
    }
    for array in record.arrays() {
        object.insert(array.name.clone(), array_to_json(&array.value));
    }
    Value::Object(object)
}

/// Render every record as a JSON list of objects
pub fn records_to_json(records: &[Record]) -> Value {
    Value::Array(records.iter().map(record_to_json).collect())
}

/// Non-finite floats have no JSON form and become `null`
fn float_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Shortest decimal form of a single precision value, so 4.3f32 prints as 4.3
fn float32_json(v: f32) -> Value {
    float_json(v.to_string().parse::<f64>().unwrap_or(v as f64))
}

fn scalar_to_json(value: &DmapValue) -> Value {
    match value {
        DmapValue::Char(v) => Value::from(*v),
        DmapValue::Short(v) => Value::from(*v),
        DmapValue::Int(v) => Value::from(*v),
        DmapValue::Float(v) => float32_json(*v),
        DmapValue::Double(v) => float_json(*v),
        DmapValue::String(v) => Value::from(v.as_str()),
        DmapValue::Long(v) => Value::from(*v),
        DmapValue::UChar(v) => Value::from(*v),
        DmapValue::UShort(v) => Value::from(*v),
        DmapValue::UInt(v) => Value::from(*v),
        DmapValue::ULong(v) => Value::from(*v),
        DmapValue::Record(r) => record_to_json(r),
    }
}

/// Nest elements into lists following the array's axes, outermost first
fn nest<T>(view: ArrayViewD<'_, T>, leaf: &impl Fn(&T) -> Value) -> Value {
    if view.ndim() == 0 {
        return view.iter().next().map(leaf).unwrap_or(Value::Null);
    }
    Value::Array(view.outer_iter().map(|sub| nest(sub, leaf)).collect())
}

fn array_to_json(value: &ArrayValue) -> Value {
    match value {
        ArrayValue::Char(a) => nest(a.view(), &|v: &i8| Value::from(*v)),
        ArrayValue::Short(a) => nest(a.view(), &|v: &i16| Value::from(*v)),
        ArrayValue::Int(a) => nest(a.view(), &|v: &i32| Value::from(*v)),
        ArrayValue::Float(a) => nest(a.view(), &|v: &f32| float32_json(*v)),
        ArrayValue::Double(a) => nest(a.view(), &|v: &f64| float_json(*v)),
        ArrayValue::String(a) => nest(a.view(), &|v: &String| Value::from(v.as_str())),
        ArrayValue::Long(a) => nest(a.view(), &|v: &i64| Value::from(*v)),
        ArrayValue::UChar(a) => nest(a.view(), &|v: &u8| Value::from(*v)),
        ArrayValue::UShort(a) => nest(a.view(), &|v: &u16| Value::from(*v)),
        ArrayValue::UInt(a) => nest(a.view(), &|v: &u32| Value::from(*v)),
        ArrayValue::ULong(a) => nest(a.view(), &|v: &u64| Value::from(*v)),
        ArrayValue::Record(a) => nest(a.view(), &record_to_json),
    }
}

// =============================================================================
// JSON -> Record
// =============================================================================

/// Build records from a JSON list of objects (a single object is one record)
pub fn records_from_json(value: &Value, overrides: Option<&TypeOverrides>) -> Result<Vec<Record>> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(object) => record_from_json(object, overrides),
                other => Err(DmapError::InvalidRecord {
                    record: index,
                    message: format!("expected an object, found {}", json_kind(other)),
                }),
            })
            .collect(),
        Value::Object(object) => Ok(vec![record_from_json(object, overrides)?]),
        other => Err(DmapError::InvalidRecord {
            record: 0,
            message: format!("expected a list of objects, found {}", json_kind(other)),
        }),
    }
}

/// Build one record from a JSON object, inferring each field's tag
pub fn record_from_json(object: &Map<String, Value>, overrides: Option<&TypeOverrides>) -> Result<Record> {
    let fields = object
        .iter()
        .map(|(name, value)| {
            let tag = overrides.and_then(|o| o.get(name)).copied();
            field_from_json(name, value, tag).map(|field| (name.as_str(), field))
        })
        .collect::<Result<Vec<_>>>()?;
    Record::from_fields(fields, None)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn field_from_json(name: &str, value: &Value, tag: Option<TypeTag>) -> Result<FieldValue> {
    let inferred = match value {
        Value::Array(items) if items.is_empty() => {
            return match tag {
                Some(tag) => Ok(FieldValue::Array(empty_array(tag))),
                None => Err(DmapError::invalid_field(name, "empty list has no element type")),
            };
        }
        Value::Array(_) => FieldValue::Array(array_from_json(name, value)?),
        other => FieldValue::Scalar(scalar_from_json(name, other)?),
    };
    match tag {
        Some(tag) => inferred.cast(tag, name),
        None => Ok(narrow_floats(inferred)),
    }
}

/// Fractions are read as doubles and stored as floats unless overridden
fn narrow_floats(field: FieldValue) -> FieldValue {
    match field {
        FieldValue::Scalar(DmapValue::Double(v)) => FieldValue::Scalar(DmapValue::Float(v as f32)),
        FieldValue::Array(ArrayValue::Double(a)) => {
            FieldValue::Array(ArrayValue::Float(a.mapv(|v| v as f32)))
        }
        other => other,
    }
}

fn number_value(n: &Number) -> DmapValue {
    if let Some(v) = n.as_i64() {
        match i32::try_from(v) {
            Ok(v) => DmapValue::Int(v),
            Err(_) => DmapValue::Long(v),
        }
    } else if let Some(v) = n.as_u64() {
        DmapValue::ULong(v)
    } else {
        DmapValue::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn scalar_from_json(name: &str, value: &Value) -> Result<DmapValue> {
    match value {
        Value::Null => Err(DmapError::invalid_field(name, "null has no wire type")),
        Value::Bool(b) => Ok(DmapValue::from(*b)),
        Value::Number(n) => Ok(number_value(n)),
        Value::String(s) => Ok(DmapValue::String(s.clone())),
        Value::Object(object) => Ok(DmapValue::from(record_from_json(object, None)?)),
        Value::Array(_) => Err(DmapError::invalid_field(name, "a list is not a scalar")),
    }
}

fn empty_array(tag: TypeTag) -> ArrayValue {
    match tag {
        TypeTag::Char => Vec::<i8>::new().into(),
        TypeTag::Short => Vec::<i16>::new().into(),
        TypeTag::Int => Vec::<i32>::new().into(),
        TypeTag::Float => Vec::<f32>::new().into(),
        TypeTag::Double => Vec::<f64>::new().into(),
        TypeTag::String => Vec::<String>::new().into(),
        TypeTag::Long => Vec::<i64>::new().into(),
        TypeTag::UChar => Vec::<u8>::new().into(),
        TypeTag::UShort => Vec::<u16>::new().into(),
        TypeTag::UInt => Vec::<u32>::new().into(),
        TypeTag::ULong => Vec::<u64>::new().into(),
        TypeTag::Dmap => Vec::<Record>::new().into(),
    }
}

/// Shape of a nested list, following the first element at each level
fn list_shape(name: &str, value: &Value) -> Result<Vec<usize>> {
    let mut shape = Vec::new();
    let mut current = value;
    while let Value::Array(items) = current {
        let first = items
            .first()
            .ok_or_else(|| DmapError::invalid_field(name, "empty list inside an array"))?;
        shape.push(items.len());
        current = first;
    }
    Ok(shape)
}

/// Flatten a nested list in row-major order, checking it is rectangular
fn collect_leaves<'v>(name: &str, value: &'v Value, shape: &[usize], out: &mut Vec<&'v Value>) -> Result<()> {
    match (value, shape.split_first()) {
        (Value::Array(items), Some((&len, rest))) => {
            if items.len() != len {
                return Err(DmapError::invalid_field(
                    name,
                    format!("ragged list: expected {} items, found {}", len, items.len()),
                ));
            }
            for item in items {
                collect_leaves(name, item, rest, out)?;
            }
            Ok(())
        }
        (Value::Array(_), None) => Err(DmapError::invalid_field(name, "ragged list: nested too deep")),
        (_, Some(_)) => Err(DmapError::invalid_field(name, "ragged list: nested too shallow")),
        (leaf, None) => {
            out.push(leaf);
            Ok(())
        }
    }
}

fn shaped<T>(name: &str, shape: &[usize], values: Vec<T>) -> Result<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| DmapError::invalid_field(name, e.to_string()))
}

fn leaves_as<'v, T>(name: &str, leaves: &[&'v Value], convert: impl Fn(&'v Value) -> Option<T>) -> Result<Vec<T>> {
    leaves
        .iter()
        .map(|&leaf| {
            convert(leaf).ok_or_else(|| {
                DmapError::invalid_field(
                    name,
                    format!("list mixes element types ({} found)", json_kind(leaf)),
                )
            })
        })
        .collect()
}

fn array_from_json(name: &str, value: &Value) -> Result<ArrayValue> {
    let shape = list_shape(name, value)?;
    let mut leaves = Vec::new();
    collect_leaves(name, value, &shape, &mut leaves)?;

    let first = leaves
        .first()
        .copied()
        .ok_or_else(|| DmapError::invalid_field(name, "list has no elements"))?;
    Ok(match first {
        Value::Null => return Err(DmapError::invalid_field(name, "null has no wire type")),
        Value::Bool(_) => {
            let values = leaves_as(name, &leaves, |v| v.as_bool().map(|b| b as i8))?;
            ArrayValue::Char(shaped(name, &shape, values)?)
        }
        Value::String(_) => {
            let values = leaves_as(name, &leaves, |v| v.as_str().map(str::to_string))?;
            ArrayValue::String(shaped(name, &shape, values)?)
        }
        Value::Object(_) => {
            let values = leaves
                .iter()
                .map(|leaf| match leaf {
                    Value::Object(object) => record_from_json(object, None),
                    other => Err(DmapError::invalid_field(
                        name,
                        format!("list mixes element types ({} found)", json_kind(other)),
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            ArrayValue::Record(shaped(name, &shape, values)?)
        }
        Value::Number(_) => number_array(name, &shape, &leaves)?,
        Value::Array(_) => return Err(DmapError::invalid_field(name, "ragged list")),
    })
}

/// The first leaf decides the tag for the whole array; every other leaf
/// must be the same kind of number and fit that tag
fn number_array(name: &str, shape: &[usize], leaves: &[&Value]) -> Result<ArrayValue> {
    let first = match leaves.first() {
        Some(Value::Number(n)) => number_value(n),
        _ => return Err(DmapError::invalid_field(name, "list has no numeric elements")),
    };
    let mismatch = |leaf: &Value| {
        DmapError::invalid_field(
            name,
            format!("element {} does not match the list type {}", leaf, first.tag()),
        )
    };
    let integers = |leaf: &&Value| -> Result<()> {
        if leaf.is_i64() || leaf.is_u64() {
            Ok(())
        } else {
            Err(mismatch(*leaf))
        }
    };

    Ok(match first {
        DmapValue::Int(_) => {
            let values = leaves
                .iter()
                .map(|leaf| {
                    integers(leaf)?;
                    leaf.as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(|| mismatch(*leaf))
                })
                .collect::<Result<Vec<_>>>()?;
            ArrayValue::Int(shaped(name, shape, values)?)
        }
        DmapValue::Long(_) => {
            let values = leaves
                .iter()
                .map(|leaf| {
                    integers(leaf)?;
                    leaf.as_i64().ok_or_else(|| mismatch(*leaf))
                })
                .collect::<Result<Vec<_>>>()?;
            ArrayValue::Long(shaped(name, shape, values)?)
        }
        DmapValue::ULong(_) => {
            let values = leaves
                .iter()
                .map(|leaf| {
                    integers(leaf)?;
                    leaf.as_u64().ok_or_else(|| mismatch(*leaf))
                })
                .collect::<Result<Vec<_>>>()?;
            ArrayValue::ULong(shaped(name, shape, values)?)
        }
        _ => {
            let values = leaves
                .iter()
                .map(|leaf| {
                    if leaf.is_f64() {
                        leaf.as_f64().ok_or_else(|| mismatch(*leaf))
                    } else {
                        Err(mismatch(*leaf))
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            ArrayValue::Double(shaped(name, shape, values)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn one(value: Value) -> Result<Record> {
        match value {
            Value::Object(object) => record_from_json(&object, None),
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn test_inference() {
        let rec = one(json!({
            "stid": 5,
            "big": 5_000_000_000i64,
            "bmazm": 12.5,
            "gflg": true,
            "combf": "normal",
            "site": {"lat": 1.5, "beams": [1, 2]},
            "xcf": [4.3, 3.5, 2.3],
            "acfd": [[1, 2, 3], [4, 5, 6]],
            "names": ["a", "b"],
        }))
        .unwrap();

        assert_eq!(rec.scalar("stid").unwrap().value, DmapValue::Int(5));
        assert_eq!(rec.scalar("big").unwrap().tag(), TypeTag::Long);
        assert_eq!(rec.scalar("bmazm").unwrap().value, DmapValue::Float(12.5));
        assert_eq!(rec.scalar("gflg").unwrap().value, DmapValue::Char(1));
        assert_eq!(rec.scalar("combf").unwrap().tag(), TypeTag::String);
        assert_eq!(rec.scalar("site").unwrap().tag(), TypeTag::Dmap);
        assert_eq!(rec.array("xcf").unwrap().tag(), TypeTag::Float);
        assert_eq!(rec.array("acfd").unwrap().dims(), &[2, 3]);
        assert_eq!(rec.array("acfd").unwrap().tag(), TypeTag::Int);
        assert_eq!(rec.array("names").unwrap().tag(), TypeTag::String);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = TypeOverrides::new();
        overrides.insert("stid".to_string(), TypeTag::Short);
        overrides.insert("slist".to_string(), TypeTag::Short);
        overrides.insert("noise.mean".to_string(), TypeTag::Double);

        let object = json!({"stid": 5, "slist": [], "noise.mean": 0.1, "ptab": [0, 9]});
        let records = records_from_json(&object, Some(&overrides)).unwrap();
        let rec = &records[0];

        assert_eq!(rec.scalar("stid").unwrap().value, DmapValue::Short(5));
        assert_eq!(rec.array("slist").unwrap().dims(), &[0]);
        assert_eq!(rec.scalar("noise.mean").unwrap().value, DmapValue::Double(0.1));
    }

    #[test]
    fn test_override_out_of_range() {
        let mut overrides = TypeOverrides::new();
        overrides.insert("cp".to_string(), TypeTag::Char);
        let err = records_from_json(&json!({"cp": 1000}), Some(&overrides)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);
    }

    #[test]
    fn test_rejected_values() {
        for value in [
            json!({"x": []}),
            json!({"x": null}),
            json!({"x": [1, "a"]}),
            json!({"x": [[1, 2], [3]]}),
            json!({"x": [[1, 2], 3]}),
            json!({"x": [-1, 18_000_000_000_000_000_000u64]}),
        ] {
            let err = one(value.clone()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidField, "{}", value);
        }
    }

    #[test]
    fn test_list_type_follows_first_element() {
        let rec = one(json!({
            "x": [3_000_000_000i64, 1],
            "y": [2.5, 1.0],
            "z": [-3_000_000_000i64, 7],
        }))
        .unwrap();
        assert_eq!(rec.array("x").unwrap().tag(), TypeTag::Long);
        assert_eq!(rec.array("y").unwrap().tag(), TypeTag::Float);
        assert_eq!(rec.array("z").unwrap().tag(), TypeTag::Long);
    }

    #[test]
    fn test_list_elements_must_match_first() {
        for value in [
            json!({"x": [1, 2.5]}),
            json!({"x": [2.5, 1]}),
            json!({"x": [1, 3_000_000_000i64]}),
            json!({"x": [3_000_000_000i64, 18_000_000_000_000_000_000u64]}),
            json!({"x": [[1, 2], [3, 4.5]]}),
        ] {
            let err = one(value.clone()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidField, "{}", value);
        }
    }

    #[test]
    fn test_to_json_keeps_order_and_shape() {
        let rec = one(json!({
            "stid": 5,
            "bmazm": 4.3,
            "acfd": [[1, 2, 3], [4, 5, 6]],
        }))
        .unwrap();
        let value = record_to_json(&rec);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"stid":5,"bmazm":4.3,"acfd":[[1,2,3],[4,5,6]]}"#
        );
    }

    #[test]
    fn test_json_round_trip() {
        let input = json!([
            {"stid": 5, "site": {"name": "sas", "beams": [0, 1]}, "xcf": [4.5, 3.5]},
            {"stid": 6, "xcf": [[1.5], [2.5]]},
        ]);
        let records = records_from_json(&input, None).unwrap();
        assert_eq!(records_to_json(&records), input);
    }

    #[test]
    fn test_non_object_record() {
        let err = records_from_json(&json!([{"a": 1}, 5]), None).unwrap_err();
        assert!(matches!(err, DmapError::InvalidRecord { record: 1, .. }));
    }
}
