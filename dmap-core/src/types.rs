//! The closed DMAP type table.
//!
//! Every scalar and array on the wire is preceded by a one-byte type tag.
//! The tag values are fixed by the format and must never be renumbered:
//!
//! | Tag | Name     | Width                    |
//! |-----|----------|--------------------------|
//! | 0   | `dmap`   | nested record (variable) |
//! | 1   | `char`   | 1 (signed)               |
//! | 2   | `short`  | 2                        |
//! | 3   | `int`    | 4                        |
//! | 4   | `float`  | 4                        |
//! | 8   | `double` | 8                        |
//! | 9   | `string` | null terminated          |
//! | 10  | `long`   | 8                        |
//! | 16  | `uchar`  | 1                        |
//! | 17  | `ushort` | 2                        |
//! | 18  | `uint`   | 4                        |
//! | 19  | `ulong`  | 8                        |

use std::str::FromStr;

use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Size in bytes of the record header (code, size, scalar count, array count)
pub const RECORD_HEADER_SIZE: usize = 16;

/// Record code written by the encoder (0x00010001). Decoders ignore it.
pub const ENCODING_CODE: i32 = 65537;

/// Packed record header, little-endian int32 fields
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub code: i32,
    pub size: i32,
    pub num_scalars: i32,
    pub num_arrays: i32,
}

/// One-byte wire type tag
#[derive(Primitive, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Dmap = 0,
    Char = 1,
    Short = 2,
    Int = 3,
    Float = 4,
    Double = 8,
    String = 9,
    Long = 10,
    UChar = 16,
    UShort = 17,
    UInt = 18,
    ULong = 19,
}

impl TypeTag {
    /// All tags, in wire value order
    pub const ALL: [TypeTag; 12] = [
        TypeTag::Dmap,
        TypeTag::Char,
        TypeTag::Short,
        TypeTag::Int,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::String,
        TypeTag::Long,
        TypeTag::UChar,
        TypeTag::UShort,
        TypeTag::UInt,
        TypeTag::ULong,
    ];

    /// Look up a tag byte, `None` if it is outside the closed set
    pub fn from_byte(tag: u8) -> Option<Self> {
        TypeTag::from_u8(tag)
    }

    /// The wire byte for this tag
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Width of one element, `None` for text and nested records
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            TypeTag::Char | TypeTag::UChar => Some(1),
            TypeTag::Short | TypeTag::UShort => Some(2),
            TypeTag::Int | TypeTag::UInt | TypeTag::Float => Some(4),
            TypeTag::Long | TypeTag::ULong | TypeTag::Double => Some(8),
            TypeTag::String | TypeTag::Dmap => None,
        }
    }

    /// Smallest number of bytes one element can occupy on the wire.
    ///
    /// Text needs at least its terminator and a nested record at least its header.
    pub fn min_size(self) -> usize {
        match self {
            TypeTag::String => 1,
            TypeTag::Dmap => RECORD_HEADER_SIZE,
            other => other.fixed_size().unwrap_or(1),
        }
    }

    pub fn is_numeric(self) -> bool {
        self.fixed_size().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Dmap => "dmap",
            TypeTag::Char => "char",
            TypeTag::Short => "short",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::String => "string",
            TypeTag::Long => "long",
            TypeTag::UChar => "uchar",
            TypeTag::UShort => "ushort",
            TypeTag::UInt => "uint",
            TypeTag::ULong => "ulong",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        TypeTag::ALL
            .iter()
            .copied()
            .find(|t| t.name() == lower)
            .ok_or_else(|| format!("Unknown type tag: {}", s))
    }
}

/// A fixed-width numeric element that can be bulk-decoded from the wire
pub trait WireElement: Copy + Sized {
    const TAG: TypeTag;
    const WIDTH: usize;

    /// Decode from exactly `WIDTH` little-endian bytes
    fn from_wire(bytes: &[u8]) -> Self;

    fn put_wire(self, out: &mut Vec<u8>);
}

macro_rules! wire_element {
    ($t:ty, $tag:ident) => {
        impl WireElement for $t {
            const TAG: TypeTag = TypeTag::$tag;
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn from_wire(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw)
            }

            fn put_wire(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

wire_element!(i8, Char);
wire_element!(i16, Short);
wire_element!(i32, Int);
wire_element!(f32, Float);
wire_element!(f64, Double);
wire_element!(i64, Long);
wire_element!(u8, UChar);
wire_element!(u16, UShort);
wire_element!(u32, UInt);
wire_element!(u64, ULong);

/// Decode a whole little-endian region of `T` elements
pub(crate) fn decode_elements<T: WireElement>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::WIDTH).map(T::from_wire).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_values_are_fixed() {
        let expected: [(TypeTag, u8); 12] = [
            (TypeTag::Dmap, 0),
            (TypeTag::Char, 1),
            (TypeTag::Short, 2),
            (TypeTag::Int, 3),
            (TypeTag::Float, 4),
            (TypeTag::Double, 8),
            (TypeTag::String, 9),
            (TypeTag::Long, 10),
            (TypeTag::UChar, 16),
            (TypeTag::UShort, 17),
            (TypeTag::UInt, 18),
            (TypeTag::ULong, 19),
        ];
        for (tag, byte) in expected {
            assert_eq!(tag.as_byte(), byte);
            assert_eq!(TypeTag::from_byte(byte), Some(tag));
        }
    }

    #[test]
    fn test_unknown_tags_rejected() {
        for byte in [5u8, 6, 7, 11, 15, 20, 0xFF] {
            assert_eq!(TypeTag::from_byte(byte), None);
        }
    }

    #[test]
    fn test_widths() {
        assert_eq!(TypeTag::Char.fixed_size(), Some(1));
        assert_eq!(TypeTag::Double.fixed_size(), Some(8));
        assert_eq!(TypeTag::String.fixed_size(), None);
        assert_eq!(TypeTag::Dmap.fixed_size(), None);
        assert_eq!(TypeTag::String.min_size(), 1);
        assert_eq!(TypeTag::Dmap.min_size(), RECORD_HEADER_SIZE);
    }

    #[test]
    fn test_name_parsing() {
        assert_eq!("short".parse::<TypeTag>(), Ok(TypeTag::Short));
        assert_eq!("ULONG".parse::<TypeTag>(), Ok(TypeTag::ULong));
        assert!("quad".parse::<TypeTag>().is_err());
        assert_eq!(TypeTag::UShort.to_string(), "ushort");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&TypeTag::UChar).unwrap();
        assert_eq!(json, "\"uchar\"");
        let tag: TypeTag = serde_json::from_str("\"double\"").unwrap();
        assert_eq!(tag, TypeTag::Double);
    }

    #[test]
    fn test_header_layout() {
        let header = RecordHeader {
            code: ENCODING_CODE,
            size: 40,
            num_scalars: 1,
            num_arrays: 2,
        };
        let bytes = bincode::serialize(&header).unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_SIZE);
        assert_eq!(&bytes[0..4], &[0x01, 0x00, 0x01, 0x00]);
        assert_eq!(&bytes[4..8], &40i32.to_le_bytes());

        let back: RecordHeader = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn test_decode_elements() {
        let bytes = [0x05, 0x00, 0xFF, 0xFF];
        let values: Vec<i16> = decode_elements(&bytes);
        assert_eq!(values, vec![5, -1]);

        let mut out = Vec::new();
        2.5f32.put_wire(&mut out);
        assert_eq!(f32::from_wire(&out), 2.5);
    }
}
