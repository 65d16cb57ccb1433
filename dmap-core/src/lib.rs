//! # DMAP Core
//!
//! Reader and writer for DMAP, the self-describing binary record format
//! used for SuperDARN radar data products (iqdat, rawacf, fitacf, grid, map).
//!
//! This crate is a pure codec: it turns bytes into [`Record`]s and back.
//! The only I/O is the single whole-file read in [`DmapReader::open`] and the
//! single write in [`write_file`].
//!
//! ## Wire layout
//!
//! ```text
//! ┌──────────────────────── record ─────────────────────────┐
//! │ code:i32 │ size:i32 │ num_scalars:i32 │ num_arrays:i32  │  16 byte header
//! ├─────────────────────────────────────────────────────────┤
//! │ scalar:  name\0 │ tag:u8 │ value                        │  x num_scalars
//! ├─────────────────────────────────────────────────────────┤
//! │ array:   name\0 │ tag:u8 │ rank:i32 │ dims:i32[rank]    │  x num_arrays
//! │          │ elements (row-major, little-endian)          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! `size` counts the whole record including its header. Array dimensions
//! are written innermost first, the reverse of the logical shape.
//!
//! ## Key Modules
//!
//! - [`types`] - The closed type-tag table
//! - [`record`] - Records, scalars, arrays and their values
//! - [`reader`] - Integrity scan and per-record decode
//! - [`writer`] - Record encoding
//! - [`formats`] - SuperDARN field dictionaries and validation
//! - [`json`] - Conversion to and from JSON objects
//!
//! ## Example: Round trip
//!
//! ```rust
//! use dmap_core::{read_bytes, to_bytes, FieldValue, Record};
//!
//! let record = Record::from_fields(
//!     vec![
//!         ("stid", FieldValue::scalar(5i16)),
//!         ("xcf", FieldValue::array(vec![4.3f32, 3.5, 2.3])),
//!     ],
//!     None,
//! )
//! .unwrap();
//!
//! let bytes = to_bytes(&[record.clone()]).unwrap();
//! assert_eq!(read_bytes(&bytes).unwrap(), vec![record]);
//! ```
//!
//! ## Example: Reading a validated file
//!
//! ```rust,no_run
//! use dmap_core::formats::{read_file_type, FileType};
//!
//! let path = "20180101.0000.00.sas.fitacf";
//! let file_type = FileType::from_filename(path).unwrap_or(FileType::Fitacf);
//! match read_file_type(path, file_type) {
//!     Ok(records) => println!("{} records", records.len()),
//!     Err(e) => println!("Read failed: {}", e),
//! }
//! ```

pub mod error;
pub mod formats;
pub mod json;
pub mod reader;
pub mod record;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use error::{DmapError, ErrorKind, Result};
pub use formats::{read_file_type, write_file_type, FieldSchemaError, FileType};
pub use reader::{read_bytes, read_file, DmapReader, RecordSpan};
pub use record::{
    Array, ArrayValue, DmapValue, FieldRef, FieldValue, Record, Scalar, TypeOverrides,
};
pub use types::TypeTag;
pub use writer::{to_bytes, write_file, DmapWriter};
