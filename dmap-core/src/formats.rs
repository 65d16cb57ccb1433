//! SuperDARN file types and their field dictionaries.
//!
//! Every file type has a base group of fields that each record must carry,
//! plus optional groups that depend on how the file was processed (fitted
//! data present, elevation angles computed, map model added, ...). An
//! optional group is either present in full or absent.
//!
//! Field types use the DMAP tags: `c` char, `h` short, `i` int, `f` float,
//! `d` double, `s` string.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::reader::read_file;
use crate::record::{Record, TypeOverrides};
use crate::types::TypeTag;
use crate::writer::write_file;

use crate::types::TypeTag::{Char as C, Double as D, Float as F, Int as I, Short as H, String as S};

/// Field name and its expected wire type
pub type FieldSpec = (&'static str, TypeTag);

/// A named set of fields that appear together
#[derive(Debug, Clone, Copy)]
pub struct FieldGroup {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

// =============================================================================
// Field dictionaries
// =============================================================================

/// Radar operating parameters shared by iqdat, rawacf and fitacf
const RADAR_PARAMETERS: &[FieldSpec] = &[
    ("radar.revision.major", C),
    ("radar.revision.minor", C),
    ("origin.code", C),
    ("origin.time", S),
    ("origin.command", S),
    ("cp", H),
    ("stid", H),
    ("time.yr", H),
    ("time.mo", H),
    ("time.dy", H),
    ("time.hr", H),
    ("time.mt", H),
    ("time.sc", H),
    ("time.us", I),
    ("txpow", H),
    ("nave", H),
    ("atten", H),
    ("lagfr", H),
    ("smsep", H),
    ("ercod", H),
    ("stat.agc", H),
    ("stat.lopwr", H),
    ("noise.search", F),
    ("noise.mean", F),
    ("channel", H),
    ("bmnum", H),
    ("bmazm", F),
    ("scan", H),
    ("offset", H),
    ("rxrise", H),
    ("intt.sc", H),
    ("intt.us", I),
    ("txpl", H),
    ("mpinc", H),
    ("mppul", H),
    ("mplgs", H),
    ("nrang", H),
    ("frang", H),
    ("rsep", H),
    ("xcf", H),
    ("tfreq", H),
    ("mxpwr", I),
    ("lvmax", I),
];

const IQDAT_FIELDS: &[FieldSpec] = &[
    ("iqdata.revision.major", I),
    ("iqdata.revision.minor", I),
    ("combf", S),
    ("seqnum", I),
    ("chnnum", I),
    ("smpnum", I),
    ("skpnum", I),
    ("ptab", H),
    ("ltab", H),
    ("tsc", I),
    ("tus", I),
    ("tatten", H),
    ("tnoise", F),
    ("toff", I),
    ("tsze", I),
    ("data", H),
];

const RAWACF_FIELDS: &[FieldSpec] = &[
    ("rawacf.revision.major", I),
    ("rawacf.revision.minor", I),
    ("combf", S),
    ("thr", F),
    ("ptab", H),
    ("ltab", H),
    ("slist", H),
    ("pwr0", F),
];

const FITACF_FIELDS: &[FieldSpec] = &[
    ("combf", S),
    ("fitacf.revision.major", I),
    ("fitacf.revision.minor", I),
    ("noise.sky", F),
    ("noise.lag0", F),
    ("noise.vel", F),
    ("ptab", H),
    ("ltab", H),
    ("pwr0", F),
];

/// Integration period shared by grid and map
const SCAN_PERIOD: &[FieldSpec] = &[
    ("start.year", H),
    ("start.month", H),
    ("start.day", H),
    ("start.hour", H),
    ("start.minute", H),
    ("start.second", D),
    ("end.year", H),
    ("end.month", H),
    ("end.day", H),
    ("end.hour", H),
    ("end.minute", H),
    ("end.second", D),
];

/// Per-radar summary shared by grid and map
const STATION_PARAMETERS: &[FieldSpec] = &[
    ("stid", H),
    ("channel", H),
    ("nvec", H),
    ("freq", F),
    ("major.revision", H),
    ("minor.revision", H),
    ("program.id", H),
    ("noise.mean", F),
    ("noise.sd", F),
    ("gsct", H),
    ("v.min", F),
    ("v.max", F),
    ("p.min", F),
    ("p.max", F),
    ("w.min", F),
    ("w.max", F),
    ("ve.min", F),
    ("ve.max", F),
];

/// Velocity vectors, present once a grid has been populated
const VECTOR_FIELDS: &[FieldSpec] = &[
    ("vector.mlat", F),
    ("vector.mlon", F),
    ("vector.kvect", F),
    ("vector.stid", H),
    ("vector.channel", H),
    ("vector.index", I),
    ("vector.vel.median", F),
    ("vector.vel.sd", F),
];

/// Power and spectral width, present when processed with the extended option
const VECTOR_EXTRA_FIELDS: &[FieldSpec] = &[
    ("vector.pwr.median", F),
    ("vector.pwr.sd", F),
    ("vector.wdt.median", F),
    ("vector.wdt.sd", F),
];

const MAP_FIELDS: &[FieldSpec] = &[
    ("map.major.revision", H),
    ("map.minor.revision", H),
    ("doping.level", H),
    ("model.wt", H),
    ("error.wt", H),
    ("IMF.flag", H),
    ("IMF.delay", H),
    ("IMF.Bx", D),
    ("IMF.By", D),
    ("IMF.Bz", D),
    ("IMF.Vx", D),
    ("IMF.tilt", D),
    ("IMF.Kp", D),
    ("hemisphere", H),
    ("noigrf", H),
    ("fit.order", H),
    ("latmin", F),
    ("chi.sqr", D),
    ("chi.sqr.dat", D),
    ("rms.err", D),
    ("lon.shft", F),
    ("lat.shft", F),
    ("mlt.start", D),
    ("mlt.end", D),
    ("mlt.av", D),
    ("pot.drop", D),
    ("pot.drop.err", D),
    ("pot.max", D),
    ("pot.max.err", D),
    ("pot.min", D),
    ("pot.min.err", D),
];

const IQDAT_BASE: &[&[FieldSpec]] = &[RADAR_PARAMETERS, IQDAT_FIELDS];
const RAWACF_BASE: &[&[FieldSpec]] = &[RADAR_PARAMETERS, RAWACF_FIELDS];
const FITACF_BASE: &[&[FieldSpec]] = &[RADAR_PARAMETERS, FITACF_FIELDS];
const GRID_BASE: &[&[FieldSpec]] = &[SCAN_PERIOD, STATION_PARAMETERS];
const MAP_BASE: &[&[FieldSpec]] = &[SCAN_PERIOD, MAP_FIELDS, STATION_PARAMETERS, VECTOR_FIELDS];

const RAWACF_GROUPS: &[FieldGroup] = &[
    FieldGroup {
        name: "correlation",
        fields: &[("acfd", F)],
    },
    FieldGroup {
        name: "digitizing",
        fields: &[("ifmode", H)],
    },
    FieldGroup {
        name: "fittex",
        fields: &[("mplgexs", H)],
    },
    FieldGroup {
        name: "cross-correlation",
        fields: &[("xcfd", F)],
    },
];

const FITACF_GROUPS: &[FieldGroup] = &[
    FieldGroup {
        name: "extra",
        fields: &[("ifmode", H), ("mplgexs", H)],
    },
    FieldGroup {
        name: "fitted",
        fields: &[
            ("slist", H),
            ("nlag", H),
            ("qflg", C),
            ("gflg", C),
            ("p_l", F),
            ("p_l_e", F),
            ("p_s", F),
            ("p_s_e", F),
            ("v", F),
            ("v_e", F),
            ("w_l", F),
            ("w_l_e", F),
            ("w_s", F),
            ("w_s_e", F),
            ("sd_l", F),
            ("sd_s", F),
            ("sd_phi", F),
        ],
    },
    FieldGroup {
        name: "elevation",
        fields: &[
            ("x_qflg", C),
            ("x_gflg", C),
            ("x_p_l", F),
            ("x_p_l_e", F),
            ("x_p_s", F),
            ("x_p_s_e", F),
            ("x_v", F),
            ("x_v_e", F),
            ("x_w_l", F),
            ("x_w_l_e", F),
            ("x_w_s", F),
            ("x_w_s_e", F),
            ("phi0", F),
            ("phi0_e", F),
            ("elv", F),
            ("elv_low", F),
            ("elv_high", F),
            ("x_sd_l", F),
            ("x_sd_s", F),
            ("x_sd_phi", F),
        ],
    },
];

const GRID_GROUPS: &[FieldGroup] = &[
    FieldGroup {
        name: "fitted",
        fields: VECTOR_FIELDS,
    },
    FieldGroup {
        name: "extra",
        fields: VECTOR_EXTRA_FIELDS,
    },
];

const MAP_GROUPS: &[FieldGroup] = &[
    FieldGroup {
        name: "extra",
        fields: VECTOR_EXTRA_FIELDS,
    },
    FieldGroup {
        name: "fit",
        fields: &[
            ("source", S),
            ("N", D),
            ("N+1", D),
            ("N+2", D),
            ("N+3", D),
        ],
    },
    FieldGroup {
        name: "model",
        fields: &[
            ("model.angle", S),
            ("model.level", S),
            ("model.tilt", S),
            ("model.name", S),
        ],
    },
    FieldGroup {
        name: "hmb",
        fields: &[
            ("model.mlat", F),
            ("model.mlon", F),
            ("model.kvect", F),
            ("model.vel.median", F),
            ("boundary.mlat", F),
            ("boundary.mlon", F),
        ],
    },
];

// =============================================================================
// File types
// =============================================================================

/// SuperDARN data products stored as DMAP
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Iqdat,
    Rawacf,
    Fitacf,
    Grid,
    Map,
}

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::Iqdat,
        FileType::Rawacf,
        FileType::Fitacf,
        FileType::Grid,
        FileType::Map,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Iqdat => "iqdat",
            FileType::Rawacf => "rawacf",
            FileType::Fitacf => "fitacf",
            FileType::Grid => "grid",
            FileType::Map => "map",
        }
    }

    /// Infer the file type from a file name, e.g. `20180101.0000.00.sas.rawacf`
    pub fn from_filename(path: impl AsRef<Path>) -> Option<FileType> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        FileType::ALL
            .iter()
            .copied()
            .find(|t| name.contains(t.as_str()))
    }

    /// Fields every record must carry
    pub fn base_fields(&self) -> impl Iterator<Item = FieldSpec> {
        let parts: &'static [&'static [FieldSpec]] = match self {
            FileType::Iqdat => IQDAT_BASE,
            FileType::Rawacf => RAWACF_BASE,
            FileType::Fitacf => FITACF_BASE,
            FileType::Grid => GRID_BASE,
            FileType::Map => MAP_BASE,
        };
        parts.iter().flat_map(|part| part.iter().copied())
    }

    /// Groups that are either present in full or absent
    pub fn optional_groups(&self) -> &'static [FieldGroup] {
        match self {
            FileType::Iqdat => &[],
            FileType::Rawacf => RAWACF_GROUPS,
            FileType::Fitacf => FITACF_GROUPS,
            FileType::Grid => GRID_GROUPS,
            FileType::Map => MAP_GROUPS,
        }
    }

    /// Every known field of this file type
    pub fn all_fields(&self) -> impl Iterator<Item = FieldSpec> {
        self.base_fields().chain(
            self.optional_groups()
                .iter()
                .flat_map(|g| g.fields.iter().copied()),
        )
    }

    /// The dictionary's declared type for a field
    pub fn expected_tag(&self, field: &str) -> Option<TypeTag> {
        self.all_fields().find(|(name, _)| *name == field).map(|(_, tag)| tag)
    }

    /// The whole dictionary as an override table, for coercing loosely typed input
    pub fn type_overrides(&self) -> TypeOverrides {
        self.all_fields()
            .map(|(name, tag)| (name.to_string(), tag))
            .collect()
    }

    /// Check one record against the dictionary
    pub fn validate(&self, record: &Record, index: usize) -> std::result::Result<(), FieldSchemaError> {
        let mut missing: BTreeSet<String> = self
            .base_fields()
            .filter(|(name, _)| !record.contains(name))
            .map(|(name, _)| name.to_string())
            .collect();
        for group in self.optional_groups() {
            let absent: Vec<&str> = group
                .fields
                .iter()
                .map(|(name, _)| *name)
                .filter(|name| !record.contains(name))
                .collect();
            if !absent.is_empty() && absent.len() != group.fields.len() {
                missing.extend(absent.into_iter().map(str::to_string));
            }
        }
        if !missing.is_empty() {
            return Err(FieldSchemaError::MissingFields {
                record: index,
                fields: missing,
            });
        }

        let mut extra = BTreeSet::new();
        let mut mismatched = BTreeMap::new();
        for field in record.fields() {
            let name = field.name();
            match self.expected_tag(name) {
                None => {
                    extra.insert(name.to_string());
                }
                Some(expected) if expected != field.tag() => {
                    mismatched.insert(name.to_string(), (expected, field.tag()));
                }
                Some(_) => {}
            }
        }
        if !extra.is_empty() {
            return Err(FieldSchemaError::ExtraFields {
                record: index,
                fields: extra,
            });
        }
        if !mismatched.is_empty() {
            return Err(FieldSchemaError::TypeMismatch {
                record: index,
                fields: mismatched,
            });
        }
        Ok(())
    }

    /// Check every record, stopping at the first failure
    pub fn validate_records(&self, records: &[Record]) -> std::result::Result<(), FieldSchemaError> {
        for (index, record) in records.iter().enumerate() {
            self.validate(record, index)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        FileType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("Unknown file type: {}", s))
    }
}

// =============================================================================
// Errors
// =============================================================================

/// A record that does not match its file type's dictionary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldSchemaError {
    #[error("Record {record} is missing fields: {}", join_names(.fields))]
    MissingFields {
        record: usize,
        fields: BTreeSet<String>,
    },

    #[error("Record {record} has unexpected fields: {}", join_names(.fields))]
    ExtraFields {
        record: usize,
        fields: BTreeSet<String>,
    },

    /// Field name mapped to (expected, found)
    #[error("Record {record} has fields of the wrong type: {}", join_mismatches(.fields))]
    TypeMismatch {
        record: usize,
        fields: BTreeMap<String, (TypeTag, TypeTag)>,
    },
}

impl FieldSchemaError {
    pub fn record(&self) -> usize {
        match self {
            FieldSchemaError::MissingFields { record, .. }
            | FieldSchemaError::ExtraFields { record, .. }
            | FieldSchemaError::TypeMismatch { record, .. } => *record,
        }
    }
}

fn join_names(fields: &BTreeSet<String>) -> String {
    fields.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn join_mismatches(fields: &BTreeMap<String, (TypeTag, TypeTag)>) -> String {
    fields
        .iter()
        .map(|(name, (expected, found))| format!("{} (expected {}, found {})", name, expected, found))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Validated I/O
// =============================================================================

/// Decode a file and check every record against `file_type`
pub fn read_file_type(path: impl AsRef<Path>, file_type: FileType) -> Result<Vec<Record>> {
    let records = read_file(path)?;
    file_type.validate_records(&records)?;
    debug!("Validated {} {} records", records.len(), file_type);
    Ok(records)
}

/// Check every record against `file_type`, then encode them to `path`
pub fn write_file_type(path: impl AsRef<Path>, file_type: FileType, records: &[Record]) -> Result<()> {
    file_type.validate_records(records)?;
    write_file(path, records)
}
