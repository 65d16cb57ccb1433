use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use dmap_core::json::{record_to_json, records_from_json};
use dmap_core::{read_file, write_file, DmapReader, FileType, TypeOverrides};
use log::{debug, info, warn};
use serde::Serialize;

/// Result of `dmap check`
#[derive(Serialize, Debug)]
struct CheckSummary {
    file: String,
    records: usize,
    bytes: usize,
    file_type: Option<FileType>,
    validated: bool,
}

/// Explicit type first, then whatever the file name says
fn resolve_file_type(explicit: Option<FileType>, name: &Path) -> Option<FileType> {
    let file_type = explicit.or_else(|| FileType::from_filename(name));
    match file_type {
        Some(t) => debug!("Using file type {} for {}", t, name.display()),
        None => debug!("No file type for {}", name.display()),
    }
    file_type
}

pub(crate) fn check(
    input: &Path,
    file_type: Option<FileType>,
    validate: bool,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let mut reader =
        DmapReader::open(input).with_context(|| format!("Cannot open {}", input.display()))?;
    let spans = reader
        .check_integrity()
        .with_context(|| format!("{} failed the integrity scan", input.display()))?
        .len();
    debug!("{}: {} records located", input.display(), spans);

    let records = reader
        .read_records()
        .with_context(|| format!("Cannot decode {}", input.display()))?;

    let file_type = resolve_file_type(file_type, input);
    let validated = match (file_type, validate) {
        (Some(t), true) => {
            t.validate_records(&records)
                .with_context(|| format!("{} is not a valid {} file", input.display(), t))?;
            true
        }
        (None, true) => {
            warn!(
                "Cannot infer the file type of {}, fields not checked",
                input.display()
            );
            false
        }
        (_, false) => false,
    };

    let summary = CheckSummary {
        file: input.display().to_string(),
        records: records.len(),
        bytes: reader.len(),
        file_type,
        validated,
    };
    if json {
        writeln!(out, "{}", serde_json::to_string(&summary)?)?;
    } else {
        write!(
            out,
            "{}: {} records, {} bytes",
            summary.file, summary.records, summary.bytes
        )?;
        match (summary.file_type, summary.validated) {
            (Some(t), true) => writeln!(out, ", valid {}", t)?,
            _ => writeln!(out)?,
        }
    }
    Ok(())
}

pub(crate) fn dump(input: &Path, record: Option<usize>, out: &mut dyn Write) -> Result<()> {
    let records = read_file(input).with_context(|| format!("Cannot read {}", input.display()))?;

    match record {
        Some(index) => {
            let rec = records.get(index).ok_or_else(|| {
                anyhow!(
                    "{} has {} records, there is no record {}",
                    input.display(),
                    records.len(),
                    index
                )
            })?;
            writeln!(out, "{}", serde_json::to_string(&record_to_json(rec))?)?;
        }
        None => {
            for rec in &records {
                writeln!(out, "{}", serde_json::to_string(&record_to_json(rec))?)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn convert(
    input: &Path,
    output: &Path,
    file_type: Option<FileType>,
    validate: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let records = read_file(input).with_context(|| format!("Cannot read {}", input.display()))?;

    if validate {
        let Some(t) = resolve_file_type(file_type, input) else {
            bail!(
                "Cannot infer the file type of {}; pass --file-type or --no-validate",
                input.display()
            );
        };
        t.validate_records(&records)
            .with_context(|| format!("{} is not a valid {} file", input.display(), t))?;
    }

    write_file(output, &records).with_context(|| format!("Cannot write {}", output.display()))?;
    info!(
        "Converted {} records from {} to {}",
        records.len(),
        input.display(),
        output.display()
    );
    writeln!(out, "{} records written to {}", records.len(), output.display())?;
    Ok(())
}

fn load_overrides(path: &Path) -> Result<TypeOverrides> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a field to type name map", path.display()))
}

pub(crate) fn encode(
    input: &Path,
    output: &Path,
    file_type: Option<FileType>,
    types: Option<&Path>,
    validate: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let file = File::open(input).with_context(|| format!("Cannot open {}", input.display()))?;
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not valid JSON", input.display()))?;

    let file_type = resolve_file_type(file_type, output);
    let mut overrides = file_type.map(|t| t.type_overrides()).unwrap_or_default();
    if let Some(path) = types {
        overrides.extend(load_overrides(path)?);
    }

    let records = records_from_json(&value, Some(&overrides))
        .with_context(|| format!("Cannot build records from {}", input.display()))?;

    if validate {
        if let Some(t) = file_type {
            t.validate_records(&records)
                .with_context(|| format!("Records in {} are not a valid {} file", input.display(), t))?;
        }
    }

    write_file(output, &records).with_context(|| format!("Cannot write {}", output.display()))?;
    info!("Encoded {} records into {}", records.len(), output.display());
    writeln!(out, "{} records written to {}", records.len(), output.display())?;
    Ok(())
}
