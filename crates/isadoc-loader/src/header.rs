// ABOUTME: Reads and writes InstructionRecords as generated C headers of `#define` macros.
// ABOUTME: C string literals keep `\n` as the two-character escape marker in both directions.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use isadoc_core::{
    AccessMap, DescriptionEntry, EmitError, Encoding, EncodingVariable, InstructionRecord,
    RecordError,
};
use thiserror::Error;

/// Errors that can occur while reading an instruction header.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: unterminated string literal in {name}")]
    UnterminatedString { line: usize, name: String },

    #[error("line {line}: {name} has unsupported value `{value}`")]
    BadValue {
        line: usize,
        name: String,
        value: String,
    },

    #[error("missing macro {0}")]
    MissingField(String),

    #[error("{prefix} entries are not contiguous: index {missing} is missing")]
    IndexGap { prefix: &'static str, missing: usize },

    #[error(transparent)]
    Invalid(#[from] RecordError),
}

/// Right-hand side of a `#define`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MacroValue {
    Str(String),
    Int(i64),
    Null,
}

impl MacroValue {
    fn into_string(self) -> String {
        match self {
            MacroValue::Str(s) => s,
            MacroValue::Int(n) => n.to_string(),
            MacroValue::Null => String::new(),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            MacroValue::Str(s) => s == "true",
            MacroValue::Int(n) => *n != 0,
            MacroValue::Null => false,
        }
    }
}

#[derive(Debug, Default)]
struct PartialDescription {
    id: Option<String>,
    normative: bool,
    text: Option<String>,
}

#[derive(Debug, Default)]
struct PartialVariable {
    name: Option<String>,
    location: Option<String>,
}

/// Accumulates macros in header order, then assembles the record.
#[derive(Debug, Default)]
struct HeaderBuilder {
    schema: Option<String>,
    kind: Option<String>,
    name: Option<String>,
    long_name: Option<String>,
    /// Bare `DESCRIPTION`, written when the document's description is one string.
    description: Option<String>,
    descriptions: BTreeMap<usize, PartialDescription>,
    defined_by: Option<String>,
    assembly: Option<String>,
    match_pattern: Option<String>,
    variables: BTreeMap<usize, PartialVariable>,
    access: AccessMap,
    data_independent_timing: bool,
    operation: String,
}

impl HeaderBuilder {
    fn apply(&mut self, name: &str, value: MacroValue) {
        match name {
            "_SCHEMA" => self.schema = Some(value.into_string()),
            "KIND" => self.kind = Some(value.into_string()),
            "NAME" => self.name = Some(value.into_string()),
            "LONG_NAME" => self.long_name = Some(value.into_string()),
            "DESCRIPTION" => self.description = Some(value.into_string()),
            "DEFINEDBY" => self.defined_by = Some(value.into_string()),
            "ASSEMBLY" => self.assembly = Some(value.into_string()),
            "ENCODING_MATCH" => self.match_pattern = Some(value.into_string()),
            "DATA_INDEPENDENT_TIMING" => self.data_independent_timing = value.truthy(),
            "OPERATION__" => self.operation = value.into_string(),
            _ => {
                if let Some((idx, field)) = indexed(name, "DESCRIPTION_") {
                    let entry = self.descriptions.entry(idx).or_default();
                    match field {
                        "ID" => entry.id = Some(value.into_string()),
                        "NORMATIVE" => entry.normative = value.truthy(),
                        "TEXT" => entry.text = Some(value.into_string()),
                        _ => {
                            tracing::warn!(macro_name = name, "ignoring unknown description macro")
                        }
                    }
                } else if let Some((idx, field)) = indexed(name, "ENCODING_VARIABLES_") {
                    let var = self.variables.entry(idx).or_default();
                    match field {
                        "NAME" => var.name = Some(value.into_string()),
                        "LOCATION" => var.location = Some(value.into_string()),
                        _ => {
                            tracing::warn!(macro_name = name, "ignoring unknown encoding macro")
                        }
                    }
                } else if let Some(mode) = name.strip_prefix("ACCESS_") {
                    self.access.push(mode.to_ascii_lowercase(), value.into_string());
                } else {
                    tracing::warn!(macro_name = name, "ignoring unknown macro");
                }
            }
        }
    }

    fn finish(self) -> Result<InstructionRecord, HeaderError> {
        check_contiguous(&self.descriptions, "DESCRIPTION")?;
        check_contiguous(&self.variables, "ENCODING_VARIABLES")?;

        let name = require(self.name, "NAME")?;

        let mut descriptions = self
            .descriptions
            .into_iter()
            .map(|(idx, d)| -> Result<DescriptionEntry, HeaderError> {
                Ok(DescriptionEntry {
                    id: d.id.ok_or_else(|| missing(format!("DESCRIPTION_{idx}_ID")))?,
                    normative: d.normative,
                    text: d.text.ok_or_else(|| missing(format!("DESCRIPTION_{idx}_TEXT")))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(text) = self.description {
            if descriptions.is_empty() {
                descriptions.push(DescriptionEntry::new(
                    format!("inst-{name}-behaviour"),
                    false,
                    text,
                ));
            } else {
                tracing::warn!(
                    name = %name,
                    "ignoring bare DESCRIPTION alongside indexed description macros"
                );
            }
        }

        let variables = self
            .variables
            .into_iter()
            .map(|(idx, v)| -> Result<EncodingVariable, HeaderError> {
                Ok(EncodingVariable {
                    name: v
                        .name
                        .ok_or_else(|| missing(format!("ENCODING_VARIABLES_{idx}_NAME")))?,
                    location: v
                        .location
                        .ok_or_else(|| missing(format!("ENCODING_VARIABLES_{idx}_LOCATION")))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let record = InstructionRecord {
            schema: require(self.schema, "_SCHEMA")?,
            kind: require(self.kind, "KIND")?,
            name,
            long_name: require(self.long_name, "LONG_NAME")?,
            descriptions,
            defined_by: require(self.defined_by, "DEFINEDBY")?,
            assembly: require(self.assembly, "ASSEMBLY")?,
            encoding: Encoding {
                match_pattern: require(self.match_pattern, "ENCODING_MATCH")?,
                variables,
            },
            access: self.access,
            data_independent_timing: self.data_independent_timing,
            operation: self.operation,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Parse header text into a record.
pub fn parse_header(text: &str) -> Result<InstructionRecord, HeaderError> {
    let mut builder = HeaderBuilder::default();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let Some(rest) = line.trim_start().strip_prefix("#define") else {
            continue;
        };
        let rest = rest.trim_start();
        let (name, raw) = match rest.split_once(|c: char| c.is_ascii_whitespace()) {
            Some((name, raw)) => (name, raw.trim()),
            None => (rest.trim_end(), ""),
        };
        // Bare `#define GUARD` lines carry no value.
        if name.is_empty() || raw.is_empty() {
            continue;
        }
        let value = parse_value(raw, name, line_no)?;
        builder.apply(name, value);
    }

    builder.finish()
}

/// Read and parse a header file.
pub fn load_header_file(path: &Path) -> Result<InstructionRecord, HeaderError> {
    let text = fs::read_to_string(path)?;
    let record = parse_header(&text)?;
    tracing::debug!(path = %path.display(), name = %record.name, "loaded instruction header");
    Ok(record)
}

fn parse_value(raw: &str, name: &str, line: usize) -> Result<MacroValue, HeaderError> {
    if let Some(body) = raw.strip_prefix('"') {
        return decode_c_string(body).map(MacroValue::Str).ok_or_else(|| {
            HeaderError::UnterminatedString {
                line,
                name: name.to_string(),
            }
        });
    }
    if raw == "NULL" {
        return Ok(MacroValue::Null);
    }
    raw.parse::<i64>()
        .map(MacroValue::Int)
        .map_err(|_| HeaderError::BadValue {
            line,
            name: name.to_string(),
            value: raw.to_string(),
        })
}

/// Write `record` as the `#define` macro set that [`parse_header`] reads.
///
/// Macro names follow the document keys, uppercased with every
/// non-alphanumeric character replaced by `_` (`operation()` becomes
/// `OPERATION__`). Booleans are written as `1`/`0`.
pub fn write_header<W: Write>(record: &InstructionRecord, sink: &mut W) -> Result<(), EmitError> {
    record.validate()?;

    writeln!(sink, "#ifndef YAML_CONTENT_H")?;
    write_string(sink, "_SCHEMA", &record.schema)?;
    write_string(sink, "KIND", &record.kind)?;
    write_string(sink, "NAME", &record.name)?;
    write_string(sink, "LONG_NAME", &record.long_name)?;
    for (idx, entry) in record.descriptions.iter().enumerate() {
        write_string(sink, &format!("DESCRIPTION_{idx}_ID"), &entry.id)?;
        writeln!(sink, "#define DESCRIPTION_{idx}_NORMATIVE {}", u8::from(entry.normative))?;
        write_string(sink, &format!("DESCRIPTION_{idx}_TEXT"), &entry.text)?;
    }
    write_string(sink, "DEFINEDBY", &record.defined_by)?;
    write_string(sink, "ASSEMBLY", &record.assembly)?;
    write_string(sink, "ENCODING_MATCH", &record.encoding.match_pattern)?;
    for (idx, var) in record.encoding.variables.iter().enumerate() {
        write_string(sink, &format!("ENCODING_VARIABLES_{idx}_NAME"), &var.name)?;
        write_string(sink, &format!("ENCODING_VARIABLES_{idx}_LOCATION"), &var.location)?;
    }
    for (mode, access) in record.access.iter() {
        write_string(sink, &format!("ACCESS_{}", macro_name(mode)), access)?;
    }
    writeln!(
        sink,
        "#define DATA_INDEPENDENT_TIMING {}",
        u8::from(record.data_independent_timing)
    )?;
    write_string(sink, "OPERATION__", &record.operation)?;
    write!(sink, "\n#endif \n")?;

    tracing::debug!(name = %record.name, "wrote instruction header");
    Ok(())
}

/// Write `record` as a header into a fresh buffer and return the text.
pub fn export_header(record: &InstructionRecord) -> Result<String, EmitError> {
    let mut buf = Vec::new();
    write_header(record, &mut buf)?;
    let text = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(text)
}

fn write_string<W: Write>(sink: &mut W, name: &str, value: &str) -> io::Result<()> {
    writeln!(sink, "#define {name} \"{}\"", encode_c_string(value))
}

/// Uppercase, with anything outside `[A-Za-z0-9]` turned into `_`.
fn macro_name(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Inverse of [`decode_c_string`]: `\n` markers stay `\n`, other backslashes
/// and quotes are escaped, and real line breaks become `\n`.
fn encode_c_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'n') => {
                chars.next();
                out.push_str("\\n");
            }
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode a C string literal body (after the opening quote) up to its closing
/// quote. `\"` and `\\` are unescaped, `\n` stays as the escape marker, and
/// any other escape is copied through. Returns `None` without a closing quote.
fn decode_c_string(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            _ => out.push(c),
        }
    }
    None
}

/// Split `PREFIX<idx>_<FIELD>` into its index and field.
fn indexed<'a>(name: &'a str, prefix: &str) -> Option<(usize, &'a str)> {
    let (idx, field) = name.strip_prefix(prefix)?.split_once('_')?;
    Some((idx.parse().ok()?, field))
}

fn check_contiguous<T>(
    entries: &BTreeMap<usize, T>,
    prefix: &'static str,
) -> Result<(), HeaderError> {
    for (expected, idx) in entries.keys().enumerate() {
        if *idx != expected {
            return Err(HeaderError::IndexGap {
                prefix,
                missing: expected,
            });
        }
    }
    Ok(())
}

fn require(value: Option<String>, name: &str) -> Result<String, HeaderError> {
    value.ok_or_else(|| missing(name.to_string()))
}

fn missing(name: String) -> HeaderError {
    HeaderError::MissingField(name)
}
