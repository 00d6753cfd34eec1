// ABOUTME: Writes an InstructionRecord as a schema-conformant YAML document in one forward pass.
// ABOUTME: Unfolds `\n` escape markers in prose fields into indented block-literal lines.

use std::io::{self, Write};

use thiserror::Error;

use crate::record::{InstructionRecord, RecordError};

/// Indentation of `description[].text` block content.
const DESCRIPTION_TEXT_INDENT: usize = 6;
/// Indentation of `operation()` block content.
const OPERATION_INDENT: usize = 2;

/// Errors that abort an emission.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("sink write failed: {0}")]
    Sink(#[from] io::Error),

    #[error("malformed record: {0}")]
    Malformed(#[from] RecordError),
}

/// Emit `record` as YAML into `sink`.
///
/// The record is validated before the first byte is written. After that
/// every write goes straight to the sink; a sink error stops the emission
/// immediately and whatever was already written stays in the sink.
pub fn emit_yaml<W: Write>(record: &InstructionRecord, sink: &mut W) -> Result<(), EmitError> {
    record.validate()?;

    tracing::debug!(
        name = %record.name,
        descriptions = record.descriptions.len(),
        variables = record.encoding.variables.len(),
        "emitting instruction yaml"
    );

    writeln!(sink, "$schema: \"{}\"", record.schema)?;
    writeln!(sink, "kind: \"{}\"", record.kind)?;
    writeln!(sink, "name: \"{}\"", record.name)?;
    writeln!(sink, "long_name: \"{}\"", record.long_name)?;

    writeln!(sink, "description:")?;
    for entry in &record.descriptions {
        writeln!(sink, "  - id: \"{}\"", entry.id)?;
        writeln!(sink, "    normative: {}", entry.normative)?;
        writeln!(sink, "    text: |")?;
        write_block_literal(sink, DESCRIPTION_TEXT_INDENT, &entry.text)?;
    }

    writeln!(sink, "definedBy: \"{}\"", record.defined_by)?;
    writeln!(sink, "assembly: \"{}\"", record.assembly)?;

    writeln!(sink, "encoding:")?;
    writeln!(sink, "  match: \"{}\"", record.encoding.match_pattern)?;
    if record.encoding.variables.is_empty() {
        writeln!(sink, "  variables: []")?;
    } else {
        writeln!(sink, "  variables:")?;
        for var in &record.encoding.variables {
            writeln!(sink, "    - name: \"{}\"", var.name)?;
            writeln!(sink, "      location: \"{}\"", var.location)?;
        }
    }

    if record.access.is_empty() {
        writeln!(sink, "access: {{}}")?;
    } else {
        writeln!(sink, "access:")?;
        for (mode, access) in record.access.iter() {
            writeln!(sink, "  {}: \"{}\"", mode, access)?;
        }
    }

    writeln!(
        sink,
        "data_independent_timing: {}",
        record.data_independent_timing
    )?;
    writeln!(sink, "operation(): |")?;
    write_block_literal(sink, OPERATION_INDENT, &record.operation)?;

    Ok(())
}

/// Emit `record` into a fresh buffer and return the YAML text.
pub fn export_yaml(record: &InstructionRecord) -> Result<String, EmitError> {
    let mut buf = Vec::new();
    emit_yaml(record, &mut buf)?;
    let text = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(text)
}

/// Write the body of a `|` block literal whose header the caller already wrote.
///
/// Content starts at `indent` spaces. Each two-character `\n` marker becomes
/// a line break followed by the same indentation; everything else, including
/// a lone backslash, is copied verbatim. One trailing newline closes the block,
/// so empty `text` yields a single indentation-only line.
pub fn write_block_literal<W: Write>(sink: &mut W, indent: usize, text: &str) -> io::Result<()> {
    write_indent(sink, indent)?;

    let bytes = text.as_bytes();
    let mut run_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'n') {
            sink.write_all(&bytes[run_start..i])?;
            sink.write_all(b"\n")?;
            write_indent(sink, indent)?;
            i += 2;
            run_start = i;
        } else {
            i += 1;
        }
    }
    sink.write_all(&bytes[run_start..])?;
    sink.write_all(b"\n")
}

fn write_indent<W: Write>(sink: &mut W, indent: usize) -> io::Result<()> {
    write!(sink, "{:indent$}", "", indent = indent)
}
