// ABOUTME: Loads an InstructionRecord from a schema-shaped YAML or JSON instruction document.
// ABOUTME: Folds real line breaks in prose fields into the `\n` escape marker the emitter expects.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use isadoc_core::{
    AccessMap, DescriptionEntry, Encoding, EncodingVariable, InstructionRecord, RecordError,
};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors that can occur while loading an instruction document.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported instruction document extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error(transparent)]
    Invalid(#[from] RecordError),
}

/// Serialization format of an instruction document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// Pick the format from a file extension (`yaml`, `yml`, `json`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// The on-disk document, keyed exactly like the emitted output.
#[derive(Debug, Deserialize)]
struct SourceDocument {
    #[serde(rename = "$schema")]
    schema: String,
    kind: String,
    name: String,
    long_name: String,
    description: SourceDescription,
    #[serde(rename = "definedBy")]
    defined_by: String,
    assembly: String,
    encoding: SourceEncoding,
    access: AccessMap,
    #[serde(default)]
    data_independent_timing: bool,
    #[serde(rename = "operation()", default)]
    operation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceEncoding {
    #[serde(rename = "match", deserialize_with = "string_or_number")]
    match_pattern: String,
    #[serde(default)]
    variables: Vec<SourceVariable>,
}

#[derive(Debug, Deserialize)]
struct SourceVariable {
    name: String,
    #[serde(deserialize_with = "string_or_number")]
    location: String,
}

/// A scalar that may arrive as a bare number (`"location": 20` in JSON).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    UInt(u64),
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::UInt(n) => n.to_string(),
    })
}

/// `description` is either a list of entries or a bare prose string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceDescription {
    Entries(Vec<SourceDescriptionEntry>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct SourceDescriptionEntry {
    id: String,
    #[serde(default)]
    normative: bool,
    text: String,
}

/// Parse an instruction document from text.
pub fn load_source_str(text: &str, format: SourceFormat) -> Result<InstructionRecord, SourceError> {
    let doc: SourceDocument = match format {
        SourceFormat::Yaml => serde_yaml::from_str(text)?,
        SourceFormat::Json => serde_json::from_str(text)?,
    };
    let record = into_record(doc);
    record.validate()?;
    Ok(record)
}

/// Read and parse an instruction document, choosing the format by extension.
pub fn load_source_file(path: &Path) -> Result<InstructionRecord, SourceError> {
    let format = SourceFormat::from_path(path)
        .ok_or_else(|| SourceError::UnsupportedExtension(path.to_path_buf()))?;
    let text = fs::read_to_string(path)?;
    let record = load_source_str(&text, format)?;
    tracing::debug!(
        path = %path.display(),
        name = %record.name,
        "loaded instruction document"
    );
    Ok(record)
}

/// Replace each line break with the two-character `\n` escape marker.
pub fn fold_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\n")
}

fn into_record(doc: SourceDocument) -> InstructionRecord {
    let descriptions = match doc.description {
        SourceDescription::Entries(entries) => entries
            .into_iter()
            .map(|e| DescriptionEntry::new(e.id, e.normative, fold_newlines(&e.text)))
            .collect(),
        SourceDescription::Text(text) => vec![DescriptionEntry::new(
            format!("inst-{}-behaviour", doc.name),
            false,
            fold_newlines(&text),
        )],
    };

    InstructionRecord {
        schema: doc.schema,
        kind: doc.kind,
        name: doc.name,
        long_name: doc.long_name,
        descriptions,
        defined_by: doc.defined_by,
        assembly: doc.assembly,
        encoding: Encoding {
            match_pattern: doc.encoding.match_pattern,
            variables: doc
                .encoding
                .variables
                .into_iter()
                .map(|v| EncodingVariable::new(v.name, v.location))
                .collect(),
        },
        access: doc.access,
        data_independent_timing: doc.data_independent_timing,
        operation: doc.operation.as_deref().map(fold_newlines).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isadoc_core::export_yaml;
    use tempfile::TempDir;

    const FCVT_YAML: &str = r#"$schema: "inst_schema.json#"
kind: instruction
name: fcvt.d.q
long_name: Floating-point Convert Quad-precision to Double-precision
description:
  - id: inst-fcvt.d.q-behaviour
    normative: false
    text: |
      `fcvt.d.q` converts a quad-precision floating-point number to a double-precision floating-point number.
definedBy: Q
assembly: fd, fs1, rm
encoding:
  match: 010000100011-------------1010011
  variables:
    - name: fs1
      location: 19-15
    - name: rm
      location: 14-12
    - name: fd
      location: 11-7
access:
  s: always
  u: always
  vs: always
  vu: always
data_independent_timing: false
operation(): ""
"#;

    #[test]
    fn loads_yaml_document() {
        let record = load_source_str(FCVT_YAML, SourceFormat::Yaml).unwrap();
        assert_eq!(record.schema, "inst_schema.json#");
        assert_eq!(record.name, "fcvt.d.q");
        assert_eq!(record.defined_by, "Q");
        assert_eq!(record.encoding.match_pattern, "010000100011-------------1010011");
        assert_eq!(record.encoding.variables.len(), 3);
        assert_eq!(record.encoding.variables[0].name, "fs1");
        assert_eq!(record.access.get("vu"), Some("always"));
        assert!(!record.data_independent_timing);
        assert_eq!(record.operation, "");
    }

    #[test]
    fn block_text_gets_trailing_marker() {
        let record = load_source_str(FCVT_YAML, SourceFormat::Yaml).unwrap();
        assert_eq!(
            record.descriptions[0].text,
            "`fcvt.d.q` converts a quad-precision floating-point number to a double-precision floating-point number.\\n"
        );
    }

    #[test]
    fn yaml_document_reemits_to_reference_shape() {
        let record = load_source_str(FCVT_YAML, SourceFormat::Yaml).unwrap();
        let yaml = export_yaml(&record).unwrap();
        assert!(yaml.starts_with("$schema: \"inst_schema.json#\"\nkind: \"instruction\"\n"));
        assert!(yaml.contains("    - name: \"rm\"\n      location: \"14-12\"\n"));
        assert!(yaml.ends_with("operation(): |\n  \n"));
    }

    #[test]
    fn keeps_access_document_order() {
        let text = FCVT_YAML.replace(
            "  s: always\n  u: always\n  vs: always\n  vu: always\n",
            "  vu: never\n  s: always\n  u: always\n  vs: always\n",
        );
        let record = load_source_str(&text, SourceFormat::Yaml).unwrap();
        let modes: Vec<&str> = record.access.iter().map(|(m, _)| m).collect();
        assert_eq!(modes, vec!["vu", "s", "u", "vs"]);
    }

    #[test]
    fn optional_keys_default() {
        let text = FCVT_YAML
            .replace("data_independent_timing: false\n", "")
            .replace("operation(): \"\"\n", "")
            .replace("    normative: false\n", "");
        let record = load_source_str(&text, SourceFormat::Yaml).unwrap();
        assert!(!record.data_independent_timing);
        assert!(!record.descriptions[0].normative);
        assert_eq!(record.operation, "");
    }

    #[test]
    fn multi_line_operation_is_folded() {
        let text = FCVT_YAML.replace(
            "operation(): \"\"\n",
            "operation(): |\n  check_f_ok();\n  X[fd] = convert(X[fs1]);\n",
        );
        let record = load_source_str(&text, SourceFormat::Yaml).unwrap();
        assert_eq!(record.operation, "check_f_ok();\\nX[fd] = convert(X[fs1]);\\n");
    }

    #[test]
    fn plain_string_description_becomes_single_entry() {
        let text = FCVT_YAML.replace(
            "description:\n  - id: inst-fcvt.d.q-behaviour\n    normative: false\n    text: |\n      `fcvt.d.q` converts a quad-precision floating-point number to a double-precision floating-point number.\n",
            "description: Converts quad to double.\n",
        );
        let record = load_source_str(&text, SourceFormat::Yaml).unwrap();
        assert_eq!(record.descriptions.len(), 1);
        assert_eq!(record.descriptions[0].id, "inst-fcvt.d.q-behaviour");
        assert_eq!(record.descriptions[0].text, "Converts quad to double.");
    }

    #[test]
    fn empty_description_list_is_rejected() {
        let text = FCVT_YAML.replace(
            "description:\n  - id: inst-fcvt.d.q-behaviour\n    normative: false\n    text: |\n      `fcvt.d.q` converts a quad-precision floating-point number to a double-precision floating-point number.\n",
            "description: []\n",
        );
        let err = load_source_str(&text, SourceFormat::Yaml).unwrap_err();
        assert!(matches!(err, SourceError::Invalid(RecordError::NoDescriptions(_))));
    }

    #[test]
    fn missing_required_key_is_a_yaml_error() {
        let text = FCVT_YAML.replace("assembly: fd, fs1, rm\n", "");
        let err = load_source_str(&text, SourceFormat::Yaml).unwrap_err();
        assert!(matches!(err, SourceError::Yaml(_)));
        assert!(err.to_string().contains("assembly"));
    }

    #[test]
    fn loads_json_document() {
        let json = serde_json::json!({
            "$schema": "inst_schema.json#",
            "kind": "instruction",
            "name": "add",
            "long_name": "Integer add",
            "description": [
                {"id": "inst-add-behaviour", "normative": true, "text": "Adds.\nWraps on overflow."}
            ],
            "definedBy": "I",
            "assembly": "xd, xs1, xs2",
            "encoding": {"match": "0000000----------000-----0110011"},
            "access": {"s": "always", "u": "always", "vs": "always", "vu": "always"},
            "data_independent_timing": true,
            "operation()": "X[xd] = X[xs1] + X[xs2];"
        });
        let record = load_source_str(&json.to_string(), SourceFormat::Json).unwrap();
        assert_eq!(record.name, "add");
        assert!(record.descriptions[0].normative);
        assert_eq!(record.descriptions[0].text, "Adds.\\nWraps on overflow.");
        assert!(record.encoding.variables.is_empty());
        assert!(record.data_independent_timing);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a/fcvt.d.q.yaml")), Some(SourceFormat::Yaml));
        assert_eq!(SourceFormat::from_path(Path::new("add.YML")), Some(SourceFormat::Yaml));
        assert_eq!(SourceFormat::from_path(Path::new("add.json")), Some(SourceFormat::Json));
        assert_eq!(SourceFormat::from_path(Path::new("add.h")), None);
        assert_eq!(SourceFormat::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn load_source_file_reads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fcvt.d.q.yaml");
        fs::write(&path, FCVT_YAML).unwrap();
        let record = load_source_file(&path).unwrap();
        assert_eq!(record.long_name, "Floating-point Convert Quad-precision to Double-precision");
    }

    #[test]
    fn load_source_file_rejects_unknown_extension() {
        let err = load_source_file(Path::new("fcvt.d.q.txt")).unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedExtension(_)));
    }

    #[test]
    fn fold_newlines_handles_crlf() {
        assert_eq!(fold_newlines("a\r\nb\nc"), "a\\nb\\nc");
        assert_eq!(fold_newlines("no breaks"), "no breaks");
    }

    #[test]
    fn numeric_locations_load_from_json_and_yaml() {
        let json = serde_json::json!({
            "$schema": "inst_schema.json#",
            "kind": "instruction",
            "name": "c.nop",
            "long_name": "Compressed no-op",
            "description": "Does nothing.",
            "definedBy": "C",
            "assembly": "",
            "encoding": {
                "match": 1,
                "variables": [
                    {"name": "imm", "location": 12},
                    {"name": "rd", "location": "11-7"}
                ]
            },
            "access": {"s": "always"}
        });
        let record = load_source_str(&json.to_string(), SourceFormat::Json).unwrap();
        assert_eq!(record.encoding.match_pattern, "1");
        assert_eq!(record.encoding.variables[0], EncodingVariable::new("imm", "12"));
        assert_eq!(record.encoding.variables[1], EncodingVariable::new("rd", "11-7"));

        let yaml = FCVT_YAML.replace("location: 19-15", "location: 20");
        let record = load_source_str(&yaml, SourceFormat::Yaml).unwrap();
        assert_eq!(record.encoding.variables[0].location, "20");

        // Leading zeros keep a digits-only pattern a string.
        let yaml = FCVT_YAML.replace(
            "match: 010000100011-------------1010011",
            "match: 0000000000000000000000000010011",
        );
        let record = load_source_str(&yaml, SourceFormat::Yaml).unwrap();
        assert_eq!(record.encoding.match_pattern, "0000000000000000000000000010011");
    }
}
