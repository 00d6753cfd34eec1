// ABOUTME: Core library for isadoc, containing the instruction record model and YAML emitter.
// ABOUTME: Loaders build an InstructionRecord; the emitter turns it into a schema-shaped document.

pub mod emit;
pub mod record;

pub use emit::{EmitError, emit_yaml, export_yaml};
pub use record::{
    AccessMap, DescriptionEntry, Encoding, EncodingVariable, InstructionRecord, RecordError,
};
