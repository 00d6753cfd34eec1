// ABOUTME: Module root for instruction record emitters.
// ABOUTME: Re-exports the YAML emitter and its error type.

pub mod yaml;

pub use yaml::{EmitError, emit_yaml, export_yaml, write_block_literal};
