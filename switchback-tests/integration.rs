//! Integration tests for Switchback
//!
//! These tests run the sender and receiver pipelines back-to-back over
//! synthetic content and verify the protocol end to end: quality
//! switching with reference resynchronization, wire-format framing,
//! trace handling, and file-backed workflows.

#[path = "integration/quality_switching.rs"]
mod quality_switching;

#[path = "integration/session_roundtrip.rs"]
mod session_roundtrip;

#[path = "integration/trace_errors.rs"]
mod trace_errors;

#[path = "integration/file_workflow.rs"]
mod file_workflow;
