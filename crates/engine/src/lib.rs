//! The verification and decision engine.
//!
//! Drives the full lifecycle of one optimization request: diagnose the
//! original statement, ask the proposal source for a fix, execute both
//! variants in an isolated shadow scope, and accept the candidate only when
//! its result set matches the baseline exactly and it is measurably faster.
//! Everything external comes in through the collaborator traits defined in
//! `sqlshadow-core`, so the whole loop runs against in-memory fakes in
//! tests.

pub mod diagnose;
pub mod orchestrator;
pub mod sandbox;

pub use orchestrator::Orchestrator;
