//! Core domain logic for the sqlshadow verification engine.
//!
//! Everything in this crate is pure: canonicalization, equivalence and
//! performance checks, diagnosis rules, the security guard, and the verdict
//! types. The collaborator traits ([`collaborators`]) are defined here and
//! implemented by the `sqlshadow-db` and `sqlshadow-llm` crates, so the
//! decision engine can be tested without a database or a language model.

pub mod canonical;
pub mod collaborators;
pub mod config;
pub mod diagnosis;
pub mod equivalence;
pub mod error;
pub mod performance;
pub mod security;
pub mod sqltext;
pub mod types;
pub mod verdict;
