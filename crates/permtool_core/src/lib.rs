//! Core engine for Salesforce permission metadata administration:
//! tag-block extraction from profile/permission-set XML, first-wins
//! deduplication across documents, a registry-driven CSV codec, and
//! schema-ordered permission-set XML generation. The library performs
//! no I/O; callers hand it already-resident text and receive text back.

pub mod builder;
pub mod config;
pub mod csv;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod project;
pub mod registry;
pub mod roster;
pub mod session;
