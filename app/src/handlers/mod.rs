//! Per-command payload consumers.
//!
//! Each handler owns one command class: it feeds frames through the
//! shared reassembly slot, parses the complete payload against its
//! schema, runs the cross-field and cross-state checks the schema
//! cannot express, and commits into [`crate::state::DeviceState`] as a
//! whole value. Nothing is committed before verification succeeds.

pub mod auth_7702;
pub mod field_table;
pub mod network;
pub mod safe_account;
pub mod token;
pub mod trusted_name;
pub mod tx_simulation;
