//! Shared wire-level types for the Ethereum signer firmware.
//!
//! This crate defines the command frame format, the command identifiers,
//! the status/error taxonomy and the plain data types exchanged between
//! the untrusted host and the device command processor. It contains no
//! parsing or cryptography; all validation happens device-side after
//! deserialization.

#![no_std]

extern crate alloc;

pub mod commands;
pub mod error;
pub mod message;
pub mod types;
