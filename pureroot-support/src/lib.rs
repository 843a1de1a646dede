//! # PureRoot Support
//!
//! Shared utilities for the PureRoot crates.
//!
//! This crate provides:
//! - Text rendering for error messages and disposal reports

pub mod rendering;
