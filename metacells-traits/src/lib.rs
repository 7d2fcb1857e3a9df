//! Shared traits for the metacells kernel crates.
//!
//! This crate provides the element-type bounds that are shared across
//! `metacells-view`, `metacells-kernel` and embedding crates. Every kernel is
//! written once against these bounds instead of being instantiated by hand for
//! each data / index / offset type combination.
//!
//! - [`DataElement`]: values stored in dense and sparse buffers
//!   (`f32`, `f64`, `i32`, `i64`, `u32`, `u64`)
//! - [`IndexElement`]: element indices and band offsets of compressed matrices

pub mod element;

pub use element::{DataElement, IndexElement};
