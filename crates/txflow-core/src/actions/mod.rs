//! Client actions.
//!
//! Each action is a method on [`crate::Client`]; this module groups them by
//! the kind of transaction they produce.

pub mod contracts;
pub mod transactions;
