//! Device protocol implementations.
//!
//! `helios` holds the point/frame wire types and, behind the `helios`
//! feature, the binding to the vendor shared library. `simulated` is an
//! in-process stand-in used for dry runs and tests.

pub mod helios;
pub mod simulated;
