//! Cross-module test suite for the block runtime
//!
//! Unit tests live next to the code they cover; these modules exercise the
//! kernel, the live block graph, and persistence end to end.

#[cfg(test)]
mod property_tests;
