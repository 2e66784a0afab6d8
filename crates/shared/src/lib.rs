//! Read model shared between the upload core and whatever renders it.

pub mod domain;
pub mod error;
pub mod protocol;

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
