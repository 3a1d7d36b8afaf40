//! Process-level helpers shared by binaries and tests.

pub mod bootstrap;
