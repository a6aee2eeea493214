//! Tests of the `relaunch` binary.

mod binary_test;
