//! End-to-end scenarios for the depot.

mod harness;
mod scenarios;
