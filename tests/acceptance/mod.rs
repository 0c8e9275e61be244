//! End-to-end sampler runs against the loopback transport.

mod common;
mod ordering_test;
mod scenario_test;
mod teardown_test;
mod timeout_test;
