//! Session-level tests: a whole engine driven through lifecycle sequences
//! with a manual clock, paused Tokio time and the loopback data layer.

mod engine_tests;
