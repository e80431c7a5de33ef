//! Integration Tests Module
//!
//! End-to-end tests driving the gateway and the built-in commands against
//! the recording backend and real `sh` subprocesses.

// Shared fixtures
mod support;

// Dispatch, presence and capture through the gateway
mod dispatch_test;

// Terminal streaming and file delivery
mod terminal_test;

// Configuration file handling
mod config_test;
