// src/lib_tests/logging.rs
// Tests for safe logging helpers
