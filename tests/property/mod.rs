//! Property-based tests module
