//! Level 3: Feature Integration Tests

mod archive;
mod keys;
mod stream;
