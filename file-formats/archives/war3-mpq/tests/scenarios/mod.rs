//! Level 4: End-to-End Scenario Tests
//!
//! Archives damaged the way map protection tools damage them.
