#![allow(dead_code)]

pub mod builders;
pub mod faulty;
pub mod harness;

// Re-export commonly used test utilities
pub use faulty::FaultyStore;
pub use harness::{StaticMetadataSource, TestHarness};
