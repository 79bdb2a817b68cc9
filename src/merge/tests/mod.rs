//! Unit tests for the merge pipeline.

mod policy_tests;
