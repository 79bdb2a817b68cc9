//! Tests for dispatch domain types, adapters and the dispatcher loop.

mod dispatcher_tests;
