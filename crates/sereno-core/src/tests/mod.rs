//! Falsification test suite for daemon supervision.
//!
//! Tests are organized by category and numbered so a failure names the
//! property it falsified:
//!
//! | Category | ID Range  | Concern                         |
//! |----------|-----------|---------------------------------|
//! | A        | F001-F010 | Lifecycle transitions           |
//! | B        | F011-F016 | Operation guard and concurrency |
//! | C        | F017-F024 | Signal escalation               |
//! | D        | F025-F031 | Status polling                  |
//! | E        | F032-F036 | Event delivery                  |
//!
//! The mocks share one fake process table so launches, signals, and
//! lookups stay causally coupled the way they are through a real kernel.

pub mod lifecycle;
pub mod mocks;

pub use harness::TestRig;
pub use mocks::{FakeTable, MockLauncher, RecordingSender, ScriptedLocator};
