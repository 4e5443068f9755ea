//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters and the simulated board.  No GPIO hardware or
//! voice client install is required.

mod behaviors_tests;
mod mock_hw;
mod pubsub_tests;
mod supervisor_tests;
mod togglemute_tests;
