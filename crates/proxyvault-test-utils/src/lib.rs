// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for proxyvault integration tests.
//!
//! # Components
//!
//! - [`TestHarness`] - temp database, initialized engine, repository,
//!   coordinator, and store wired together
//! - [`FailingCipher`] - cipher that fails after a set number of encryptions
//! - [`fixtures`] - legacy plaintext rows and raw table inspection

pub mod failing_cipher;
pub mod fixtures;
pub mod harness;

pub use failing_cipher::FailingCipher;
pub use harness::TestHarness;
