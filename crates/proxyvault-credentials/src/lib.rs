// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential subsystem for proxyvault.
//!
//! - [`CredentialStore`]: encrypted credential records with access auditing.
//! - [`SecureProxyRepository`]: proxy CRUD that never stores or returns
//!   plaintext secrets outside an explicit decrypting read.
//! - [`MigrationCoordinator`]: resumable bulk conversion of legacy plaintext
//!   rows, plus verification of the end state.
//! - [`keyring`]: master key creation, unlock, and rotation.

pub mod keyring;
pub mod migration;
pub mod repository;
pub mod startup;
pub mod store;
pub mod validation;

pub use keyring::{rotate_passphrase, unlock_or_create, RotationReport, UnlockOutcome};
pub use migration::{
    MigrationCoordinator, MigrationReport, RowFailure, RowOutcome, VerificationReport,
};
pub use repository::SecureProxyRepository;
pub use startup::run_startup_migration;
pub use store::CredentialStore;
