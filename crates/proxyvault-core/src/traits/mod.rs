// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams between proxyvault crates.

pub mod cipher;

pub use cipher::CredentialCipher;
