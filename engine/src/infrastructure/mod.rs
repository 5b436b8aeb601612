// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Adapters for external collaborators.

pub mod reasoning;
pub mod sandbox;

pub use reasoning::OpenRouterAdapter;
pub use sandbox::{ScriptedSandbox, ScriptedSandboxConfig};
