// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Fact Snapshot
//!
//! Structured facts supplied by the external parse collaborator: call
//! graph, state variables, external calls, and guard annotations per
//! target. The engine treats a snapshot as read-only and versioned for
//! the duration of one analysis run.

use serde::{Deserialize, Serialize};

/// Where a state mutation happens relative to external calls in the
/// same function body. The ordering is what reentrancy patterns key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMutation {
    BeforeExternalCall,
    AfterExternalCall,
    NoExternalCall,
}

/// A state variable declared by the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    /// Whether the variable tracks value (balances, shares, supplies).
    pub holds_value: bool,
}

/// An external call made by a target function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalCall {
    pub callee: String,
    /// True if the callee is attacker-controllable (arbitrary address,
    /// token hook, callback).
    pub attacker_controllable: bool,
    /// True if the call forwards value.
    pub transfers_value: bool,
}

/// Facts about a single function of the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionFact {
    pub name: String,
    /// Functions this one calls within the target (call graph edges).
    pub calls: Vec<String>,
    pub external_calls: Vec<ExternalCall>,
    /// State variables written, with their position relative to
    /// external calls.
    pub state_writes: Vec<(String, StateMutation)>,
    /// Guard modifiers present (access control, reentrancy guard).
    pub guards: Vec<String>,
    /// True if callable without privilege (public/external, no owner
    /// check).
    pub permissionless: bool,
    /// True if the function reads a price or rate from another contract.
    pub reads_external_price: bool,
    /// True if the function performs unchecked arithmetic on value
    /// amounts.
    pub unchecked_arithmetic: bool,
}

/// Read-only, versioned fact set for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactSnapshot {
    /// Target reference (path, address, or package id).
    pub target: String,
    /// Snapshot version supplied by the parse collaborator.
    pub version: String,
    pub functions: Vec<FunctionFact>,
    pub state_variables: Vec<StateVariable>,
    /// Total value locked in the target, in the collaborator's base
    /// unit; denominator for observed-impact ratios.
    pub total_value_locked: f64,
    /// True if the target exposes flash-loan entry points or is
    /// composable with a flash-loan provider.
    pub flash_loanable: bool,
    /// True if governance functions (propose/vote/execute) exist.
    pub has_governance: bool,
}

impl FactSnapshot {
    pub fn function(&self, name: &str) -> Option<&FunctionFact> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Functions reachable without privilege.
    pub fn permissionless_functions(&self) -> impl Iterator<Item = &FunctionFact> {
        self.functions.iter().filter(|f| f.permissionless)
    }
}
