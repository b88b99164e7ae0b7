//! # Fieldops Agent
//!
//! Client-side engine for the field operations portal:
//! - CSV decoding of externally-edited spreadsheet exports
//! - Normalization into typed Account/Assignment entities
//! - Polling reconciliation engine holding the canonical collections
//! - Session trust state machine (login, lockout, remembered-device scan path)
//! - Fire-and-forget write-endpoint actions and audit logging
//!
//! Consumers construct an [`state::AppState`], a [`reconcile::ReconcileEngine`]
//! over a [`sheets::SheetSource`], and a [`session::SessionManager`]; everything
//! else hangs off those three.

pub mod actions;
pub mod audit;
pub mod csv;
pub mod device;
pub mod normalize;
pub mod reconcile;
pub mod session;
pub mod sheets;
pub mod solve;
pub mod state;
pub mod trust;
