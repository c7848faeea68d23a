//! Core internal logic for presence tracking.
//!
//! This module contains the shared station state, the occupancy evaluator
//! and the background notification and reconciliation loops.

pub(crate) mod occupancy;
pub(crate) mod output;
pub(crate) mod poller;
pub(crate) mod state;
pub(crate) mod subscriber;
