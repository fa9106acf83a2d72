//! Consolidated type definitions for the allocation optimizer.
//!
//! This module contains the data contract shared by the core and its
//! external collaborators: targets, policy lists, budgets, allocation
//! vectors, actions, and the input snapshot.

mod action;
mod allocation;
mod policy;
mod snapshot;
mod target;

pub use action::*;
pub use allocation::*;
pub use policy::*;
pub use snapshot::*;
pub use target::*;
