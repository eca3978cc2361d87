//! Canvas domain model.
//!
//! # Responsibility
//! - Define the records shared by placement, persistence and broadcast.
//! - Own input validation for identities and colors.
//!
//! # Invariants
//! - A constructed `ActorId`, `GroupId` or `Color` is always valid.
//! - Cells are never deleted, only overwritten.

pub mod cell;
pub mod color;
pub mod input;
