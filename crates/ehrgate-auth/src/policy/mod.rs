//! Delegation policies and the access decision engine.

pub mod engine;
pub mod index;

pub use engine::AccessDecisionEngine;
pub use index::{POLICY_OBJECT_TYPE, PolicyIndex};
