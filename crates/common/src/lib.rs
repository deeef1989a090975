//! Types and functions shared by all pyslot components.

pub mod hash;
pub mod lock;
