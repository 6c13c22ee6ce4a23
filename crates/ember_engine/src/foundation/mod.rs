//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Generational pools and handles
//! - Interned string ids
//! - Math types and bounding boxes
//! - Frame timing
//! - Logging setup

pub mod aabb;
pub mod logging;
pub mod math;
pub mod pool;
pub mod string_id;
pub mod time;
