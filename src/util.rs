//! Shared utility modules used across Glaive components.

pub mod varint;
