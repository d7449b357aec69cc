//! Domain models for Gatehouse.
//!
//! Each entity kind has a read projection (the stored form returned to
//! callers), a create record and a patch record. Patch fields are
//! `Option`s: `None` leaves the stored value untouched.

pub mod group;
pub mod permission;
pub mod user;
