//! Read-only product and rate tables (C4-C9, C16): everything the monthly engine consults
//! but never mutates. Submodules group tables the way the teacher's `assumptions` module did
//! -- one file per table family, a directory-of-CSVs loader, and a hand-written `sample()`
//! fixture per type for tests and demos that don't want to touch the filesystem.

pub mod interest;
pub mod loads;
pub mod mortality;
pub mod premium_tax;
pub mod product;
pub mod state;
