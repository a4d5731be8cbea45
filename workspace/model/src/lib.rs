//! Persistence layer of the recurrence engine: the SeaORM entities for
//! recurrence rules and their generated occurrences.

pub mod entities;
