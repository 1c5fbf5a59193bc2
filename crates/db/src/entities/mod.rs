//! `SeaORM` entity definitions.

pub mod attachments;
