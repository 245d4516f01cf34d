//! `SeaORM` entity definitions.

pub mod report_cache;
