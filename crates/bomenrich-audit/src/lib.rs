//! Audit Sink: two-phase object-storage writer plus the
//! downstream field-diff report.

pub mod field_diff;
pub mod finalize;
pub mod sink;

pub use field_diff::{diff_line, render_field_diff_csv, FieldDiffRow};
pub use finalize::{rows_to_csv, AuditFinalizer};
pub use sink::AuditSink;
