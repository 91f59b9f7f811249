//! # hts-io: Study Input and Reporting
//!
//! The mechanical edges of the system: reading study documents, writing the
//! human-readable text report, and exporting per-variable CSV series (one
//! file per variable and plant, ready for plotting or side-by-side study
//! comparison).
//!
//! The engines never touch the filesystem; everything here consumes or
//! produces the validated [`hts_core::Study`] and [`hts_algo::StudyResult`]
//! types.

pub mod export;
pub mod input;
pub mod report;
pub mod text;

pub use export::{export_comparison, export_csvs};
pub use input::{read_study, read_study_str};
pub use report::{render_report, write_report};
pub use text::parse_study_text;
