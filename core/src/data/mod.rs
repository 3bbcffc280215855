//! Dataset acquisition and preparation
//!
//! IDEB school index (zipped spreadsheet from INEP), ENEM candidate
//! microdata (semicolon separated CSV) and the merge of both.

pub mod columns;
pub mod enem;
pub mod frame;
pub mod ideb;
pub mod merge;

pub use enem::{load_enem, prepare_enem};
pub use ideb::{fetch_ideb_archive, load_prepared_ideb, prepare_ideb, read_ideb_sheet};
pub use merge::{merge_datasets, read_frame_csv, write_frame_csv};
