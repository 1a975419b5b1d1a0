pub mod analyze;
pub mod model;

pub use analyze::{analyze_entries, build_report, Analysis, Block, Edge, EdgeKind, EdgeOut, FunctionOut, Report};
pub use model::{clamp_words, is_mapped, load_raw_bin, read_word, Image, Segment};
