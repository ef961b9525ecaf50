//! Frame decoding and the reader-to-estimator hand-off

pub mod parser;
pub mod store;
pub mod reader;
pub mod estimator;

pub use parser::{FrameParser, ParseError, decode_distance, decode_tag_id, encode_frame};
pub use store::{ReadingStore, PositionCell};
pub use reader::{FrameReader, ReaderCounters};
pub use estimator::{Estimator, CycleOutcome};
