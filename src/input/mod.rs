mod core;

pub use crate::input::core::{Control, InputSink, PadState, PipeCommand, PipeSink};
