pub mod data_stream;
mod lines;
pub mod openai;

pub use data_stream::{DataStreamProvider, Frame, FrameError, decode_frame};
pub use openai::OpenAiProvider;
