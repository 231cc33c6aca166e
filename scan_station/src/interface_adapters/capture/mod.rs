pub mod line_reader;

pub use line_reader::{LineFeed, LineReaderCamera, STDIN_DEVICE};
