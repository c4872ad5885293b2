mod output;

pub use output::{LogBuffer, LogLine, severity_color};
