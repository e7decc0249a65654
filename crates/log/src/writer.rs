//! Writer implementations

use std::io;

use tracing_subscriber::fmt::{
    TestWriter,
    writer::{BoxMakeWriter, MakeWriterExt},
};

use crate::config::WriterConfig;
use crate::error::{LogError, LogResult};

/// Create a writer from configuration
pub fn make_writer(config: &WriterConfig) -> LogResult<BoxMakeWriter> {
    let writer = match config {
        WriterConfig::Stderr => BoxMakeWriter::new(io::stderr),
        WriterConfig::Stdout => BoxMakeWriter::new(io::stdout),
        WriterConfig::Test => BoxMakeWriter::new(TestWriter::default),
        WriterConfig::Multi(writers) => {
            let mut iter = writers.iter();
            let first = iter
                .next()
                .ok_or_else(|| LogError::config("Multi writer needs at least one writer"))?;
            let mut combined = make_writer(first)?;
            for next in iter {
                combined = BoxMakeWriter::new(combined.and(make_writer(next)?));
            }
            combined
        }
    };

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_multi_writer_is_rejected() {
        let result = make_writer(&WriterConfig::Multi(Vec::new()));
        assert!(matches!(result, Err(LogError::Config(_))));
    }

    #[test]
    fn test_nested_multi_writer_builds() {
        let config = WriterConfig::Multi(vec![
            WriterConfig::Stderr,
            WriterConfig::Multi(vec![WriterConfig::Stdout, WriterConfig::Test]),
        ]);
        assert!(make_writer(&config).is_ok());
    }
}
