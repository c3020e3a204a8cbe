//! # Reading Sources
//!
//! Where the stream loops get their raw readings from.
//!
//! Camera decoders and card readers on a station are external processes
//! that write one reading per line: to a FIFO, a serial device or stdin.
//! A [`LineSource`] turns any such byte stream into readings.

use scanlink_core::ScanlinkError;
use std::future::Future;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Input path meaning "read from stdin".
pub const STDIN_PATH: &str = "-";

/// A stream of raw readings.
///
/// `Ok(None)` means the source is exhausted and the loop should stop.
/// An `Err` is a transient read failure: no reading this cycle.
pub trait ReadingSource: Send {
    fn next_reading(&mut self) -> impl Future<Output = std::io::Result<Option<String>>> + Send;
}

/// Line-oriented source over any buffered async reader.
///
/// Lines are trimmed; blank lines are skipped.
#[derive(Debug)]
pub struct LineSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R> ReadingSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_reading(&mut self) -> std::io::Result<Option<String>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        return Ok(Some(trimmed.to_string()));
                    }
                }
                None => return Ok(None),
            }
        }
    }
}

/// Boxed reader behind a configured input.
pub type InputReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Open a configured input: a file/FIFO/device path, or `-` for stdin.
pub async fn open_input(path: &Path) -> Result<LineSource<InputReader>, ScanlinkError> {
    let reader: InputReader = if path.as_os_str() == STDIN_PATH {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            ScanlinkError::IoError(format!("Cannot open input {}: {}", path.display(), e))
        })?;
        Box::new(BufReader::new(file))
    };
    Ok(LineSource::new(reader))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_lines_skipped_and_trimmed() {
        let mut source = LineSource::new(&b"\n  S123415003270 \r\n\n04A3F21B\n"[..]);

        assert_eq!(
            source.next_reading().await.expect("read"),
            Some("S123415003270".to_string())
        );
        assert_eq!(
            source.next_reading().await.expect("read"),
            Some("04A3F21B".to_string())
        );
        assert_eq!(source.next_reading().await.expect("read"), None);
    }

    #[tokio::test]
    async fn missing_input_file_is_an_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let result = open_input(&dir.path().join("absent.fifo")).await;
        assert!(matches!(result, Err(ScanlinkError::IoError(_))));
    }
}
