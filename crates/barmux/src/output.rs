use std::io::Write;

use bar_protocol::{Header, Segment};

use crate::error::OutputError;

/// Writes the bar protocol: a header line, then one infinite JSON array of frames.
///
/// This is the only thing that ever writes to the output, and every write is flushed right away.
pub struct OutputWriter<W: Write> {
    out: W,
    header_written: bool,
    frames_written: usize,
    closed: bool,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(out: W) -> Self {
        OutputWriter { out, header_written: false, frames_written: 0, closed: false }
    }

    pub fn write_header(&mut self) -> Result<(), OutputError> {
        if self.header_written {
            return Ok(());
        }
        let header = serde_json::to_string(&Header::default()).map_err(std::io::Error::from)?;
        writeln!(self.out, "{}", header)?;
        writeln!(self.out, "[")?;
        self.out.flush()?;
        self.header_written = true;
        Ok(())
    }

    /// Write a serialized frame, which must be a JSON array on a single line.
    pub fn write_frame(&mut self, frame: &str) -> Result<(), OutputError> {
        if self.closed {
            log::debug!("Output already closed, dropping frame");
            return Ok(());
        }
        self.write_header()?;
        if self.frames_written == 0 {
            writeln!(self.out, "{}", frame)?;
        } else {
            writeln!(self.out, ",{}", frame)?;
        }
        self.out.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Show a last, single segment frame describing a fatal error.
    pub fn write_error_frame(&mut self, message: &str, color: &str) -> Result<(), OutputError> {
        let mut segment = Segment::text(format!("barmux: {}", message)).with_name("barmux").with_color(color);
        segment.urgent = Some(true);
        let frame = serde_json::to_string(&[segment]).map_err(std::io::Error::from)?;
        self.write_frame(&frame)
    }

    /// Terminate the infinite array. Calling this more than once has no effect.
    pub fn close(&mut self) -> Result<(), OutputError> {
        if self.closed {
            return Ok(());
        }
        self.write_header()?;
        writeln!(self.out, "]")?;
        self.out.flush()?;
        self.closed = true;
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

#[cfg(test)]
pub mod testing {
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };

    /// A writer that can be inspected while something else owns it.
    #[derive(Debug, Clone, Default)]
    pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        /// Everything after the header line, parsed as a JSON array of frames.
        pub fn frames(&self) -> serde_json::Value {
            let contents = self.contents();
            let (_header, body) = contents.split_once('\n').expect("no header line");
            serde_json::from_str(body).unwrap_or_else(|err| panic!("malformed output ({}):\n{}", err, contents))
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
