use std::io::{self, Write};

use crate::format::{render_json, render_text};
use crate::system::snapshot::SnapshotRecord;

/// Consumer of per-cycle snapshot records.
pub trait SnapshotSink: Send {
    fn emit(&mut self, record: &SnapshotRecord) -> io::Result<()>;
}

/// Human-readable console block per record.
pub struct TextSink<W> {
    out: W,
}

impl TextSink<io::Stdout> {
    pub fn stdout() -> Self {
        TextSink::new(io::stdout())
    }
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W) -> Self {
        TextSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SnapshotSink for TextSink<W> {
    fn emit(&mut self, record: &SnapshotRecord) -> io::Result<()> {
        writeln!(self.out, "{}", render_text(record))?;
        self.out.flush()
    }
}

/// JSON Lines: one object per record.
pub struct JsonSink<W> {
    out: W,
}

impl JsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        JsonSink::new(io::stdout())
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W) -> Self {
        JsonSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SnapshotSink for JsonSink<W> {
    fn emit(&mut self, record: &SnapshotRecord) -> io::Result<()> {
        let line = render_json(record)?;
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }
}
