//! ASCII 事件跟踪
//!
//! 每行一个事件：`<kind> <时间秒> <设备路径> <帧摘要>`，kind 为 `+ - r d`。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::TracePoint;
use crate::net::Frame;
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Enqueue,
    Dequeue,
    Receive,
    Drop,
}

impl TraceKind {
    pub fn symbol(self) -> char {
        match self {
            TraceKind::Enqueue => '+',
            TraceKind::Dequeue => '-',
            TraceKind::Receive => 'r',
            TraceKind::Drop => 'd',
        }
    }

    fn source(self) -> &'static str {
        match self {
            TraceKind::Enqueue => "TxQueue/Enqueue",
            TraceKind::Dequeue => "TxQueue/Dequeue",
            TraceKind::Receive => "MacRx",
            TraceKind::Drop => "TxQueue/Drop",
        }
    }
}

#[derive(Debug)]
pub struct AsciiTrace<W: Write> {
    out: W,
    path: PathBuf,
    lines: u64,
    error: Option<io::Error>,
}

impl AsciiTrace<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> AsciiTrace<W> {
    pub fn new(out: W, path: impl AsRef<Path>) -> Self {
        Self {
            out,
            path: path.as_ref().to_path_buf(),
            lines: 0,
            error: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn record(&mut self, kind: TraceKind, now: SimTime, at: TracePoint, frame: &Frame) {
        if self.error.is_some() {
            return;
        }
        let res = writeln!(
            self.out,
            "{} {:.9} /NodeList/{}/DeviceList/{}/$CsmaNetDevice/{} {}",
            kind.symbol(),
            now.as_secs_f64(),
            at.node.0,
            at.index,
            kind.source(),
            frame
        );
        match res {
            Ok(()) => self.lines += 1,
            Err(e) => self.error = Some(e),
        }
    }

    /// 刷新输出，返回写入的行数或第一次写入错误
    pub fn finish(mut self) -> io::Result<u64> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.lines)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
