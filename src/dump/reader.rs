use std::io::{self, Read};
use std::sync::Arc;

use super::cache::BlockCache;
use super::CancelToken;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repository;

/// `io::Read` over a file's content blocks, fetched through a `BlockCache`
///
/// only the current block is held in memory. failures are carried inside the
/// returned `io::Error` as a crate `Error`; `classify_read_error` gets them
/// back out. the byte count is checked against the declared file size, both
/// on overrun and at end of data.
pub struct BlockReader<'a, R: Repository + ?Sized> {
    repo: &'a R,
    cache: &'a mut BlockCache,
    blocks: std::slice::Iter<'a, Hash>,
    cancel: &'a CancelToken,
    path: &'a str,
    expected: u64,
    delivered: u64,
    current: Option<Arc<[u8]>>,
    pos: usize,
}

impl<'a, R: Repository + ?Sized> BlockReader<'a, R> {
    pub fn new(
        repo: &'a R,
        cache: &'a mut BlockCache,
        blocks: &'a [Hash],
        expected: u64,
        path: &'a str,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            repo,
            cache,
            blocks: blocks.iter(),
            cancel,
            path,
            expected,
            delivered: 0,
            current: None,
            pos: 0,
        }
    }

    /// bytes handed out so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn next_block(&mut self) -> Result<bool> {
        let Some(id) = self.blocks.next() else {
            if self.delivered != self.expected {
                return Err(self.size_mismatch(self.delivered));
            }
            return Ok(false);
        };

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let block = self.cache.get(self.repo, id)?;
        let total = self.delivered + block.len() as u64;
        if total > self.expected {
            return Err(self.size_mismatch(total));
        }

        self.current = Some(block);
        self.pos = 0;
        Ok(true)
    }

    fn size_mismatch(&self, actual: u64) -> Error {
        Error::SizeMismatch {
            path: self.path.to_string(),
            expected: self.expected,
            actual,
        }
    }
}

impl<R: Repository + ?Sized> Read for BlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if let Some(block) = &self.current {
                let remaining = &block[self.pos..];
                if !remaining.is_empty() {
                    let n = remaining.len().min(buf.len());
                    buf[..n].copy_from_slice(&remaining[..n]);
                    self.pos += n;
                    self.delivered += n as u64;
                    return Ok(n);
                }
                self.current = None;
            }

            match self.next_block() {
                Ok(true) => continue,
                Ok(false) => return Ok(0),
                Err(e) => return Err(io::Error::other(e)),
            }
        }
    }
}

/// turn an error from copying file content into the dump taxonomy
///
/// cancellation observed by the reader stays `Cancelled`; everything else,
/// including failures of the sink during the copy, becomes `ContentRead`.
pub(crate) fn classify_read_error(op: &'static str, path: &str, err: io::Error) -> Error {
    let source = match unwrap_io_error(err) {
        Error::Cancelled => return Error::Cancelled,
        other => other,
    };
    Error::ContentRead {
        op,
        path: path.to_string(),
        source: Box::new(source),
    }
}

fn unwrap_io_error(err: io::Error) -> Error {
    let sink = || std::path::PathBuf::from("<archive>");

    if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        return Error::Io {
            path: sink(),
            source: err,
        };
    }

    let kind = err.kind();
    match err.into_inner().map(|inner| inner.downcast::<Error>()) {
        Some(Ok(inner)) => *inner,
        Some(Err(other)) => Error::Io {
            path: sink(),
            source: io::Error::new(kind, other),
        },
        None => Error::Io {
            path: sink(),
            source: io::Error::from(kind),
        },
    }
}
