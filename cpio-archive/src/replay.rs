// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reader that can push already consumed bytes back in front of a stream.

use std::io::Read;

/// A [Read] decorator serving replayed bytes before those of the inner reader.
///
/// This allows content to be sniffed from a non-seekable stream and then
/// handed to a consumer that expects to read it again.
#[derive(Debug)]
pub struct ReplayReader<R: Read> {
    inner: R,
    buffer: Vec<u8>,
    position: usize,
}

impl<R: Read> ReplayReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: vec![],
            position: 0,
        }
    }

    /// Arrange for `data` to be returned by the next reads.
    ///
    /// The data is placed in front of any replayed bytes not yet consumed.
    pub fn replay(&mut self, data: &[u8]) {
        let mut buffer = Vec::with_capacity(data.len() + self.pending());
        buffer.extend_from_slice(data);
        buffer.extend_from_slice(&self.buffer[self.position..]);

        self.buffer = buffer;
        self.position = 0;
    }

    /// Read up to `count` bytes and replay them.
    ///
    /// Fewer bytes are returned only if the stream ends first.
    pub fn peek(&mut self, count: usize) -> std::io::Result<Vec<u8>> {
        let mut data = vec![0u8; count];
        let mut filled = 0;

        while filled < count {
            match self.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    data.truncate(filled);
                    self.replay(&data);
                    return Err(e);
                }
            }
        }

        data.truncate(filled);
        self.replay(&data);

        Ok(data)
    }

    /// Number of replayed bytes not yet consumed.
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Obtain the inner reader.
    ///
    /// Replayed bytes not yet consumed are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ReplayReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.position < self.buffer.len() {
            let count = std::cmp::min(buf.len(), self.pending());
            buf[..count].copy_from_slice(&self.buffer[self.position..self.position + count]);
            self.position += count;

            if self.position == self.buffer.len() {
                self.buffer.clear();
                self.position = 0;
            }

            Ok(count)
        } else {
            self.inner.read(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    #[test]
    fn replay_order() -> std::io::Result<()> {
        let mut reader = ReplayReader::new(Cursor::new(b"world".to_vec()));
        reader.replay(b"lo ");
        reader.replay(b"hel");
        assert_eq!(reader.pending(), 6);

        let mut first = [0u8; 2];
        reader.read_exact(&mut first)?;
        assert_eq!(&first, b"he");

        // Replayed bytes go ahead of the unconsumed remainder.
        reader.replay(b"xy");

        let mut rest = String::new();
        reader.read_to_string(&mut rest)?;
        assert_eq!(rest, "xyllo world");
        assert_eq!(reader.pending(), 0);

        Ok(())
    }

    #[test]
    fn peek_is_transparent() -> std::io::Result<()> {
        let mut reader = ReplayReader::new(Cursor::new(b"070701rest".to_vec()));

        assert_eq!(reader.peek(6)?, b"070701");
        assert_eq!(reader.peek(4)?, b"0707");

        let mut all = vec![];
        reader.read_to_end(&mut all)?;
        assert_eq!(all, b"070701rest");

        assert!(reader.peek(6)?.is_empty());

        let mut short = ReplayReader::new(Cursor::new(b"07".to_vec()));
        assert_eq!(short.peek(6)?, b"07");
        assert_eq!(short.pending(), 2);

        Ok(())
    }
}
