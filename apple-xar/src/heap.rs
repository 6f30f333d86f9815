// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded views over the XAR heap.

use {
    crate::{Error, XarResult},
    std::{
        cmp::min,
        io::{Read, Seek, SeekFrom},
    },
};

/// Describes the heap region of an archive.
///
/// Offsets in the table of contents are relative to [Self::start].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Heap {
    /// Absolute offset within the archive where the heap begins.
    pub start: u64,
    /// Number of bytes from [Self::start] to the end of the archive.
    pub size: u64,
}

impl Heap {
    /// Verify a heap relative range fits inside the heap.
    pub fn check_range(&self, offset: u64, length: u64) -> XarResult<()> {
        match offset.checked_add(length) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::HeapRangeOutOfBounds {
                offset,
                length,
                heap_size: self.size,
            }),
        }
    }

    /// Obtain a reader over a heap relative range.
    pub fn slice<'a, R: Read + Seek>(
        &self,
        reader: &'a mut R,
        offset: u64,
        length: u64,
    ) -> XarResult<HeapSlice<'a, R>> {
        self.check_range(offset, length)?;

        Ok(HeapSlice {
            reader,
            start: self.start + offset,
            length,
            position: 0,
        })
    }
}

/// A reader over a fixed range of the heap.
///
/// Every read seeks to its absolute position first, so the view doesn't
/// care where the underlying reader's cursor was left by anyone else.
#[derive(Debug)]
pub struct HeapSlice<'a, R: Read + Seek> {
    reader: &'a mut R,
    start: u64,
    length: u64,
    position: u64,
}

impl<'a, R: Read + Seek> HeapSlice<'a, R> {
    /// Total size of this view in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of bytes not yet read.
    pub fn remaining(&self) -> u64 {
        self.length - self.position
    }
}

impl<'a, R: Read + Seek> Read for HeapSlice<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let wanted = min(self.remaining(), buf.len() as u64) as usize;
        if wanted == 0 {
            return Ok(0);
        }

        self.reader
            .seek(SeekFrom::Start(self.start + self.position))?;
        let count = self.reader.read(&mut buf[0..wanted])?;
        self.position += count as u64;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    #[test]
    fn slice_bounds() -> XarResult<()> {
        let mut cursor = Cursor::new((0u8..100).collect::<Vec<_>>());
        let heap = Heap {
            start: 10,
            size: 90,
        };

        let mut buf = vec![];
        heap.slice(&mut cursor, 5, 4)?.read_to_end(&mut buf)?;
        assert_eq!(buf, vec![15, 16, 17, 18]);

        cursor.set_position(0);
        let mut slice = heap.slice(&mut cursor, 80, 10)?;
        let mut first = [0u8; 4];
        slice.read_exact(&mut first)?;
        assert_eq!(first, [90, 91, 92, 93]);
        assert_eq!(slice.remaining(), 6);

        let mut buf = vec![];
        heap.slice(&mut cursor, 0, 90)?.read_to_end(&mut buf)?;
        assert_eq!(buf.len(), 90);

        assert!(matches!(
            heap.slice(&mut cursor, 85, 6),
            Err(Error::HeapRangeOutOfBounds {
                offset: 85,
                length: 6,
                heap_size: 90
            })
        ));
        assert!(heap.check_range(u64::MAX, 2).is_err());

        Ok(())
    }
}
