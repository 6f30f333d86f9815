// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading of cpio archives whose dialect is not known in advance.

use {
    crate::{
        newc, odc, CpioHeader, CpioReader, CpioResult, NewcReader, OdcReader, ReplayReader,
        MAGIC_LENGTH,
    },
    log::debug,
    std::{
        fmt::{Display, Formatter},
        io::Read,
    },
};

/// A cpio archive dialect, identified by the marker leading each entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dialect {
    /// New ASCII format.
    Newc,
    /// New ASCII format with data checksums.
    NewcCrc,
    /// Portable ASCII format.
    Odc,
}

impl Dialect {
    /// Resolve the dialect for an entry marker.
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic {
            newc::MAGIC => Some(Self::Newc),
            newc::MAGIC_CRC => Some(Self::NewcCrc),
            odc::MAGIC => Some(Self::Odc),
            _ => None,
        }
    }

    pub fn magic(&self) -> &'static [u8] {
        match self {
            Self::Newc => newc::MAGIC,
            Self::NewcCrc => newc::MAGIC_CRC,
            Self::Odc => odc::MAGIC,
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Newc => f.write_str("newc"),
            Self::NewcCrc => f.write_str("newc-crc"),
            Self::Odc => f.write_str("odc"),
        }
    }
}

/// Decoder for a single dialect.
enum Decoder<T: Read> {
    Newc(NewcReader<T>),
    Odc(OdcReader<T>),
}

impl<T: Read> Decoder<T> {
    fn new(dialect: Dialect, reader: T) -> Self {
        match dialect {
            Dialect::Newc | Dialect::NewcCrc => Self::Newc(NewcReader::new(reader)),
            Dialect::Odc => Self::Odc(OdcReader::new(reader)),
        }
    }

    fn read_next(&mut self) -> CpioResult<Option<Box<dyn CpioHeader>>> {
        match self {
            Self::Newc(r) => r.read_next(),
            Self::Odc(r) => r.read_next(),
        }
    }

    fn finish(&mut self) -> CpioResult<()> {
        match self {
            Self::Newc(r) => r.finish(),
            Self::Odc(r) => r.finish(),
        }
    }

    fn into_inner(self) -> Option<T> {
        match self {
            Self::Newc(r) => r.into_inner(),
            Self::Odc(r) => r.into_inner(),
        }
    }
}

impl<T: Read> Read for Decoder<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Newc(r) => r.read(buf),
            Self::Odc(r) => r.read(buf),
        }
    }
}

enum State<R: Read> {
    /// Positioned at an entry boundary.
    Idle(ReplayReader<R>),
    /// An entry of the given dialect is current.
    Dispatched(Decoder<ReplayReader<R>>, Dialect),
    /// No further entries.
    Exhausted(ReplayReader<R>),
    /// A structural error was encountered. The stream is gone.
    Failed,
}

/// A cpio archive reader detecting the dialect of every entry.
///
/// Before each entry the marker is sniffed, then replayed into a decoder for
/// the matching dialect. An unrecognized marker ends iteration. After an
/// error, no further entries are produced.
pub struct ArchiveReader<R: Read> {
    state: State<R>,
}

impl<R: Read> ArchiveReader<R> {
    /// The dialect of the current entry, if any.
    pub fn dialect(&self) -> Option<Dialect> {
        match &self.state {
            State::Dispatched(_, dialect) => Some(*dialect),
            _ => None,
        }
    }

    /// Obtain the underlying reader.
    ///
    /// `None` if reading failed. Bytes sniffed but not consumed are lost.
    pub fn into_inner(self) -> Option<R> {
        match self.state {
            State::Idle(r) | State::Exhausted(r) => Some(r.into_inner()),
            State::Dispatched(d, _) => d.into_inner().map(|r| r.into_inner()),
            State::Failed => None,
        }
    }

    /// Advance to the next entry, returning a reader over its content.
    ///
    /// The entry borrows this reader, so it must be dropped before advancing.
    pub fn next_entry(&mut self) -> CpioResult<Option<ArchiveEntry<'_, R>>> {
        Ok(self
            .advance()?
            .map(move |(header, dialect)| ArchiveEntry {
                header,
                dialect,
                reader: self,
            }))
    }

    fn advance(&mut self) -> CpioResult<Option<(Box<dyn CpioHeader>, Dialect)>> {
        let mut stream = match std::mem::replace(&mut self.state, State::Failed) {
            State::Idle(stream) => stream,
            State::Dispatched(mut decoder, _) => {
                decoder.finish()?;
                match decoder.into_inner() {
                    Some(stream) => stream,
                    None => return Ok(None),
                }
            }
            State::Exhausted(stream) => {
                self.state = State::Exhausted(stream);
                return Ok(None);
            }
            State::Failed => return Ok(None),
        };

        let magic = stream.peek(MAGIC_LENGTH)?;

        if magic.is_empty() {
            self.state = State::Exhausted(stream);
            return Ok(None);
        }

        if magic.len() < MAGIC_LENGTH {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "archive ended inside entry marker",
            )
            .into());
        }

        let dialect = match Dialect::from_magic(&magic) {
            Some(dialect) => dialect,
            None => {
                debug!("unrecognized cpio marker {:?}; ending archive", magic);
                self.state = State::Exhausted(stream);
                return Ok(None);
            }
        };

        let mut decoder = Decoder::new(dialect, stream);

        match decoder.read_next()? {
            Some(header) => {
                debug!("dispatched {} entry {}", dialect, header.name());
                self.state = State::Dispatched(decoder, dialect);
                Ok(Some((header, dialect)))
            }
            None => {
                if let Some(stream) = decoder.into_inner() {
                    self.state = State::Exhausted(stream);
                }
                Ok(None)
            }
        }
    }
}

impl<R: Read> CpioReader<R> for ArchiveReader<R> {
    fn new(reader: R) -> Self {
        Self {
            state: State::Idle(ReplayReader::new(reader)),
        }
    }

    fn read_next(&mut self) -> CpioResult<Option<Box<dyn CpioHeader>>> {
        Ok(self.advance()?.map(|(header, _)| header))
    }

    fn finish(&mut self) -> CpioResult<()> {
        if let State::Dispatched(decoder, _) = &mut self.state {
            decoder.finish()?;
        }

        Ok(())
    }
}

impl<R: Read> Iterator for ArchiveReader<R> {
    type Item = CpioResult<Box<dyn CpioHeader>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(r)) => Some(Ok(r)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: Read> Read for ArchiveReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        if let State::Dispatched(decoder, _) = &mut self.state {
            decoder.read(buf)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no current archive entry to read from",
            ))
        }
    }
}

/// An entry obtained from [ArchiveReader::next_entry].
///
/// Reading yields the entry's content.
pub struct ArchiveEntry<'a, R: Read> {
    header: Box<dyn CpioHeader>,
    dialect: Dialect,
    reader: &'a mut ArchiveReader<R>,
}

impl<'a, R: Read> ArchiveEntry<'a, R> {
    pub fn name(&self) -> &str {
        self.header.name()
    }

    pub fn is_directory(&self) -> bool {
        self.header.is_directory()
    }

    /// Full header of this entry.
    pub fn header(&self) -> &dyn CpioHeader {
        self.header.as_ref()
    }

    /// Dialect the entry was encoded in.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl<'a, R: Read> Read for ArchiveEntry<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}
