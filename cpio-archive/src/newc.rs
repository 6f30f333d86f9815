// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! New ASCII format support.
//!
//! Both the plain (`070701`) and checksummed (`070702`) variants are handled.
//! In the latter, the header checksum field holds the 32-bit wrapping sum of
//! all bytes of the entry's data.

use {
    crate::{read_name, read_number, CpioHeader, CpioReader, CpioResult, Error, TRAILER_NAME},
    log::debug,
    std::io::{Read, Take},
};

pub const MAGIC: &[u8] = b"070701";

/// Header magic for entries carrying a data checksum.
pub const MAGIC_CRC: &[u8] = b"070702";

/// Size of the fixed portion of a header, magic included.
pub const HEADER_SIZE: usize = 110;

fn read_hex(reader: &mut impl Read, count: usize) -> CpioResult<u32> {
    read_number(reader, count, 16)
}

/// Number of bytes needed to pad `length` to a 4 byte boundary.
fn pad_length(length: usize) -> usize {
    (4 - length % 4) % 4
}

/// Running checksum of the current entry's data.
#[derive(Clone, Debug)]
struct EntryChecksum {
    name: String,
    expected: u32,
    actual: u32,
}

impl EntryChecksum {
    fn update(&mut self, data: &[u8]) {
        for b in data {
            self.actual = self.actual.wrapping_add(*b as u32);
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewcHeader {
    pub inode: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub file_size: u32,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub rdev_major: u32,
    pub rdev_minor: u32,
    pub checksum: u32,
    pub name: String,
}

impl NewcHeader {
    /// Parse a header from a reader positioned just after the magic.
    ///
    /// Padding following the filename is consumed.
    pub fn from_reader(reader: &mut impl Read) -> CpioResult<Self> {
        let inode = read_hex(reader, 8)?;
        let mode = read_hex(reader, 8)?;
        let uid = read_hex(reader, 8)?;
        let gid = read_hex(reader, 8)?;
        let nlink = read_hex(reader, 8)?;
        let mtime = read_hex(reader, 8)?;
        let file_size = read_hex(reader, 8)?;
        let dev_major = read_hex(reader, 8)?;
        let dev_minor = read_hex(reader, 8)?;
        let rdev_major = read_hex(reader, 8)?;
        let rdev_minor = read_hex(reader, 8)?;
        let name_length = read_hex(reader, 8)?;
        let checksum = read_hex(reader, 8)?;

        let name = read_name(reader, name_length)?;

        // Header plus name is padded to 4 byte boundary.
        let mut pad = vec![0u8; pad_length(HEADER_SIZE + name_length as usize)];
        reader.read_exact(&mut pad)?;

        Ok(Self {
            inode,
            mode,
            uid,
            gid,
            nlink,
            mtime,
            file_size,
            dev_major,
            dev_minor,
            rdev_major,
            rdev_minor,
            checksum,
            name,
        })
    }
}

/// Combine major and minor numbers using the Linux `new_encode_dev()` layout.
fn encode_dev(major: u32, minor: u32) -> u32 {
    (minor & 0xff) | ((major & 0xfff) << 8) | ((minor & !0xff) << 12)
}

impl CpioHeader for NewcHeader {
    fn device(&self) -> u32 {
        encode_dev(self.dev_major, self.dev_minor)
    }

    fn inode(&self) -> u32 {
        self.inode
    }

    fn mode(&self) -> u32 {
        self.mode
    }

    fn uid(&self) -> u32 {
        self.uid
    }

    fn gid(&self) -> u32 {
        self.gid
    }

    fn nlink(&self) -> u32 {
        self.nlink
    }

    fn rdev(&self) -> u32 {
        encode_dev(self.rdev_major, self.rdev_minor)
    }

    fn mtime(&self) -> u32 {
        self.mtime
    }

    fn file_size(&self) -> u32 {
        self.file_size
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A cpio archive reader for *New ASCII format* archives.
pub struct NewcReader<T: Read + Sized> {
    archive_reader: Option<T>,
    entry_reader: Option<Take<T>>,
    entry_data_pad: usize,
    entry_checksum: Option<EntryChecksum>,
    seen_trailer: bool,
}

impl<T: Read + Sized> NewcReader<T> {
    /// Obtain the underlying reader.
    ///
    /// If an entry is being read, the reader is positioned somewhere in its data.
    pub fn into_inner(self) -> Option<T> {
        match (self.archive_reader, self.entry_reader) {
            (Some(reader), _) => Some(reader),
            (None, Some(reader)) => Some(reader.into_inner()),
            (None, None) => None,
        }
    }
}

impl<T: Read + Sized> CpioReader<T> for NewcReader<T> {
    fn new(reader: T) -> Self {
        Self {
            archive_reader: Some(reader),
            entry_reader: None,
            entry_data_pad: 0,
            entry_checksum: None,
            seen_trailer: false,
        }
    }

    fn read_next(&mut self) -> CpioResult<Option<Box<dyn CpioHeader>>> {
        self.finish()?;

        if self.seen_trailer {
            return Ok(None);
        }

        if let Some(mut reader) = self.archive_reader.take() {
            let mut magic = [0u8; 6];

            match reader.read_exact(&mut magic) {
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(e.into());
                }
            }

            let crc = match &magic[..] {
                MAGIC => false,
                MAGIC_CRC => true,
                _ => return Err(Error::BadMagic),
            };

            let header = NewcHeader::from_reader(&mut reader)?;

            if header.name == TRAILER_NAME {
                self.seen_trailer = true;
                self.archive_reader = Some(reader);
                Ok(None)
            } else {
                debug!("newc entry {} ({} bytes)", header.name, header.file_size);

                self.entry_reader = Some(reader.take(header.file_size as _));
                self.entry_data_pad = pad_length(header.file_size as usize);
                self.entry_checksum = if crc {
                    Some(EntryChecksum {
                        name: header.name.clone(),
                        expected: header.checksum,
                        actual: 0,
                    })
                } else {
                    None
                };

                Ok(Some(Box::new(header)))
            }
        } else {
            Ok(None)
        }
    }

    fn finish(&mut self) -> CpioResult<()> {
        if let Some(mut reader) = self.entry_reader.take() {
            let mut buffer = vec![0u8; 32768];
            loop {
                let count = reader.read(&mut buffer)?;
                if count == 0 {
                    break;
                }
                if let Some(checksum) = &mut self.entry_checksum {
                    checksum.update(&buffer[0..count]);
                }
            }

            if reader.limit() != 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "archive ended inside entry data",
                )
                .into());
            }

            let mut reader = reader.into_inner();

            let mut pad = vec![0u8; self.entry_data_pad];
            reader.read_exact(&mut pad)?;
            self.entry_data_pad = 0;

            self.archive_reader = Some(reader);

            if let Some(checksum) = self.entry_checksum.take() {
                if checksum.actual != checksum.expected {
                    return Err(Error::ChecksumMismatch {
                        name: checksum.name,
                        expected: checksum.expected,
                        actual: checksum.actual,
                    });
                }
            }
        }

        Ok(())
    }
}

impl<T: Read + Sized> Iterator for NewcReader<T> {
    type Item = CpioResult<Box<dyn CpioHeader>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(r)) => Some(Ok(r)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<T: Read + Sized> Read for NewcReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        if let Some(reader) = &mut self.entry_reader {
            let count = reader.read(buf)?;

            if let Some(checksum) = &mut self.entry_checksum {
                checksum.update(&buf[0..count]);
            }

            Ok(count)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no current archive entry to read from",
            ))
        }
    }
}
