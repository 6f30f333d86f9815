// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{Error, XarResult},
    log::debug,
    scroll::{IOwrite, Pread, Pwrite, SizeWith},
    std::io::Read,
};

/// File magic. `xar!`.
pub const XAR_MAGIC: u32 = 0x7861_7221;

/// Size in bytes of the header we know how to parse.
pub const XAR_HEADER_SIZE: u16 = 28;

/// The only known format version.
pub const XAR_VERSION: u16 = 1;

/// Encoding style for file data stored as-is.
pub const ENCODING_OCTET_STREAM: &str = "application/octet-stream";

/// Encoding style for zlib compressed file data.
///
/// The media type is arguably wrong, as there is no gzip header.
pub const ENCODING_GZIP: &str = "application/x-gzip";

/// Encoding style for bzip2 compressed file data.
pub const ENCODING_BZIP2: &str = "application/x-bzip2";

/// Encoding style for xz/lzma compressed file data.
pub const ENCODING_LZMA: &str = "application/x-lzma";

/// A XAR archive header.
///
/// The header effectively defines a table of contents, which
/// holds information about the content of the archive.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IOwrite, Pread, Pwrite, SizeWith)]
pub struct XarHeader {
    /// File magic. `xar!`.
    pub magic: u32,

    /// Size of this header + magic.
    pub size: u16,

    /// Format version number.
    pub version: u16,

    /// Size in bytes of zlib compressed table of contents.
    pub toc_length_compressed: u64,

    /// Size in bytes of uncompressed table of contents.
    pub toc_length_uncompressed: u64,

    /// Checksum algorithm used.
    pub checksum_algorithm_id: u32,
}

impl XarHeader {
    /// Read and validate a header from the start of a reader.
    ///
    /// Exactly [XAR_HEADER_SIZE] bytes are consumed on success.
    pub fn from_reader(reader: &mut impl Read) -> XarResult<Self> {
        let mut data = [0u8; XAR_HEADER_SIZE as usize];
        reader.read_exact(&mut data)?;

        let header = data[..].pread_with::<XarHeader>(0, scroll::BE)?;
        header.validate()?;

        debug!(
            "parsed XAR header; toc compressed={} uncompressed={} checksum={}",
            header.toc_length_compressed,
            header.toc_length_uncompressed,
            header.checksum_algorithm_id
        );

        Ok(header)
    }

    /// Verify all fields hold values we can process.
    ///
    /// Checks are performed in field order and the first failure is returned.
    pub fn validate(&self) -> XarResult<()> {
        if self.magic != XAR_MAGIC {
            return Err(Error::BadMagic(self.magic));
        }

        if self.size != XAR_HEADER_SIZE {
            return Err(Error::BadHeaderSize(self.size));
        }

        if self.version != XAR_VERSION {
            return Err(Error::UnsupportedVersion(self.version));
        }

        if self.toc_length_compressed == 0 {
            return Err(Error::EmptyTableOfContents("compressed"));
        }

        if self.toc_length_uncompressed == 0 {
            return Err(Error::EmptyTableOfContents("uncompressed"));
        }

        // A named digest follows the header in this mode. We don't parse it.
        if let XarChecksum::Named = self.checksum() {
            return Err(Error::UnsupportedChecksumAlgorithm(
                self.checksum_algorithm_id,
            ));
        }

        Ok(())
    }

    /// The checksum algorithm declared by this header.
    pub fn checksum(&self) -> XarChecksum {
        XarChecksum::from(self.checksum_algorithm_id)
    }

    /// Absolute offset of the heap, assuming a table of contents immediately follows the header.
    pub fn heap_start_offset(&self) -> u64 {
        (self.size as u64).saturating_add(self.toc_length_compressed)
    }
}

/// Checksum format used in file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum XarChecksum {
    None,
    Sha1,
    Md5,
    /// Digest identified by a name string following the header.
    Named,
    Sha512,
    Other(u32),
}

impl From<u32> for XarChecksum {
    fn from(i: u32) -> Self {
        match i {
            0 => Self::None,
            1 => Self::Sha1,
            2 => Self::Md5,
            3 => Self::Named,
            4 => Self::Sha512,
            _ => Self::Other(i),
        }
    }
}

impl From<XarChecksum> for u32 {
    fn from(c: XarChecksum) -> Self {
        match c {
            XarChecksum::None => 0,
            XarChecksum::Sha1 => 1,
            XarChecksum::Md5 => 2,
            XarChecksum::Named => 3,
            XarChecksum::Sha512 => 4,
            XarChecksum::Other(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    fn valid_header() -> XarHeader {
        XarHeader {
            magic: XAR_MAGIC,
            size: XAR_HEADER_SIZE,
            version: XAR_VERSION,
            toc_length_compressed: 137,
            toc_length_uncompressed: 512,
            checksum_algorithm_id: 1,
        }
    }

    fn encode(header: &XarHeader) -> Vec<u8> {
        let mut data = Vec::new();
        data.iowrite_with(*header, scroll::BE).unwrap();
        data
    }

    fn parse(header: &XarHeader) -> XarResult<XarHeader> {
        XarHeader::from_reader(&mut Cursor::new(encode(header)))
    }

    #[test]
    fn header_layout() {
        let data = encode(&valid_header());
        assert_eq!(data.len(), XAR_HEADER_SIZE as usize);
        assert_eq!(&data[0..4], b"xar!");
        assert_eq!(&data[4..6], &[0, 28]);
        assert_eq!(&data[6..8], &[0, 1]);
        assert_eq!(&data[24..28], &[0, 0, 0, 1]);
    }

    #[test]
    fn parse_valid() -> XarResult<()> {
        let header = parse(&valid_header())?;
        assert_eq!(header, valid_header());
        assert_eq!(header.checksum(), XarChecksum::Sha1);
        assert_eq!(header.heap_start_offset(), 28 + 137);

        Ok(())
    }

    #[test]
    fn short_read() {
        let data = encode(&valid_header());
        let res = XarHeader::from_reader(&mut Cursor::new(&data[0..20]));
        assert!(matches!(res, Err(Error::Io(_))));
    }

    #[test]
    fn single_field_corruption() {
        let mut h = valid_header();
        h.magic = 0x78617222;
        assert!(matches!(parse(&h), Err(Error::BadMagic(0x78617222))));

        let mut h = valid_header();
        h.size = 32;
        assert!(matches!(parse(&h), Err(Error::BadHeaderSize(32))));

        let mut h = valid_header();
        h.version = 2;
        let err = parse(&h).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(2)));
        assert!(err.is_unsupported());

        let mut h = valid_header();
        h.toc_length_compressed = 0;
        assert!(matches!(
            parse(&h),
            Err(Error::EmptyTableOfContents("compressed"))
        ));

        let mut h = valid_header();
        h.toc_length_uncompressed = 0;
        assert!(matches!(
            parse(&h),
            Err(Error::EmptyTableOfContents("uncompressed"))
        ));

        let mut h = valid_header();
        h.checksum_algorithm_id = 3;
        let err = parse(&h).unwrap_err();
        assert!(matches!(err, Error::UnsupportedChecksumAlgorithm(3)));
        assert!(err.is_unsupported());
    }

    #[test]
    fn other_checksum_ids_accepted() -> XarResult<()> {
        for id in [0, 2, 4, 5] {
            let mut h = valid_header();
            h.checksum_algorithm_id = id;
            assert_eq!(u32::from(parse(&h)?.checksum()), id);
        }

        Ok(())
    }
}
