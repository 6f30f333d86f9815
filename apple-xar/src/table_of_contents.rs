// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! XAR XML table of contents data structure.

use {
    crate::{Error, XarResult},
    chrono::{DateTime, Utc},
    digest::Digest,
    log::{debug, warn},
    serde::Deserialize,
    std::{
        collections::{hash_map::Entry as HashMapEntry, HashMap},
        fmt::{Display, Formatter},
        io::Read,
        ops::Deref,
    },
    x509_certificate::CapturedX509Certificate,
};

/// An XML table of contents in a XAR file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableOfContents {
    toc: XarToC,
}

impl Deref for TableOfContents {
    type Target = XarToC;

    fn deref(&self) -> &Self::Target {
        &self.toc
    }
}

impl TableOfContents {
    /// Parse XML table of contents from a reader.
    pub fn from_reader(reader: impl Read) -> XarResult<Self> {
        Ok(serde_xml_rs::from_reader(reader)?)
    }

    /// Flatten the file tree into full paths.
    ///
    /// Only regular files are indexed. Directories contribute their name as a
    /// path prefix for their children. Paths are emitted depth-first in
    /// document order.
    pub fn flatten(&self) -> XarResult<FileIndex> {
        let mut index = FileIndex::default();

        for file in &self.toc.files {
            index.add(file, None)?;
        }

        debug!("indexed {} files in table of contents", index.len());

        Ok(index)
    }
}

/// The main data structure inside a table of contents.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct XarToC {
    pub creation_time: Option<String>,
    pub checksum: Checksum,
    #[serde(default, rename = "file")]
    pub files: Vec<File>,
    pub signature: Option<Signature>,
    pub x_signature: Option<Signature>,
}

impl XarToC {
    /// The signature block holding the archive's certificate chain.
    ///
    /// This is `<signature>` if present, else `<x-signature>`.
    pub fn primary_signature(&self) -> Option<&Signature> {
        self.signature.as_ref().or(self.x_signature.as_ref())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Checksum {
    /// The digest format used.
    pub style: ChecksumType,

    /// Offset within heap of the checksum data.
    pub offset: u64,

    /// Size of checksum data.
    pub size: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    None,
    Sha1,
    Sha256,
    Sha512,
    Md5,
}

impl ChecksumType {
    /// Digest data with this checksum format.
    ///
    /// `None` yields an empty digest.
    pub fn digest_data(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::None => vec![],
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
            Self::Md5 => md5::Md5::digest(data).to_vec(),
        }
    }

    /// Digest all content of a reader with this checksum format.
    pub fn digest_reader(&self, reader: &mut impl Read) -> XarResult<Vec<u8>> {
        fn consume<D: Digest, R: Read>(reader: &mut R) -> XarResult<Vec<u8>> {
            let mut hasher = D::new();
            let mut buffer = [0u8; 32768];

            loop {
                let count = reader.read(&mut buffer)?;
                if count == 0 {
                    break;
                }
                hasher.update(&buffer[0..count]);
            }

            Ok(hasher.finalize().to_vec())
        }

        match self {
            Self::None => {
                std::io::copy(reader, &mut std::io::sink())?;
                Ok(vec![])
            }
            Self::Sha1 => consume::<sha1::Sha1, _>(reader),
            Self::Sha256 => consume::<sha2::Sha256, _>(reader),
            Self::Sha512 => consume::<sha2::Sha512, _>(reader),
            Self::Md5 => consume::<md5::Md5, _>(reader),
        }
    }
}

impl Display for ChecksumType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Sha1 => f.write_str("SHA-1"),
            Self::Sha256 => f.write_str("SHA-256"),
            Self::Sha512 => f.write_str("SHA-512"),
            Self::Md5 => f.write_str("MD5"),
        }
    }
}

/// A `<file>` record.
///
/// Directories hold nested records in [Self::files].
#[derive(Clone, Debug, Deserialize)]
pub struct File {
    pub id: u64,
    pub ctime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
    pub atime: Option<DateTime<Utc>>,
    /// Filename.
    ///
    /// There should only be a single element. However, some Apple tools can
    /// emit multiple <name> elements. The first one is authoritative.
    #[serde(default, rename = "name")]
    pub names: Vec<String>,
    /// Raw type string. See [Self::file_type] for the validated form.
    #[serde(rename = "type")]
    pub file_type: String,
    /// Octal permission string, e.g. `0755`.
    pub mode: Option<String>,
    pub deviceno: Option<u32>,
    pub inode: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub size: Option<u64>,
    pub data: Option<FileData>,
    #[serde(default, rename = "file")]
    pub files: Vec<File>,
}

impl File {
    /// The name of this entry.
    pub fn name(&self) -> XarResult<&str> {
        self.names
            .first()
            .map(|s| s.as_str())
            .ok_or(Error::TableOfContentsCorrupted("missing file name"))
    }

    /// Resolve the type of this entry.
    pub fn file_type(&self) -> XarResult<FileType> {
        FileType::try_from(self.file_type.as_str())
    }

    /// Obtain a typed view of this record.
    pub fn entry(&self) -> XarResult<Entry<'_>> {
        Ok(match self.file_type()? {
            FileType::File => Entry::File(self.data.as_ref()),
            FileType::Directory => Entry::Directory(&self.files),
        })
    }

    /// Numeric permission bits parsed from [Self::mode].
    pub fn mode_bits(&self) -> Option<u32> {
        self.mode
            .as_ref()
            .and_then(|m| u32::from_str_radix(m, 8).ok())
    }
}

/// Typed view of a [File] record.
#[derive(Clone, Copy, Debug)]
pub enum Entry<'a> {
    /// A leaf holding data. `None` denotes an empty file without a heap range.
    File(Option<&'a FileData>),
    /// A directory and its children, in document order.
    Directory(&'a [File]),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    File,
    Directory,
}

impl TryFrom<&str> for FileType {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "file" => Ok(Self::File),
            "directory" => Ok(Self::Directory),
            _ => Err(Error::UnknownFileType(s.to_string())),
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::File => f.write_str("file"),
            FileType::Directory => f.write_str("directory"),
        }
    }
}

/// Describes where a file's data lives in the heap and how it is encoded.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileData {
    /// Offset relative to the start of the heap.
    pub offset: u64,
    /// Size of the decoded data.
    pub size: u64,
    /// Number of bytes occupied in the heap.
    pub length: u64,
    pub extracted_checksum: Option<FileChecksum>,
    pub archived_checksum: Option<FileChecksum>,
    pub encoding: FileEncoding,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileChecksum {
    pub style: ChecksumType,
    #[serde(rename = "$value")]
    pub checksum: String,
}

impl FileChecksum {
    /// Decode the hex digest.
    pub fn digest(&self) -> XarResult<Vec<u8>> {
        hex::decode(self.checksum.trim()).map_err(|_| Error::BadChecksum(self.checksum.clone()))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileEncoding {
    pub style: String,
}

/// Flattened view of the file tree.
///
/// Holds full paths in depth-first document order and a mapping from
/// path to the file record.
#[derive(Clone, Debug, Default)]
pub struct FileIndex {
    paths: Vec<String>,
    files: HashMap<String, File>,
}

impl FileIndex {
    fn add(&mut self, file: &File, directory: Option<&str>) -> XarResult<()> {
        let name = file.name()?;

        let full_path = if let Some(d) = directory {
            format!("{}/{}", d, name)
        } else {
            name.to_string()
        };

        match file.entry()? {
            Entry::File(_) => match self.files.entry(full_path) {
                HashMapEntry::Occupied(entry) => {
                    warn!("ignoring duplicate path in table of contents: {}", entry.key());
                }
                HashMapEntry::Vacant(entry) => {
                    self.paths.push(entry.key().clone());
                    entry.insert(file.clone());
                }
            },
            Entry::Directory(children) => {
                for child in children {
                    self.add(child, Some(&full_path))?;
                }
            }
        }

        Ok(())
    }

    /// Full paths of all files, in document order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Resolve the record for a path.
    pub fn get(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Iterate over `(path, record)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &File)> {
        self.paths
            .iter()
            .filter_map(|p| self.files.get(p).map(|f| (p.as_str(), f)))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Signature {
    pub style: SignatureStyle,
    pub offset: u64,
    pub size: u64,
    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}

impl Signature {
    /// Obtained parsed X.509 certificates.
    pub fn x509_certificates(&self) -> XarResult<Vec<CapturedX509Certificate>> {
        self.key_info.x509_certificates()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignatureStyle {
    /// Cryptographic message syntax.
    Cms,

    /// RSA signature.
    Rsa,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KeyInfo {
    #[serde(rename = "X509Data")]
    pub x509_data: X509Data,
}

impl KeyInfo {
    /// Obtain parsed X.509 certificates.
    pub fn x509_certificates(&self) -> XarResult<Vec<CapturedX509Certificate>> {
        self.x509_data.x509_certificates()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct X509Data {
    #[serde(default, rename = "X509Certificate")]
    pub x509_certificate: Vec<String>,
}

impl X509Data {
    /// Obtain parsed X.509 certificates, in the order they are listed.
    ///
    /// The XML holds bare base64 of the DER encoding, often wrapped across lines.
    pub fn x509_certificates(&self) -> XarResult<Vec<CapturedX509Certificate>> {
        self.x509_certificate
            .iter()
            .map(|text| {
                let encoded = text
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect::<String>();

                let der = base64::decode(encoded)?;

                Ok(CapturedX509Certificate::from_der(der)?)
            })
            .collect()
    }
}
