// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Apple flat packages.
//!
//! Apple flat packages - often existing as `.pkg` files - are an installer
//! file format used by macOS.
//!
//! # File Format
//!
//! Flat packages are Apple-flavored XAR archives. XAR is a tar-like
//! file format consisting of file records/metadata and raw file data.
//! See the `apple-xar` crate for more on this file format.
//!
//! Flat packages come in 2 flavors: *component* packages and *product*
//! packages. *Component* packages contain a single *component*. *Product*
//! installers can contain multiple *components* as well as additional
//! metadata describing the installer. End-user `.pkg` files are typically
//! *product* packages. Using Apple tooling, *component* packages are built
//! `pkgbuild` and *product* packages using `productbuild`.
//!
//! ## Components
//!
//! A *component* defines an installable unit. *Components* are comprised of
//! a set of well-known files:
//!
//! `Bom`
//!    A *bill of materials* describing the contents of the component.
//! `PackageInfo`
//!    An XML file describing the component.
//! `Payload`
//!    A cpio archive containing files comprising the component. See the
//!    `cpio-archive` for more on this file format.
//! `Scripts`
//!    A cpio archive containing *scripts* files that run as part of component
//!    processing.
//!
//! ## Products
//!
//! A *product* flat package consists of 1 or more *components* and additional
//! metadata.
//!
//! A *product* flat package is identified by the presence of a `Distribution`
//! XML file in the root of the archive. See [Distribution] for the Rust type
//! defining this file format. See also
//! [Apple's XML documentation](https://developer.apple.com/library/archive/documentation/DeveloperTools/Reference/DistributionDefinitionRef/Chapters/Distribution_XML_Ref.html).
//!
//! Components within a *product* flat package exist in sub-directories which often
//! have the name `*.pkg/`. The `<pkg-ref>` elements of the `Distribution` file
//! name each component's identifier and directory.
//!
//! # Cryptographic Signing
//!
//! Signatures can be embedded in the XAR archive's *table of contents*, which is
//! a data structure at the beginning of the XAR defining the content within.
//! The signature block carries the signing certificate chain. See
//! [PkgReader::xar] and the `apple-xar` crate for inspecting it. Only the
//! internal consistency of the chain can be checked; trust is not evaluated.
//!
//! # Nested Archive Formats
//!
//! Flat packages contain multiple data structures that effectively enumerate
//! lists of files. There are many layers to the onion and there is duplication
//! of functionality to express file manifests.
//!
//! * XAR archives contain a *table of contents* enumerating files within the XAR.
//! * Each component has `Payload` and/or `Scripts` files, which are cpio archives.
//!   These cpio archives are file manifests containing file metadata and content.
//! * Each component may have a `Bom`, which is a binary data structure defining
//!   file metadata as well as other attributes.
//!
//! There are also multiple layers that involve compression:
//!
//! * The XAR table of contents is likely compressed with zlib.
//! * Individual files within XAR archives can be individually compressed
//!   with a compression format denoted by a MIME type.
//! * cpio archive files may also be compressed. gzip is handled transparently.
//!   Apple's `pbzx` framing is not supported.
//! * Installed files in components may also be compressed (but this file
//!   content is treated as opaque by the flat package format).

pub mod distribution;
pub use distribution::{Distribution, PkgRef};
pub mod reader;
pub use reader::{PkgFlavor, PkgReader};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    XmlRead(#[from] xml::reader::Error),

    #[error("invalid Distribution XML: {0}")]
    BadDistribution(String),

    #[error("xar error: {0}")]
    Xar(#[from] apple_xar::Error),

    #[error("cpio archive error: {0}")]
    Cpio(#[from] cpio_archive::Error),

    #[error("invalid package id: {0}")]
    InvalidPackageId(String),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Whether this error denotes a recognized but unimplemented feature.
    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::Unsupported(_) => true,
            Self::Xar(e) => e.is_unsupported(),
            _ => false,
        }
    }
}

/// Result type for this crate.
pub type PkgResult<T> = std::result::Result<T, Error>;
