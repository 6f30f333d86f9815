// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Writers producing cpio archives for tests.

use crate::{newc, odc, TRAILER_NAME};

/// Modification time given to all written entries.
pub const TEST_MTIME: u32 = 1_600_000_000;

/// An entry to write.
#[derive(Clone, Debug)]
pub struct TestEntry {
    pub name: String,
    pub mode: u32,
    pub data: Vec<u8>,
}

/// A regular file with `0644` permissions.
pub fn file_entry(name: &str, data: Vec<u8>) -> TestEntry {
    TestEntry {
        name: name.to_string(),
        mode: 0o100644,
        data,
    }
}

/// A directory with `0755` permissions.
pub fn directory_entry(name: &str) -> TestEntry {
    TestEntry {
        name: name.to_string(),
        mode: 0o040755,
        data: vec![],
    }
}

fn trailer() -> TestEntry {
    TestEntry {
        name: TRAILER_NAME.to_string(),
        mode: 0,
        data: vec![],
    }
}

fn pad(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

/// Write entries in the new ASCII format.
///
/// With `crc`, the checksummed variant is written.
pub fn write_newc(entries: &[TestEntry], crc: bool, with_trailer: bool) -> Vec<u8> {
    let mut data = vec![];
    let trailer = trailer();

    let all = entries
        .iter()
        .chain(std::iter::once(&trailer).filter(|_| with_trailer));

    for (i, entry) in all.enumerate() {
        let checksum = if crc {
            entry
                .data
                .iter()
                .fold(0u32, |acc, b| acc.wrapping_add(*b as u32))
        } else {
            0
        };

        // Padding is relative to the entry start, which is always 4 byte aligned.
        debug_assert_eq!(data.len() % 4, 0);

        data.extend_from_slice(if crc { newc::MAGIC_CRC } else { newc::MAGIC });
        for value in [
            i as u32 + 1,
            entry.mode,
            501,
            20,
            1,
            TEST_MTIME,
            entry.data.len() as u32,
            1,
            4,
            0,
            0,
            entry.name.len() as u32 + 1,
            checksum,
        ] {
            data.extend_from_slice(format!("{:08X}", value).as_bytes());
        }

        data.extend_from_slice(entry.name.as_bytes());
        data.push(0);
        pad(&mut data);

        data.extend_from_slice(&entry.data);
        pad(&mut data);
    }

    data
}

/// Write entries in the portable ASCII format.
pub fn write_odc(entries: &[TestEntry], with_trailer: bool) -> Vec<u8> {
    let mut data = vec![];
    let trailer = trailer();

    let all = entries
        .iter()
        .chain(std::iter::once(&trailer).filter(|_| with_trailer));

    for (i, entry) in all.enumerate() {
        data.extend_from_slice(odc::MAGIC);
        data.extend_from_slice(
            format!(
                "{:06o}{:06o}{:06o}{:06o}{:06o}{:06o}{:06o}{:011o}{:06o}{:011o}",
                1,
                i + 1,
                entry.mode,
                501,
                20,
                1,
                0,
                TEST_MTIME,
                entry.name.len() + 1,
                entry.data.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(entry.name.as_bytes());
        data.push(0);
        data.extend_from_slice(&entry.data);
    }

    data
}
