//! Flat archive of named blobs
//!
//! Entries are stored uncompressed in a tar stream. Callers compress the
//! whole archive instead: the repeated array-header boilerplate then shrinks
//! across entries, which per-entry compression cannot do.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Header;

use crate::{codec, ArtifactError, FlatRecord, Result};

/// Suffix appended to every entry name, identifying the blob encoding.
pub const ENTRY_SUFFIX: &str = ".npy";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Write one entry per name, in key order, with fixed metadata so that equal
/// input always yields equal bytes.
pub fn write_archive<W: Write>(entries: &BTreeMap<String, Vec<u8>>, dest: W) -> Result<W> {
    let mut builder = tar::Builder::new(dest);
    for (name, blob) in entries {
        let mut header = Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(0o644);
        header.set_size(blob.len() as u64);
        builder
            .append_data(&mut header, format!("{name}{ENTRY_SUFFIX}"), blob.as_slice())
            .map_err(|e| ArtifactError::Archive(format!("failed to append '{name}': {e}")))?;
    }
    builder
        .into_inner()
        .map_err(|e| ArtifactError::Archive(format!("failed to finish archive: {e}")))
}

pub fn read_archive<R: Read>(src: R) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(src);
    let mut out = BTreeMap::new();

    let entries = archive
        .entries()
        .map_err(|e| ArtifactError::Archive(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| ArtifactError::Archive(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = String::from_utf8(entry.path_bytes().into_owned())
            .map_err(|_| ArtifactError::Archive("entry name is not UTF-8".into()))?;
        let name = path.strip_suffix(ENTRY_SUFFIX).ok_or_else(|| {
            ArtifactError::Archive(format!("entry '{path}' lacks the {ENTRY_SUFFIX} suffix"))
        })?;

        let mut blob = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut blob)?;
        out.insert(name.to_string(), blob);
    }

    Ok(out)
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Inflate `bytes` if they carry the gzip magic, otherwise return them as-is.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Encode every array of `flat`, bundle the blobs and gzip the archive.
pub fn pack_record(flat: &FlatRecord) -> Result<Vec<u8>> {
    let blobs = flat
        .iter()
        .map(|(k, a)| Ok((k.clone(), codec::encode(a)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;
    let tar_bytes = write_archive(&blobs, Vec::new())?;
    gzip(&tar_bytes)
}

pub fn unpack_record(bytes: &[u8]) -> Result<FlatRecord> {
    let raw = gunzip(bytes)?;
    read_archive(raw.as_slice())?
        .into_iter()
        .map(|(k, blob)| Ok((k, codec::decode(&blob)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NdArray;

    fn entries() -> BTreeMap<String, Vec<u8>> {
        let mut m = BTreeMap::new();
        m.insert("17/lines/vals".to_string(), vec![1, 2, 3]);
        m.insert("17/area".to_string(), vec![]);
        m.insert("a-very-long-item-identifier-that-exceeds-the-classic-tar-name-field/with/nested/segments/and/more".to_string(), vec![9; 700]);
        m
    }

    #[test]
    fn test_archive_roundtrip_strips_suffix() {
        let bytes = write_archive(&entries(), Vec::new()).unwrap();
        assert_eq!(read_archive(bytes.as_slice()).unwrap(), entries());
    }

    #[test]
    fn test_archive_bytes_are_deterministic() {
        let a = write_archive(&entries(), Vec::new()).unwrap();
        let b = write_archive(&entries(), Vec::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_read_rejects_foreign_entries() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_size(2);
        header.set_mode(0o644);
        builder.append_data(&mut header, "notes.txt", &b"hi"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();
        assert!(matches!(read_archive(bytes.as_slice()), Err(ArtifactError::Archive(_))));
    }

    #[test]
    fn test_gunzip_passes_plain_bytes_through() {
        assert_eq!(gunzip(b"plain").unwrap(), b"plain".to_vec());
        let z = gzip(b"squeeze me").unwrap();
        assert_eq!(&z[..2], &GZIP_MAGIC);
        assert_eq!(gunzip(&z).unwrap(), b"squeeze me".to_vec());
    }

    #[test]
    fn test_pack_unpack_record() {
        let mut flat = FlatRecord::new();
        flat.insert("3/walls".into(), NdArray::from_vec(vec![2, 2], vec![0.0f64, 1.0, 2.0, 3.0]).unwrap());
        flat.insert("3/doors".into(), NdArray::from_slice(&[true, false]));
        let packed = pack_record(&flat).unwrap();
        assert_eq!(unpack_record(&packed).unwrap(), flat);
    }
}
