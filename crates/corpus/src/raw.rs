//! Raw corpus archive: a zip, or a tar (optionally gzipped), of per-plan SVG
//! files laid out as `cubicasa5k/<category>/<id>/<filename>.svg`.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::{CorpusError, Result, SvgRecord};

static SVG_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^cubicasa5k/(?P<category>[^/]*)/(?P<id>\d+)/(?P<filename>[^./]*)\.svg$")
        .expect("SVG path pattern must compile")
});

/// Enumerate-and-read access to an archive of source files.
pub trait SourceArchive {
    fn names(&self) -> Vec<&str>;
    fn read(&self, name: &str) -> Option<&[u8]>;
}

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Open raw corpus bytes as zip or tar, sniffed from the leading magic
/// after any gzip layer is removed.
pub fn open_source(bytes: &[u8]) -> Result<Box<dyn SourceArchive>> {
    let raw = artifacts::gunzip(bytes)?;
    if raw.starts_with(&ZIP_MAGIC) {
        Ok(Box::new(ZipSource::from_bytes(&raw)?))
    } else {
        Ok(Box::new(TarSource::from_bytes(&raw)?))
    }
}

/// Zip archive held fully in memory.
pub struct ZipSource {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ZipSource {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bad = |e: &dyn std::fmt::Display| CorpusError::Malformed(format!("raw corpus zip: {e}"));
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| bad(&e))?;
        let mut entries = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| bad(&e))?;
            if !file.is_file() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).map_err(|e| bad(&e))?;
            entries.insert(name, data);
        }

        debug!(entries = entries.len(), "raw corpus zip opened");
        Ok(Self { entries })
    }
}

impl SourceArchive for ZipSource {
    fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    fn read(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }
}

/// Tar archive held fully in memory.
pub struct TarSource {
    entries: BTreeMap<String, Vec<u8>>,
}

impl TarSource {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = artifacts::gunzip(bytes)?;
        let mut archive = tar::Archive::new(raw.as_slice());
        let mut entries = BTreeMap::new();

        let bad = |e: std::io::Error| CorpusError::Malformed(format!("raw corpus archive: {e}"));
        for entry in archive.entries().map_err(bad)? {
            let mut entry = entry.map_err(bad)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data).map_err(bad)?;
            entries.insert(name, data);
        }

        debug!(entries = entries.len(), "raw corpus archive opened");
        Ok(Self { entries })
    }
}

impl SourceArchive for TarSource {
    fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    fn read(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }
}

/// `(category, id, filename)` for paths matching the corpus layout.
pub fn parse_svg_path(path: &str) -> Option<(&str, &str, &str)> {
    let caps = SVG_PATH.captures(path)?;
    Some((
        caps.name("category")?.as_str(),
        caps.name("id")?.as_str(),
        caps.name("filename")?.as_str(),
    ))
}

/// Every matching entry as a record, ordered by path.
pub fn svg_records(source: &dyn SourceArchive) -> Result<Vec<SvgRecord>> {
    let mut names: Vec<&str> = source.names();
    names.sort_unstable();

    let mut records = Vec::new();
    for name in names {
        let Some((category, id, filename)) = parse_svg_path(name) else {
            continue;
        };
        let bytes = source
            .read(name)
            .ok_or_else(|| CorpusError::Malformed(format!("entry '{name}' listed but unreadable")))?;
        let svg = String::from_utf8(bytes.to_vec())
            .map_err(|_| CorpusError::Malformed(format!("entry '{name}' is not UTF-8")))?;

        records.push(SvgRecord {
            path: name.to_string(),
            category: category.to_string(),
            id: id.to_string(),
            filename: filename.to_string(),
            svg,
        });
    }

    info!(records = records.len(), "svg records extracted");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapSource(BTreeMap<String, Vec<u8>>);

    impl SourceArchive for MapSource {
        fn names(&self) -> Vec<&str> {
            self.0.keys().map(String::as_str).collect()
        }

        fn read(&self, name: &str) -> Option<&[u8]> {
            self.0.get(name).map(Vec::as_slice)
        }
    }

    #[test]
    fn test_parse_svg_path() {
        assert_eq!(
            parse_svg_path("cubicasa5k/high_quality/10074/model.svg"),
            Some(("high_quality", "10074", "model"))
        );
        assert_eq!(parse_svg_path("cubicasa5k/colorful/12/F1_scaled.png"), None);
        assert_eq!(parse_svg_path("cubicasa5k/colorful/abc/model.svg"), None);
        assert_eq!(parse_svg_path("other/colorful/12/model.svg"), None);
        assert_eq!(parse_svg_path("cubicasa5k/colorful/12/model.svg.bak"), None);
    }

    #[test]
    fn test_svg_records_filters_and_orders() {
        let mut m = BTreeMap::new();
        m.insert("cubicasa5k/colorful/9/model.svg".to_string(), b"<svg b/>".to_vec());
        m.insert("cubicasa5k/colorful/9/F1_original.png".to_string(), vec![0x89, 0x50]);
        m.insert("cubicasa5k/high_quality/3/model.svg".to_string(), b"<svg a/>".to_vec());
        m.insert("cubicasa5k/README.md".to_string(), b"readme".to_vec());

        let records = svg_records(&MapSource(m)).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["9", "3"]);
        assert_eq!(records[1].category, "high_quality");
        assert_eq!(records[1].svg, "<svg a/>");
    }

    #[test]
    fn test_open_source_sniffs_zip_and_tar() {
        use std::io::Write;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("cubicasa5k/colorful/12/", options).unwrap();
        writer.start_file("cubicasa5k/colorful/12/model.svg", options).unwrap();
        writer.write_all(b"<svg z/>").unwrap();
        let zipped = writer.finish().unwrap().into_inner();

        let source = open_source(&zipped).unwrap();
        assert_eq!(source.names(), vec!["cubicasa5k/colorful/12/model.svg"]);
        let records = svg_records(source.as_ref()).unwrap();
        assert_eq!(records[0].id, "12");
        assert_eq!(records[0].svg, "<svg z/>");

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(8);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "cubicasa5k/colorful/13/model.svg", &b"<svg t/>"[..])
            .unwrap();
        let tarred = builder.into_inner().unwrap();
        let records = svg_records(open_source(&tarred).unwrap().as_ref()).unwrap();
        assert_eq!(records[0].id, "13");
    }

    #[test]
    fn test_truncated_zip_is_malformed() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(open_source(&bytes), Err(CorpusError::Malformed(_))));
    }

    #[test]
    fn test_svg_records_rejects_invalid_utf8() {
        let mut m = BTreeMap::new();
        m.insert("cubicasa5k/colorful/9/model.svg".to_string(), vec![0xff, 0xfe]);
        assert!(matches!(svg_records(&MapSource(m)), Err(CorpusError::Malformed(_))));
    }
}
