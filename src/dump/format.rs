use std::fmt;
use std::io::{Read, Seek, Write};
use std::str::FromStr;

use super::tar_writer::TarWriter;
use super::zip_writer::{ZipCompression, ZipWriter};
use super::ArchiveEntry;
use crate::error::{Error, Result};

/// a sequential archive container that nodes are dumped into
///
/// `dump_node` is called once per node, parents before children. for
/// regular files `content` yields exactly the declared size; for
/// directories and symlinks it is empty. `close` writes the trailing
/// structure; a closed writer refuses further use with `WriterClosed`.
pub trait FormatWriter {
    fn dump_node(&mut self, entry: &ArchiveEntry<'_>, content: &mut dyn Read) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// supported archive containers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
        }
    }

    /// does the container need a seekable sink
    pub fn needs_seek(self) -> bool {
        matches!(self, ArchiveFormat::Zip)
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// create a writer for `format` over `sink`
pub fn open_writer<'a, W>(format: ArchiveFormat, sink: W) -> Box<dyn FormatWriter + 'a>
where
    W: Write + Seek + 'a,
{
    match format {
        ArchiveFormat::Zip => Box::new(ZipWriter::with_compression(sink, ZipCompression::Stored)),
        ArchiveFormat::Tar => Box::new(TarWriter::new(sink)),
    }
}

/// create a writer for `format` over a sink that can only be appended to
///
/// fails with `SeekRequired` for containers that patch earlier bytes.
pub fn open_stream_writer<'a, W>(
    format: ArchiveFormat,
    sink: W,
) -> Result<Box<dyn FormatWriter + 'a>>
where
    W: Write + 'a,
{
    if format.needs_seek() {
        return Err(Error::SeekRequired(format.extension()));
    }
    Ok(Box::new(TarWriter::new(sink)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_format() {
        assert_eq!("zip".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("TAR".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Tar);
        assert!(matches!(
            "rar".parse::<ArchiveFormat>(),
            Err(Error::UnknownFormat(name)) if name == "rar"
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for format in [ArchiveFormat::Zip, ArchiveFormat::Tar] {
            assert_eq!(format.to_string().parse::<ArchiveFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_open_writer_produces_container() {
        let mut zip_out = Cursor::new(Vec::new());
        open_writer(ArchiveFormat::Zip, &mut zip_out).close().unwrap();
        // empty zip is just the end-of-central-directory record
        assert_eq!(&zip_out.get_ref()[..4], b"PK\x05\x06");

        let mut tar_out = Cursor::new(Vec::new());
        open_writer(ArchiveFormat::Tar, &mut tar_out).close().unwrap();
        assert_eq!(tar_out.get_ref().len(), 1024);
        assert!(tar_out.get_ref().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_stream_writer_needs_no_seek() {
        // a plain Vec has no Seek impl
        let mut out: Vec<u8> = Vec::new();
        open_stream_writer(ArchiveFormat::Tar, &mut out)
            .unwrap()
            .close()
            .unwrap();
        assert_eq!(out.len(), 1024);

        assert!(matches!(
            open_stream_writer(ArchiveFormat::Zip, &mut out),
            Err(Error::SeekRequired("zip"))
        ));
    }
}
