//! SVR4 "newc" cpio codec.
//!
//! Each record is a 110-byte ASCII header (`070701` followed by thirteen
//! 8-digit hex fields), the NUL-terminated name, padding to a 4-byte
//! boundary, the payload, and padding again. The archive ends with a record
//! named `TRAILER!!!` that carries no payload.

use std::borrow::Cow;
use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use serde::{Serialize, Serializer};

pub const MAGIC: &str = "070701";
pub const HEADER_LEN: usize = 110;
pub const TRAILER: &str = "TRAILER!!!";

/// File type constants for mode field (matches POSIX S_IF* values)
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFBLK: u32 = 0o060000;

/// Header fields of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Info {
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub filesize: u32,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub rdev_major: u32,
    pub rdev_minor: u32,
    /// Raw name bytes, without the terminating NUL.
    #[serde(serialize_with = "lossy_name")]
    pub name: Vec<u8>,
}

fn lossy_name<S: Serializer>(name: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(name))
}

impl Info {
    /// The name for display. Invalid UTF-8 is replaced.
    pub fn display_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// One archive entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub info: Info,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Record {
    pub fn directory(name: &str, perm: u32) -> Self {
        Self::with_mode(name, S_IFDIR | (perm & 0o7777))
    }

    pub fn file(name: &str, perm: u32, data: Vec<u8>) -> Self {
        let mut r = Self::with_mode(name, S_IFREG | (perm & 0o7777));
        r.info.filesize = data.len() as u32;
        r.data = data;
        r
    }

    pub fn char_device(name: &str, perm: u32, major: u32, minor: u32) -> Self {
        let mut r = Self::with_mode(name, S_IFCHR | (perm & 0o7777));
        r.info.rdev_major = major;
        r.info.rdev_minor = minor;
        r
    }

    fn with_mode(name: &str, mode: u32) -> Self {
        Self {
            info: Info {
                mode,
                name: name.as_bytes().to_vec(),
                ..Info::default()
            },
            data: Vec::new(),
        }
    }

    /// Translate a filesystem entry. Symlinks are not followed; their
    /// payload is the link target. Directories and device nodes carry no
    /// payload.
    pub fn from_path(path: &Path, name: &[u8]) -> io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        let mode = meta.mode();
        let data = match mode & S_IFMT {
            S_IFREG => fs::read(path)?,
            S_IFLNK => fs::read_link(path)?.as_os_str().as_bytes().to_vec(),
            _ => Vec::new(),
        };
        let (dev_major, dev_minor) = split_dev(meta.dev());
        let (rdev_major, rdev_minor) = split_dev(meta.rdev());
        Ok(Self {
            info: Info {
                ino: meta.ino() as u32,
                mode,
                uid: meta.uid(),
                gid: meta.gid(),
                nlink: meta.nlink() as u32,
                mtime: meta.mtime().max(0) as u32,
                filesize: data.len() as u32,
                dev_major,
                dev_minor,
                rdev_major,
                rdev_minor,
                name: name.to_vec(),
            },
            data,
        })
    }

    pub fn is_trailer(&self) -> bool {
        self.info.name == TRAILER.as_bytes()
    }

    pub fn is_dir(&self) -> bool {
        self.info.mode & S_IFMT == S_IFDIR
    }
}

/// Split a Linux `dev_t` into (major, minor).
pub fn split_dev(dev: u64) -> (u32, u32) {
    let major = ((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff);
    let minor = (dev & 0xff) | ((dev >> 12) & !0xff);
    (major as u32, minor as u32)
}

/// Align value up to 4-byte boundary
fn align_to_4(n: usize) -> usize {
    (n + 3) & !3
}

/// Format newc header (110 bytes ASCII)
fn format_header(info: &Info, namesize: usize) -> String {
    format!(
        "{}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}{:08X}",
        MAGIC,
        info.ino,
        info.mode,
        info.uid,
        info.gid,
        info.nlink,
        info.mtime,
        info.filesize,
        info.dev_major,
        info.dev_minor,
        info.rdev_major,
        info.rdev_minor,
        namesize,
        0, // c_check, always 0 for newc
    )
}

/// Streaming newc writer.
pub struct Writer<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn put(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn pad(&mut self, len: usize) -> io::Result<()> {
        let pad = align_to_4(len) - len;
        if pad > 0 {
            self.put(&[0u8; 3][..pad])?;
        }
        Ok(())
    }

    pub fn write_record(&mut self, record: &Record) -> io::Result<()> {
        if record.data.len() != record.info.filesize as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{}: filesize {} does not match {} payload bytes",
                    record.info.display_name(),
                    record.info.filesize,
                    record.data.len()
                ),
            ));
        }
        let namesize = record.info.name.len() + 1;
        let header = format_header(&record.info, namesize);
        self.put(header.as_bytes())?;
        self.put(&record.info.name)?;
        self.put(&[0])?;
        self.pad(HEADER_LEN + namesize)?;
        if !record.data.is_empty() {
            self.put(&record.data)?;
            self.pad(record.data.len())?;
        }
        Ok(())
    }

    pub fn write_records<'a, I>(&mut self, records: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        for r in records {
            self.write_record(r)?;
        }
        Ok(())
    }

    /// Write the end-of-archive record.
    pub fn write_trailer(&mut self) -> io::Result<()> {
        let trailer = Record::with_mode(TRAILER, 0);
        self.write_record(&trailer)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Streaming newc reader.
pub struct Reader<R: Read> {
    inner: R,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn skip_pad(&mut self, len: usize) -> io::Result<()> {
        let pad = align_to_4(len) - len;
        let mut buf = [0u8; 3];
        self.inner.read_exact(&mut buf[..pad])
    }

    /// Read the next record, trailer included. `None` at a clean end of input.
    pub fn next_record(&mut self) -> io::Result<Option<Record>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self.inner.read(&mut header[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated cpio header",
                ));
            }
            filled += n;
        }

        if &header[..6] != MAGIC.as_bytes() {
            return Err(invalid(format!(
                "bad magic {:?}",
                String::from_utf8_lossy(&header[..6])
            )));
        }
        let mut fields = [0u32; 13];
        for (i, field) in fields.iter_mut().enumerate() {
            let start = 6 + i * 8;
            let text = std::str::from_utf8(&header[start..start + 8])
                .map_err(|_| invalid(format!("non-ASCII header field {}", i)))?;
            *field = u32::from_str_radix(text, 16)
                .map_err(|_| invalid(format!("bad hex in header field {}: {:?}", i, text)))?;
        }
        let namesize = fields[11] as usize;
        if namesize == 0 {
            return Err(invalid("zero-length name".to_string()));
        }

        let mut name = vec![0u8; namesize];
        self.inner.read_exact(&mut name)?;
        self.skip_pad(HEADER_LEN + namesize)?;
        if name.pop() != Some(0) {
            return Err(invalid("name is not NUL terminated".to_string()));
        }

        let filesize = fields[6] as usize;
        let mut data = vec![0u8; filesize];
        self.inner.read_exact(&mut data)?;
        self.skip_pad(filesize)?;

        Ok(Some(Record {
            info: Info {
                ino: fields[0],
                mode: fields[1],
                uid: fields[2],
                gid: fields[3],
                nlink: fields[4],
                mtime: fields[5],
                filesize: fields[6],
                dev_major: fields[7],
                dev_minor: fields[8],
                rdev_major: fields[9],
                rdev_minor: fields[10],
                name,
            },
            data,
        }))
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Read every record up to and including the trailer.
pub fn read_all<R: Read>(input: R) -> io::Result<Vec<Record>> {
    let mut reader = Reader::new(input);
    let mut out = Vec::new();
    while let Some(record) = reader.next_record()? {
        let done = record.is_trailer();
        out.push(record);
        if done {
            break;
        }
    }
    Ok(out)
}
