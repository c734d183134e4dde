//! Inspect command - lists the records of a newc archive.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::archive::cpio::{self, Record, S_IFBLK, S_IFCHR, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};

/// One-letter type, as in `ls -l`.
fn kind(mode: u32) -> char {
    match mode & S_IFMT {
        S_IFDIR => 'd',
        S_IFREG => '-',
        S_IFLNK => 'l',
        S_IFCHR => 'c',
        S_IFBLK => 'b',
        _ => '?',
    }
}

/// `ls -l` style line for one record.
pub fn describe(record: &Record) -> String {
    let info = &record.info;
    let mut line = format!(
        "{}{:04o} {:>5} {:>5} {:>10} {}",
        kind(info.mode),
        info.mode & 0o7777,
        info.uid,
        info.gid,
        info.filesize,
        info.display_name()
    );
    match info.mode & S_IFMT {
        S_IFCHR | S_IFBLK => {
            line.push_str(&format!(" ({}, {})", info.rdev_major, info.rdev_minor))
        }
        S_IFLNK => line.push_str(&format!(" -> {}", String::from_utf8_lossy(&record.data))),
        _ => {}
    }
    line
}

/// Execute the inspect command.
pub fn cmd_inspect(archive: &Path, json: bool) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Opening {}", archive.display()))?;
    let records = cpio::read_all(BufReader::new(file))
        .with_context(|| format!("Reading {}", archive.display()))?;

    if json {
        let text = serde_json::to_string_pretty(&records).context("Serializing records")?;
        println!("{}", text);
        return Ok(());
    }

    for record in &records {
        println!("{}", describe(record));
    }
    let trailer = records.last().map_or(false, Record::is_trailer);
    println!(
        "\n{} records{}",
        records.len(),
        if trailer { "" } else { " [WARN] no trailer" }
    );
    Ok(())
}
