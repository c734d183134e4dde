//! Initramfs archive handling.
//!
//! - [`cpio`]: the newc record codec
//! - [`skeleton`]: fixed records that open every image
//! - [`pack`]: turns an assembled root into an archive

pub mod cpio;
pub mod pack;
pub mod skeleton;
