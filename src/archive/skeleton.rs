//! The fixed records every image starts with.
//!
//! These come first in the archive so the kernel has `/dev/console` and the
//! usual mount points before anything from the assembled tree is unpacked.
//! Directories precede their children.

use super::cpio::Record;

/// Root skeleton, in archive order.
pub fn root_records() -> Vec<Record> {
    vec![
        Record::directory("bin", 0o755),
        Record::directory("dev", 0o755),
        Record::char_device("dev/console", 0o600, 5, 1),
        Record::char_device("dev/null", 0o666, 1, 3),
        Record::char_device("dev/port", 0o640, 1, 4),
        Record::char_device("dev/tty", 0o666, 5, 0),
        Record::char_device("dev/urandom", 0o666, 1, 9),
        Record::directory("env", 0o755),
        Record::directory("etc", 0o755),
        Record::directory("lib64", 0o755),
        Record::directory("proc", 0o755),
        Record::directory("sys", 0o755),
        Record::directory("tcz", 0o755),
        Record::directory("tmp", 0o777),
        Record::directory("ubin", 0o755),
        Record::directory("usr", 0o755),
        Record::directory("usr/lib", 0o755),
        Record::directory("var", 0o755),
        Record::directory("var/log", 0o777),
    ]
}
