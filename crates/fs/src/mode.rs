//! Permission bits and their `ls -l` rendering.
//!
//! Mode values use the unix `st_mode` layout on every platform: the file
//! type lives in the `S_IFMT` bits and the permission triplets plus
//! setuid/setgid/sticky in the low twelve bits. Non-unix platforms get a
//! synthesized value built from the file type and the read-only flag.

use std::fs::Metadata;

pub const S_IFMT: u32 = 0o170_000;
pub const S_IFSOCK: u32 = 0o140_000;
pub const S_IFLNK: u32 = 0o120_000;
pub const S_IFREG: u32 = 0o100_000;
pub const S_IFBLK: u32 = 0o060_000;
pub const S_IFDIR: u32 = 0o040_000;
pub const S_IFCHR: u32 = 0o020_000;
pub const S_IFIFO: u32 = 0o010_000;

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;
const S_ISVTX: u32 = 0o1000;

const TYPE_CHARS: &[(u32, char)] = &[
    (S_IFDIR, 'd'),
    (S_IFREG, '-'),
    (S_IFLNK, 'l'),
    (S_IFIFO, 'p'),
    (S_IFSOCK, 's'),
    (S_IFCHR, 'c'),
    (S_IFBLK, 'b'),
];

/// (read, write, exec, special bit, special char with exec set / unset)
type Triplet = (u32, u32, u32, u32, (char, char));

const TRIPLETS: [Triplet; 3] = [
    (0o400, 0o200, 0o100, S_ISUID, ('s', 'S')),
    (0o040, 0o020, 0o010, S_ISGID, ('s', 'S')),
    (0o004, 0o002, 0o001, S_ISVTX, ('t', 'T')),
];

#[cfg(unix)]
pub fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
pub fn mode_bits(metadata: &Metadata) -> u32 {
    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        S_IFDIR
    } else if file_type.is_symlink() {
        S_IFLNK
    } else {
        S_IFREG
    };

    let perms = match (file_type.is_dir(), metadata.permissions().readonly()) {
        (true, false) => 0o755,
        (true, true) => 0o555,
        (false, false) => 0o644,
        (false, true) => 0o444,
    };

    kind | perms
}

/// Render mode bits as a ten character string, e.g. `drwxr-xr-x`.
pub fn render_mode(mode: u32) -> String {
    let mut out = String::with_capacity(10);

    let kind = mode & S_IFMT;
    let type_char = TYPE_CHARS
        .iter()
        .find(|(bits, _)| *bits == kind)
        .map(|(_, c)| *c)
        .unwrap_or('?');
    out.push(type_char);

    for (r, w, x, special, (with_x, without_x)) in TRIPLETS {
        out.push(if mode & r != 0 { 'r' } else { '-' });
        out.push(if mode & w != 0 { 'w' } else { '-' });
        let exec = mode & x != 0;
        let c = match (mode & special != 0, exec) {
            (true, true) => with_x,
            (true, false) => without_x,
            (false, true) => 'x',
            (false, false) => '-',
        };
        out.push(c);
    }

    out
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
