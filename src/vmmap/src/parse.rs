//! Field extraction for the dominant text mapping format.
//!
//! One line looks like
//! `start-end perms offset major:minor inode [whitespace filename]`,
//! hex fields throughout except the decimal inode. The parser walks the
//! line byte by byte instead of handing it to a formatted scanner: every
//! field is validated in place against its terminator, nothing is
//! allocated, and a malformed field is rejected at the exact position it
//! occurs. The source file can change underneath the reader, so a bad
//! line is a per-line error for the caller to skip, never a reason to
//! abort the scan.

use crate::record::Perms;

/// A parsed maps line. `filename` borrows the tail of the input line and
/// is only as durable as that line buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapsLine<'a> {
    pub start: u64,
    pub end: u64,
    pub perms: Perms,
    pub offset: u64,
    pub inode: u64,
    pub filename: &'a [u8],
}

/// A line failed field extraction; the enumerator skips it and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing or malformed {0} field")]
    Field(&'static str),
    #[error("invalid permission token")]
    Perms,
}

/// Parses one maps line.
///
/// The device major/minor pair is validated but not reported: the
/// canonical record does not track it, and the text renderer takes a
/// caller-supplied device value instead.
pub fn parse_line(line: &[u8]) -> Result<MapsLine<'_>, ParseError> {
    let (field, rest) = split_field(line, b'-').ok_or(ParseError::Field("start address"))?;
    let start = number_field(field, 16).ok_or(ParseError::Field("start address"))?;

    let (field, rest) = split_field(rest, b' ').ok_or(ParseError::Field("end address"))?;
    let end = number_field(field, 16).ok_or(ParseError::Field("end address"))?;

    let (token, rest) = split_field(rest, b' ').ok_or(ParseError::Perms)?;
    let perms = Perms::from_token(token).ok_or(ParseError::Perms)?;

    let (field, rest) = split_field(rest, b' ').ok_or(ParseError::Field("offset"))?;
    let offset = number_field(field, 16).ok_or(ParseError::Field("offset"))?;

    let (field, rest) = split_field(rest, b':').ok_or(ParseError::Field("device major"))?;
    number_field(field, 16).ok_or(ParseError::Field("device major"))?;

    let (field, rest) = split_field(rest, b' ').ok_or(ParseError::Field("device minor"))?;
    number_field(field, 16).ok_or(ParseError::Field("device minor"))?;

    // The filename is optional: a line may end right after the inode.
    let (inode, filename) = match split_field(rest, b' ') {
        Some((field, tail)) => {
            let inode = number_field(field, 10).ok_or(ParseError::Field("inode"))?;
            (inode, tail)
        }
        None => {
            let inode = number_field(rest, 10).ok_or(ParseError::Field("inode"))?;
            (inode, &[][..])
        }
    };

    Ok(MapsLine {
        start,
        end,
        perms,
        offset,
        inode,
        filename,
    })
}

/// Splits `text` at the next `term` byte, then advances past any run of
/// whitespace when the terminator itself is whitespace, the same
/// separator handling a formatted scanner applies between fields.
pub(crate) fn split_field(text: &[u8], term: u8) -> Option<(&[u8], &[u8])> {
    let at = memchr::memchr(term, text)?;
    let mut rest = &text[at + 1..];
    if term.is_ascii_whitespace() {
        while let Some((first, tail)) = rest.split_first() {
            if !first.is_ascii_whitespace() {
                break;
            }
            rest = tail;
        }
    }
    Some((&text[..at], rest))
}

/// Converts a whole field with the given radix. Empty or partially
/// numeric fields are rejected.
pub(crate) fn number_field(field: &[u8], radix: u32) -> Option<u64> {
    let text = std::str::from_utf8(field).ok()?;
    u64::from_str_radix(text, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_line() {
        let parsed = parse_line(b"400000-401000 r-xp 00000000 08:01 12345   /bin/true").unwrap();
        assert_eq!(parsed.start, 0x400000);
        assert_eq!(parsed.end, 0x401000);
        assert_eq!(&parsed.perms.token(), b"r-xp");
        assert_eq!(parsed.offset, 0);
        assert_eq!(parsed.inode, 12345);
        assert_eq!(parsed.filename, b"/bin/true");
    }

    #[test]
    fn test_parse_anonymous_line() {
        let parsed = parse_line(b"7ffd1c37e000-7ffd1c39f000 rw-p 00000000 00:00 0 ").unwrap();
        assert_eq!(parsed.start, 0x7ffd1c37e000);
        assert_eq!(parsed.end, 0x7ffd1c39f000);
        assert_eq!(parsed.inode, 0);
        assert!(parsed.filename.is_empty());
    }

    #[test]
    fn test_parse_line_ending_at_inode() {
        let parsed = parse_line(b"35b1a21000-35b1a22000 rw-p 00000000 00:00 0").unwrap();
        assert_eq!(parsed.inode, 0);
        assert!(parsed.filename.is_empty());
    }

    #[test]
    fn test_parse_pseudo_path() {
        let parsed =
            parse_line(b"ffffffffff600000-ffffffffff601000 --xp 00000000 00:00 0  [vsyscall]")
                .unwrap();
        assert_eq!(parsed.filename, b"[vsyscall]");
        assert!(parsed.perms.exec);
        assert!(!parsed.perms.read);
    }

    #[test]
    fn test_parse_filename_keeps_spaces() {
        let parsed =
            parse_line(b"400000-401000 r--p 00000000 08:01 99   /tmp/with space (deleted)")
                .unwrap();
        assert_eq!(parsed.filename, b"/tmp/with space (deleted)");
    }

    #[test]
    fn test_parse_offset_and_device() {
        let parsed =
            parse_line(b"7f5985f46000-7f5985f48000 rw-p 00039000 103:06 76021795   /lib/ld.so")
                .unwrap();
        assert_eq!(parsed.offset, 0x39000);
        assert_eq!(parsed.inode, 76021795);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line(b"garbage").is_err());
        assert!(parse_line(b"").is_err());
    }

    #[test]
    fn test_parse_rejects_per_field() {
        // Truncated after the address range.
        assert_eq!(
            parse_line(b"400000-401000"),
            Err(ParseError::Field("end address"))
        );
        // Non-hex start.
        assert_eq!(
            parse_line(b"40zz00-401000 r-xp 00000000 08:01 0 "),
            Err(ParseError::Field("start address"))
        );
        // Bad permission token.
        assert_eq!(
            parse_line(b"400000-401000 rzxp 00000000 08:01 0 "),
            Err(ParseError::Perms)
        );
        // Missing device separator.
        assert_eq!(
            parse_line(b"400000-401000 r-xp 00000000 0801 0 "),
            Err(ParseError::Field("device major"))
        );
        // Decimal inode must not contain hex digits.
        assert_eq!(
            parse_line(b"400000-401000 r-xp 00000000 08:01 12ab "),
            Err(ParseError::Field("inode"))
        );
    }

    #[test]
    fn test_parse_rejects_partially_numeric_field() {
        // The whole pre-terminator substring must convert, exactly the way
        // an endptr comparison would catch "123x".
        assert_eq!(
            parse_line(b"400000x-401000 r-xp 00000000 08:01 0 "),
            Err(ParseError::Field("start address"))
        );
    }

    #[test]
    fn test_split_field_skips_whitespace_run() {
        let (field, rest) = split_field(b"12345   /bin/true", b' ').unwrap();
        assert_eq!(field, b"12345");
        assert_eq!(rest, b"/bin/true");

        // Non-whitespace terminators do not eat what follows.
        let (field, rest) = split_field(b"08:01", b':').unwrap();
        assert_eq!(field, b"08");
        assert_eq!(rest, b"01");
    }
}
