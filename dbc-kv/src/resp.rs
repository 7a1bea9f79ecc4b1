//! RESP-2 wire codec: encodes commands as arrays of bulk strings and
//! decodes the five reply types a Redis-protocol server returns.
//!
//! Grounded on `original_source/.../driver_redis.cpp`'s `executeRaw`
//! (builds an `argv`/`argvlen` pair and calls `redisCommandArgv`) and its
//! `extractString`/`extractInteger`/`extractArray` reply helpers — this
//! module is the from-scratch Rust translation of what `hiredis` does for
//! the C++ original, since no such library is in the dependency stack here.

use std::io::{self, BufRead, Write};

use dbc_core::error::{Error, Result};

/// A decoded RESP-2 reply.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// The spec's "string/status" decoding rule: raw payload as a string,
    /// nil becomes an empty string.
    pub(crate) fn into_string_lossy(self) -> String {
        match self {
            Reply::Status(s) => s,
            Reply::Bulk(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Reply::Bulk(None) => String::new(),
            Reply::Integer(n) => n.to_string(),
            Reply::Error(msg) => msg,
            Reply::Array(_) => String::new(),
        }
    }

    pub(crate) fn into_bulk(self) -> Option<Vec<u8>> {
        match self {
            Reply::Bulk(value) => value,
            Reply::Status(s) => Some(s.into_bytes()),
            Reply::Integer(n) => Some(n.to_string().into_bytes()),
            _ => None,
        }
    }

    pub(crate) fn into_integer(self) -> i64 {
        match self {
            Reply::Integer(n) => n,
            Reply::Bulk(Some(bytes)) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .unwrap_or(0),
            Reply::Status(s) => s.trim().parse::<i64>().unwrap_or(0),
            _ => 0,
        }
    }

    pub(crate) fn into_array(self) -> Vec<Reply> {
        match self {
            Reply::Array(Some(items)) => items,
            Reply::Array(None) => Vec::new(),
            other => vec![other],
        }
    }
}

/// Writes `args` as a RESP-2 command array of bulk strings, e.g.
/// `["SET", "k", "v"]` becomes `*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n`.
pub(crate) fn write_command<W: Write>(w: &mut W, args: &[&[u8]]) -> io::Result<()> {
    write!(w, "*{}\r\n", args.len())?;
    for arg in args {
        write!(w, "${}\r\n", arg.len())?;
        w.write_all(arg)?;
        w.write_all(b"\r\n")?;
    }
    w.flush()
}

/// Reads and decodes one RESP-2 reply. Error replies are returned as
/// `Ok(Reply::Error(..))`, not `Err` — the caller decides whether a
/// particular command's error reply maps to [`Error::Auth`] or
/// [`Error::Command`].
pub(crate) fn read_reply<R: BufRead>(r: &mut R) -> Result<Reply> {
    let line = read_line(r)?;
    let (prefix, rest) = line
        .split_at_checked(1)
        .ok_or_else(|| Error::Command("empty reply from server".into()))?;

    match prefix {
        "+" => Ok(Reply::Status(rest.to_string())),
        "-" => Ok(Reply::Error(rest.to_string())),
        ":" => Ok(Reply::Integer(
            rest.parse()
                .map_err(|_| Error::Command(format!("malformed integer reply {rest:?}").into()))?,
        )),
        "$" => {
            let len: i64 = rest
                .parse()
                .map_err(|_| Error::Command(format!("malformed bulk length {rest:?}").into()))?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            let mut buf = vec![0u8; len as usize];
            r.read_exact(&mut buf)
                .map_err(|e| Error::from(io::Error::new(e.kind(), e.to_string())))?;
            let mut crlf = [0u8; 2];
            r.read_exact(&mut crlf)?;
            Ok(Reply::Bulk(Some(buf)))
        }
        "*" => {
            let len: i64 = rest
                .parse()
                .map_err(|_| Error::Command(format!("malformed array length {rest:?}").into()))?;
            if len < 0 {
                return Ok(Reply::Array(None));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(read_reply(r)?);
            }
            Ok(Reply::Array(Some(items)))
        }
        other => Err(Error::Command(
            format!("unrecognized reply type byte {other:?}").into(),
        )),
    }
}

/// Reads one incoming command as a RESP-2 bulk-string array, the shape
/// every Redis-protocol client sends. Returns `Ok(None)` on a clean EOF
/// (the client closed its side) instead of erroring, since that is the
/// ordinary way a connection ends. Arguments come back as raw bytes —
/// the caller decides which ones are key/field names (safe to treat as
/// text) and which are opaque values that must not be re-encoded.
#[cfg(test)]
pub(crate) fn read_command<R: BufRead>(r: &mut R) -> Result<Option<Vec<Vec<u8>>>> {
    let mut line = String::new();
    if r.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    if !line.starts_with('*') {
        return Err(Error::Command(
            format!("expected command array, got {line:?}").into(),
        ));
    }
    let count: usize = line[1..]
        .parse()
        .map_err(|_| Error::Command(format!("malformed command array length {line:?}").into()))?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        match read_reply(r)? {
            Reply::Bulk(Some(bytes)) => args.push(bytes),
            other => {
                return Err(Error::Command(
                    format!("expected bulk string argument, got {other:?}").into(),
                ))
            }
        }
    }
    Ok(Some(args))
}

/// Encodes a reply back onto the wire, the server-side counterpart of
/// [`read_reply`].
#[cfg(test)]
pub(crate) fn write_reply<W: Write>(w: &mut W, reply: &Reply) -> io::Result<()> {
    match reply {
        Reply::Status(s) => write!(w, "+{s}\r\n"),
        Reply::Error(msg) => write!(w, "-{msg}\r\n"),
        Reply::Integer(n) => write!(w, ":{n}\r\n"),
        Reply::Bulk(None) => write!(w, "$-1\r\n"),
        Reply::Bulk(Some(bytes)) => {
            write!(w, "${}\r\n", bytes.len())?;
            w.write_all(bytes)?;
            w.write_all(b"\r\n")
        }
        Reply::Array(None) => write!(w, "*-1\r\n"),
        Reply::Array(Some(items)) => {
            write!(w, "*{}\r\n", items.len())?;
            for item in items {
                write_reply(w, item)?;
            }
            Ok(())
        }
    }?;
    w.flush()
}

fn read_line<R: BufRead>(r: &mut R) -> Result<String> {
    let mut line = String::new();
    let n = r.read_line(&mut line)?;
    if n == 0 {
        return Err(Error::from(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by peer",
        )));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_each_reply_type() {
        assert_eq!(
            read_reply(&mut Cursor::new(b"+OK\r\n".to_vec())).unwrap(),
            Reply::Status("OK".into())
        );
        assert_eq!(
            read_reply(&mut Cursor::new(b"-ERR boom\r\n".to_vec())).unwrap(),
            Reply::Error("ERR boom".into())
        );
        assert_eq!(
            read_reply(&mut Cursor::new(b":42\r\n".to_vec())).unwrap(),
            Reply::Integer(42)
        );
        assert_eq!(
            read_reply(&mut Cursor::new(b"$-1\r\n".to_vec())).unwrap(),
            Reply::Bulk(None)
        );
        assert_eq!(
            read_reply(&mut Cursor::new(b"$5\r\nhello\r\n".to_vec())).unwrap(),
            Reply::Bulk(Some(b"hello".to_vec()))
        );
        assert_eq!(
            read_reply(&mut Cursor::new(b"*2\r\n$1\r\na\r\n$1\r\nb\r\n".to_vec())).unwrap(),
            Reply::Array(Some(vec![
                Reply::Bulk(Some(b"a".to_vec())),
                Reply::Bulk(Some(b"b".to_vec())),
            ]))
        );
    }

    #[test]
    fn write_command_encodes_argv_as_bulk_array() {
        let mut buf = Vec::new();
        write_command(&mut buf, &[b"SET", b"k", b"v"]).unwrap();
        assert_eq!(buf, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n".to_vec());
    }
}
