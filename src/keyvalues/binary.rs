//! Binary KeyValues as written by the Steam client for `shortcuts.vdf`.
//!
//! A node is a run of `(tag, key, value)` triples closed by [`TAG_END`]. Keys
//! and string values are NUL-terminated, integers are four little-endian
//! bytes. Nothing carries a length, so a truncated stream only shows up as an
//! unexpected end of input.

use super::{KvNode, KvValue};
use crate::error::{KvError, KvResult};
use std::io::{ErrorKind, Read, Write};

pub const TAG_NODE: u8 = 0x00;
pub const TAG_STRING: u8 = 0x01;
pub const TAG_INT32: u8 = 0x02;
pub const TAG_END: u8 = 0x08;

pub const MAX_DEPTH: usize = 256;

/// Decodes one node from `reader`, stopping right after its end marker.
///
/// Reads byte by byte; wrap unbuffered sources in a `BufReader`.
pub fn read<R: Read>(reader: R) -> KvResult<KvNode> {
    let mut source = ByteSource { inner: reader, offset: 0 };
    read_node(&mut source, 0)
}

pub fn decode(bytes: &[u8]) -> KvResult<KvNode> {
    read(bytes)
}

pub fn write<W: Write>(node: &KvNode, writer: &mut W) -> KvResult<()> {
    write_node(node, writer)
}

pub fn encode(node: &KvNode) -> KvResult<Vec<u8>> {
    let mut out = Vec::new();
    write_node(node, &mut out)?;
    Ok(out)
}

struct ByteSource<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> ByteSource<R> {
    fn read_u8(&mut self, context: &'static str) -> KvResult<u8> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf, context)?;
        Ok(buf[0])
    }

    fn read_i32(&mut self) -> KvResult<i32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf, "int32 value")?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_cstring(&mut self, context: &'static str) -> KvResult<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8(context)? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        String::from_utf8(bytes).map_err(|_| KvError::InvalidUtf8 { context })
    }

    fn fill(&mut self, buf: &mut [u8], context: &'static str) -> KvResult<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                Err(KvError::UnexpectedEof { context })
            }
            Err(err) => Err(KvError::Io(err)),
        }
    }
}

fn read_node<R: Read>(source: &mut ByteSource<R>, depth: usize) -> KvResult<KvNode> {
    if depth > MAX_DEPTH {
        return Err(KvError::TooDeep { limit: MAX_DEPTH });
    }

    let mut node = KvNode::new();
    loop {
        let tag_offset = source.offset;
        let tag = source.read_u8("type tag")?;
        let (key, value) = match tag {
            TAG_END => return Ok(node),
            TAG_NODE | TAG_STRING | TAG_INT32 => {
                let key = source.read_cstring("key")?;
                let value = match tag {
                    TAG_NODE => KvValue::Node(read_node(source, depth + 1)?),
                    TAG_STRING => KvValue::String(source.read_cstring("string value")?),
                    _ => KvValue::Int(source.read_i32()?),
                };
                (key, value)
            }
            other => {
                return Err(KvError::UnknownTag {
                    tag: other,
                    offset: tag_offset,
                })
            }
        };
        node.insert(key, value);
    }
}

fn write_node<W: Write>(node: &KvNode, writer: &mut W) -> KvResult<()> {
    for (key, value) in node.iter() {
        match value {
            KvValue::Node(child) => {
                writer.write_all(&[TAG_NODE])?;
                write_cstring(writer, key, "key")?;
                write_node(child, writer)?;
            }
            KvValue::String(text) => {
                writer.write_all(&[TAG_STRING])?;
                write_cstring(writer, key, "key")?;
                write_cstring(writer, text, key)?;
            }
            KvValue::Int(number) => {
                writer.write_all(&[TAG_INT32])?;
                write_cstring(writer, key, "key")?;
                writer.write_all(&number.to_le_bytes())?;
            }
        }
    }
    writer.write_all(&[TAG_END])?;
    Ok(())
}

fn write_cstring<W: Write>(writer: &mut W, value: &str, what: &str) -> KvResult<()> {
    if value.as_bytes().contains(&0) {
        return Err(KvError::EmbeddedNul {
            what: format!("\"{}\"", what.replace('\0', "\\0")),
        });
    }
    writer.write_all(value.as_bytes())?;
    writer.write_all(&[0])?;
    Ok(())
}
