//! Binary nested key/value tree codec.
//!
//! The remote stat schema arrives as a recursive tree of named nodes:
//!
//!   `<type u8><name\0><payload>`
//!
//! where a table payload is a run of entries closed by an end marker and every
//! other payload is a scalar. Scalars are kept typed in [`Value`] but compared
//! through their decimal text form ([`Node::text`]) because the schema is not
//! consistent about whether, say, a stat type code is stored as `4` or `"4"`.
//!
//! Decoding is bounded: nesting past [`MAX_DEPTH`] levels is rejected rather than
//! recursing without limit on a hostile blob.
use std::borrow::Cow;

use bytes::{Buf, BufMut};

use crate::error::SchemaDecodeError;

/// Maximum table nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

pub const TAG_TABLE: u8 = 0x00;
pub const TAG_STRING: u8 = 0x01;
pub const TAG_INT32: u8 = 0x02;
pub const TAG_FLOAT32: u8 = 0x03;
pub const TAG_POINTER: u8 = 0x04;
pub const TAG_WIDE_STRING: u8 = 0x05;
pub const TAG_COLOR: u8 = 0x06;
pub const TAG_UINT64: u8 = 0x07;
pub const TAG_END: u8 = 0x08;
pub const TAG_INT64: u8 = 0x0A;
pub const TAG_ALT_END: u8 = 0x0B;

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Table(Vec<Node>),
    String(String),
    Int32(i32),
    Float32(f32),
    Pointer(i32),
    Color(i32),
    UInt64(u64),
    Int64(i64),
}

/// One named node of the schema tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub value: Value,
}

impl Node {
    pub fn table(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            value: Value::Table(children),
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::String(value.into()),
        }
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value: Value::Int32(value),
        }
    }

    /// Child nodes, empty for scalar nodes.
    pub fn children(&self) -> &[Node] {
        match &self.value {
            Value::Table(children) => children,
            _ => &[],
        }
    }

    /// First direct child with exactly this name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children().iter().find(|c| c.name == name)
    }

    /// Walk a chain of child names, e.g. `["display", "name", "english"]`.
    pub fn path(&self, names: &[&str]) -> Option<&Node> {
        let mut current = self;
        for name in names {
            current = current.child(name)?;
        }
        Some(current)
    }

    /// Scalar value as text. Tables have no text.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match &self.value {
            Value::Table(_) => None,
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Int32(v) | Value::Pointer(v) | Value::Color(v) => {
                Some(Cow::Owned(v.to_string()))
            }
            Value::Float32(v) => Some(Cow::Owned(v.to_string())),
            Value::UInt64(v) => Some(Cow::Owned(v.to_string())),
            Value::Int64(v) => Some(Cow::Owned(v.to_string())),
        }
    }

    /// Text of a direct scalar child.
    pub fn child_text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.child(name).and_then(Node::text)
    }

    /// Build a tree from a JSON document. Objects become tables (key order is kept),
    /// integers that fit become `Int32`, larger ones `UInt64`/`Int64`, other numbers
    /// `Float32`, booleans `Int32` 0/1, arrays tables keyed "0", "1", ...
    pub fn from_json(name: impl Into<String>, json: &serde_json::Value) -> Self {
        use serde_json::Value as J;
        let name = name.into();
        let value = match json {
            J::Object(map) => Value::Table(
                map.iter()
                    .map(|(k, v)| Node::from_json(k.as_str(), v))
                    .collect(),
            ),
            J::Array(items) => Value::Table(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Node::from_json(i.to_string(), v))
                    .collect(),
            ),
            J::String(s) => Value::String(s.clone()),
            J::Bool(b) => Value::Int32(i32::from(*b)),
            J::Null => Value::String(String::new()),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Value::Int32(small),
                        Err(_) => Value::Int64(i),
                    }
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Float32(n.as_f64().unwrap_or_default() as f32)
                }
            }
        };
        Self { name, value }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
        }
    }

    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn need(&self, n: usize, context: &'static str) -> Result<(), SchemaDecodeError> {
        if self.buf.remaining() < n {
            return Err(SchemaDecodeError::Truncated {
                offset: self.offset(),
                context,
            });
        }
        Ok(())
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, SchemaDecodeError> {
        self.need(1, context)?;
        Ok(self.buf.get_u8())
    }

    fn i32(&mut self, context: &'static str) -> Result<i32, SchemaDecodeError> {
        self.need(4, context)?;
        Ok(self.buf.get_i32_le())
    }

    fn f32(&mut self, context: &'static str) -> Result<f32, SchemaDecodeError> {
        self.need(4, context)?;
        Ok(self.buf.get_f32_le())
    }

    fn u64(&mut self, context: &'static str) -> Result<u64, SchemaDecodeError> {
        self.need(8, context)?;
        Ok(self.buf.get_u64_le())
    }

    fn i64(&mut self, context: &'static str) -> Result<i64, SchemaDecodeError> {
        self.need(8, context)?;
        Ok(self.buf.get_i64_le())
    }

    fn cstring(&mut self, context: &'static str) -> Result<String, SchemaDecodeError> {
        let nul = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(SchemaDecodeError::Truncated {
                offset: self.offset(),
                context,
            })?;
        let text = String::from_utf8_lossy(&self.buf[..nul]).into_owned();
        self.buf.advance(nul + 1);
        Ok(text)
    }
}

/// Decode a schema blob. The returned root is the first top-level entry; the
/// schema's `stats` table sits among its children. An empty blob decodes to an
/// empty unnamed table; a non-empty one must hold a root entry and nothing
/// after the top-level end marker.
pub fn decode(blob: &[u8]) -> Result<Node, SchemaDecodeError> {
    if blob.is_empty() {
        return Ok(Node::table("", Vec::new()));
    }
    let mut reader = Reader::new(blob);
    let root = read_entries(&mut reader, 0)?
        .into_iter()
        .next()
        .ok_or(SchemaDecodeError::MissingRoot { offset: 0 })?;
    if reader.buf.has_remaining() {
        return Err(SchemaDecodeError::TrailingData {
            offset: reader.offset(),
            remaining: reader.buf.remaining(),
        });
    }
    Ok(root)
}

fn read_entries(reader: &mut Reader<'_>, depth: usize) -> Result<Vec<Node>, SchemaDecodeError> {
    if depth > MAX_DEPTH {
        return Err(SchemaDecodeError::TooDeep { max: MAX_DEPTH });
    }
    let mut nodes = Vec::new();
    loop {
        // The outermost list may simply run out instead of carrying an end marker.
        if depth == 0 && !reader.buf.has_remaining() {
            return Ok(nodes);
        }
        let offset = reader.offset();
        let tag = reader.u8("type tag")?;
        if tag == TAG_END || tag == TAG_ALT_END {
            return Ok(nodes);
        }
        let name = reader.cstring("node name")?;
        let value = match tag {
            TAG_TABLE => Value::Table(read_entries(reader, depth + 1)?),
            TAG_STRING => Value::String(reader.cstring("string value")?),
            TAG_INT32 => Value::Int32(reader.i32("int32 value")?),
            TAG_FLOAT32 => Value::Float32(reader.f32("float32 value")?),
            TAG_POINTER => Value::Pointer(reader.i32("pointer value")?),
            TAG_COLOR => Value::Color(reader.i32("color value")?),
            TAG_UINT64 => Value::UInt64(reader.u64("uint64 value")?),
            TAG_INT64 => Value::Int64(reader.i64("int64 value")?),
            TAG_WIDE_STRING => return Err(SchemaDecodeError::WideString { offset }),
            other => return Err(SchemaDecodeError::UnknownType { tag: other, offset }),
        };
        nodes.push(Node { name, value });
    }
}

/// Encode a tree rooted at `root`, followed by the top-level end marker.
pub fn encode(root: &Node) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    write_node(&mut out, root);
    out.put_u8(TAG_END);
    out
}

fn put_cstr(out: &mut Vec<u8>, s: &str) {
    // Interior NULs cannot be represented; the string ends at the first one.
    let bytes = s.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    out.put_slice(&bytes[..end]);
    out.put_u8(0);
}

fn write_node(out: &mut Vec<u8>, node: &Node) {
    let tag = match &node.value {
        Value::Table(_) => TAG_TABLE,
        Value::String(_) => TAG_STRING,
        Value::Int32(_) => TAG_INT32,
        Value::Float32(_) => TAG_FLOAT32,
        Value::Pointer(_) => TAG_POINTER,
        Value::Color(_) => TAG_COLOR,
        Value::UInt64(_) => TAG_UINT64,
        Value::Int64(_) => TAG_INT64,
    };
    out.put_u8(tag);
    put_cstr(out, &node.name);
    match &node.value {
        Value::Table(children) => {
            for child in children {
                write_node(out, child);
            }
            out.put_u8(TAG_END);
        }
        Value::String(s) => put_cstr(out, s),
        Value::Int32(v) | Value::Pointer(v) | Value::Color(v) => out.put_i32_le(*v),
        Value::Float32(v) => out.put_f32_le(*v),
        Value::UInt64(v) => out.put_u64_le(*v),
        Value::Int64(v) => out.put_i64_le(*v),
    }
}
