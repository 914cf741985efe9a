//! Base types for structure of an AXRP header.

use binrw::BinRead;
use indexmap::{map::Iter, IndexMap};
use serde::{Deserialize, Deserializer, Serialize};

/// The published signature of an archive. Only the first two bytes are compared.
pub const MAGIC: [u8; 4] = [0xAC, 0xEF, 0x0A, 0x00];

/// Size of the fixed prologue that precedes the header block
pub const PROLOGUE_SIZE: usize = 8;

/// Archive prologue
///
/// Defines the first eight bytes of the file, which always start with the magic `AC EF`.
/// The two reserved bytes that follow are kept but never validated.
/// All data is stored in little endian format
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(magic = b"\xAC\xEF", little)]
pub struct Prologue {
    /// Reserved bytes, observed as `0A 00`
    pub reserved: [u8; 2],

    /// The size of the compressed header block that follows the prologue
    pub header_length: u32,
}

/// A named node of the header tree
///
/// Both maps keep the order the entries were written in. A missing or `null` map in the
/// encoded header reads as an empty one.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactGroup {
    /// Nested groups, keyed by name
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: IndexMap<String, CompactGroup>,

    /// Offsets or sizes of archive content, keyed by name
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parts: IndexMap<String, i64>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl CompactGroup {
    /// Get a direct child group by name
    pub fn child(&self, name: &str) -> Option<&CompactGroup> {
        self.children.get(name)
    }

    /// Get a direct part by name
    pub fn part(&self, name: &str) -> Option<i64> {
        self.parts.get(name).copied()
    }

    /// Resolve a `/` separated path of group names, starting from this group.
    ///
    /// Empty segments are ignored, so `""` and `"/"` both resolve to `self`.
    pub fn find_group(&self, path: &str) -> Option<&CompactGroup> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |group, segment| group.child(segment))
    }

    /// Resolve a `/` separated path whose last segment names a part
    pub fn find_part(&self, path: &str) -> Option<i64> {
        let path = path.trim_end_matches('/');
        match path.rsplit_once('/') {
            Some((groups, name)) => self.find_group(groups)?.part(name),
            None => self.part(path),
        }
    }

    /// Total number of groups below this one
    pub fn group_count(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.group_count())
            .sum()
    }

    /// Total number of parts in this group and every group below it
    pub fn part_count(&self) -> usize {
        self.parts.len()
            + self
                .children
                .values()
                .map(CompactGroup::part_count)
                .sum::<usize>()
    }

    /// Iterate over every part in the tree, depth first.
    ///
    /// A group's own parts are yielded before those of its children. Each item carries the
    /// full `/` separated path of the part.
    ///
    /// ```
    /// use axrp_archive::types::CompactGroup;
    ///
    /// let root: CompactGroup = serde_json::from_str(
    ///     r#"{"children":{"pages":{"parts":{"home":64}}},"parts":{"doc":8}}"#,
    /// ).unwrap();
    ///
    /// let parts: Vec<_> = root.walk().collect();
    /// assert_eq!(parts, vec![("doc".to_string(), 8), ("pages/home".to_string(), 64)]);
    /// ```
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![Frame::new(String::new(), self)],
        }
    }
}

struct Frame<'a> {
    path: String,
    parts: Iter<'a, String, i64>,
    children: Iter<'a, String, CompactGroup>,
}

impl<'a> Frame<'a> {
    fn new(path: String, group: &'a CompactGroup) -> Self {
        Self {
            path,
            parts: group.parts.iter(),
            children: group.children.iter(),
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Depth first iterator over the parts of a [`CompactGroup`], see [`CompactGroup::walk`]
pub struct Walk<'a> {
    stack: Vec<Frame<'a>>,
}

impl Iterator for Walk<'_> {
    type Item = (String, i64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            if let Some((name, value)) = frame.parts.next() {
                return Some((join(&frame.path, name), *value));
            }

            match frame.children.next() {
                Some((name, child)) => {
                    let path = join(&frame.path, name);
                    self.stack.push(Frame::new(path, child));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// The decoded header of an archive
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// The top level group of the archive
    pub root: CompactGroup,
}

/// Which encoding the header block was stored with
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeaderShape {
    /// An object with a `root` field holding the top level group
    Wrapped,

    /// A bare top level group, written by pre-release versions
    Bare,
}

impl std::fmt::Display for HeaderShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderShape::Wrapped => f.write_str("wrapped"),
            HeaderShape::Bare => f.write_str("bare (legacy)"),
        }
    }
}

/// A header together with where it was found in the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedHeader {
    /// The decoded header
    pub header: ArchiveHeader,

    /// Size of the compressed header block, as declared by the prologue
    pub header_length: u32,

    /// The encoding the header block used
    pub shape: HeaderShape,
}

impl LoadedHeader {
    /// Offset from the start of the stream to the first byte after the header block
    pub fn content_offset(&self) -> u64 {
        PROLOGUE_SIZE as u64 + self.header_length as u64
    }

    /// Unwrap and return the decoded header
    pub fn into_header(self) -> ArchiveHeader {
        self.header
    }
}
