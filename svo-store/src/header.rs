//! ASCII header of an octree file.
//!
//! The header is a whitespace-separated token stream: the magic token and the
//! format version, then `<keyword> <value...>` entries, then the end marker.
//!
//! ```text
//! #octree 1
//! node_count 1200
//! data_count 800
//! data_size 16
//! grid 256 256 256
//! data_descriptor morton 0 8
//! data_descriptor color 8 11
//! END
//! ```
//!
//! Either `END` or `#END` ends the header and anything after it is ignored.
//! Unknown keywords are skipped together with the rest of their line. A
//! missing end marker is tolerated and the entries read so far are kept.

use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::str::FromStr;

use crate::constants::{HEADER_END, HEADER_END_ALT, HEADER_MAGIC, HEADER_VERSION};
use crate::descriptor::DataDescriptor;
use crate::errors::{OctreeError, OctreeResult};

/// Global metadata of one octree store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OctreeFileHeader {
    pub node_count: u64,
    pub data_count: u64,
    /// Size in bytes of every data record
    pub data_size: u64,
    /// Dimensions of the cubic volume indexed by the octree
    pub grid: [u32; 3],
    pub data_descriptors: Vec<DataDescriptor>,
}

impl OctreeFileHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses header text. Either the whole header is returned or an error;
    /// there is no partially applied result.
    pub fn parse(text: &str) -> OctreeResult<Self> {
        HeaderParser::new(text).parse()
    }

    /// Looks up a descriptor by name.
    pub fn data_descriptor(&self, name: &str) -> Option<&DataDescriptor> {
        self.data_descriptors.iter().find(|d| d.name() == name)
    }
}

impl FromStr for OctreeFileHeader {
    type Err = OctreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for OctreeFileHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {}", HEADER_MAGIC, HEADER_VERSION)?;
        writeln!(f, "{} {}", Keyword::NodeCount, self.node_count)?;
        writeln!(f, "{} {}", Keyword::DataCount, self.data_count)?;
        writeln!(f, "{} {}", Keyword::DataSize, self.data_size)?;
        writeln!(
            f,
            "{} {} {} {}",
            Keyword::Grid,
            self.grid[0],
            self.grid[1],
            self.grid[2]
        )?;
        for descriptor in &self.data_descriptors {
            writeln!(f, "{} {}", Keyword::DataDescriptor, descriptor)?;
        }
        writeln!(f, "{}", HEADER_END)
    }
}

/// Keywords understood by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    NodeCount,
    DataCount,
    DataSize,
    Grid,
    DataDescriptor,
}

impl Keyword {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "node_count" => Some(Keyword::NodeCount),
            "data_count" => Some(Keyword::DataCount),
            "data_size" => Some(Keyword::DataSize),
            "grid" => Some(Keyword::Grid),
            "data_descriptor" => Some(Keyword::DataDescriptor),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Keyword::NodeCount => "node_count",
            Keyword::DataCount => "data_count",
            Keyword::DataSize => "data_size",
            Keyword::Grid => "grid",
            Keyword::DataDescriptor => "data_descriptor",
        }
    }

    /// Reads this keyword's values and stores them in `header`.
    fn apply(
        self,
        parser: &mut HeaderParser<'_>,
        header: &mut OctreeFileHeader,
    ) -> OctreeResult<()> {
        match self {
            Keyword::NodeCount => header.node_count = parser.value(self)?,
            Keyword::DataCount => header.data_count = parser.value(self)?,
            Keyword::DataSize => header.data_size = parser.value(self)?,
            Keyword::Grid => {
                for axis in header.grid.iter_mut() {
                    *axis = parser.value(self)?;
                }
            }
            Keyword::DataDescriptor => {
                let name = parser.word(self)?;
                let start_byte = parser.value(self)?;
                let end_byte = parser.value(self)?;
                let descriptor = DataDescriptor::new(name, start_byte, end_byte)
                    .map_err(|e| OctreeError::MalformedHeader(e.to_string()))?;
                header.data_descriptors.push(descriptor);
            }
        }
        Ok(())
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type Tokens<'a> = Box<dyn Iterator<Item = (usize, &'a str)> + 'a>;

/// Tokens paired with their zero-based line number
struct HeaderParser<'a> {
    tokens: Peekable<Tokens<'a>>,
}

impl<'a> HeaderParser<'a> {
    fn new(text: &'a str) -> Self {
        let tokens: Tokens<'a> = Box::new(
            text.lines()
                .enumerate()
                .flat_map(|(line, content)| content.split_whitespace().map(move |t| (line, t))),
        );
        Self {
            tokens: tokens.peekable(),
        }
    }

    fn parse(mut self) -> OctreeResult<OctreeFileHeader> {
        self.expect_preamble()?;

        let mut header = OctreeFileHeader::new();
        loop {
            let Some((line, token)) = self.tokens.next() else {
                log::warn!(
                    "Header ended without {} marker, using the values read so far",
                    HEADER_END
                );
                break;
            };

            if token == HEADER_END || token == HEADER_END_ALT {
                break;
            }

            match Keyword::from_token(token) {
                Some(keyword) => keyword.apply(&mut self, &mut header)?,
                None => {
                    log::warn!(
                        "Unrecognized header keyword [{}] on line {}, skipping",
                        token,
                        line + 1
                    );
                    self.skip_line(line);
                }
            }
        }

        Ok(header)
    }

    fn expect_preamble(&mut self) -> OctreeResult<()> {
        match self.tokens.next() {
            Some((_, HEADER_MAGIC)) => {}
            Some((_, other)) => {
                return Err(OctreeError::MalformedHeader(format!(
                    "first word reads [{}] instead of {}",
                    other, HEADER_MAGIC
                )))
            }
            None => {
                return Err(OctreeError::MalformedHeader(
                    "header file is empty".to_string(),
                ))
            }
        }

        match self.tokens.next() {
            Some((_, HEADER_VERSION)) => Ok(()),
            Some((_, other)) => Err(OctreeError::MalformedHeader(format!(
                "unsupported header version [{}], expected {}",
                other, HEADER_VERSION
            ))),
            None => Err(OctreeError::MalformedHeader(
                "missing header version".to_string(),
            )),
        }
    }

    fn word(&mut self, keyword: Keyword) -> OctreeResult<&'a str> {
        self.tokens.next().map(|(_, token)| token).ok_or_else(|| {
            OctreeError::MalformedHeader(format!("missing value for {}", keyword))
        })
    }

    fn value<T: FromStr>(&mut self, keyword: Keyword) -> OctreeResult<T> {
        let token = self.word(keyword)?;
        token.parse().map_err(|_| {
            OctreeError::MalformedHeader(format!("invalid value [{}] for {}", token, keyword))
        })
    }

    fn skip_line(&mut self, line: usize) {
        while self.tokens.next_if(|(l, _)| *l == line).is_some() {}
    }
}
