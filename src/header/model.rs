//! Owned, immutable view of a SAM/BAM header.
//!
//! The header is modelled as a mapping from record kind (`HD`, `SQ`, `RG`,
//! `PG`) to the ordered list of records of that kind. Each record is an
//! ordered map of two-character tags to values. `@CO` lines carry free text and
//! are kept separately.
//!
//! Values of these types are never modified in place: every transformation
//! returns a new value.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use noodles::sam;

pub const REFERENCE_SEQUENCE: &str = "SQ";
pub const READ_GROUP: &str = "RG";
pub const COMMENT: &str = "CO";

pub const SAMPLE: &str = "SM";
pub const PLATFORM: &str = "PL";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    fields: IndexMap<String, String>,
}

impl HeaderRecord {
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.get(tag).map(String::as_str)
    }

    /// Value of `tag`, treating whitespace-only values as absent.
    pub fn non_blank(&self, tag: &str) -> Option<&str> {
        self.get(tag).filter(|value| !value.trim().is_empty())
    }

    /// Copy of this record with `tag` set to `value`. An existing tag keeps its
    /// position; a new one is appended.
    pub fn with_field(&self, tag: &str, value: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(tag.to_string(), value.to_string());
        Self { fields }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for HeaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (tag, value)) in self.fields().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", tag, value)?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    sections: IndexMap<String, Vec<HeaderRecord>>,
    comments: Vec<String>,
}

impl Header {
    /// Append a record of `kind`, creating the section on first use.
    pub fn with_record(mut self, kind: &str, record: HeaderRecord) -> Self {
        self.sections
            .entry(kind.to_string())
            .or_default()
            .push(record);
        self
    }

    /// Replace (or add) a whole section, keeping the section's position.
    pub fn with_section(mut self, kind: &str, records: Vec<HeaderRecord>) -> Self {
        self.sections.insert(kind.to_string(), records);
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comments.push(comment.to_string());
        self
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[HeaderRecord])> {
        self.sections
            .iter()
            .map(|(kind, records)| (kind.as_str(), records.as_slice()))
    }

    pub fn section(&self, kind: &str) -> &[HeaderRecord] {
        self.sections
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn read_groups(&self) -> &[HeaderRecord] {
        self.section(READ_GROUP)
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Convert the header handed over by noodles into the owned model.
    pub fn from_sam(header: &sam::Header) -> Result<Self> {
        let mut buf = Vec::new();
        sam::io::Writer::new(&mut buf)
            .write_header(header)
            .context("Failed to serialize SAM header")?;
        let text = String::from_utf8(buf).context("SAM header is not valid UTF-8")?;
        text.parse()
    }

    /// Convert back to a noodles header, letting noodles validate the result.
    pub fn to_sam(&self) -> Result<sam::Header> {
        self.to_string()
            .parse::<sam::Header>()
            .context("Failed to build SAM header from records")
    }
}

fn parse_record(kind: &str, line_num: usize, fields: &str) -> Result<HeaderRecord> {
    let mut record = IndexMap::new();
    for field in fields.split('\t') {
        let Some((tag, value)) = field.split_once(':') else {
            bail!(
                "Malformed field '{}' in @{} header line {}",
                field,
                kind,
                line_num
            );
        };
        if tag.len() != 2 {
            bail!(
                "Invalid tag '{}' in @{} header line {}",
                tag,
                kind,
                line_num
            );
        }
        if record.insert(tag.to_string(), value.to_string()).is_some() {
            bail!(
                "Duplicate tag '{}' in @{} header line {}",
                tag,
                kind,
                line_num
            );
        }
    }
    Ok(HeaderRecord { fields: record })
}

impl FromStr for Header {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut header = Header::default();

        for (idx, line) in s.lines().enumerate() {
            let line_num = idx + 1;
            if line.is_empty() {
                continue;
            }

            let Some(rest) = line.strip_prefix('@') else {
                bail!("Header line {} does not start with '@': {}", line_num, line);
            };
            let (kind, fields) = match rest.split_once('\t') {
                Some((kind, fields)) => (kind, Some(fields)),
                None => (rest, None),
            };
            if kind.len() != 2 {
                bail!("Invalid header record kind '@{}' on line {}", kind, line_num);
            }

            if kind == COMMENT {
                header.comments.push(fields.unwrap_or_default().to_string());
                continue;
            }

            let record = match fields {
                Some(fields) => parse_record(kind, line_num, fields)?,
                None => HeaderRecord::default(),
            };
            header = header.with_record(kind, record);
        }

        Ok(header)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, records) in self.sections() {
            for record in records {
                write!(f, "@{}", kind)?;
                for (tag, value) in record.fields() {
                    write!(f, "\t{}:{}", tag, value)?;
                }
                writeln!(f)?;
            }
        }
        for comment in &self.comments {
            writeln!(f, "@{}\t{}", COMMENT, comment)?;
        }
        Ok(())
    }
}
