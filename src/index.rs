use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;
use noodles::bgzf;
use noodles::core::Position;
use noodles::csi::binning_index::index::header::Builder as IndexHeaderBuilder;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::tabix;

/// Column layout of the file being indexed, as in `tabix -p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Vcf,
    Bed,
}

const META_CHAR: char = '#';

impl Preset {
    fn index_header(&self) -> noodles::csi::binning_index::index::Header {
        match self {
            Preset::Vcf => IndexHeaderBuilder::vcf().build(),
            Preset::Bed => IndexHeaderBuilder::bed().build(),
        }
    }

    /// Reference name and 1-based closed interval covered by a data line.
    pub fn parse_interval<'a>(&self, line: &'a str) -> Result<(&'a str, Position, Position)> {
        let fields: Vec<&str> = line.split('\t').collect();
        match self {
            Preset::Vcf => vcf_interval(&fields),
            Preset::Bed => bed_interval(&fields),
        }
        .with_context(|| format!("Cannot index line: {}", line))
    }
}

fn parse_position(value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("Invalid coordinate '{}'", value))
}

fn vcf_interval<'a>(fields: &[&'a str]) -> Result<(&'a str, Position, Position)> {
    if fields.len() < 8 {
        bail!("Expected at least 8 columns, found {}", fields.len());
    }

    let start = parse_position(fields[1])?;
    let mut end = start + fields[3].len().max(1) - 1;
    let info_end = fields[7]
        .split(';')
        .find_map(|entry| entry.strip_prefix("END="))
        .and_then(|value| value.parse::<usize>().ok());
    if let Some(info_end) = info_end {
        if info_end >= start {
            end = info_end;
        }
    }

    let start = Position::new(start).context("VCF position must be >= 1")?;
    let end = Position::new(end).context("Invalid VCF end position")?;
    Ok((fields[0], start, end))
}

fn bed_interval<'a>(fields: &[&'a str]) -> Result<(&'a str, Position, Position)> {
    if fields.len() < 3 {
        bail!("Expected at least 3 columns, found {}", fields.len());
    }

    let start = parse_position(fields[1])? + 1;
    let end = parse_position(fields[2])?.max(start);

    let start = Position::new(start).context("Invalid BED start")?;
    let end = Position::new(end).context("Invalid BED end")?;
    Ok((fields[0], start, end))
}

pub fn index_path<P: AsRef<Path>>(src: P) -> PathBuf {
    PathBuf::from(format!("{}.tbi", src.as_ref().display()))
}

/// Build `<src>.tbi` for a coordinate-sorted BGZF file, replacing any
/// existing index.
pub fn build_tabix_index<P: AsRef<Path>>(src: P, preset: Preset) -> Result<PathBuf> {
    let src = src.as_ref();
    let dst = index_path(src);
    info!("Creating index {}", dst.display());

    let file = File::open(src).with_context(|| format!("Failed to open {}", src.display()))?;
    let mut reader = bgzf::Reader::new(file);

    let mut indexer = tabix::index::Indexer::default();
    indexer.set_header(preset.index_header());

    let mut line = String::new();
    let mut start_position = reader.virtual_position();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let end_position = reader.virtual_position();

        let record = line.trim_end_matches(['\n', '\r']);
        if !record.is_empty() && !record.starts_with(META_CHAR) {
            let (name, start, end) = preset.parse_interval(record)?;
            let chunk = Chunk::new(start_position, end_position);
            indexer.add_record(name, start, end, chunk)?;
        }

        start_position = end_position;
    }

    let index = indexer.build();
    tabix::write(&dst, &index)
        .with_context(|| format!("Failed to write index {}", dst.display()))?;

    Ok(dst)
}
