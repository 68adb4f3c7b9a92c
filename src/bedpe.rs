//! Brass BEDPE extraction.
//!
//! Brass writes several `#` comment lines ahead of its records; the last of
//! them holds the column names. The output carries a single normalised
//! column header followed by the records as they were.

use std::collections::HashSet;
use std::io::{BufRead, Read};

use anyhow::{bail, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use noodles::bgzf;

use crate::archive::{find_members, with_member, BRASS_BEDPE};
use crate::index::{build_tabix_index, Preset};
use crate::rewrite::{output_path, trim_line_ending, write_bgzf_atomic, RewriteSummary};

/// Strand columns after this index describe transcripts, not breakpoints.
const BREAKPOINT_COLUMNS: usize = 9;

fn normalise_column(index: usize, name: &str) -> Result<String> {
    let column = match name {
        "name/id" => "name".to_string(),
        "brass_score" => "score".to_string(),
        _ if name.starts_with("strand") && index > BREAKPOINT_COLUMNS => match name {
            "strand1" => "transcript1_strand".to_string(),
            "strand2" => "transcript2_strand".to_string(),
            _ => bail!("Unknown strand value column {} - {}", index, name),
        },
        _ => name
            .to_lowercase()
            .replace([' ', '/', '-'], "_"),
    };
    Ok(column)
}

/// Normalise the brass column header line into GDC column names.
pub fn format_header(line: &str) -> Result<Vec<String>> {
    let line = line.replace('#', "");
    let columns = line
        .trim()
        .split('\t')
        .enumerate()
        .map(|(index, name)| normalise_column(index, name))
        .collect::<Result<Vec<_>>>()?;

    let mut seen = HashSet::new();
    if !columns.iter().all(|column| seen.insert(column.as_str())) {
        bail!("Duplicate header keys {}", columns.join(","));
    }

    Ok(columns)
}

fn header_line(meta: Option<&str>) -> Result<String> {
    match meta {
        Some(meta) => Ok(format!("#{}", format_header(meta)?.join("\t"))),
        None => bail!("No '#' column header found before the first BEDPE record"),
    }
}

/// Replace the `#` lines of a BGZF BEDPE stream with one normalised header.
pub fn rewrite_bedpe<R: Read>(src: R, dst: &Utf8Path) -> Result<RewriteSummary> {
    let mut reader = bgzf::Reader::new(src);

    write_bgzf_atomic(dst, |writer| {
        let mut summary = RewriteSummary::default();
        let mut meta: Option<String> = None;
        let mut header_written = false;
        let mut buf = String::new();

        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                break;
            }
            let line = trim_line_ending(&buf);

            if line.starts_with('#') {
                meta = Some(line.to_string());
                summary.dropped += 1;
                continue;
            }

            if !header_written {
                writeln!(writer, "{}", header_line(meta.as_deref())?)?;
                header_written = true;
            }
            writeln!(writer, "{}", line)?;
            summary.written += 1;
        }

        if !header_written {
            if let Some(meta) = meta.as_deref() {
                writeln!(writer, "{}", header_line(Some(meta))?)?;
            }
        }

        Ok(summary)
    })
}

/// Rewrite the brass BEDPE from the results archive to `<prefix>.bedpe.gz`
/// and index it.
pub fn run_extract_brass_bedpe(
    archive: &Utf8Path,
    output_prefix: &Utf8Path,
) -> Result<Utf8PathBuf> {
    info!("Extracting brass bedpe file key from tarfile...");
    let members = find_members(archive, &BRASS_BEDPE)?;

    info!("Processing brass bedpe {}...", members.data);
    let output = output_path(output_prefix, "bedpe.gz");
    info!("Creating final bedpe {}", output);
    let summary = with_member(archive, &members.data, |reader| rewrite_bedpe(reader, &output))?;
    info!("Wrote {} bedpe records", summary.written);

    info!("Rebuilding index rather than reusing {}", members.index);
    build_tabix_index(&output, Preset::Bed)?;
    Ok(output)
}
