//! Rewrites for the VCFs shipped inside a Sanger results archive.
//!
//! Sanger names the tumour sample `TUMOUR`; downstream expects `TUMOR`. The
//! files are rewritten line by line so no VCF validation is imposed on them.

use anyhow::{bail, Result};
use camino::Utf8Path;
use log::{info, warn};

use crate::archive::{find_members, with_member, MemberLocator, BRASS_VCF, CAVEMAN_VCF};
use crate::index::{build_tabix_index, Preset};
use crate::rewrite::{output_path, rewrite_lines, LineAction, RewriteSummary};

const SANGER_TUMOR: &str = "TUMOUR";
const GDC_TUMOR: &str = "TUMOR";
const SAMPLE_LINE_PREFIX: &str = "##SAMPLE=<ID=TUMOUR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcfSource {
    Brass,
    Caveman,
}

impl VcfSource {
    pub fn locator(&self) -> &'static MemberLocator {
        match self {
            VcfSource::Brass => &BRASS_VCF,
            VcfSource::Caveman => &CAVEMAN_VCF,
        }
    }

    pub fn transform(&self, line: &str) -> Result<LineAction> {
        match self {
            VcfSource::Brass => Ok(rename_tumour(line)),
            VcfSource::Caveman => caveman_line(line),
        }
    }
}

/// `##SAMPLE=<ID=TUMOUR...` and `#CHROM` lines get `TUMOUR` renamed; all other
/// lines pass through.
pub fn rename_tumour(line: &str) -> LineAction {
    if line.starts_with("##") {
        if line.starts_with(SAMPLE_LINE_PREFIX) {
            LineAction::Replace(line.replace("ID=TUMOUR", "ID=TUMOR"))
        } else {
            LineAction::Keep
        }
    } else if line.starts_with("#CHROM") {
        LineAction::Replace(line.replace(SANGER_TUMOR, GDC_TUMOR))
    } else {
        LineAction::Keep
    }
}

/// Caveman occasionally emits loci with ALT identical to REF; those are
/// dropped.
pub fn caveman_line(line: &str) -> Result<LineAction> {
    if line.starts_with('#') {
        return Ok(rename_tumour(line));
    }

    let cols: Vec<&str> = line.splitn(6, '\t').collect();
    if cols.len() < 5 {
        bail!("Malformed VCF record: {}", line);
    }
    if cols[3] == cols[4] {
        warn!(
            "Removing loci {}:{} where ref and alt alleles are same: {} - {}",
            cols[0], cols[1], cols[3], cols[4]
        );
        return Ok(LineAction::Drop);
    }

    Ok(LineAction::Keep)
}

/// Rewrite the tool's VCF from the results archive to `<prefix>.vcf.gz` and
/// index it.
pub fn run_extract_vcf(
    archive: &Utf8Path,
    output_prefix: &Utf8Path,
    source: VcfSource,
) -> Result<RewriteSummary> {
    let locator = source.locator();
    info!(
        "Extracting {} vcf file key from tarfile...",
        locator.tool
    );
    let members = find_members(archive, locator)?;

    let output = output_path(output_prefix, "vcf.gz");
    info!(
        "Processing raw VCF {} to change TUMOUR -> TUMOR...",
        members.data
    );
    info!("Creating final vcf {}", output);
    let summary = with_member(archive, &members.data, |reader| {
        rewrite_lines(reader, &output, |line| source.transform(line))
    })?;

    info!("Rebuilding index rather than reusing {}", members.index);
    build_tabix_index(&output, Preset::Vcf)?;
    Ok(summary)
}
