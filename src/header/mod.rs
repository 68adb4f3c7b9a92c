pub mod check;
pub mod model;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use noodles::{bam, sam};

use crate::logging::Reporter;
use check::{check_platforms, check_samples, repair_header, ReadGroupPatch, ILLUMINA};
use model::Header;

/// Which read-group fields are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// `SM` must be present and identical.
    Samples,
    /// `SM` as above, and `PL` must be `ILLUMINA`.
    SamplesAndPlatforms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderOutcome {
    Conformant,
    Repaired(Header),
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Read only the header of a BAM (or SAM, by extension) file.
pub fn read_alignment_header<P: AsRef<Path>>(src: P) -> Result<sam::Header> {
    let src = src.as_ref();
    let file = File::open(src).with_context(|| format!("Failed to open {}", src.display()))?;

    let header = if has_extension(src, "sam") {
        sam::io::Reader::new(BufReader::new(file)).read_header()
    } else {
        bam::io::Reader::new(file).read_header()
    }
    .with_context(|| format!("Failed to read alignment header from {}", src.display()))?;

    Ok(header)
}

/// Write a file holding `header` and no alignment records. BAM when the path
/// ends in `.bam`, SAM text otherwise.
pub fn write_header_only<P: AsRef<Path>>(dst: P, header: &sam::Header) -> Result<()> {
    let dst = dst.as_ref();
    let file = File::create(dst).with_context(|| format!("Failed to create {}", dst.display()))?;

    if has_extension(dst, "bam") {
        let mut writer = bam::io::Writer::new(file);
        writer.write_header(header)?;
        writer.into_inner().finish()?;
    } else {
        let mut writer = sam::io::Writer::new(file);
        writer.write_header(header)?;
    }

    Ok(())
}

/// Decide whether `header` needs repairing, and build the repaired header if so.
pub fn evaluate_header(
    header: &Header,
    aliquot_id: &str,
    mode: CheckMode,
    reporter: &dyn Reporter,
) -> HeaderOutcome {
    let pass_sm = check_samples(header, reporter);
    let pass_pl = match mode {
        CheckMode::Samples => true,
        CheckMode::SamplesAndPlatforms => check_platforms(header, reporter),
    };

    let patch = ReadGroupPatch {
        sample: (!pass_sm).then_some(aliquot_id),
        platform: (!pass_pl).then_some(ILLUMINA),
    };

    if patch.is_empty() {
        reporter.info("No issues detected. No header written.");
        return HeaderOutcome::Conformant;
    }

    if let Some(sample) = patch.sample {
        reporter.info(&format!(
            "Detected RG problems, will create new header with SM {}",
            sample
        ));
    }
    if let Some(platform) = patch.platform {
        reporter.info(&format!(
            "Detected RG problems, will create new header with PL {}",
            platform
        ));
    }

    HeaderOutcome::Repaired(repair_header(header, &patch))
}

/// Check the read groups of `input` and, only when a problem is found, write a
/// header-only alignment file to `output`.
pub fn run_check_bam_header<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    aliquot_id: &str,
    output: Q,
    mode: CheckMode,
    reporter: &dyn Reporter,
) -> Result<HeaderOutcome> {
    reporter.info("Extracting bam header...");
    let sam_header = read_alignment_header(&input)?;
    let header = Header::from_sam(&sam_header)?;

    let outcome = evaluate_header(&header, aliquot_id, mode, reporter);
    if let HeaderOutcome::Repaired(ref repaired) = outcome {
        let new_header = repaired.to_sam()?;
        write_header_only(&output, &new_header)?;
        reporter.info(&format!(
            "Wrote new header to {}",
            output.as_ref().display()
        ));
    }

    Ok(outcome)
}
