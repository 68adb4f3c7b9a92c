use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use noodles::bgzf;
use noodles::vcf::{self, variant::io::Write as _, variant::record::AlternateBases as _};

use crate::index::{build_tabix_index, Preset};
use crate::rewrite::staged_output;

const STANDARD_BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub kept: u64,
    pub removed: u64,
}

/// True when every character of every allele is one of A, C, G, T
/// (case-insensitive).
pub fn is_standard<S: AsRef<str>>(alleles: &[S]) -> bool {
    alleles.iter().all(|allele| {
        allele
            .as_ref()
            .bytes()
            .all(|b| STANDARD_BASES.contains(&b.to_ascii_uppercase()))
    })
}

fn alleles(record: &vcf::Record) -> Result<Vec<String>> {
    let mut alleles = vec![record.reference_bases().to_string()];
    for alt in record.alternate_bases().iter() {
        alleles.push(alt?.to_string());
    }
    Ok(alleles)
}

fn filter_records<R, W>(
    reader: &mut vcf::io::Reader<R>,
    header: &vcf::Header,
    writer: &mut vcf::io::Writer<W>,
) -> Result<FilterSummary>
where
    R: BufRead,
    W: Write,
{
    let mut summary = FilterSummary::default();

    for result in reader.records() {
        let record = result?;
        let alleles = alleles(&record)?;

        if is_standard(&alleles) {
            writer.write_variant_record(header, &record)?;
            summary.kept += 1;
        } else {
            let position = match record.variant_start() {
                Some(Ok(position)) => position.to_string(),
                _ => ".".to_string(),
            };
            warn!(
                "Removing {}:{}:{}",
                record.reference_sequence_name(),
                position,
                alleles.join(",")
            );
            summary.removed += 1;
        }
    }

    Ok(summary)
}

/// Hard filter that drops records with non-ACGT alleles. Output ending in
/// `gz` is BGZF-compressed and tabix indexed.
pub fn run_remove_nonstandard_variants<P, Q>(input: P, output: Q) -> Result<FilterSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (input, output) = (input.as_ref(), output.as_ref());
    info!("Processing input VCF file {}...", input.display());

    let mut reader = vcf::io::reader::Builder::default()
        .build_from_path(input)
        .with_context(|| format!("Failed to open VCF {}", input.display()))?;
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read VCF header from {}", input.display()))?;

    let compressed = output.to_string_lossy().ends_with("gz");
    let mut staged = staged_output(output)?;

    let summary = if compressed {
        let mut writer = vcf::io::Writer::new(bgzf::Writer::new(staged.as_file_mut()));
        writer.write_header(&header)?;
        let summary = filter_records(&mut reader, &header, &mut writer)?;
        writer.into_inner().finish()?;
        summary
    } else {
        let mut writer = vcf::io::Writer::new(std::io::BufWriter::new(staged.as_file_mut()));
        writer.write_header(&header)?;
        let summary = filter_records(&mut reader, &header, &mut writer)?;
        writer.into_inner().flush()?;
        summary
    };

    staged
        .persist(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        "Kept {} records, removed {} non-standard records",
        summary.kept, summary.removed
    );

    if compressed {
        build_tabix_index(output, Preset::Vcf)?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::testing::{compress, decompress_file};
    use rstest::rstest;
    use tempfile::TempDir;

    const VCF: &str = concat!(
        "##fileformat=VCFv4.3\n",
        "##contig=<ID=chr1>\n",
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
        "chr1\t10\t.\tA\tC\t.\tPASS\t.\n",
        "chr1\t20\t.\tA\tT,N\t.\tPASS\t.\n",
        "chr1\t30\t.\tg\tt\t.\tPASS\t.\n",
        "chr1\t40\t.\tR\tA\t.\tPASS\t.\n",
        "chr1\t50\t.\tAC\tA\t.\tPASS\t.\n",
    );

    #[rstest]
    #[case(&["A", "C"], true)]
    #[case(&["ACGT", "a"], true)]
    #[case(&["A", "T", "N"], false)]
    #[case(&["A", "<DEL>"], false)]
    #[case(&["A", "*"], false)]
    fn test_is_standard(#[case] alleles: &[&str], #[case] expected: bool) {
        assert_eq!(is_standard(alleles), expected);
    }

    fn data_positions(text: &str) -> Vec<String> {
        text.lines()
            .filter(|line| !line.starts_with('#'))
            .map(|line| line.split('\t').nth(1).unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_remove_nonstandard_plain() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("in.vcf");
        let output = dir.path().join("out.vcf");
        std::fs::write(&input, VCF)?;

        let summary = run_remove_nonstandard_variants(&input, &output)?;

        assert_eq!(summary, FilterSummary { kept: 3, removed: 2 });
        let text = std::fs::read_to_string(&output)?;
        assert!(text.starts_with("##fileformat=VCFv4.3\n"));
        assert_eq!(data_positions(&text), vec!["10", "30", "50"]);
        assert!(!dir.path().join("out.vcf.tbi").exists());
        Ok(())
    }

    #[test]
    fn test_remove_nonstandard_compressed_is_indexed() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("in.vcf.gz");
        let output = dir.path().join("out.vcf.gz");
        std::fs::write(&input, compress(VCF)?)?;

        let summary = run_remove_nonstandard_variants(&input, &output)?;

        assert_eq!(summary.removed, 2);
        assert_eq!(data_positions(&decompress_file(&output)?), vec!["10", "30", "50"]);
        assert!(dir.path().join("out.vcf.gz.tbi").exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_readable_like_created_files() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new()?;
        let input = dir.path().join("in.vcf");
        let output = dir.path().join("out.vcf");
        std::fs::write(&input, VCF)?;

        run_remove_nonstandard_variants(&input, &output)?;

        let created = std::fs::metadata(&input)?.permissions().mode() & 0o777;
        let written = std::fs::metadata(&output)?.permissions().mode() & 0o777;
        assert_eq!(written, created);
        Ok(())
    }
}
