use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::archive::{find_member_by_suffix, with_member};

const COPYNUMBER_SUFFIX: &str = "copynumber.caveman.csv";
const STATISTICS_SUFFIX: &str = "samplestatistics.txt";

const COPYNUMBER_COLUMNS: [&str; 7] = [
    "GDC_Aliquot",
    "Chromosome",
    "Start",
    "End",
    "Copy_Number",
    "Major_Copy_Number",
    "Minor_Copy_Number",
];

/// One GDC copy-number segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyNumberRecord {
    pub aliquot: String,
    pub chromosome: String,
    pub start: String,
    pub end: String,
    pub copy_number: i64,
    pub major_copy_number: i64,
    pub minor_copy_number: i64,
}

impl CopyNumberRecord {
    /// Build from a row of the ASCAT caveman copy-number CSV: segment id,
    /// chromosome, start, end, normal total, normal minor, tumour total,
    /// tumour minor.
    pub fn from_ascat(aliquot: &str, row: &csv::StringRecord) -> Result<Self> {
        let field = |i: usize| {
            row.get(i)
                .with_context(|| format!("Copy number row has no column {}: {:?}", i, row))
        };
        let parse = |i: usize| -> Result<i64> {
            let value = field(i)?;
            value
                .trim()
                .parse()
                .with_context(|| format!("Invalid copy number '{}'", value))
        };

        let copy_number = parse(6)?;
        let minor_copy_number = parse(7)?;
        Ok(Self {
            aliquot: aliquot.to_string(),
            chromosome: format!("chr{}", field(1)?),
            start: field(2)?.to_string(),
            end: field(3)?.to_string(),
            copy_number,
            major_copy_number: copy_number - minor_copy_number,
            minor_copy_number,
        })
    }
}

/// Tumour purity and ploidy from the ASCAT sample statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AscatStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tumor_purity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ploidy: Option<f64>,
}

impl AscatStats {
    /// Parse `key value` lines; keys other than `NormalContamination` and
    /// `Ploidy` are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut stats = Self::default();
        for line in reader.lines() {
            let line = line?;
            let mut fields = line.trim().split(' ');
            let key = fields.next().unwrap_or_default();
            let mut value = || -> Result<f64> {
                let value = fields.next().unwrap_or_default();
                value
                    .parse()
                    .with_context(|| format!("Invalid {} value '{}'", key, value))
            };
            match key {
                "NormalContamination" => stats.tumor_purity = Some(1.0 - value()?),
                "Ploidy" => stats.ploidy = Some(value()?),
                _ => {}
            }
        }
        Ok(stats)
    }
}

fn copy_number_rows(reader: &mut dyn Read, aliquot: &str) -> Result<Vec<CopyNumberRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        records.push(CopyNumberRecord::from_ascat(aliquot, &row)?);
    }
    Ok(records)
}

/// Write the ASCAT copy-number segments of `archive` as a GDC TSV.
pub fn reformat_copynumber<P, Q>(archive: P, output: Q, aliquot: &str) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (archive, output) = (archive.as_ref(), output.as_ref());
    let member = find_member_by_suffix(archive, COPYNUMBER_SUFFIX)?;
    let records = with_member(archive, &member, |reader| copy_number_rows(reader, aliquot))?;

    let file = File::create(output)
        .with_context(|| format!("Couldn't create output file: {}", output.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    writer.write_record(COPYNUMBER_COLUMNS)?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("Wrote {} segments to {}", records.len(), output.display());
    Ok(records.len())
}

pub fn extract_stats<P: AsRef<Path>>(archive: P) -> Result<AscatStats> {
    let archive = archive.as_ref();
    let member = find_member_by_suffix(archive, STATISTICS_SUFFIX)?;
    with_member(archive, &member, |reader| {
        AscatStats::from_reader(BufReader::new(reader))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::testing::write_tar;
    use rstest::rstest;
    use tempfile::TempDir;

    const COPYNUMBER: &str = "1,1,10001,2000000,2,1,3,1\n2,X,1,500,2,1,0,0\n";
    const STATISTICS: &str = concat!(
        "NormalContamination 0.25\n",
        "Ploidy 3.1\n",
        "rho 0.75\n",
        "GenderChr Y\n",
    );

    fn archive(dir: &TempDir) -> Result<std::path::PathBuf> {
        let path = dir.path().join("results.tar");
        let members: [(&str, &[u8]); 2] = [
            ("WGS_x/ascat/x.copynumber.caveman.csv", COPYNUMBER.as_bytes()),
            ("WGS_x/ascat/x.samplestatistics.txt", STATISTICS.as_bytes()),
        ];
        write_tar(&path, &members)?;
        Ok(path)
    }

    #[test]
    fn test_from_ascat() -> Result<()> {
        let row = csv::StringRecord::from(vec!["1", "1", "10001", "2000000", "2", "1", "3", "1"]);
        let record = CopyNumberRecord::from_ascat("aliquot", &row)?;
        assert_eq!(record.chromosome, "chr1");
        assert_eq!(record.copy_number, 3);
        assert_eq!(record.major_copy_number, 2);
        assert_eq!(record.minor_copy_number, 1);
        Ok(())
    }

    #[rstest]
    #[case(vec!["1", "1", "10", "20"])]
    #[case(vec!["1", "1", "10", "20", "2", "1", "x", "1"])]
    fn test_from_ascat_bad_row(#[case] fields: Vec<&str>) {
        let row = csv::StringRecord::from(fields);
        assert!(CopyNumberRecord::from_ascat("aliquot", &row).is_err());
    }

    #[test]
    fn test_reformat_copynumber() -> Result<()> {
        let dir = TempDir::new()?;
        let archive = archive(&dir)?;
        let output = dir.path().join("out.tsv");

        assert_eq!(reformat_copynumber(&archive, &output, "gdc-1")?, 2);

        let text = std::fs::read_to_string(&output)?;
        assert_eq!(
            text,
            concat!(
                "GDC_Aliquot\tChromosome\tStart\tEnd\tCopy_Number\tMajor_Copy_Number\tMinor_Copy_Number\n",
                "gdc-1\tchr1\t10001\t2000000\t3\t2\t1\n",
                "gdc-1\tchrX\t1\t500\t0\t0\t0\n",
            )
        );
        Ok(())
    }

    #[test]
    fn test_extract_stats() -> Result<()> {
        let dir = TempDir::new()?;
        let stats = extract_stats(archive(&dir)?)?;
        assert_eq!(stats.tumor_purity, Some(0.75));
        assert_eq!(stats.ploidy, Some(3.1));
        assert_eq!(serde_json::to_string(&stats)?, r#"{"tumor_purity":0.75,"ploidy":3.1}"#);
        Ok(())
    }

    #[test]
    fn test_stats_omit_missing_keys() -> Result<()> {
        let stats = AscatStats::from_reader("Ploidy 2\n".as_bytes())?;
        assert_eq!(serde_json::to_string(&stats)?, r#"{"ploidy":2.0}"#);
        Ok(())
    }

    #[test]
    fn test_missing_member_is_fatal() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty.tar");
        write_tar(&path, &[])?;
        assert!(extract_stats(&path).is_err());
        Ok(())
    }
}
