use indexmap::IndexSet;

use super::model::{Header, HeaderRecord, PLATFORM, READ_GROUP, SAMPLE};
use crate::logging::Reporter;

/// The only sequencing platform accepted downstream.
pub const ILLUMINA: &str = "ILLUMINA";

/// Every read group must carry a non-blank `SM`, and all of them must name the
/// same sample. Zero read groups is not a single sample either.
pub fn check_samples(header: &Header, reporter: &dyn Reporter) -> bool {
    let mut missing = false;
    let mut samples = IndexSet::new();

    for read_group in header.read_groups() {
        match read_group.non_blank(SAMPLE) {
            Some(sample) => {
                samples.insert(sample);
            }
            None => {
                reporter.warn(&format!("Unable to find 'SM' key in RG {}", read_group));
                missing = true;
            }
        }
    }

    if missing {
        return false;
    }

    match samples.len() {
        1 => true,
        0 => {
            reporter.warn("No read groups found in header");
            false
        }
        _ => {
            let samples: Vec<&str> = samples.into_iter().collect();
            reporter.warn(&format!("Multiple sample IDs detected {:?}", samples));
            false
        }
    }
}

/// Every read group must have `PL` set to [`ILLUMINA`].
pub fn check_platforms(header: &Header, reporter: &dyn Reporter) -> bool {
    let mut pass = true;

    for read_group in header.read_groups() {
        match read_group.non_blank(PLATFORM) {
            None => {
                reporter.warn(&format!("Unable to find 'PL' key in RG {}", read_group));
                pass = false;
            }
            Some(platform) if platform != ILLUMINA => {
                reporter.warn(&format!(
                    "Found readgroup with platform != '{}' - {}",
                    ILLUMINA, read_group
                ));
                pass = false;
            }
            Some(_) => {}
        }
    }

    pass
}

/// Overrides applied to every read group when repairing a header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadGroupPatch<'a> {
    pub sample: Option<&'a str>,
    pub platform: Option<&'a str>,
}

impl ReadGroupPatch<'_> {
    pub fn is_empty(&self) -> bool {
        self.sample.is_none() && self.platform.is_none()
    }

    fn apply(&self, read_group: &HeaderRecord) -> HeaderRecord {
        let mut patched = read_group.clone();
        if let Some(sample) = self.sample {
            patched = patched.with_field(SAMPLE, sample);
        }
        if let Some(platform) = self.platform {
            patched = patched.with_field(PLATFORM, platform);
        }
        patched
    }
}

/// Build a new header whose read groups carry the patched fields. All other
/// sections are copied unchanged and read-group order is preserved.
pub fn repair_header(header: &Header, patch: &ReadGroupPatch<'_>) -> Header {
    let mut repaired = Header::default();

    for (kind, records) in header.sections() {
        let records = if kind == READ_GROUP {
            records.iter().map(|rg| patch.apply(rg)).collect()
        } else {
            records.to_vec()
        };
        repaired = repaired.with_section(kind, records);
    }

    header
        .comments()
        .iter()
        .fold(repaired, |h, comment| h.with_comment(comment))
}

/// Force every read group's `SM` to `aliquot_id`.
pub fn build_new_header(header: &Header, aliquot_id: &str) -> Header {
    repair_header(
        header,
        &ReadGroupPatch {
            sample: Some(aliquot_id),
            platform: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::model::REFERENCE_SEQUENCE;
    use crate::logging::testing::RecordingReporter;
    use rstest::rstest;

    fn rg(fields: &[(&str, &str)]) -> HeaderRecord {
        HeaderRecord::from_fields(fields.iter().copied())
    }

    fn header_with_read_groups(read_groups: Vec<HeaderRecord>) -> Header {
        Header::default()
            .with_record(
                REFERENCE_SEQUENCE,
                rg(&[("SN", "chr1"), ("LN", "100")]),
            )
            .with_section(READ_GROUP, read_groups)
    }

    #[test]
    fn test_check_samples_conformant() {
        let header = header_with_read_groups(vec![
            rg(&[("ID", "1"), ("SM", "AB")]),
            rg(&[("ID", "2"), ("SM", "AB")]),
        ]);
        let reporter = RecordingReporter::default();

        assert!(check_samples(&header, &reporter));
        assert!(reporter.warnings().is_empty());
    }

    #[test]
    fn test_check_samples_missing_sample() {
        let header = header_with_read_groups(vec![
            rg(&[("ID", "1"), ("SM", "AB")]),
            rg(&[("ID", "2")]),
        ]);
        let reporter = RecordingReporter::default();

        assert!(!check_samples(&header, &reporter));
        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Unable to find 'SM' key in RG"));
        assert!(warnings[0].contains("ID:2"));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_check_samples_blank_sample(#[case] sample: &str) {
        let header = header_with_read_groups(vec![rg(&[("ID", "1"), ("SM", sample)])]);
        let reporter = RecordingReporter::default();

        assert!(!check_samples(&header, &reporter));
        assert_eq!(reporter.warnings().len(), 1);
    }

    #[test]
    fn test_check_samples_multiple_samples() {
        let header = header_with_read_groups(vec![
            rg(&[("ID", "1"), ("SM", "AB")]),
            rg(&[("ID", "2"), ("SM", "BB")]),
            rg(&[("ID", "3"), ("SM", "AB")]),
        ]);
        let reporter = RecordingReporter::default();

        assert!(!check_samples(&header, &reporter));
        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Multiple sample IDs detected"));
        assert!(warnings[0].contains("\"AB\""));
        assert!(warnings[0].contains("\"BB\""));
    }

    #[test]
    fn test_check_samples_no_read_groups() {
        let header = header_with_read_groups(vec![]);
        let reporter = RecordingReporter::default();

        assert!(!check_samples(&header, &reporter));
        assert_eq!(reporter.warnings(), vec!["No read groups found in header"]);
    }

    #[rstest]
    #[case(&[("ID", "1"), ("PL", "ILLUMINA")], true)]
    #[case(&[("ID", "1"), ("PL", "illumina")], false)]
    #[case(&[("ID", "1"), ("PL", "PACBIO")], false)]
    #[case(&[("ID", "1"), ("PL", " ")], false)]
    #[case(&[("ID", "1")], false)]
    fn test_check_platforms(#[case] fields: &[(&str, &str)], #[case] expected: bool) {
        let header = header_with_read_groups(vec![
            rg(&[("ID", "0"), ("PL", "ILLUMINA")]),
            rg(fields),
        ]);
        let reporter = RecordingReporter::default();

        assert_eq!(check_platforms(&header, &reporter), expected);
        assert_eq!(reporter.warnings().len(), usize::from(!expected));
    }

    #[test]
    fn test_build_new_header() {
        let header = header_with_read_groups(vec![
            rg(&[("ID", "1"), ("SM", "AB")]),
            rg(&[]),
            rg(&[("ID", "3"), ("SM", "BB")]),
        ]);

        let new_header = build_new_header(&header, "XYZ");

        assert_eq!(
            new_header.section(REFERENCE_SEQUENCE),
            header.section(REFERENCE_SEQUENCE)
        );
        assert_eq!(
            new_header.read_groups(),
            [
                rg(&[("ID", "1"), ("SM", "XYZ")]),
                rg(&[("SM", "XYZ")]),
                rg(&[("ID", "3"), ("SM", "XYZ")]),
            ]
        );
        // input untouched
        assert_eq!(header.read_groups()[0].get("SM"), Some("AB"));
    }

    #[test]
    fn test_build_new_header_is_idempotent() {
        let header = header_with_read_groups(vec![
            rg(&[("ID", "1"), ("SM", "AA")]),
            rg(&[("ID", "2"), ("SM", "BB")]),
        ])
        .with_comment("kept");

        let once = build_new_header(&header, "XYZ");
        let twice = build_new_header(&once, "XYZ");

        assert_eq!(once, twice);
        assert_eq!(twice.comments(), ["kept"]);
    }

    #[test]
    fn test_repair_header_platform_only() {
        let header = header_with_read_groups(vec![rg(&[
            ("ID", "1"),
            ("SM", "AB"),
            ("PL", "PACBIO"),
        ])]);

        let patch = ReadGroupPatch {
            sample: None,
            platform: Some(ILLUMINA),
        };
        let repaired = repair_header(&header, &patch);

        assert_eq!(
            repaired.read_groups(),
            [rg(&[("ID", "1"), ("SM", "AB"), ("PL", "ILLUMINA")])]
        );
    }
}
