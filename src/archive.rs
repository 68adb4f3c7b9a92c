use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use log::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Where a tool's output lives inside a Sanger results archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLocator {
    pub tool: &'static str,
    pub kind: &'static str,
    /// Directory component the member path must contain, e.g. `/brass/`.
    pub marker: &'static str,
    pub suffix: &'static str,
}

impl MemberLocator {
    pub fn index_suffix(&self) -> String {
        format!("{}.tbi", self.suffix)
    }
}

pub const BRASS_VCF: MemberLocator = MemberLocator {
    tool: "brass",
    kind: "vcf",
    marker: "/brass/",
    suffix: ".annot.vcf.gz",
};

pub const BRASS_BEDPE: MemberLocator = MemberLocator {
    tool: "brass",
    kind: "bedpe",
    marker: "/brass/",
    suffix: ".annot.bedpe.gz",
};

pub const CAVEMAN_VCF: MemberLocator = MemberLocator {
    tool: "caveman",
    kind: "vcf",
    marker: "/caveman/",
    suffix: ".flagged.muts.vcf.gz",
};

/// Paths of a data member and its tabix index inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMembers {
    pub data: String,
    pub index: String,
}

/// Open a plain or gzip-compressed tar archive.
pub fn open_archive<P: AsRef<Path>>(path: P) -> Result<tar::Archive<Box<dyn Read>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open results archive {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    let inner: Box<dyn Read> = if is_gzip {
        debug!("{} is gzip compressed", path.display());
        Box::new(MultiGzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    Ok(tar::Archive::new(inner))
}

/// Scan the archive for the data member described by `locator` and its index.
pub fn find_members<P: AsRef<Path>>(path: P, locator: &MemberLocator) -> Result<ArchiveMembers> {
    let path = path.as_ref();
    let index_suffix = locator.index_suffix();
    let mut archive = open_archive(path)?;

    let mut data = None;
    let mut index = None;
    for entry in archive
        .entries()
        .with_context(|| format!("Failed to list {}", path.display()))?
    {
        let entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        if name.contains(locator.marker) {
            if name.ends_with(locator.suffix) {
                info!("Found {} {} key: {}", locator.tool, locator.kind, name);
                data = Some(name);
            } else if name.ends_with(&index_suffix) {
                info!("Found {} {} index key: {}", locator.tool, locator.kind, name);
                index = Some(name);
            }
        }
        if data.is_some() && index.is_some() {
            break;
        }
    }

    let data = data.with_context(|| {
        format!(
            "Unable to find {} {} file in {}",
            locator.tool,
            locator.kind,
            path.display()
        )
    })?;
    let index = index.with_context(|| {
        format!(
            "Unable to find {} {} index file in {}",
            locator.tool,
            locator.kind,
            path.display()
        )
    })?;

    Ok(ArchiveMembers { data, index })
}

/// First member whose path ends with `suffix`.
pub fn find_member_by_suffix<P: AsRef<Path>>(path: P, suffix: &str) -> Result<String> {
    let path = path.as_ref();
    let mut archive = open_archive(path)?;

    for entry in archive.entries()? {
        let entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        if name.ends_with(suffix) {
            info!("Found archive member {}", name);
            return Ok(name);
        }
    }

    anyhow::bail!("Unable to find *{} in {}", suffix, path.display())
}

/// Stream the contents of `member` to `f` without extracting it to disk.
pub fn with_member<P, T, F>(path: P, member: &str, f: F) -> Result<T>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Read) -> Result<T>,
{
    let path = path.as_ref();
    let mut archive = open_archive(path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == member {
            return f(&mut entry)
                .with_context(|| format!("Failed to process {} from {}", member, path.display()));
        }
    }

    anyhow::bail!("Unable to find member {} in {}", member, path.display())
}


#[cfg(test)]
mod tests {
    use super::testing::{write_tar, write_tar_gz};
    use super::*;
    use tempfile::TempDir;

    const MEMBERS: &[(&str, &[u8])] = &[
        ("WGS_x/brass/x.annot.bedpe.gz", b"bedpe"),
        ("WGS_x/brass/x.annot.vcf.gz.tbi", b"tbi"),
        ("WGS_x/brass/x.annot.vcf.gz", b"vcf"),
        ("WGS_x/caveman/x.flagged.muts.vcf.gz", b"caveman"),
        ("WGS_x/ascat/x.samplestatistics.txt", b"Ploidy 2.1\n"),
    ];

    #[test]
    fn test_find_members() -> Result<()> {
        let dir = TempDir::new()?;
        let tar = dir.path().join("results.tar");
        write_tar(&tar, MEMBERS)?;

        let members = find_members(&tar, &BRASS_VCF)?;
        assert_eq!(members.data, "WGS_x/brass/x.annot.vcf.gz");
        assert_eq!(members.index, "WGS_x/brass/x.annot.vcf.gz.tbi");
        Ok(())
    }

    #[test]
    fn test_find_members_missing_index_is_fatal() -> Result<()> {
        let dir = TempDir::new()?;
        let tar = dir.path().join("results.tar");
        write_tar(&tar, MEMBERS)?;

        let err = find_members(&tar, &CAVEMAN_VCF).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Unable to find caveman vcf index file in"));

        let err = find_members(&tar, &BRASS_BEDPE).unwrap_err();
        assert!(err.to_string().contains("brass bedpe index"));
        Ok(())
    }

    #[test]
    fn test_gzip_archive_and_member_stream() -> Result<()> {
        let dir = TempDir::new()?;
        let tar = dir.path().join("results.tar.gz");
        write_tar_gz(&tar, MEMBERS)?;

        let name = find_member_by_suffix(&tar, "samplestatistics.txt")?;
        let contents = with_member(&tar, &name, |reader| {
            let mut s = String::new();
            reader.read_to_string(&mut s)?;
            Ok(s)
        })?;
        assert_eq!(contents, "Ploidy 2.1\n");
        Ok(())
    }

    #[test]
    fn test_missing_member() -> Result<()> {
        let dir = TempDir::new()?;
        let tar = dir.path().join("results.tar");
        write_tar(&tar, MEMBERS)?;

        assert!(find_member_by_suffix(&tar, "copynumber.caveman.csv").is_err());
        assert!(with_member(&tar, "nope", |_| Ok(())).is_err());
        Ok(())
    }
}
