use std::io::{BufRead, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use noodles::bgzf;
use tempfile::NamedTempFile;

/// What to do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Keep,
    Replace(String),
    Drop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub written: u64,
    pub dropped: u64,
}

pub(crate) fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// `<prefix>.<suffix>`, e.g. `sample` + `vcf.gz` -> `sample.vcf.gz`.
pub fn output_path(prefix: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{}.{}", prefix, suffix))
}

/// Directory a temporary sibling of `dst` should be created in.
pub(crate) fn parent_dir(dst: &Path) -> &Path {
    match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Temporary sibling of `dst`. On unix it is opened with mode 0666 so the
/// umask decides the final permissions, as with `File::create`.
pub(crate) fn staged_output(dst: &Path) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder
        .tempfile_in(parent_dir(dst))
        .with_context(|| format!("Failed to create temporary file for {}", dst.display()))
}

/// Run `f` against a BGZF writer whose output lands at `dst` only if `f`
/// succeeds. Output is staged in a temporary file next to `dst`.
pub fn write_bgzf_atomic<P, T, F>(dst: P, f: F) -> Result<T>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> Result<T>,
{
    let dst = dst.as_ref();
    let mut staged = staged_output(dst)?;

    let value = {
        let mut writer = bgzf::Writer::new(staged.as_file_mut());
        let value = f(&mut writer)?;
        writer.finish()?;
        value
    };

    staged
        .persist(dst)
        .with_context(|| format!("Failed to write {}", dst.display()))?;
    Ok(value)
}

/// Decompress `src`, pass each line (without its line ending) through
/// `transform`, and write the surviving lines BGZF-compressed to `dst`.
pub fn rewrite_lines<R, P, F>(src: R, dst: P, mut transform: F) -> Result<RewriteSummary>
where
    R: Read,
    P: AsRef<Path>,
    F: FnMut(&str) -> Result<LineAction>,
{
    let mut reader = bgzf::Reader::new(src);

    write_bgzf_atomic(dst, |writer| {
        let mut summary = RewriteSummary::default();
        let mut buf = String::new();

        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                break;
            }
            let line = trim_line_ending(&buf);

            match transform(line)? {
                LineAction::Keep => {
                    writeln!(writer, "{}", line)?;
                    summary.written += 1;
                }
                LineAction::Replace(new_line) => {
                    writeln!(writer, "{}", new_line)?;
                    summary.written += 1;
                }
                LineAction::Drop => summary.dropped += 1,
            }
        }

        Ok(summary)
    })
}
