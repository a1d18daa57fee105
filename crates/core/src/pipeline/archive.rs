//! Archive creation and verification.
//!
//! Inputs are staged as symlinks in a scratch directory so archivers record
//! short relative member names; tar dereferences them with `-h`, zip
//! follows them by default. Verification failures are reported as
//! [`ConverterError::VerificationFailed`], distinct from creation failures.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::ConversionContext;
use crate::converter::{execute, file_stem, ConvertedArtifact, ConverterError};
use crate::format::{ArchiveFormat, Format};
use crate::options::ArchiveOptions;
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::{Tool, ToolHandle};

/// Name of a bundle made from several inputs.
const BUNDLE_STEM: &str = "Archive";

/// Archiver that creates and tests `format`.
pub fn archiver(format: ArchiveFormat) -> Tool {
    match format {
        ArchiveFormat::Zip => Tool::Zip,
        _ => Tool::Tar,
    }
}

/// Creation arguments, run inside the staging directory.
pub fn create_args(format: ArchiveFormat, level: Option<u8>, output: &Path, members: &[String]) -> Vec<String> {
    let output = output.to_string_lossy().to_string();
    let mut args = Vec::new();
    match format {
        ArchiveFormat::Zip => {
            args.extend(["-r".to_string(), "-q".to_string()]);
            if let Some(level) = level {
                args.push(format!("-{}", level));
            }
            args.push(output);
        }
        _ => match (format.compressor(), level) {
            (Some(compressor), Some(level)) => args.extend([
                "-chf".to_string(),
                output,
                format!("--use-compress-program={} -{}", compressor, level),
            ]),
            _ => {
                let flag = format.tar_flag().map(String::from).unwrap_or_default();
                args.extend([format!("-c{}hf", flag), output]);
            }
        },
    }
    // Keep member names from being read as options
    args.extend(members.iter().map(|m| {
        if m.starts_with('-') {
            format!("./{}", m)
        } else {
            m.clone()
        }
    }));
    args
}

/// Integrity test arguments.
pub fn verify_args(format: ArchiveFormat, archive: &Path) -> Vec<String> {
    let archive = archive.to_string_lossy().to_string();
    match format {
        ArchiveFormat::Zip => vec!["-T".to_string(), archive],
        _ => {
            let flag = format.tar_flag().map(String::from).unwrap_or_default();
            vec![format!("-t{}f", flag), archive]
        }
    }
}

/// Links `inputs` into `staging` under unique names, returning the names.
fn stage(staging: &Path, inputs: &[PathBuf]) -> Result<Vec<String>, ConverterError> {
    let mut used = HashSet::new();
    let mut members = Vec::with_capacity(inputs.len());

    for input in inputs {
        let source = std::fs::canonicalize(input).map_err(|_| ConverterError::InputNotFound {
            path: input.clone(),
        })?;
        let original = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        let mut name = original.clone();
        let mut n = 2;
        while !used.insert(name.clone()) {
            name = match original.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
                _ => format!("{} ({})", original, n),
            };
            n += 1;
        }

        std::os::unix::fs::symlink(&source, staging.join(&name))?;
        members.push(name);
    }
    Ok(members)
}

/// Builds one archive from `inputs` at `output`, verifying it when asked.
#[allow(clippy::too_many_arguments)]
async fn create_one(
    ctx: &ConversionContext,
    handle: &ToolHandle,
    inputs: &[PathBuf],
    output: &Path,
    format: ArchiveFormat,
    options: &ArchiveOptions,
    workspace: &mut JobWorkspace,
    cancel: &CancellationToken,
) -> Result<ConvertedArtifact, ConverterError> {
    let staging = workspace.scratch_dir()?;
    let result = async {
        let members = stage(&staging, inputs)?;
        let mut create = ToolInvocation::new(handle);
        create
            .args(create_args(format, options.effective_level(format), output, &members))
            .current_dir(&staging);
        execute(ctx, &create, Some(Format::Archive(format)), Some(output), cancel).await?;
        Ok::<_, ConverterError>(())
    }
    .await;
    workspace.release(&staging);
    result?;

    if options.verify {
        verify(ctx, handle, output, format, cancel).await?;
    }

    info!(archive = %output.display(), members = inputs.len(), "Archive created");
    ConvertedArtifact::from_output(inputs.to_vec(), output.to_path_buf(), Format::Archive(format))
}

/// Runs the archiver's test mode over `archive`.
pub async fn verify(
    ctx: &ConversionContext,
    handle: &ToolHandle,
    archive: &Path,
    format: ArchiveFormat,
    cancel: &CancellationToken,
) -> Result<(), ConverterError> {
    let mut invocation = ToolInvocation::new(handle);
    invocation.args(verify_args(format, archive));
    let outcome = ctx.processes.run(&invocation, cancel).await?;
    if !outcome.success() {
        return Err(ConverterError::VerificationFailed {
            archive: archive.to_path_buf(),
            stderr: outcome.stderr,
        });
    }
    debug!(archive = %archive.display(), "Archive verified");
    Ok(())
}

/// Archives every input of a request: one bundle, or one archive per input
/// in separate mode.
pub async fn create_archives(
    ctx: &ConversionContext,
    inputs: &[PathBuf],
    format: ArchiveFormat,
    options: &ArchiveOptions,
    workspace: &mut JobWorkspace,
    cancel: &CancellationToken,
) -> Result<Vec<ConvertedArtifact>, ConverterError> {
    let handle = ctx.tools.locate(archiver(format))?;
    let ext = format.id();

    if options.separate {
        let mut artifacts = Vec::with_capacity(inputs.len());
        for input in inputs {
            let output = workspace.output_path(&format!("{}.{}", file_stem(input), ext));
            artifacts.push(
                create_one(
                    ctx,
                    &handle,
                    std::slice::from_ref(input),
                    &output,
                    format,
                    options,
                    workspace,
                    cancel,
                )
                .await?,
            );
        }
        return Ok(artifacts);
    }

    let stem = match inputs {
        [single] => file_stem(single),
        _ => BUNDLE_STEM.to_string(),
    };
    let output = workspace.output_path(&format!("{}.{}", stem, ext));
    let artifact = create_one(ctx, &handle, inputs, &output, format, options, workspace, cancel).await?;
    Ok(vec![artifact])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn members() -> Vec<String> {
        vec!["a.txt".to_string(), "b.txt".to_string()]
    }

    #[test]
    fn test_zip_args() {
        let args = create_args(ArchiveFormat::Zip, Some(9), Path::new("/o/A.zip"), &members());
        assert_eq!(args, ["-r", "-q", "-9", "/o/A.zip", "a.txt", "b.txt"]);

        let args = create_args(ArchiveFormat::Zip, None, Path::new("/o/A.zip"), &["-x.txt".to_string()]);
        assert_eq!(args.last().unwrap(), "./-x.txt");
    }

    #[test]
    fn test_tar_args() {
        let args = create_args(ArchiveFormat::TarGz, None, Path::new("/o/A.tar.gz"), &members());
        assert_eq!(&args[..2], ["-czhf", "/o/A.tar.gz"]);

        let args = create_args(ArchiveFormat::Tar, None, Path::new("/o/A.tar"), &members());
        assert_eq!(args[0], "-chf");

        let args = create_args(ArchiveFormat::TarXz, Some(0), Path::new("/o/A.tar.xz"), &members());
        assert_eq!(args[0], "-chf");
        assert_eq!(args[2], "--use-compress-program=xz -0");
    }

    #[test]
    fn test_verify_args() {
        assert_eq!(verify_args(ArchiveFormat::Zip, Path::new("/a.zip")), ["-T", "/a.zip"]);
        assert_eq!(verify_args(ArchiveFormat::TarBz2, Path::new("/a.tbz")), ["-tjf", "/a.tbz"]);
        assert_eq!(archiver(ArchiveFormat::TarBz2), Tool::Tar);
    }

    #[test]
    fn test_stage_deduplicates_names() {
        let src = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("x")).unwrap();
        std::fs::create_dir_all(src.path().join("y")).unwrap();
        let first = src.path().join("x/notes.txt");
        let second = src.path().join("y/notes.txt");
        std::fs::write(&first, "1").unwrap();
        std::fs::write(&second, "2").unwrap();

        let names = stage(staging.path(), &[first, second]).unwrap();
        assert_eq!(names, ["notes.txt", "notes (2).txt"]);
        assert_eq!(
            std::fs::read_to_string(staging.path().join("notes (2).txt")).unwrap(),
            "2"
        );
    }

    #[test]
    fn test_stage_missing_input() {
        let staging = TempDir::new().unwrap();
        let err = stage(staging.path(), &[PathBuf::from("/nonexistent/file")]).unwrap_err();
        assert!(matches!(err, ConverterError::InputNotFound { .. }));
    }
}
