use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A required slot of an asset bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleRole {
    Atlas,
    Skeleton,
}

impl fmt::Display for BundleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleRole::Atlas => write!(f, "atlas (.atlas)"),
            BundleRole::Skeleton => write!(f, "skeleton (.json or .skel)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Atlas,
    Skeleton,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStage::Atlas => write!(f, "atlas"),
            ParseStage::Skeleton => write!(f, "skeleton"),
        }
    }
}

/// One file whose read or decode was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub relative_path: String,
    pub reason: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.relative_path, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("incomplete bundle: missing {}", join_roles(.missing))]
    IncompleteBundle { missing: Vec<BundleRole> },

    #[error("failed to read dropped directory {}: {source}", .path.display())]
    Expansion {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} dropped file(s) could not be decoded: {}", .failures.len(), join_failures(.failures))]
    DecodeFailure { failures: Vec<FileFailure> },

    #[error("failed to parse {stage}: {cause:#}")]
    SkeletonParseFailure { stage: ParseStage, cause: anyhow::Error },
}

impl IngestError {
    /// One-line summary suitable for a blocking alert.
    pub fn user_message(&self) -> String {
        match self {
            IngestError::IncompleteBundle { missing } => format!(
                "Drop the atlas, the skeleton and its images together. Missing: {}.",
                join_roles(missing)
            ),
            IngestError::Expansion { path, source } => {
                format!("Could not read the dropped folder {}: {source}.", path.display())
            }
            IngestError::DecodeFailure { failures } => {
                format!("Loading failed for {} file(s): {}.", failures.len(), join_failures(failures))
            }
            IngestError::SkeletonParseFailure { stage, cause } => {
                format!("The {stage} could not be parsed: {cause}.")
            }
        }
    }
}

fn join_roles(roles: &[BundleRole]) -> String {
    roles.iter().map(|role| role.to_string()).collect::<Vec<_>>().join(" and ")
}

fn join_failures(failures: &[FileFailure]) -> String {
    failures.iter().map(|failure| failure.to_string()).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn incomplete_bundle_names_every_missing_role() {
        let err = IngestError::IncompleteBundle { missing: vec![BundleRole::Atlas, BundleRole::Skeleton] };
        let message = err.user_message();
        assert!(message.contains("atlas (.atlas)"));
        assert!(message.contains("skeleton (.json or .skel)"));
    }

    #[test]
    fn decode_failure_summarises_all_files_in_one_message() {
        let err = IngestError::DecodeFailure {
            failures: vec![
                FileFailure { relative_path: "a.png".into(), reason: "bad header".into() },
                FileFailure { relative_path: "b.atlas".into(), reason: "not UTF-8".into() },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 dropped file(s)"), "got {text}");
        assert!(text.contains("a.png (bad header); b.atlas (not UTF-8)"));
    }

    #[test]
    fn parse_failure_keeps_the_cause_chain() {
        let cause = anyhow!("Region not found in atlas: head").context("skin 'default'");
        let err = IngestError::SkeletonParseFailure { stage: ParseStage::Skeleton, cause };
        let text = err.to_string();
        assert!(text.contains("failed to parse skeleton"));
        assert!(text.contains("Region not found in atlas: head"));
    }
}
