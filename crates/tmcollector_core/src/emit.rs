use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ScrapingConfig;
use crate::document::{build_document, render_document};
use crate::group::SubjectGroup;
use crate::model::{ApplicationDocument, Subject};

pub const APPLICATION_FILE_SUFFIX: &str = "_application.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitAction {
    Created,
    Updated,
    Unchanged,
}

impl EmitAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub action: EmitAction,
    pub components: usize,
    pub content_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmitReport {
    pub files: Vec<EmittedFile>,
}

impl EmitReport {
    pub fn written(&self) -> usize {
        self.files.len()
    }

    pub fn count(&self, action: EmitAction) -> usize {
        self.files.iter().filter(|file| file.action == action).count()
    }
}

/// `<root>/<subfolder>/<team>/<application>_application.yaml`
pub fn output_path(root: &Path, subfolder: &str, subject: &Subject) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in subfolder.split('/').filter(|segment| !segment.is_empty()) {
        path.push(checked_segment(segment, "output_subfolder")?);
    }
    path.push(checked_segment(&subject.team_name, "team name")?);
    let application = checked_segment(&subject.application_name, "application name")?;
    path.push(format!("{application}{APPLICATION_FILE_SUFFIX}"));
    Ok(path)
}

/// Build, render and write one file per group. Any filesystem error is fatal.
pub fn emit_groups(
    root: &Path,
    groups: &[SubjectGroup],
    config: &ScrapingConfig,
) -> Result<EmitReport> {
    let header = config.header_line();
    let mut report = EmitReport::default();
    for group in groups {
        let document = build_document(
            &group.subject,
            &group.threat_modelings,
            &config.activity_name,
        );
        let path = output_path(root, &config.output_subfolder, &group.subject)?;
        debug!(
            path = %path.display(),
            count = group.threat_modelings.len(),
            "writing application file"
        );
        let (action, content_hash) = write_document(&path, &document, &header)?;
        report.files.push(EmittedFile {
            path,
            action,
            components: group.threat_modelings.len(),
            content_hash,
        });
    }
    Ok(report)
}

/// Full overwrite. A file whose SHA-256 matches the new content is left untouched.
/// Returns the action taken and the SHA-256 of the new content.
pub fn write_document(
    path: &Path,
    document: &ApplicationDocument,
    header_line: &str,
) -> Result<(EmitAction, String)> {
    let rendered = render_document(document, header_line)?;
    let content_hash = compute_hash(rendered.as_bytes());
    ensure_parent_dir(path)?;

    let action = match fs::read(path) {
        Ok(existing) if compute_hash(&existing) == content_hash => {
            return Ok((EmitAction::Unchanged, content_hash));
        }
        Ok(_) => EmitAction::Updated,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => EmitAction::Created,
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    Ok((action, content_hash))
}

fn checked_segment<'a>(segment: &'a str, what: &str) -> Result<&'a str> {
    let mut components = Path::new(segment).components();
    let is_single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if segment.trim().is_empty() || !is_single_normal || segment.contains(['/', '\\']) {
        bail!("{what} `{segment}` cannot be used as a path segment");
    }
    Ok(segment)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))
}

fn compute_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut output = String::with_capacity(64);
    for byte in digest.iter() {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
