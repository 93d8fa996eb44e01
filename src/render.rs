//! # Template Renderer
//!
//! Renders one template file into its target file.
//!
//! ## File classes
//!
//! - **Text** (anything that is not `.yaml`/`.yml`): rendered on every run and
//!   overwritten in full.
//! - **YAML**: skipped when the target is newer than the template, the
//!   configuration file and the secrets file (when there is one). Otherwise
//!   the file is split into documents and each document is rendered on its
//!   own. Documents with a literal `kind: Secret` get the decrypted secrets
//!   under the `Secrets` key and are encrypted after rendering.
//!
//! The `kind` of a document is read from the raw template, before any
//! templating. A templated `kind` is not recognized and such a document is
//! never encrypted.
//!
//! Writes are atomic. In dry-run mode nothing is written; any difference
//! between the rendered output and the existing target is reported as
//! [`Error::DryRunViolation`].

use std::path::Path;
use std::time::SystemTime;

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::filesystem;
use crate::path::relative_display;
use crate::secrets::{self, Cipher, SecretsEnvelope};
use crate::template::TemplateEngine;
use crate::values::{self, Values};

/// Document separator used when joining rendered documents.
pub const DOCUMENT_SEPARATOR: &str = "---\n";

const SECRET_KIND: &str = "Secret";

/// Result of rendering one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The target was (or in dry-run, would be left) written
    Written,
    /// Dry-run only: the rendered output equals the existing target
    Unchanged,
    /// The target is newer than every input
    Skipped,
}

/// Renders template files against a context
pub struct Renderer<'a> {
    engine: &'a dyn TemplateEngine,
    cipher: &'a dyn Cipher,
    dry_run: bool,
}

impl<'a> Renderer<'a> {
    pub fn new(engine: &'a dyn TemplateEngine, cipher: &'a dyn Cipher, dry_run: bool) -> Self {
        Self {
            engine,
            cipher,
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Render `template_file` into `target_file`.
    pub fn render(
        &self,
        template_file: &Path,
        target_file: &Path,
        context: &Values,
        secrets: &SecretsEnvelope,
        config_modified: SystemTime,
    ) -> Result<RenderOutcome> {
        if !is_yaml(template_file) {
            return self.render_text(template_file, target_file, context);
        }

        if is_fresh(template_file, target_file, config_modified, secrets.modified)? {
            debug!("Up to date: {}", relative_display(target_file));
            return Ok(RenderOutcome::Skipped);
        }

        let name = relative_display(template_file);
        let source = filesystem::read_to_string(template_file)?;

        let mut rendered = Vec::new();
        let mut has_secret = false;
        for document in split_documents(&source) {
            if sniff_kind(document).as_deref() == Some(SECRET_KIND) {
                has_secret = true;
                rendered.push(self.render_secret(&name, document, context, secrets)?);
            } else {
                rendered.push(self.engine.render(&name, document, context)?);
            }
        }
        let output = join_documents(&rendered);

        if self.dry_run {
            if has_secret {
                return Err(Error::dry_run(
                    target_file,
                    "would be re-rendered and its secrets re-encrypted",
                ));
            }
            return compare(target_file, output.as_bytes());
        }

        debug!("Rendering {} -> {}", name, relative_display(target_file));
        filesystem::write_atomic(target_file, output.as_bytes())?;
        Ok(RenderOutcome::Written)
    }

    fn render_text(
        &self,
        template_file: &Path,
        target_file: &Path,
        context: &Values,
    ) -> Result<RenderOutcome> {
        let name = relative_display(template_file);
        let source = filesystem::read_to_string(template_file)?;
        let output = self.engine.render(&name, &source, context)?;

        if self.dry_run {
            return compare(target_file, output.as_bytes());
        }
        if filesystem::read_optional(target_file)?.as_deref() == Some(output.as_bytes()) {
            return Ok(RenderOutcome::Unchanged);
        }
        debug!("Rendering {} -> {}", name, relative_display(target_file));
        filesystem::write_atomic(target_file, output.as_bytes())?;
        Ok(RenderOutcome::Written)
    }

    /// Render a Secret document; in dry-run the plaintext is returned unencrypted.
    fn render_secret(
        &self,
        name: &str,
        document: &str,
        context: &Values,
        secrets: &SecretsEnvelope,
    ) -> Result<String> {
        let Some(recipient) = secrets.age_public_key.as_deref() else {
            return Err(Error::Configuration {
                message: format!(
                    "secret templated but no recipient key: {} contains a kind: Secret document and the cluster has no age_public_key",
                    name
                ),
            });
        };

        let secret_context = values::with_secrets(context, &secrets.values);
        let plaintext = self.engine.render(name, document, &secret_context)?;
        if self.dry_run {
            return Ok(plaintext);
        }
        secrets::encrypt_document(&plaintext, recipient, self.cipher)
    }
}

/// True for `.yaml` and `.yml` files, case-insensitive
pub fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

/// True when `target` is strictly newer than every input
fn is_fresh(
    template: &Path,
    target: &Path,
    config_modified: SystemTime,
    secrets_modified: Option<SystemTime>,
) -> Result<bool> {
    let Some(target_modified) = filesystem::modified(target)? else {
        return Ok(false);
    };
    let Some(template_modified) = filesystem::modified(template)? else {
        return Ok(false);
    };

    Ok(target_modified > template_modified
        && target_modified > config_modified
        && secrets_modified.map_or(true, |s| target_modified > s))
}

fn is_separator(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("---") else {
        return false;
    };
    let rest = rest.trim();
    rest.is_empty() || rest.starts_with('#')
}

/// Split a YAML stream into its documents, in order.
///
/// Documents that are empty or whitespace-only are dropped.
pub fn split_documents(source: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut position = 0;

    for line in source.split_inclusive('\n') {
        if is_separator(line.trim_end_matches(['\r', '\n'])) {
            documents.push(&source[start..position]);
            start = position + line.len();
        }
        position += line.len();
    }
    documents.push(&source[start..]);

    documents
        .into_iter()
        .filter(|d| !d.trim().is_empty())
        .collect()
}

/// Join rendered documents, terminating each with a newline.
pub fn join_documents(documents: &[String]) -> String {
    let mut output = String::new();
    for (i, document) in documents.iter().enumerate() {
        if i > 0 {
            output.push_str(DOCUMENT_SEPARATOR);
        }
        output.push_str(document);
        if !document.ends_with('\n') {
            output.push('\n');
        }
    }
    output
}

#[derive(Deserialize)]
struct KindProbe {
    kind: Option<serde_yaml::Value>,
}

/// Read the literal top-level `kind` of a raw (unrendered) document.
pub fn sniff_kind(document: &str) -> Option<String> {
    // Templates are usually not valid YAML; fall back to a line scan.
    match serde_yaml::from_str::<KindProbe>(document) {
        Ok(probe) => probe.kind.and_then(|k| k.as_str().map(str::to_string)),
        Err(_) => scan_kind(document),
    }
}

fn scan_kind(document: &str) -> Option<String> {
    document.lines().find_map(|line| {
        let value = line.strip_prefix("kind:")?;
        let value = value.split(" #").next().unwrap_or(value).trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(value.to_string())
        } else {
            None
        }
    })
}

fn compare(target: &Path, output: &[u8]) -> Result<RenderOutcome> {
    match filesystem::read_optional(target)? {
        Some(existing) if existing == output => Ok(RenderOutcome::Unchanged),
        Some(_) => Err(Error::dry_run(target, "would be modified")),
        None => Err(Error::dry_run(target, "would be created")),
    }
}
