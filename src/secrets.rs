//! # Secrets Gateway
//!
//! A cluster may keep an encrypted secrets file in its target directory. The
//! decrypted values are exposed to `kind: Secret` documents under the
//! `Secrets` context key, and every rendered Secret document is encrypted
//! again before it is written.
//!
//! Encryption and decryption go through the [`Cipher`] trait. The default
//! [`SopsCipher`] shells out to the `sops` binary with an age recipient;
//! tests substitute their own implementation.
//!
//! Encryption is stateless per document. The ciphertext differs on every call
//! (sops uses a fresh data key and IV), so callers must avoid re-encrypting
//! unchanged plaintext; the renderer's incremental skip takes care of that.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::SystemTime;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::filesystem;
use crate::suggestions;
use crate::values::Values;

/// Document fields selected for encryption: Kubernetes Secret payloads.
pub const ENCRYPTED_REGEX: &str = "^(data|stringData)$";

/// Name of the external encryption tool.
pub const SOPS: &str = "sops";

/// One encryption call.
#[derive(Debug, Clone, Copy)]
pub struct EncryptRequest<'a> {
    pub plaintext: &'a [u8],
    /// age recipient (public key)
    pub recipient: &'a str,
    /// Regex restricting which fields are encrypted
    pub encrypted_regex: &'a str,
}

/// Encrypt/decrypt collaborator.
///
/// Implementations must be safe to call concurrently from several cluster
/// tasks.
pub trait Cipher: Send + Sync {
    /// Decrypt the file at `path`, returning the plaintext.
    ///
    /// `format` is the input/output format hint (`yaml`, `json`, ...).
    fn decrypt(&self, path: &Path, format: &str) -> Result<Vec<u8>>;

    /// Encrypt a document, returning the ciphertext.
    fn encrypt(&self, request: &EncryptRequest<'_>) -> Result<Vec<u8>>;
}

/// [`Cipher`] backed by the `sops` command-line tool and age keys.
#[derive(Debug, Clone)]
pub struct SopsCipher {
    binary: String,
}

impl Default for SopsCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl SopsCipher {
    pub fn new() -> Self {
        Self::with_binary(SOPS)
    }

    /// Use a differently named (or absolute) sops binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn resolve(&self) -> Result<PathBuf> {
        which::which(&self.binary).map_err(|e| Error::ToolNotFound {
            tool: self.binary.clone(),
            message: format!("{}\n  {}", e, suggestions::tool_not_found_hint(&self.binary)),
        })
    }

    fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Output> {
        let binary = self.resolve()?;
        debug!("Running {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::filesystem("execute", &binary, e))?;

        // Feed stdin from a separate thread so a large document cannot
        // deadlock against a full stdout pipe.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_vec();
                Some(std::thread::spawn(move || pipe.write_all(&input)))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|e| Error::filesystem("wait for", &binary, e))?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // A tool that exits early closes the pipe; its status reports why.
                Ok(Err(e)) if output.status.success() => {
                    return Err(Error::filesystem("write to", &binary, e));
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    return Err(Error::Encryption {
                        message: "stdin writer thread panicked".to_string(),
                    });
                }
            }
        }
        Ok(output)
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("sops exited with {}", output.status)
    } else {
        format!("sops exited with {}: {}", output.status, stderr)
    }
}

impl Cipher for SopsCipher {
    fn decrypt(&self, path: &Path, format: &str) -> Result<Vec<u8>> {
        let path_arg = path.to_string_lossy();
        let output = self.run(
            &[
                "--decrypt",
                "--input-type",
                format,
                "--output-type",
                format,
                &path_arg,
            ],
            None,
        )?;
        if !output.status.success() {
            return Err(Error::Decryption {
                path: path.to_path_buf(),
                message: failure_message(&output),
            });
        }
        Ok(output.stdout)
    }

    fn encrypt(&self, request: &EncryptRequest<'_>) -> Result<Vec<u8>> {
        let output = self.run(
            &[
                "--encrypt",
                "--age",
                request.recipient,
                "--encrypted-regex",
                request.encrypted_regex,
                "--input-type",
                "yaml",
                "--output-type",
                "yaml",
                "/dev/stdin",
            ],
            Some(request.plaintext),
        )?;
        if !output.status.success() {
            return Err(Error::Encryption {
                message: failure_message(&output),
            });
        }
        Ok(output.stdout)
    }
}

/// Per-cluster secrets state
#[derive(Debug, Clone, Default)]
pub struct SecretsEnvelope {
    /// Recipient for Secret documents of this cluster
    pub age_public_key: Option<String>,
    /// Decrypted values; empty without a secrets file or key
    pub values: Values,
    /// Modification time of the secrets file, if it exists
    pub modified: Option<SystemTime>,
}

impl SecretsEnvelope {
    /// An envelope with no secrets file.
    pub fn empty(age_public_key: Option<String>) -> Self {
        Self {
            age_public_key,
            ..Self::default()
        }
    }
}

/// Load the secrets envelope of a cluster.
///
/// A missing file yields an empty envelope. An existing file always has its
/// modification time recorded; it is decrypted only when `age_public_key`
/// is configured.
pub fn load(
    path: &Path,
    age_public_key: Option<&str>,
    cipher: &dyn Cipher,
) -> Result<SecretsEnvelope> {
    let recipient = age_public_key.map(str::to_string);
    let Some(modified) = filesystem::modified(path)? else {
        trace!("No secrets file at {}", path.display());
        return Ok(SecretsEnvelope::empty(recipient));
    };

    let values = match age_public_key {
        Some(_) => {
            debug!("Decrypting secrets: {}", path.display());
            let plaintext = cipher.decrypt(path, "yaml").map_err(|e| match e {
                e @ (Error::Decryption { .. } | Error::ToolNotFound { .. }) => e,
                other => Error::Decryption {
                    path: path.to_path_buf(),
                    message: other.to_string(),
                },
            })?;
            parse_plaintext(path, &plaintext)?
        }
        None => Values::new(),
    };

    Ok(SecretsEnvelope {
        age_public_key: recipient,
        values,
        modified: Some(modified),
    })
}

fn parse_plaintext(path: &Path, plaintext: &[u8]) -> Result<Values> {
    let malformed = |message: String| Error::Decryption {
        path: path.to_path_buf(),
        message,
    };
    let text = std::str::from_utf8(plaintext)
        .map_err(|e| malformed(format!("decrypted output is not valid UTF-8: {}", e)))?;
    if text.trim().is_empty() {
        return Ok(Values::new());
    }
    serde_yaml::from_str(text)
        .map_err(|e| malformed(format!("decrypted output is not a mapping: {}", e)))
}

/// Encrypt one rendered document for `recipient`.
pub fn encrypt_document(document: &str, recipient: &str, cipher: &dyn Cipher) -> Result<String> {
    let ciphertext = cipher.encrypt(&EncryptRequest {
        plaintext: document.as_bytes(),
        recipient,
        encrypted_regex: ENCRYPTED_REGEX,
    })?;
    String::from_utf8(ciphertext).map_err(|e| Error::Encryption {
        message: format!("ciphertext is not valid UTF-8: {}", e),
    })
}
