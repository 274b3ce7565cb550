use crate::error::KeyError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Key pair files written by the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKeyFiles {
    pub public_path: PathBuf,
    pub private_path: PathBuf,
}

/// What the generator is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec<'a> {
    pub domain: &'a str,
    pub flags: u16,
    pub algorithm: &'a str,
    /// Bits; 0 leaves the size to the tool
    pub size: u32,
}

/// External DNSSEC tooling
#[async_trait]
pub trait DnssecTooling: Send + Sync {
    /// Generate one key pair into `out_dir`
    async fn generate(&self, spec: &KeySpec<'_>, out_dir: &Path)
    -> Result<GeneratedKeyFiles, KeyError>;

    /// DS records for the DNSKEY in `public_key`
    async fn ds_from_key(&self, domain: &str, public_key: &str) -> Result<String, KeyError>;
}

/// `dnssec-keygen` and `dnssec-dsfromkey`
#[derive(Debug, Clone)]
pub struct BindDnssecTools {
    keygen: String,
    dsfromkey: String,
}

impl BindDnssecTools {
    pub fn new(keygen: impl Into<String>, dsfromkey: impl Into<String>) -> Self {
        Self {
            keygen: keygen.into(),
            dsfromkey: dsfromkey.into(),
        }
    }
}

fn tool_failed(tool: &str, output: &std::process::Output) -> KeyError {
    KeyError::ToolFailed {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn spawn_failed(tool: &str, err: std::io::Error) -> KeyError {
    KeyError::ToolSpawn {
        tool: tool.to_string(),
        message: err.to_string(),
    }
}

/// Locate the `.key`/`.private` pair in a scratch directory
fn find_key_files(dir: &Path) -> Result<GeneratedKeyFiles, KeyError> {
    let mut public_path = None;
    let mut private_path = None;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("key") => public_path = Some(path),
            Some("private") => private_path = Some(path),
            _ => {}
        }
    }
    Ok(GeneratedKeyFiles {
        public_path: public_path.ok_or(KeyError::MissingOutput(".key"))?,
        private_path: private_path.ok_or(KeyError::MissingOutput(".private"))?,
    })
}

#[async_trait]
impl DnssecTooling for BindDnssecTools {
    async fn generate(
        &self,
        spec: &KeySpec<'_>,
        out_dir: &Path,
    ) -> Result<GeneratedKeyFiles, KeyError> {
        let mut command = Command::new(&self.keygen);
        command.arg("-a").arg(spec.algorithm);
        if spec.size > 0 {
            command.arg("-b").arg(spec.size.to_string());
        }
        if spec.flags & 1 == 1 {
            command.arg("-f").arg("KSK");
        }
        command
            .arg("-K")
            .arg(out_dir)
            .arg("-n")
            .arg("ZONE")
            .arg(spec.domain.trim_end_matches('.'));

        debug!("Generating {} key for {}", spec.flags, spec.domain);
        let output = command
            .output()
            .await
            .map_err(|e| spawn_failed(&self.keygen, e))?;
        if !output.status.success() {
            return Err(tool_failed(&self.keygen, &output));
        }

        find_key_files(out_dir)
    }

    async fn ds_from_key(&self, domain: &str, public_key: &str) -> Result<String, KeyError> {
        let mut child = Command::new(&self.dsfromkey)
            .arg("-f")
            .arg("-")
            .arg(domain.trim_end_matches('.'))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_failed(&self.dsfromkey, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(public_key.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(tool_failed(&self.dsfromkey, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_key_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            find_key_files(dir.path()),
            Err(KeyError::MissingOutput(".key"))
        ));

        std::fs::write(dir.path().join("Kexample.com.+013+12345.key"), "").unwrap();
        std::fs::write(dir.path().join("Kexample.com.+013+12345.private"), "").unwrap();
        let files = find_key_files(dir.path()).unwrap();
        assert!(files.public_path.ends_with("Kexample.com.+013+12345.key"));
        assert!(files.private_path.ends_with("Kexample.com.+013+12345.private"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_spawn_error() {
        let tools = BindDnssecTools::new("/nonexistent/keygen", "/nonexistent/dsfromkey");
        let dir = TempDir::new().unwrap();
        let spec = KeySpec {
            domain: "example.com.",
            flags: 257,
            algorithm: "ECDSAP256SHA256",
            size: 0,
        };
        assert!(matches!(
            tools.generate(&spec, dir.path()).await,
            Err(KeyError::ToolSpawn { .. })
        ));
    }
}
