// # File Binding Store
//
// File-based implementation of BindingStore, one file per key.
//
// ## Layout
//
// ```text
// <root>/
//   tokens/
//     3f2a…e901        contains "myhost"
//   hostnames/
//     myhost           empty marker
// ```
//
// ## Durability
//
// - Atomic writes: values are written to a temporary file in the same
//   directory, flushed, then renamed over the key
// - Keys are always validated tokens or hostnames, so no key can contain a
//   path separator or `..`
// - No locking: two halves of a binding are independent files

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::Error;
use crate::traits::binding_store::BindingStore;
use crate::validate::{Hostname, Token, validate_hostname, validate_token_format};

/// Token namespace directory
const TOKENS_DIR: &str = "tokens";

/// Hostname marker namespace directory
const HOSTNAMES_DIR: &str = "hostnames";

/// File-based binding store
///
/// # Example
///
/// ```rust,no_run
/// use dynbind_core::store::FileBindingStore;
/// use dynbind_core::traits::BindingStore;
/// use dynbind_core::validate::validate_hostname;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileBindingStore::open("/var/lib/dynbind").await?;
///
///     let hostname = validate_hostname("myhost")?;
///     let token = store.create(&hostname).await?;
///
///     assert_eq!(store.lookup(token.as_str()).await?, hostname);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileBindingStore {
    tokens: PathBuf,
    hostnames: PathBuf,
}

impl FileBindingStore {
    /// Open a store rooted at `root`, creating both namespaces if needed
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref();
        let tokens = root.join(TOKENS_DIR);
        let hostnames = root.join(HOSTNAMES_DIR);

        for dir in [&tokens, &hostnames] {
            fs::create_dir_all(dir).await.map_err(|e| {
                Error::storage(format!(
                    "Failed to create store directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        tracing::debug!("Opened file binding store at {}", root.display());
        Ok(Self { tokens, hostnames })
    }

    fn token_path(&self, token: &Token) -> PathBuf {
        self.tokens.join(token.as_str())
    }

    fn hostname_path(&self, hostname: &Hostname) -> PathBuf {
        self.hostnames.join(hostname.as_str())
    }

    /// Write `contents` to `path` via a temporary file and rename
    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
        let temp_path = Self::temp_path(path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::storage(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(contents).await.map_err(|e| {
                Error::storage(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::storage(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::storage(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )));
        }

        tracing::trace!("Wrote {}", path.display());
        Ok(())
    }

    async fn token_exists(&self, token: &Token) -> Result<bool, Error> {
        let path = self.token_path(token);
        fs::try_exists(&path).await.map_err(|e| {
            Error::storage(format!("Failed to stat {}: {}", path.display(), e))
        })
    }

    /// Unique temporary sibling of `path`
    ///
    /// The leading dot keeps it outside both key alphabets.
    fn temp_path(path: &Path) -> PathBuf {
        let mut suffix = [0u8; 4];
        OsRng.fill_bytes(&mut suffix);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.tmp", name, hex::encode(suffix)))
    }
}

#[async_trait]
impl BindingStore for FileBindingStore {
    async fn create(&self, hostname: &Hostname) -> Result<Token, Error> {
        let mut token = Token::generate();
        while self.token_exists(&token).await? {
            tracing::warn!("Generated token collided with an existing one, regenerating");
            token = Token::generate();
        }

        Self::write_atomic(&self.token_path(&token), hostname.as_str().as_bytes()).await?;
        Self::write_atomic(&self.hostname_path(hostname), b"").await?;

        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Hostname, Error> {
        let token = validate_token_format(token).map_err(|_| Error::UnknownToken)?;
        let path = self.token_path(&token);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::UnknownToken),
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        validate_hostname(content.trim()).map_err(|_| {
            Error::storage(format!(
                "Token entry {} does not hold a valid hostname",
                path.display()
            ))
        })
    }

    async fn delete(&self, token: &str) -> Result<(), Error> {
        let token = validate_token_format(token).map_err(|_| Error::UnknownToken)?;
        let path = self.token_path(&token);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::UnknownToken),
            Err(e) => Err(Error::storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn restore(&self, token: &Token, hostname: &Hostname) -> Result<(), Error> {
        Self::write_atomic(&self.token_path(token), hostname.as_str().as_bytes()).await
    }

    async fn exists_hostname(&self, hostname: &Hostname) -> Result<bool, Error> {
        let path = self.hostname_path(hostname);
        fs::try_exists(&path).await.map_err(|e| {
            Error::storage(format!("Failed to stat {}: {}", path.display(), e))
        })
    }

    async fn remove_hostname(&self, hostname: &Hostname) -> Result<(), Error> {
        let path = self.hostname_path(hostname);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::UnknownHostname(hostname.to_string()))
            }
            Err(e) => Err(Error::storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
