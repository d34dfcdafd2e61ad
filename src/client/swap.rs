use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Suffix of the backup left next to the executable after a swap.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Append a literal suffix to a path, keeping any existing extension.
///
/// `app.exe` becomes `app.exe.bak`, not `app.bak`.
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Replaces the installed executable with a staged file, keeping a backup.
///
/// # Swap sequence
///
/// ```text
/// 1. record permissions of <exe>
/// 2. rename <exe> -> <exe>.bak        (old binary now only at .bak)
/// 3. copy   <staged> -> <exe>         (fresh file, never a rename)
/// 4. apply recorded permissions to <exe>
/// ```
///
/// A failure before step 2 changes nothing. A failure in step 3 or 4 is
/// followed by a restore that *copies* `.bak` back to `<exe>`, so the backup
/// still holds the pre-update bytes whatever happens. Only a crash between
/// steps 2 and 3 leaves `<exe>` missing; `.bak` is then a runnable copy for
/// manual recovery.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap::client::swap::BinarySwap;
/// use std::path::{Path, PathBuf};
///
/// # async fn example() -> anyhow::Result<()> {
/// let swap = BinarySwap::new(PathBuf::from("/opt/app/hotswap-app"));
/// swap.swap_in(Path::new("/opt/app/hotswap-app.new_release")).await?;
/// assert!(swap.backup_exists());
/// # Ok(())
/// # }
/// ```
pub struct BinarySwap {
    /// Path of the installed executable.
    target: PathBuf,
    /// Path where the previous executable is kept.
    backup_path: PathBuf,
}

impl BinarySwap {
    /// Create a swap for `target`; the backup lives at `target` + `.bak`.
    #[must_use]
    pub fn new(target: PathBuf) -> Self {
        let backup_path = with_suffix(&target, BACKUP_SUFFIX);
        Self {
            target,
            backup_path,
        }
    }

    /// Replace the target with the bytes of `staged`.
    ///
    /// # Errors
    ///
    /// Fails if the target is missing, the backup rename fails, or the copy or
    /// permission update fails. In the last two cases the target has already
    /// been restored from the backup (best effort) when this returns.
    pub async fn swap_in(&self, staged: &Path) -> Result<()> {
        let permissions = fs::metadata(&self.target)
            .await
            .with_context(|| format!("Failed to read metadata of {}", self.target.display()))?
            .permissions();

        if fs::try_exists(&self.backup_path).await.unwrap_or(false) {
            debug!("Removing old backup at {:?}", self.backup_path);
            fs::remove_file(&self.backup_path)
                .await
                .context("Failed to remove old backup")?;
        }

        info!("Moving {:?} to {:?}", self.target, self.backup_path);
        fs::rename(&self.target, &self.backup_path)
            .await
            .context("Failed to move current binary to backup")?;

        let placed = async {
            fs::copy(staged, &self.target)
                .await
                .with_context(|| format!("Failed to copy {} into place", staged.display()))?;
            fs::set_permissions(&self.target, permissions)
                .await
                .context("Failed to restore permissions on new binary")?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = placed {
            warn!("Swap failed after backup, restoring previous binary: {e:#}");
            if let Err(restore_err) = self.attempt_restore().await {
                error!(
                    "Could not restore {:?}; previous binary remains at {:?}: {restore_err:#}",
                    self.target, self.backup_path
                );
            }
            return Err(e);
        }

        info!("Installed new binary at {:?}", self.target);
        Ok(())
    }

    /// Restore the target from the backup.
    ///
    /// The backup is copied, not moved, so it survives the rollback.
    /// Retries up to three times, one second apart, for platforms where the
    /// target may be briefly locked.
    ///
    /// # Errors
    ///
    /// Fails if no backup exists or every attempt fails.
    pub async fn rollback(&self) -> Result<()> {
        if !self.backup_exists() {
            bail!("No backup found at {:?}", self.backup_path);
        }

        warn!("Restoring from backup at {:?}", self.backup_path);

        const MAX_ATTEMPTS: u32 = 3;
        let mut attempts = 0;

        while attempts < MAX_ATTEMPTS {
            match self.attempt_restore().await {
                Ok(()) => {
                    info!("Successfully restored from backup");
                    return Ok(());
                }
                Err(e) if attempts < MAX_ATTEMPTS - 1 => {
                    warn!("Restore attempt {} failed: {e}. Retrying...", attempts + 1);
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }

        bail!("Failed to restore backup after {MAX_ATTEMPTS} attempts")
    }

    async fn attempt_restore(&self) -> Result<()> {
        if fs::try_exists(&self.target).await.unwrap_or(false) {
            fs::remove_file(&self.target)
                .await
                .context("Failed to remove partially installed binary")?;
        }

        fs::copy(&self.backup_path, &self.target)
            .await
            .context("Failed to copy backup into place")?;

        let permissions = fs::metadata(&self.backup_path)
            .await
            .context("Failed to read backup metadata")?
            .permissions();
        fs::set_permissions(&self.target, permissions)
            .await
            .context("Failed to restore permissions")?;

        Ok(())
    }

    /// Whether a backup file is present.
    #[must_use]
    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    /// Where the previous binary is kept.
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// The executable being replaced.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }
}
