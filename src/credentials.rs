use crate::error::SsoError;
use log::info;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// What `openconnect` needs to join the VPN without authenticating again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub cookie: String,
    pub servercert: String,
    /// Informational only; written as a comment.
    pub host: String,
}

impl CredentialBundle {
    pub fn render(&self) -> String {
        format!(
            "cookie={}\nservercert={}\n# host={}\n",
            self.cookie, self.servercert, self.host
        )
    }

    /// Writes the bundle to `path`, readable and writable by the owner only.
    pub fn write_to(&self, path: &Path) -> Result<(), SsoError> {
        let fs_error = |source| SsoError::Filesystem {
            path: path.to_path_buf(),
            source,
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(fs_error)?;

        // `mode` only applies to newly created files; tighten pre-existing ones too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(fs_error)?;
        }

        file.write_all(self.render().as_bytes()).map_err(fs_error)?;
        file.sync_all().map_err(fs_error)?;

        let shown = path.display().to_string();
        info!(file = shown.as_str(); "successfully written authentication details to file");
        Ok(())
    }
}
