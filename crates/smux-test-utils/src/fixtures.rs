use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temp-dir backed fixtures; spawn targets are executable shell scripts.
pub struct TestFixtures {
    temp_dir: TempDir,
}

impl TestFixtures {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Write an executable script usable as a multiplexer spawn target.
    pub fn create_test_script(&self, name: &str, content: &str) -> Result<PathBuf> {
        let script_path = self.temp_dir.path().join(name);
        std::fs::write(&script_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&script_path)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&script_path, perms)?;
        }

        Ok(script_path)
    }

    /// A target that consumes stdin forever; sessions stay alive until
    /// closed.
    pub fn cat_target(&self) -> Result<PathBuf> {
        self.create_test_script("cat-target", "#!/bin/sh\nexec cat\n")
    }

    /// A target that exits immediately with the given status.
    pub fn exit_target(&self, status: i32) -> Result<PathBuf> {
        self.create_test_script("exit-target", &format!("#!/bin/sh\nexit {status}\n"))
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}
