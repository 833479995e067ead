//! Figure output location.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PlotError;

/// Environment variable naming the root under which `figures/` is written.
pub const FIGURES_ROOT_VAR: &str = "NLDS_FIGURES_ROOT";

/// Where figures are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureConfig {
    dir: PathBuf,
}

impl FigureConfig {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        FigureConfig { dir: dir.into() }
    }

    /// `$NLDS_FIGURES_ROOT/figures` when the variable is set, `../figures` otherwise.
    pub fn from_env() -> Self {
        match env::var_os(FIGURES_ROOT_VAR) {
            Some(root) => FigureConfig::new(Path::new(&root).join("figures")),
            None => FigureConfig::new("../figures"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the figure file `name`, creating the figure directory if missing.
    pub fn figure_path(&self, name: &str) -> Result<PathBuf, PlotError> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(name))
    }
}

impl Default for FigureConfig {
    fn default() -> Self {
        FigureConfig::from_env()
    }
}
