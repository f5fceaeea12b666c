use crate::equiv::Attribute;
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/*
   Workspace definition: the projects to analyze, each naming its
   translation units (files or directories), include path, and read-only
   path prefixes (system headers that renaming must never touch).

   {
     "trigraphs": false,
     "projects": [
       {
         "name": "daemon",
         "units": ["src"],
         "include_paths": ["include"],
         "readonly": ["/usr/include"]
       }
     ]
   }
*/

#[derive(Clone, Debug, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub trigraphs: bool,
    pub projects: Vec<ProjectConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub units: Vec<PathBuf>,
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    #[serde(default)]
    pub readonly: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    TooManyProjects(usize),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(error) => write!(f, "cannot read workspace file: {}", error),
            ConfigError::Parse(error) => write!(f, "malformed workspace file: {}", error),
            ConfigError::TooManyProjects(count) => write!(
                f,
                "{} projects configured, at most {} are supported",
                count,
                Attribute::MAX_PROJECTS
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl WorkspaceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: WorkspaceConfig =
            serde_json::from_str(content).map_err(ConfigError::Parse)?;

        if config.projects.len() > Attribute::MAX_PROJECTS as usize {
            return Err(ConfigError::TooManyProjects(config.projects.len()));
        }

        Ok(config)
    }
}
