//! Config version stamps.
//!
//! The first line of the config file records the ovgen version that wrote
//! it. Comparing that stamp with the running binary decides whether the
//! file needs migrating.

use anyhow::anyhow;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Current application version from Cargo.toml
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
struct SemanticVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl FromStr for SemanticVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut parts = s.trim().split('.');
        let mut next = |name: &str| -> anyhow::Result<u32> {
            let part = parts
                .next()
                .ok_or_else(|| anyhow!("Invalid version '{s}': missing {name} component"))?;
            part.parse::<u32>()
                .map_err(|_| anyhow!("Invalid {name} version: '{part}'"))
        };
        let version = SemanticVersion {
            major: next("major")?,
            minor: next("minor")?,
            patch: next("patch")?,
        };
        if parts.next().is_some() {
            return Err(anyhow!(
                "Invalid version format: '{s}'. Expected 'major.minor.patch'"
            ));
        }
        Ok(version)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Reads the `config_version = "X.Y.Z"` stamp from the first line.
///
/// Returns `None` for a missing file, an empty file, or a first line that is
/// not a stamp (commented-out stamps do not count).
fn read_config_version(config_path: &Path) -> anyhow::Result<Option<String>> {
    if !config_path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(config_path)?;
    let Some(first_line) = content.lines().next() else {
        return Ok(None);
    };

    let regex = Regex::new(r#"^\s*config_version\s*=\s*"([^"]+)""#)?;
    Ok(regex
        .captures(first_line)
        .map(|caps| caps[1].to_string()))
}

/// Returns the stamp of a config file that needs migrating.
///
/// A file needs migrating when it has no stamp or an older one. Missing
/// files and current or newer stamps return `None`.
pub fn check_setup_needed(config_path: &Path) -> anyhow::Result<Option<String>> {
    if !config_path.exists() {
        return Ok(None);
    }

    let Some(config_version) = read_config_version(config_path)? else {
        return Ok(Some("unknown (unversioned config)".to_string()));
    };

    let config_parsed: SemanticVersion = config_version.parse()?;
    let current_parsed: SemanticVersion = CURRENT_VERSION.parse()?;

    match config_parsed.cmp(&current_parsed) {
        Ordering::Less => Ok(Some(config_version)),
        Ordering::Equal => Ok(None),
        Ordering::Greater => {
            tracing::warn!(
                "Config version {} is newer than ovgen {}",
                config_version,
                CURRENT_VERSION
            );
            Ok(None)
        }
    }
}

/// Rewrites the stamp as the first line, keeping everything else.
pub fn update_config_version(config_path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(config_path)?;

    let rest: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().starts_with("config_version"))
        .collect();

    let version_line = format!(r#"config_version = "{}""#, CURRENT_VERSION);
    let new_content = if rest.is_empty() {
        version_line
    } else {
        format!("{}\n{}\n", version_line, rest.join("\n"))
    };

    std::fs::write(config_path, new_content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("ovgen.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_and_orders_versions() {
        let v1: SemanticVersion = "0.0.4".parse().unwrap();
        let v2: SemanticVersion = "0.0.5".parse().unwrap();
        let v3: SemanticVersion = "0.1.0".parse().unwrap();
        assert!(v1 < v2 && v2 < v3);
        assert_eq!(v3.to_string(), "0.1.0");
    }

    #[test]
    fn rejects_malformed_versions() {
        for bad in ["0.0", "0.0.5.1", "invalid", "1.x.0"] {
            assert!(bad.parse::<SemanticVersion>().is_err(), "{bad}");
        }
    }

    #[test]
    fn stamp_must_be_first_and_uncommented() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "  config_version = \"1.2.3\"\nfps = 60\n");
        assert_eq!(read_config_version(&path).unwrap().as_deref(), Some("1.2.3"));

        let path = write(&dir, "# config_version = \"1.2.3\"\n");
        assert_eq!(read_config_version(&path).unwrap(), None);

        let path = write(&dir, "");
        assert_eq!(read_config_version(&path).unwrap(), None);
    }

    #[test]
    fn older_and_missing_stamps_need_setup() {
        let dir = tempfile::tempdir().unwrap();

        let path = write(&dir, "config_version = \"0.0.0\"\n");
        assert_eq!(check_setup_needed(&path).unwrap().as_deref(), Some("0.0.0"));

        let path = write(&dir, "fps = 60\n");
        assert!(check_setup_needed(&path).unwrap().is_some());

        let path = write(&dir, &format!("config_version = \"{CURRENT_VERSION}\"\n"));
        assert_eq!(check_setup_needed(&path).unwrap(), None);

        assert_eq!(check_setup_needed(&dir.path().join("absent.toml")).unwrap(), None);
    }

    #[test]
    fn update_replaces_old_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "fps = 24\nconfig_version = \"0.0.1\"\n[render]\nncols = 2\n");

        update_config_version(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let stamp = format!("config_version = \"{CURRENT_VERSION}\"");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                stamp.as_str(),
                "fps = 24",
                "[render]",
                "ncols = 2",
            ]
        );
    }
}
