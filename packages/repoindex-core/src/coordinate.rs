//! Artifact coordinates and the canonical UINFO key.
//!
//! A repository path `g1/g2/.../a/v/a-v[-c].e` is parsed back into its
//! coordinate. Timestamped snapshot files (`a-1.0-20260101.120000-1.jar`
//! inside a `1.0-SNAPSHOT` directory) resolve to their exact file version;
//! `base_version` folds them onto `1.0-SNAPSHOT` for grouping. The UINFO
//! key keeps the exact version.

use crate::record::{FS, NA};

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

// Extensions that contain a dot themselves and would defeat a plain
// rsplit on '.'.
const COMPOUND_EXTENSIONS: &[&str] = &["tar.gz", "tar.bz2", "tar.xz"];

/// Full artifact coordinate: groupId, artifactId, version, optional
/// classifier, extension. The extension is whatever the file carried;
/// it is never defaulted at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl Coordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: Option<String>,
        extension: impl Into<String>,
    ) -> Coordinate {
        Coordinate {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier,
            extension: extension.into(),
        }
    }

    /// Parse a repository-relative file path. Returns `None` for anything
    /// that is not an artifact file: too-short paths, hidden files,
    /// checksum/signature siblings, repository metadata, or filenames that
    /// do not belong to the enclosing artifact/version directories.
    pub fn from_repository_path(path: &str) -> Option<Coordinate> {
        let normalized = path.replace('\\', "/");
        let parts: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() < 4 {
            return None;
        }

        let file_name = parts[parts.len() - 1];
        if file_name.starts_with('.') || is_metadata_file(file_name) || is_checksum_file(file_name) {
            return None;
        }

        let version_dir = parts[parts.len() - 2];
        let artifact_id = parts[parts.len() - 3];
        let group_id = parts[..parts.len() - 3].join(".");

        let rest = file_name.strip_prefix(artifact_id)?.strip_prefix('-')?;

        let (version, after) = match rest.strip_prefix(version_dir) {
            Some(after) => (version_dir.to_string(), after),
            None => {
                // A snapshot directory may hold timestamped file versions.
                let base = version_dir.strip_suffix("SNAPSHOT")?;
                let tail = rest.strip_prefix(base)?;
                let len = timestamped_snapshot_len(tail)?;
                (format!("{}{}", base, &tail[..len]), &tail[len..])
            }
        };

        let (stem, extension) = split_extension(after)?;
        let classifier = match stem {
            "" => None,
            s => Some(s.strip_prefix('-')?.to_string()),
        };
        if classifier.as_deref() == Some("") {
            return None;
        }

        Some(Coordinate::new(group_id, artifact_id, version, classifier, extension))
    }

    /// Rebuild a coordinate from its UINFO key.
    pub fn from_uinfo(uinfo: &str) -> Option<Coordinate> {
        let parts: Vec<&str> = uinfo.split(FS).collect();
        if parts.len() != 5 {
            return None;
        }
        let classifier = match parts[3] {
            NA => None,
            c => Some(c.to_string()),
        };
        Some(Coordinate::new(parts[0], parts[1], parts[2], classifier, parts[4]))
    }

    /// The canonical unique key: `g|a|v|c|e`, `NA` standing in for an
    /// absent classifier. Case-sensitive and stable across time.
    pub fn uinfo(&self) -> String {
        format!(
            "{}{FS}{}{FS}{}{FS}{}{FS}{}",
            self.group_id,
            self.artifact_id,
            self.version,
            self.classifier.as_deref().unwrap_or(NA),
            self.extension,
        )
    }

    /// Timestamped snapshot versions fold back onto `<base>-SNAPSHOT`;
    /// everything else is returned untouched.
    pub fn base_version(&self) -> String {
        base_version_of(&self.version)
    }

    pub fn is_snapshot(&self) -> bool {
        self.base_version().ends_with(SNAPSHOT_SUFFIX)
    }
}

pub fn base_version_of(version: &str) -> String {
    if version.ends_with(SNAPSHOT_SUFFIX) {
        return version.to_string();
    }
    // <base>-<yyyyMMdd.HHmmss>-<build>
    if let Some(idx) = version.rfind('-') {
        let build_ok = !version[idx + 1..].is_empty()
            && version[idx + 1..].bytes().all(|b| b.is_ascii_digit());
        if build_ok {
            if let Some(ts_idx) = version[..idx].rfind('-') {
                let ts = &version[ts_idx + 1..idx];
                if is_snapshot_timestamp(ts) {
                    return format!("{}{}", &version[..ts_idx], SNAPSHOT_SUFFIX);
                }
            }
        }
    }
    version.to_string()
}

fn is_metadata_file(file_name: &str) -> bool {
    file_name == "maven-metadata.xml"
}

fn is_checksum_file(file_name: &str) -> bool {
    file_name.ends_with(".sha1") || file_name.ends_with(".md5") || file_name.ends_with(".asc")
}

/// Length of a leading `yyyyMMdd.HHmmss-<build>` run, if present.
fn timestamped_snapshot_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.len() < 17 || !is_snapshot_timestamp(s.get(..15)?) {
        return None;
    }
    if bytes[15] != b'-' {
        return None;
    }
    let mut end = 16;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == 16 {
        return None;
    }
    Some(end)
}

fn is_snapshot_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 15
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'.'
        && bytes[9..].iter().all(u8::is_ascii_digit)
}

/// Split `[-classifier].extension` off the remainder that follows the
/// version. Compound extensions like `tar.gz` are kept whole.
fn split_extension(after: &str) -> Option<(&str, String)> {
    for compound in COMPOUND_EXTENSIONS {
        if let Some(stem) = after.strip_suffix(compound) {
            let stem = stem.strip_suffix('.')?;
            return Some((stem, compound.to_string()));
        }
    }
    let dot = after.rfind('.')?;
    let extension = &after[dot + 1..];
    if extension.is_empty() {
        return None;
    }
    Some((&after[..dot], extension.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_artifact() {
        let c = Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.jar").unwrap();
        assert_eq!(c.group_id, "org.ex");
        assert_eq!(c.artifact_id, "a");
        assert_eq!(c.version, "1.0");
        assert_eq!(c.classifier, None);
        assert_eq!(c.extension, "jar");
        assert_eq!(c.uinfo(), "org.ex|a|1.0|NA|jar");
    }

    #[test]
    fn test_parse_classifier() {
        let c = Coordinate::from_repository_path("org/ex/a/1.0/a-1.0-sources.jar").unwrap();
        assert_eq!(c.classifier.as_deref(), Some("sources"));
        assert_eq!(c.uinfo(), "org.ex|a|1.0|sources|jar");
    }

    #[test]
    fn test_parse_compound_extension() {
        let c = Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.tar.gz").unwrap();
        assert_eq!(c.extension, "tar.gz");
        assert_eq!(c.classifier, None);
    }

    #[test]
    fn test_parse_pom() {
        let c = Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.pom").unwrap();
        assert_eq!(c.extension, "pom");
    }

    #[test]
    fn test_parse_timestamped_snapshot() {
        let c = Coordinate::from_repository_path(
            "org/ex/a/1.0-SNAPSHOT/a-1.0-20260101.120000-1.jar",
        )
        .unwrap();
        assert_eq!(c.version, "1.0-20260101.120000-1");
        assert_eq!(c.base_version(), "1.0-SNAPSHOT");
    }

    #[test]
    fn test_parse_literal_snapshot() {
        let c =
            Coordinate::from_repository_path("org/ex/a/1.0-SNAPSHOT/a-1.0-SNAPSHOT.jar").unwrap();
        assert_eq!(c.version, "1.0-SNAPSHOT");
        assert_eq!(c.base_version(), "1.0-SNAPSHOT");
        assert!(c.is_snapshot());
    }

    #[test]
    fn test_snapshot_grouping_keeps_exact_uinfo() {
        let literal =
            Coordinate::from_repository_path("org/ex/a/1.0-SNAPSHOT/a-1.0-SNAPSHOT.jar").unwrap();
        let stamped = Coordinate::from_repository_path(
            "org/ex/a/1.0-SNAPSHOT/a-1.0-20260101.120000-1.jar",
        )
        .unwrap();
        assert_eq!(literal.base_version(), stamped.base_version());
        assert_ne!(literal.uinfo(), stamped.uinfo());
    }

    #[test]
    fn test_rejects_non_artifact_files() {
        assert!(Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.jar.sha1").is_none());
        assert!(Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.jar.md5").is_none());
        assert!(Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.jar.asc").is_none());
        assert!(Coordinate::from_repository_path("org/ex/a/maven-metadata.xml").is_none());
        assert!(Coordinate::from_repository_path("org/ex/a/1.0/.hidden").is_none());
        assert!(Coordinate::from_repository_path("a-1.0.jar").is_none());
        // Belongs to version 1.0.1, not to this directory.
        assert!(Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.1.jar").is_none());
        assert!(Coordinate::from_repository_path("org/ex/a/1.0/other-1.0.jar").is_none());
    }

    #[test]
    fn test_unknown_extension_preserved() {
        let c = Coordinate::from_repository_path("org/ex/a/1.0/a-1.0.swidtag").unwrap();
        assert_eq!(c.extension, "swidtag");
    }

    #[test]
    fn test_uinfo_roundtrip() {
        let c = Coordinate::new("org.ex", "a", "2.0", Some("sources".into()), "jar");
        assert_eq!(Coordinate::from_uinfo(&c.uinfo()), Some(c));
        assert_eq!(Coordinate::from_uinfo("too|few|parts"), None);
    }
}
