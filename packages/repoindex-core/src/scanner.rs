//! Repository scanner: a synchronous, depth-first walk that coalesces
//! sibling POM and artifact files into one [`ArtifactContext`] per
//! coordinate and hands each to a scanning listener.
//!
//! File-level problems are reported through the listener and skipped; a
//! scan never aborts because of a single bad artifact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::artifact::{ArtifactContext, ArtifactInfo};
use crate::context::IndexingContext;
use crate::coordinate::Coordinate;
use crate::error::{IndexError, Result};
use crate::record::FLD_LAST_MODIFIED;

const METADATA_FILE: &str = "maven-metadata.xml";

/// Progress callbacks for one scan.
pub trait ArtifactScanningListener {
    fn scan_started(&mut self, _repository_dir: &Path) {}

    fn scanning_file(&mut self, _path: &Path) {}

    /// One coalesced artifact. The context's error list carries whatever
    /// went wrong while enriching it.
    fn artifact_discovered(&mut self, context: &mut ArtifactContext);

    fn artifact_error(&mut self, _path: &Path, _error: &IndexError) {}

    fn scan_finished(&mut self, _result: &ScanningResult) {}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanningResult {
    pub total_files: u64,
    pub total_artifacts: u64,
    pub errors: Vec<String>,
}

pub struct Scanner;

impl Scanner {
    /// Walk `repository_dir` depth-first and feed the listener.
    pub fn scan(
        repository_dir: &Path,
        listener: &mut dyn ArtifactScanningListener,
    ) -> Result<ScanningResult> {
        if !repository_dir.is_dir() {
            return Err(IndexError::invalid(format!(
                "repository path {} is not a directory",
                repository_dir.display()
            )));
        }

        listener.scan_started(repository_dir);
        let mut result = ScanningResult::default();

        // Group files per directory so siblings can be coalesced. Hidden
        // entries (like a repository's own .index directory) are pruned.
        let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        let walker = WalkDir::new(repository_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
            });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    result.errors.push(e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            by_dir
                .entry(entry.path().parent().unwrap_or(repository_dir).to_path_buf())
                .or_default()
                .push(entry.into_path());
        }

        for (_, files) in by_dir {
            Self::scan_directory(repository_dir, &files, listener, &mut result);
        }

        info!(
            files = result.total_files,
            artifacts = result.total_artifacts,
            errors = result.errors.len(),
            "repository scan finished"
        );
        listener.scan_finished(&result);
        Ok(result)
    }

    fn scan_directory(
        repository_dir: &Path,
        files: &[PathBuf],
        listener: &mut dyn ArtifactScanningListener,
        result: &mut ScanningResult,
    ) {
        let mut metadata: Option<PathBuf> = None;
        // Coordinate per artifact file, in filename order.
        let mut artifacts: Vec<(Coordinate, PathBuf)> = Vec::new();
        let mut poms: BTreeMap<String, (Coordinate, PathBuf)> = BTreeMap::new();

        for path in files {
            listener.scanning_file(path);
            result.total_files += 1;

            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if file_name == METADATA_FILE {
                metadata = Some(path.clone());
                continue;
            }

            let relative = match path.strip_prefix(repository_dir) {
                Ok(relative) => relative.to_string_lossy().into_owned(),
                Err(_) => continue,
            };
            let Some(coordinate) = Coordinate::from_repository_path(&relative) else {
                debug!(path = %relative, "not an artifact file");
                continue;
            };

            if coordinate.extension == "pom" && coordinate.classifier.is_none() {
                poms.insert(gav_key(&coordinate), (coordinate, path.clone()));
            } else {
                artifacts.push((coordinate, path.clone()));
            }
        }

        // Main and classified artifacts, each with the sibling POM attached.
        let mut consumed_poms: Vec<String> = Vec::new();
        for (coordinate, path) in artifacts {
            let key = gav_key(&coordinate);
            let pom = poms.get(&key).map(|(_, p)| p.clone());
            if pom.is_some() && coordinate.classifier.is_none() {
                consumed_poms.push(key);
            }
            Self::discover(coordinate, pom, Some(path), metadata.clone(), listener, result);
        }

        // POM-packaged projects: the POM is the artifact.
        for (key, (coordinate, path)) in poms {
            if consumed_poms.contains(&key) {
                continue;
            }
            Self::discover(coordinate, Some(path), None, metadata.clone(), listener, result);
        }
    }

    fn discover(
        coordinate: Coordinate,
        pom: Option<PathBuf>,
        artifact: Option<PathBuf>,
        metadata: Option<PathBuf>,
        listener: &mut dyn ArtifactScanningListener,
        result: &mut ScanningResult,
    ) {
        let info = ArtifactInfo::new(&coordinate);
        let reported = artifact.clone().or_else(|| pom.clone()).unwrap_or_default();
        let mut context = ArtifactContext::new(pom, artifact, metadata, info);
        listener.artifact_discovered(&mut context);
        result.total_artifacts += 1;
        for error in &context.errors {
            listener.artifact_error(&reported, error);
            result.errors.push(error.to_string());
        }
    }
}

fn gav_key(coordinate: &Coordinate) -> String {
    format!(
        "{}:{}:{}",
        coordinate.group_id, coordinate.artifact_id, coordinate.version
    )
}

/// The default listener: builds each record through the contributor
/// registry and upserts it, skipping artifacts whose content has not
/// changed since the last scan. On finish it can remove records whose
/// files disappeared from the repository.
pub struct DefaultScannerListener<'a> {
    context: &'a IndexingContext,
    remove_missing: bool,
    seen: Vec<String>,
    pub updated: u64,
    pub skipped: u64,
    pub removed: u64,
}

impl<'a> DefaultScannerListener<'a> {
    pub fn new(context: &'a IndexingContext) -> DefaultScannerListener<'a> {
        DefaultScannerListener {
            context,
            remove_missing: false,
            seen: Vec::new(),
            updated: 0,
            skipped: 0,
            removed: 0,
        }
    }

    /// Also delete index records whose artifacts vanished from disk.
    pub fn remove_missing(mut self) -> Self {
        self.remove_missing = true;
        self
    }
}

impl ArtifactScanningListener for DefaultScannerListener<'_> {
    fn artifact_discovered(&mut self, artifact_context: &mut ArtifactContext) {
        let record = artifact_context.create_record(self.context.index_creators());
        let Some(uinfo) = record.uinfo().map(str::to_string) else {
            return;
        };
        self.seen.push(uinfo.clone());

        let searcher = self.context.acquire_searcher();
        match self.context.record_for_uinfo(&searcher, &uinfo) {
            Ok(Some(existing)) if existing.same_content(&record, &[FLD_LAST_MODIFIED]) => {
                self.skipped += 1;
            }
            Ok(_) => match self.context.add_record(record) {
                Ok(()) => self.updated += 1,
                Err(e) => artifact_context.add_error(e),
            },
            Err(e) => artifact_context.add_error(e),
        }
    }

    fn scan_finished(&mut self, _result: &ScanningResult) {
        if !self.remove_missing {
            return;
        }
        let searcher = self.context.acquire_searcher();
        let live = match self.context.live_records(&searcher) {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, "could not enumerate index for removal pass");
                return;
            }
        };
        for (_, record) in live {
            let Some(uinfo) = record.uinfo() else { continue };
            if self.seen.iter().any(|seen| seen == uinfo) {
                continue;
            }
            if let Some(coordinate) = Coordinate::from_uinfo(uinfo) {
                if self.context.delete_artifact(&coordinate).is_ok() {
                    self.removed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CollectingListener {
        discovered: Vec<String>,
    }

    impl ArtifactScanningListener for CollectingListener {
        fn artifact_discovered(&mut self, context: &mut ArtifactContext) {
            self.discovered.push(context.coordinate.uinfo());
        }
    }

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_scan_coalesces_pom_and_jar() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "org/ex/a/1.0/a-1.0.jar", b"DATA");
        write(dir.path(), "org/ex/a/1.0/a-1.0.pom", b"<project/>");
        write(dir.path(), "org/ex/a/1.0/a-1.0.jar.sha1", b"feed");

        let mut listener = CollectingListener { discovered: vec![] };
        let result = Scanner::scan(dir.path(), &mut listener).unwrap();

        assert_eq!(listener.discovered, vec!["org.ex|a|1.0|NA|jar"]);
        assert_eq!(result.total_artifacts, 1);
        assert_eq!(result.total_files, 3);
    }

    #[test]
    fn test_scan_emits_standalone_pom() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "org/ex/parent/1.0/parent-1.0.pom", b"<project/>");

        let mut listener = CollectingListener { discovered: vec![] };
        Scanner::scan(dir.path(), &mut listener).unwrap();

        assert_eq!(listener.discovered, vec!["org.ex|parent|1.0|NA|pom"]);
    }

    #[test]
    fn test_scan_classified_artifacts_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "org/ex/a/1.0/a-1.0.jar", b"DATA");
        write(dir.path(), "org/ex/a/1.0/a-1.0-sources.jar", b"SRC");
        write(dir.path(), "org/ex/a/1.0/a-1.0.pom", b"<project/>");

        let mut listener = CollectingListener { discovered: vec![] };
        Scanner::scan(dir.path(), &mut listener).unwrap();

        assert_eq!(
            listener.discovered,
            vec!["org.ex|a|1.0|sources|jar", "org.ex|a|1.0|NA|jar"]
        );
    }

    #[test]
    fn test_scan_rejects_missing_directory() {
        let mut listener = CollectingListener { discovered: vec![] };
        let err = Scanner::scan(Path::new("/nonexistent-repo"), &mut listener);
        assert!(matches!(err, Err(IndexError::InvalidArgument(_))));
    }
}
