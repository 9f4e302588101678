//! Field contributors.
//!
//! A contributor is a capability object the context holds in an ordered
//! registry. `populate` enriches the [`ArtifactInfo`] from on-disk
//! evidence, `update_record` projects it into typed record fields, and
//! `update_artifact_info` is the inverse used when reading records back.
//! Legacy-record support is a secondary capability discovered by tag
//! (`legacy_updater`), not by type identity.

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use sha1::{Digest, Sha1};
use tracing::debug;

use crate::artifact::{is_archive, ArtifactContext, ArtifactInfo, CLASSNAMES_FIELDS, INFO_FIELDS};
use crate::record::{
    FieldDef, FieldFlags, Record, FS, LEGACY_ARTIFACT_ID, LEGACY_CLASSNAMES, LEGACY_DESCRIPTION,
    LEGACY_GROUP_ID, LEGACY_INFO, LEGACY_NAME, LEGACY_SHA1, LEGACY_UINFO, LEGACY_VERSION,
    FLD_CLASSNAMES, FLD_DESCRIPTION, FLD_LAST_MODIFIED, FLD_NAME, FLD_PACKAGING, FLD_SHA1,
    FLD_SIZE,
};

/// Secondary capability: rewrite an artifact into the legacy schema.
pub trait LegacyRecordUpdater: Send + Sync {
    fn update_legacy_record(&self, info: &ArtifactInfo, record: &mut Record);
}

pub trait IndexCreator: Send + Sync {
    /// Stable, unique contributor id.
    fn id(&self) -> &'static str;

    /// The field defs this contributor writes; drives the index schema.
    fn fields(&self) -> &'static [FieldDef];

    /// Enrich the artifact info from on-disk evidence. Failures go on the
    /// context's error list and must not abort the scan.
    fn populate(&self, context: &mut ArtifactContext);

    /// Project the enriched info into typed record fields.
    fn update_record(&self, info: &ArtifactInfo, record: &mut Record);

    /// Inverse of `update_record`. Returns true when the record carried
    /// fields this contributor understands.
    fn update_artifact_info(&self, record: &Record, info: &mut ArtifactInfo) -> bool;

    fn legacy_updater(&self) -> Option<&dyn LegacyRecordUpdater> {
        None
    }
}

/// The standard ordered registry: minimal info first, archive contents after.
pub fn default_creators() -> Vec<Arc<dyn IndexCreator>> {
    vec![
        Arc::new(MinimalArtifactInfoCreator),
        Arc::new(JarEntriesCreator),
    ]
}

pub fn creator_ids(creators: &[Arc<dyn IndexCreator>]) -> Vec<&'static str> {
    creators.iter().map(|c| c.id()).collect()
}

fn def(name: &'static str, flags: FieldFlags) -> FieldDef {
    FieldDef::new(name, flags)
}

/// Core contributor: file size, modification time, SHA-1 digest, and the
/// POM-declared packaging/name/description.
pub struct MinimalArtifactInfoCreator;

impl MinimalArtifactInfoCreator {
    fn sha1_of(path: &std::path::Path) -> std::io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha1::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl IndexCreator for MinimalArtifactInfoCreator {
    fn id(&self) -> &'static str {
        "min"
    }

    fn fields(&self) -> &'static [FieldDef] {
        INFO_FIELDS
    }

    fn populate(&self, context: &mut ArtifactContext) {
        if let Some(artifact) = context.artifact.clone() {
            match std::fs::metadata(&artifact) {
                Ok(meta) => {
                    context.info.size = meta.len() as i64;
                    context.info.last_modified = meta
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or_default();
                }
                Err(e) => context.add_error(e.into()),
            }
            match Self::sha1_of(&artifact) {
                Ok(digest) => context.info.sha1 = Some(digest),
                Err(e) => context.add_error(e.into()),
            }
        }

        if let Some(model) = context.pom_model() {
            if let Some(packaging) = model.packaging {
                context.info.packaging = packaging;
            }
            context.info.name = model.name;
            context.info.description = model.description;
        }
    }

    fn update_record(&self, info: &ArtifactInfo, record: &mut Record) {
        record.put(def(FLD_SIZE, FieldFlags::STORED), info.size.to_string());
        record.put(def(FLD_PACKAGING, FieldFlags::KEYWORD), &info.packaging);
        if let Some(sha1) = &info.sha1 {
            record.put(def(FLD_SHA1, FieldFlags::KEYWORD), sha1);
        }
        if let Some(name) = &info.name {
            record.put(def(FLD_NAME, FieldFlags::TEXT), name);
        }
        if let Some(description) = &info.description {
            record.put(def(FLD_DESCRIPTION, FieldFlags::TEXT), description);
        }
    }

    fn update_artifact_info(&self, record: &Record, info: &mut ArtifactInfo) -> bool {
        if record.uinfo().is_none() {
            return false;
        }
        if let Some(size) = record.get(FLD_SIZE).and_then(|s| s.parse().ok()) {
            info.size = size;
        }
        if let Some(millis) = record.last_modified() {
            info.last_modified = millis;
        }
        if let Some(packaging) = record.get(FLD_PACKAGING) {
            info.packaging = packaging.to_string();
        }
        info.sha1 = record.get(FLD_SHA1).map(str::to_string);
        info.name = record.get(FLD_NAME).map(str::to_string);
        info.description = record.get(FLD_DESCRIPTION).map(str::to_string);
        true
    }

    fn legacy_updater(&self) -> Option<&dyn LegacyRecordUpdater> {
        Some(self)
    }
}

impl LegacyRecordUpdater for MinimalArtifactInfoCreator {
    fn update_legacy_record(&self, info: &ArtifactInfo, record: &mut Record) {
        record.put(def(LEGACY_UINFO, FieldFlags::KEYWORD), info.uinfo());
        record.put(
            def(LEGACY_INFO, FieldFlags::STORED),
            format!(
                "{}{FS}{}{FS}{}{FS}{}",
                info.packaging, info.last_modified, info.size, info.extension
            ),
        );
        record.put(def(LEGACY_GROUP_ID, FieldFlags::KEYWORD), &info.group_id);
        record.put(def(LEGACY_ARTIFACT_ID, FieldFlags::KEYWORD), &info.artifact_id);
        record.put(def(LEGACY_VERSION, FieldFlags::KEYWORD), &info.version);
        if let Some(sha1) = &info.sha1 {
            record.put(def(LEGACY_SHA1, FieldFlags::KEYWORD), sha1);
        }
        if let Some(name) = &info.name {
            record.put(def(LEGACY_NAME, FieldFlags::STORED), name);
        }
        if let Some(description) = &info.description {
            record.put(def(LEGACY_DESCRIPTION, FieldFlags::STORED), description);
        }
    }
}

/// Archive contributor: `.class` entry names of jar-like artifacts.
pub struct JarEntriesCreator;

impl JarEntriesCreator {
    fn classnames_of(path: &std::path::Path) -> crate::error::Result<Option<String>> {
        let archive = zip::ZipArchive::new(File::open(path)?)?;
        let mut names: Vec<String> = archive
            .file_names()
            .filter_map(|n| n.strip_suffix(".class"))
            .map(|n| n.trim_start_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(None);
        }
        names.sort_unstable();
        Ok(Some(names.join("\n")))
    }
}

impl IndexCreator for JarEntriesCreator {
    fn id(&self) -> &'static str {
        "jarContent"
    }

    fn fields(&self) -> &'static [FieldDef] {
        CLASSNAMES_FIELDS
    }

    fn populate(&self, context: &mut ArtifactContext) {
        let Some(artifact) = context.artifact.clone() else {
            return;
        };
        if !is_archive(&artifact) {
            return;
        }
        match Self::classnames_of(&artifact) {
            Ok(classnames) => {
                debug!(artifact = %artifact.display(), "extracted archive entries");
                context.info.classnames = classnames;
            }
            Err(e) => context.add_error(e),
        }
    }

    fn update_record(&self, info: &ArtifactInfo, record: &mut Record) {
        if let Some(classnames) = &info.classnames {
            record.put(def(FLD_CLASSNAMES, FieldFlags::TEXT), classnames);
        }
    }

    fn update_artifact_info(&self, record: &Record, info: &mut ArtifactInfo) -> bool {
        match record.get(FLD_CLASSNAMES) {
            Some(classnames) => {
                info.classnames = Some(classnames.to_string());
                true
            }
            None => false,
        }
    }

    fn legacy_updater(&self) -> Option<&dyn LegacyRecordUpdater> {
        Some(self)
    }
}

impl LegacyRecordUpdater for JarEntriesCreator {
    fn update_legacy_record(&self, info: &ArtifactInfo, record: &mut Record) {
        if let Some(classnames) = &info.classnames {
            record.put(def(LEGACY_CLASSNAMES, FieldFlags::TEXT), classnames);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Coordinate;
    use std::io::Write;

    fn jar_with_entries(dir: &std::path::Path, entries: &[&str]) -> std::path::PathBuf {
        let path = dir.join("a-1.0.jar");
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for entry in entries {
            zip.start_file(*entry, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"stub").unwrap();
        }
        zip.finish().unwrap();
        path
    }

    fn context_for(artifact: Option<std::path::PathBuf>) -> ArtifactContext {
        let coordinate = Coordinate::new("org.ex", "a", "1.0", None, "jar");
        ArtifactContext::new(None, artifact, None, ArtifactInfo::new(&coordinate))
    }

    #[test]
    fn test_minimal_creator_stats_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-1.0.jar");
        std::fs::write(&path, b"abc").unwrap();

        let mut ctx = context_for(Some(path));
        MinimalArtifactInfoCreator.populate(&mut ctx);

        assert_eq!(ctx.info.size, 3);
        assert_eq!(
            ctx.info.sha1.as_deref(),
            Some("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
        assert!(ctx.info.last_modified > 0);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn test_minimal_creator_record_roundtrip() {
        let coordinate = Coordinate::new("org.ex", "a", "1.0", None, "jar");
        let mut info = ArtifactInfo::new(&coordinate);
        info.size = 4;
        info.sha1 = Some("feed".into());
        info.name = Some("A".into());

        let mut record = Record::new();
        record.put(
            FieldDef::new(crate::record::FLD_UINFO, FieldFlags::KEYWORD),
            info.uinfo(),
        );
        MinimalArtifactInfoCreator.update_record(&info, &mut record);

        let mut restored = ArtifactInfo::new(&coordinate);
        assert!(MinimalArtifactInfoCreator.update_artifact_info(&record, &mut restored));
        assert_eq!(restored.size, 4);
        assert_eq!(restored.sha1.as_deref(), Some("feed"));
        assert_eq!(restored.name.as_deref(), Some("A"));
    }

    #[test]
    fn test_jar_creator_extracts_classnames() {
        let dir = tempfile::tempdir().unwrap();
        let jar = jar_with_entries(
            dir.path(),
            &["org/ex/Foo.class", "org/ex/Bar.class", "META-INF/MANIFEST.MF"],
        );

        let mut ctx = context_for(Some(jar));
        JarEntriesCreator.populate(&mut ctx);

        assert_eq!(
            ctx.info.classnames.as_deref(),
            Some("org/ex/Bar\norg/ex/Foo")
        );
    }

    #[test]
    fn test_jar_creator_confines_archive_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-1.0.jar");
        std::fs::write(&path, b"not a zip").unwrap();

        let mut ctx = context_for(Some(path));
        JarEntriesCreator.populate(&mut ctx);

        assert!(ctx.info.classnames.is_none());
        assert_eq!(ctx.errors.len(), 1);
    }

    #[test]
    fn test_legacy_capability_by_tag() {
        for creator in default_creators() {
            assert!(creator.legacy_updater().is_some());
        }
    }
}
