//! Artifact state during scanning: the typed info record and the context
//! handed to field contributors.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::coordinate::Coordinate;
use crate::creator::IndexCreator;
use crate::error::IndexError;
use crate::pom::PomModel;
use crate::record::{
    FieldDef, FieldFlags, Record, FLD_CLASSNAMES, FLD_DESCRIPTION, FLD_LAST_MODIFIED, FLD_NAME,
    FLD_PACKAGING, FLD_SHA1, FLD_SIZE, FLD_UINFO,
};

/// Wall-clock milliseconds since the epoch.
pub fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Everything the index knows about one artifact. Contributors enrich it
/// during `populate`, then project it into a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
    /// Declared packaging; falls back to the extension when the POM is silent.
    pub packaging: String,
    /// File modification time, epoch millis.
    pub last_modified: i64,
    pub size: i64,
    pub sha1: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Newline-joined class entry paths extracted from the archive.
    pub classnames: Option<String>,
}

impl ArtifactInfo {
    pub fn new(coordinate: &Coordinate) -> ArtifactInfo {
        ArtifactInfo {
            group_id: coordinate.group_id.clone(),
            artifact_id: coordinate.artifact_id.clone(),
            version: coordinate.version.clone(),
            classifier: coordinate.classifier.clone(),
            extension: coordinate.extension.clone(),
            packaging: coordinate.extension.clone(),
            last_modified: 0,
            size: 0,
            sha1: None,
            name: None,
            description: None,
            classnames: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            self.version.clone(),
            self.classifier.clone(),
            self.extension.clone(),
        )
    }

    pub fn uinfo(&self) -> String {
        self.coordinate().uinfo()
    }

    /// Rebuild an info from a stored record by running every contributor's
    /// inverse mapping. Returns `None` for records that do not describe an
    /// artifact (descriptor, tombstones).
    pub fn from_record(record: &Record, creators: &[Arc<dyn IndexCreator>]) -> Option<ArtifactInfo> {
        let coordinate = Coordinate::from_uinfo(record.uinfo()?)?;
        let mut info = ArtifactInfo::new(&coordinate);
        let mut handled = false;
        for creator in creators {
            handled |= creator.update_artifact_info(record, &mut info);
        }
        handled.then_some(info)
    }
}

/// Per-artifact scanning context: the files on disk, the evolving info,
/// and a list of non-fatal errors confined to this artifact.
pub struct ArtifactContext {
    pub pom: Option<PathBuf>,
    pub artifact: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub info: ArtifactInfo,
    pub coordinate: Coordinate,
    pub errors: Vec<IndexError>,
}

impl ArtifactContext {
    pub fn new(
        pom: Option<PathBuf>,
        artifact: Option<PathBuf>,
        metadata: Option<PathBuf>,
        info: ArtifactInfo,
    ) -> ArtifactContext {
        let coordinate = info.coordinate();
        ArtifactContext {
            pom,
            artifact,
            metadata,
            info,
            coordinate,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: IndexError) {
        self.errors.push(error);
    }

    /// The sibling POM when present, otherwise the POM embedded in the
    /// artifact archive. Parse failures land on the error list.
    pub fn pom_model(&mut self) -> Option<PomModel> {
        if let Some(pom) = self.pom.clone() {
            match PomModel::from_path(&pom) {
                Ok(model) => return Some(model),
                Err(e) => self.add_error(e),
            }
        } else if let Some(artifact) = self.artifact.clone() {
            if is_archive(&artifact) {
                match PomModel::from_embedded(
                    &artifact,
                    &self.coordinate.group_id,
                    &self.coordinate.artifact_id,
                ) {
                    Ok(model) => return model,
                    Err(e) => self.add_error(e),
                }
            }
        }
        None
    }

    /// Build the index record: seed the identity fields, run every
    /// contributor's `populate` to completion, then every `update_record`.
    /// Contributor failures stay on this context's error list.
    pub fn create_record(&mut self, creators: &[Arc<dyn IndexCreator>]) -> Record {
        let mut record = Record::new();
        record.put(FieldDef::new(FLD_UINFO, FieldFlags::KEYWORD), self.info.uinfo());
        record.put(
            FieldDef::new(FLD_LAST_MODIFIED, FieldFlags::STORED),
            current_time_millis().to_string(),
        );

        for creator in creators {
            creator.populate(self);
        }
        // Second pass: contributors may read each other's enrichments.
        for creator in creators {
            creator.update_record(&self.info, &mut record);
        }

        record
    }
}

pub(crate) fn is_archive(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jar") | Some("war") | Some("ear") | Some("zip")
    )
}

/// Field defs contributed by the minimal-info creator; declared here so the
/// info projection and its inverse stay next to the type they serve.
pub const INFO_FIELDS: &[FieldDef] = &[
    FieldDef::new(FLD_SIZE, FieldFlags::STORED),
    FieldDef::new(FLD_SHA1, FieldFlags::KEYWORD),
    FieldDef::new(FLD_PACKAGING, FieldFlags::KEYWORD),
    FieldDef::new(FLD_NAME, FieldFlags::TEXT),
    FieldDef::new(FLD_DESCRIPTION, FieldFlags::TEXT),
];

pub const CLASSNAMES_FIELDS: &[FieldDef] =
    &[FieldDef::new(FLD_CLASSNAMES, FieldFlags::TEXT)];
