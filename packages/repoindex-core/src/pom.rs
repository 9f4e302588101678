//! Minimal POM reader: packaging, name, description.
//!
//! Only project-level children are consulted; a `<name>` nested inside
//! `<parent>` or a dependency never leaks into the model. Packaging stays
//! `None` when the POM does not declare it.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomModel {
    pub packaging: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl PomModel {
    pub fn read(input: impl BufRead) -> Result<PomModel> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        let mut model = PomModel::default();
        let mut depth = 0usize;
        let mut current: Option<&'static str> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if depth == 1 {
                        current = match e.name().as_ref() {
                            b"packaging" => Some("packaging"),
                            b"name" => Some("name"),
                            b"description" => Some("description"),
                            _ => None,
                        };
                    }
                    depth += 1;
                }
                Ok(Event::Text(t)) => {
                    if depth == 2 {
                        if let Some(field) = current {
                            let value = t
                                .unescape()
                                .map_err(|e| IndexError::Pom(e.to_string()))?
                                .trim()
                                .to_string();
                            match field {
                                "packaging" => model.packaging = Some(value),
                                "name" => model.name = Some(value),
                                "description" => model.description = Some(value),
                                _ => {}
                            }
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                    if depth < 2 {
                        current = None;
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(IndexError::Pom(e.to_string())),
            }
            buf.clear();
        }

        Ok(model)
    }

    pub fn from_path(path: &Path) -> Result<PomModel> {
        PomModel::read(BufReader::new(File::open(path)?))
    }

    /// Peek at the POM a build tool embeds under
    /// `META-INF/maven/<g>/<a>/pom.xml` inside the artifact archive.
    pub fn from_embedded(artifact: &Path, group_id: &str, artifact_id: &str) -> Result<Option<PomModel>> {
        let mut archive = zip::ZipArchive::new(File::open(artifact)?)?;
        let entry_path = format!("META-INF/maven/{}/{}/pom.xml", group_id, artifact_id);
        let mut entry = match archive.by_name(&entry_path) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        Ok(Some(PomModel::read(BufReader::new(&contents[..]))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0"?>
<project>
  <groupId>org.ex</groupId>
  <artifactId>a</artifactId>
  <version>1.0</version>
  <packaging>jar</packaging>
  <name>A</name>
  <description>An example artifact</description>
</project>
"#;

    #[test]
    fn test_read_project_fields() {
        let model = PomModel::read(POM.as_bytes()).unwrap();
        assert_eq!(model.packaging.as_deref(), Some("jar"));
        assert_eq!(model.name.as_deref(), Some("A"));
        assert_eq!(model.description.as_deref(), Some("An example artifact"));
    }

    #[test]
    fn test_packaging_absent_stays_none() {
        let pom = "<project><artifactId>a</artifactId></project>";
        let model = PomModel::read(pom.as_bytes()).unwrap();
        assert_eq!(model.packaging, None);
    }

    #[test]
    fn test_nested_name_is_not_project_name() {
        let pom = r#"<project>
  <parent><name>parent-name</name></parent>
  <dependencies><dependency><artifactId>dep</artifactId></dependency></dependencies>
</project>"#;
        let model = PomModel::read(pom.as_bytes()).unwrap();
        assert_eq!(model.name, None);
    }

    #[test]
    fn test_malformed_pom_is_an_error() {
        let pom = "<project><packaging>jar</name></project>";
        assert!(PomModel::read(pom.as_bytes()).is_err());
    }
}
