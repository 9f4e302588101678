//! Index record model: typed fields with wire-level flags.
//!
//! A record is an ordered name/value/flags mapping. The flags travel with
//! every field in the v1 transfer format (bit0=indexed, bit1=tokenized,
//! bit2=stored), so readers on the other end can rebuild an equivalent
//! index without knowing the schema in advance. Unknown field names are
//! carried verbatim.

/// Field separator inside composite values (UINFO, packed legacy info).
pub const FS: &str = "|";

/// Placeholder for an absent classifier inside UINFO.
pub const NA: &str = "NA";

/// Sentinel field identifying the descriptor record of a dump.
pub const FLD_DESCRIPTOR: &str = "DESCRIPTOR";

/// Content token of the descriptor sentinel field.
pub const DESCRIPTOR_CONTENTS: &str = "NexusIndex";

/// Companion descriptor field: `<format-version>|<context-id>`.
pub const FLD_IDXINFO: &str = "IDXINFO";

/// Record format version carried inside [`FLD_IDXINFO`].
pub const RECORD_FORMAT_VERSION: &str = "1.0";

pub const FLD_UINFO: &str = "uinfo";
pub const FLD_LAST_MODIFIED: &str = "last_modified";
pub const FLD_SIZE: &str = "size";
pub const FLD_SHA1: &str = "sha1";
pub const FLD_PACKAGING: &str = "packaging";
pub const FLD_NAME: &str = "name";
pub const FLD_DESCRIPTION: &str = "description";
pub const FLD_CLASSNAMES: &str = "classnames";

/// Tombstone field: holds the UINFO of a deleted artifact.
pub const FLD_DELETED: &str = "deleted";

/// Wire flags of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFlags {
    pub indexed: bool,
    pub tokenized: bool,
    pub stored: bool,
}

impl FieldFlags {
    /// Exact-match term, round-trippable.
    pub const KEYWORD: FieldFlags = FieldFlags {
        indexed: true,
        tokenized: false,
        stored: true,
    };

    /// Full-text searchable, round-trippable.
    pub const TEXT: FieldFlags = FieldFlags {
        indexed: true,
        tokenized: true,
        stored: true,
    };

    /// Round-trippable only, never searched.
    pub const STORED: FieldFlags = FieldFlags {
        indexed: false,
        tokenized: false,
        stored: true,
    };

    pub fn to_bits(self) -> u8 {
        (self.indexed as u8) | (self.tokenized as u8) << 1 | (self.stored as u8) << 2
    }

    pub fn from_bits(bits: u8) -> FieldFlags {
        FieldFlags {
            indexed: bits & 0b001 != 0,
            tokenized: bits & 0b010 != 0,
            stored: bits & 0b100 != 0,
        }
    }
}

/// A declared field: name plus wire flags. Contributors publish the defs
/// they write so the indexing context can build its schema up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub flags: FieldFlags,
}

impl FieldDef {
    pub const fn new(name: &'static str, flags: FieldFlags) -> FieldDef {
        FieldDef { name, flags }
    }
}

/// Fields every context carries independently of its contributors.
pub const BASE_FIELDS: &[FieldDef] = &[
    FieldDef::new(FLD_UINFO, FieldFlags::KEYWORD),
    FieldDef::new(FLD_LAST_MODIFIED, FieldFlags::STORED),
    FieldDef::new(FLD_DELETED, FieldFlags::KEYWORD),
    FieldDef::new(FLD_DESCRIPTOR, FieldFlags::KEYWORD),
    FieldDef::new(FLD_IDXINFO, FieldFlags::STORED),
];

// Legacy schema: the compact single-letter layout expected by pre-v1
// consumers of the zipped index directory.
pub const LEGACY_UINFO: &str = "u";
pub const LEGACY_INFO: &str = "i";
pub const LEGACY_GROUP_ID: &str = "g";
pub const LEGACY_ARTIFACT_ID: &str = "a";
pub const LEGACY_VERSION: &str = "v";
pub const LEGACY_NAME: &str = "n";
pub const LEGACY_DESCRIPTION: &str = "d";
pub const LEGACY_SHA1: &str = "1";
pub const LEGACY_CLASSNAMES: &str = "c";

pub const LEGACY_FIELDS: &[FieldDef] = &[
    FieldDef::new(LEGACY_UINFO, FieldFlags::KEYWORD),
    FieldDef::new(LEGACY_INFO, FieldFlags::STORED),
    FieldDef::new(LEGACY_GROUP_ID, FieldFlags::KEYWORD),
    FieldDef::new(LEGACY_ARTIFACT_ID, FieldFlags::KEYWORD),
    FieldDef::new(LEGACY_VERSION, FieldFlags::KEYWORD),
    FieldDef::new(LEGACY_NAME, FieldFlags::STORED),
    FieldDef::new(LEGACY_DESCRIPTION, FieldFlags::STORED),
    FieldDef::new(LEGACY_SHA1, FieldFlags::KEYWORD),
    FieldDef::new(LEGACY_CLASSNAMES, FieldFlags::TEXT),
    FieldDef::new(FLD_DESCRIPTOR, FieldFlags::KEYWORD),
    FieldDef::new(FLD_IDXINFO, FieldFlags::STORED),
];

/// One field of a record as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub name: String,
    pub value: String,
    pub flags: FieldFlags,
}

/// An ordered field mapping with upsert-by-name semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<RecordEntry>,
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    /// Insert or replace the field named by `def`.
    pub fn put(&mut self, def: FieldDef, value: impl Into<String>) {
        self.put_entry(def.name, value, def.flags);
    }

    pub fn put_entry(&mut self, name: impl Into<String>, value: impl Into<String>, flags: FieldFlags) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.value = value;
            existing.flags = flags;
        } else {
            self.entries.push(RecordEntry { name, value, flags });
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn uinfo(&self) -> Option<&str> {
        self.get(FLD_UINFO)
    }

    /// Readers key on the sentinel field name, not on record position.
    pub fn is_descriptor(&self) -> bool {
        self.get(FLD_DESCRIPTOR) == Some(DESCRIPTOR_CONTENTS)
    }

    pub fn is_tombstone(&self) -> bool {
        self.get(FLD_DELETED).is_some()
    }

    pub fn last_modified(&self) -> Option<i64> {
        self.get(FLD_LAST_MODIFIED)?.parse().ok()
    }

    /// Field-wise equality ignoring the named fields and entry order.
    pub fn same_content(&self, other: &Record, ignore: &[&str]) -> bool {
        fn significant<'a>(record: &'a Record, ignore: &[&str]) -> Vec<(&'a str, &'a str)> {
            let mut fields: Vec<(&str, &str)> = record
                .entries
                .iter()
                .filter(|e| !ignore.contains(&e.name.as_str()))
                .map(|e| (e.name.as_str(), e.value.as_str()))
                .collect();
            fields.sort_unstable();
            fields
        }
        significant(self, ignore) == significant(other, ignore)
    }
}

/// Build the descriptor record for a context id.
pub fn descriptor_record(context_id: &str) -> Record {
    let mut record = Record::new();
    record.put(FieldDef::new(FLD_DESCRIPTOR, FieldFlags::KEYWORD), DESCRIPTOR_CONTENTS);
    record.put(
        FieldDef::new(FLD_IDXINFO, FieldFlags::STORED),
        format!("{}{}{}", RECORD_FORMAT_VERSION, FS, context_id),
    );
    record
}
