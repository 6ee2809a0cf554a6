// Archive member enumeration
//
// An archive is opened once per job. Members are listed from the central
// directory without decompressing; a member's content is a once-through
// stream that must be fully consumed before the next member is opened.

use crate::chunks::RowChunks;
use crate::error::{ExtractError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;

/// Metadata of one delimited-text member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub index: usize,
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
}

impl MemberInfo {
    /// File name without directory components or the member suffix.
    pub fn stem(&self, suffix: &str) -> &str {
        let file_name = self.name.rsplit('/').next().unwrap_or(&self.name);
        file_name.strip_suffix(suffix).unwrap_or(file_name)
    }
}

/// Per-member read options
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberOptions {
    /// Keep only the first N columns; members with fewer columns fail.
    pub max_columns: Option<usize>,
}

pub struct ExtractArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
    members: Vec<MemberInfo>,
}

impl std::fmt::Debug for ExtractArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractArchive")
            .field("path", &self.path)
            .field("members", &self.members)
            .finish()
    }
}

impl ExtractArchive {
    /// Open an archive and list members whose names end with `suffix`.
    ///
    /// Fails with [`ExtractError::NoMatchingMember`] if there are none.
    pub fn open(path: &Path, suffix: &str) -> Result<Self> {
        let file = File::open(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| ExtractError::Archive {
            archive: path.to_path_buf(),
            source,
        })?;

        let mut members = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|source| ExtractError::Archive {
                    archive: path.to_path_buf(),
                    source,
                })?;
            if entry.is_dir() || !entry.name().ends_with(suffix) {
                continue;
            }
            members.push(MemberInfo {
                index,
                name: entry.name().to_string(),
                size: entry.size(),
            });
        }

        if members.is_empty() {
            return Err(ExtractError::NoMatchingMember {
                archive: path.to_path_buf(),
                suffix: suffix.to_string(),
            });
        }

        debug!(
            archive = %path.display(),
            members = members.len(),
            "Opened archive"
        );

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            members,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    /// Open a member's stream and consume its header row.
    pub fn open_member(
        &mut self,
        member: &MemberInfo,
        options: &MemberOptions,
    ) -> Result<ExtractMember<'_>> {
        let entry = self
            .archive
            .by_index(member.index)
            .map_err(|source| ExtractError::Archive {
                archive: self.path.clone(),
                source,
            })?;
        let stream: Box<dyn Read + '_> = Box::new(entry);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(stream);

        let mut record = csv::StringRecord::new();
        let has_header = reader
            .read_record(&mut record)
            .map_err(|source| ExtractError::Parse {
                member: member.name.clone(),
                source,
            })?;
        if !has_header {
            return Err(ExtractError::MissingHeader {
                member: member.name.clone(),
            });
        }

        let mut header = dedupe_header(record.iter());
        let width = header.len();

        if let Some(limit) = options.max_columns {
            if width < limit {
                return Err(ExtractError::TooFewColumns {
                    member: member.name.clone(),
                    required: limit,
                    found: width,
                });
            }
            header.truncate(limit);
        }

        Ok(ExtractMember {
            info: member.clone(),
            columns: header.into(),
            width,
            reader,
        })
    }
}

/// Rename repeated header names to `name.1`, `name.2`, ... and fill blanks.
fn dedupe_header<'r>(names: impl Iterator<Item = &'r str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for (position, name) in names.enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", position)
        } else {
            name.to_string()
        };

        let mut candidate = base.clone();
        let mut counter = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", base, counter);
            counter += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

/// An opened member positioned just after its header row
pub struct ExtractMember<'a> {
    info: MemberInfo,
    columns: Arc<[String]>,
    width: usize,
    reader: csv::Reader<Box<dyn Read + 'a>>,
}

impl std::fmt::Debug for ExtractMember<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractMember")
            .field("info", &self.info)
            .field("columns", &self.columns)
            .finish()
    }
}

impl<'a> ExtractMember<'a> {
    pub fn info(&self) -> &MemberInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Header after de-duplication and column limiting.
    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    /// Consume the member as chunks of at most `chunk_limit` rows.
    pub fn chunks(self, chunk_limit: usize) -> RowChunks<'a> {
        RowChunks::new(
            self.info.name,
            self.columns,
            self.width,
            self.reader,
            chunk_limit,
        )
    }
}
