//! Grouping audio files into events by naming convention.
//!
//! Files are named `{prefix}_{character}_{suffix}[_NN]`. Every file sharing a
//! suffix (after dropping a trailing numeric take index) lands in the same
//! group, keyed by the event name `{prefix}_{character}_{suffix}`. Files that
//! do not start with the `{prefix}_{character}_` stem are orphans.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::scanner::AudioFileDescriptor;

/// Suffix ending in `_<digits>`; the digits are a take index.
static TAKE_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<suffix>.*)_(?P<take>[0-9]+)$").unwrap());

#[derive(Error, Debug, PartialEq)]
pub enum ConventionError {
    #[error("naming convention prefix must not be empty")]
    EmptyPrefix,
    #[error("naming convention character must not be empty")]
    EmptyCharacter,
}

/// A `{prefix}_{character}_` naming convention.
#[derive(Debug, Clone, PartialEq)]
pub struct Convention {
    prefix: String,
    character: String,
}

impl Convention {
    pub fn new(prefix: &str, character: &str) -> Result<Self, ConventionError> {
        if prefix.is_empty() {
            return Err(ConventionError::EmptyPrefix);
        }
        if character.is_empty() {
            return Err(ConventionError::EmptyCharacter);
        }
        Ok(Self {
            prefix: prefix.to_string(),
            character: character.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn character(&self) -> &str {
        &self.character
    }

    /// The literal `{prefix}_{character}_`.
    pub fn stem(&self) -> String {
        format!("{}_{}_", self.prefix, self.character)
    }

    /// Event name for a file basename, or `None` if it does not follow the
    /// convention.
    pub fn event_name(&self, basename: &str) -> Option<String> {
        let stem = self.stem();
        let remainder = basename.strip_prefix(&stem)?;
        Some(format!("{stem}{}", strip_take_index(remainder)))
    }
}

/// Drop a trailing `_NN` take index. `A_01` becomes `A`, `A_B` and `01` are
/// kept whole.
pub fn strip_take_index(suffix: &str) -> &str {
    match TAKE_INDEX_RE.captures(suffix) {
        Some(caps) => caps.name("suffix").map_or(suffix, |m| m.as_str()),
        None => suffix,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// Event name to files, each group in discovery order.
    pub groups: BTreeMap<String, Vec<AudioFileDescriptor>>,
    /// Files that do not follow the convention.
    pub orphans: Vec<AudioFileDescriptor>,
}

/// Group files by the event name their basename implies.
pub fn match_files_to_events<I>(files: I, convention: &Convention) -> MatchResult
where
    I: IntoIterator<Item = AudioFileDescriptor>,
{
    let mut result = MatchResult::default();
    for file in files {
        match convention.event_name(&file.basename) {
            Some(name) => result.groups.entry(name).or_default().push(file),
            None => {
                log::debug!("Orphan file: {}", file.filename);
                result.orphans.push(file);
            }
        }
    }
    result
}

/// Project a template name onto the user's convention: its last
/// `_`-delimited token becomes the suffix.
pub fn build_event_name(prefix: &str, character: &str, template_name: &str) -> String {
    let suffix = template_name.rsplit('_').next().unwrap_or(template_name);
    format!("{prefix}_{character}_{suffix}")
}

/// Event name a template is expected to produce. Templates already named in
/// the convention keep their name (minus any take index).
pub fn expected_event_name(convention: &Convention, template_name: &str) -> String {
    convention
        .event_name(template_name)
        .unwrap_or_else(|| build_event_name(&convention.prefix, &convention.character, template_name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment<T> {
    pub event_name: String,
    pub template: T,
    pub files: Vec<AudioFileDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T> {
    pub assignments: Vec<Assignment<T>>,
    /// Expected events no file matched.
    pub orphan_events: Vec<(String, T)>,
    /// File groups whose event name no template expects.
    pub orphan_groups: BTreeMap<String, Vec<AudioFileDescriptor>>,
    /// Files outside the convention.
    pub orphan_files: Vec<AudioFileDescriptor>,
}

/// Split a match result against the expected event names.
pub fn reconcile<T: Clone>(result: MatchResult, expected: &BTreeMap<String, T>) -> Reconciliation<T> {
    let MatchResult { mut groups, orphans } = result;

    let mut assignments = Vec::new();
    let mut orphan_events = Vec::new();
    for (name, template) in expected {
        match groups.remove(name) {
            Some(files) => assignments.push(Assignment {
                event_name: name.clone(),
                template: template.clone(),
                files,
            }),
            None => orphan_events.push((name.clone(), template.clone())),
        }
    }

    Reconciliation {
        assignments,
        orphan_events,
        orphan_groups: groups,
        orphan_files: orphans,
    }
}
