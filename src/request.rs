//! Import requests for the external authoring tool.
//!
//! A request lists, in order, one entry per event the tool should create:
//! which template to copy, the new name and destination, and the audio to
//! import into it. Building a request has no side effects beyond checking
//! that each audio path is a readable file.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub project_path: String,
    pub default_bank: Option<String>,
    pub default_bus: Option<String>,
    pub default_destination: String,
    pub entries: Vec<ImportEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportEntry {
    pub template_path: String,
    pub new_name: String,
    pub destination_path: String,
    pub audio_paths: Vec<String>,
    pub asset_folder_path: String,
    pub bank_name: Option<String>,
    pub bus_name: Option<String>,
    /// More than one audio file, so the tool should build a multi sound.
    pub multi_sound: bool,
}

/// Resolved names and paths shared by every entry.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub project_path: PathBuf,
    pub destination_path: String,
    pub bank_name: Option<String>,
    pub bus_name: Option<String>,
    pub asset_folder_path: String,
}

/// One matched event: its new name, the template it copies and its files.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEvent {
    pub event_name: String,
    pub template_path: String,
    pub files: Vec<PathBuf>,
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}

/// Build the request. Unreadable audio paths are skipped; an event left with
/// no audio is dropped.
pub fn build_request(planned: &[PlannedEvent], ctx: &RequestContext) -> ImportRequest {
    let entries = planned
        .iter()
        .filter_map(|event| {
            let audio_paths: Vec<String> = event
                .files
                .iter()
                .filter(|p| {
                    let ok = is_readable_file(p);
                    if !ok {
                        log::debug!("Leaving unreadable {} out of the request", p.display());
                    }
                    ok
                })
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            if audio_paths.is_empty() {
                log::info!("No readable audio for '{}', dropping it", event.event_name);
                return None;
            }
            Some(ImportEntry {
                template_path: event.template_path.clone(),
                new_name: event.event_name.clone(),
                destination_path: ctx.destination_path.clone(),
                multi_sound: audio_paths.len() > 1,
                audio_paths,
                asset_folder_path: ctx.asset_folder_path.clone(),
                bank_name: ctx.bank_name.clone(),
                bus_name: ctx.bus_name.clone(),
            })
        })
        .collect();

    ImportRequest {
        project_path: ctx.project_path.to_string_lossy().to_string(),
        default_bank: ctx.bank_name.clone(),
        default_bus: ctx.bus_name.clone(),
        default_destination: ctx.destination_path.clone(),
        entries,
    }
}

pub fn to_json(request: &ImportRequest) -> serde_json::Result<String> {
    serde_json::to_string_pretty(request)
}
