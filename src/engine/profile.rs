//! `perftools.profiles.Profile` wire types and loading.
//!
//! Profiles arrive either gzip-compressed (the usual form written by
//! profilers) or as a raw protobuf message.

use std::collections::HashMap;
use std::io::Read;

use flate2::read::GzDecoder;
use prost::Message;

use super::EngineError;

#[derive(Clone, PartialEq, Message)]
pub struct Profile {
    #[prost(message, repeated, tag = "1")]
    pub sample_type: Vec<ValueType>,
    #[prost(message, repeated, tag = "2")]
    pub sample: Vec<Sample>,
    #[prost(message, repeated, tag = "3")]
    pub mapping: Vec<Mapping>,
    #[prost(message, repeated, tag = "4")]
    pub location: Vec<Location>,
    #[prost(message, repeated, tag = "5")]
    pub function: Vec<Function>,
    #[prost(string, repeated, tag = "6")]
    pub string_table: Vec<String>,
    #[prost(int64, tag = "7")]
    pub drop_frames: i64,
    #[prost(int64, tag = "8")]
    pub keep_frames: i64,
    #[prost(int64, tag = "9")]
    pub time_nanos: i64,
    #[prost(int64, tag = "10")]
    pub duration_nanos: i64,
    #[prost(message, optional, tag = "11")]
    pub period_type: Option<ValueType>,
    #[prost(int64, tag = "12")]
    pub period: i64,
    #[prost(int64, repeated, tag = "13")]
    pub comment: Vec<i64>,
    #[prost(int64, tag = "14")]
    pub default_sample_type: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueType {
    #[prost(int64, tag = "1")]
    pub ty: i64,
    #[prost(int64, tag = "2")]
    pub unit: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    /// Leaf first.
    #[prost(uint64, repeated, tag = "1")]
    pub location_id: Vec<u64>,
    #[prost(int64, repeated, tag = "2")]
    pub value: Vec<i64>,
    #[prost(message, repeated, tag = "3")]
    pub label: Vec<Label>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Label {
    #[prost(int64, tag = "1")]
    pub key: i64,
    #[prost(int64, tag = "2")]
    pub str: i64,
    #[prost(int64, tag = "3")]
    pub num: i64,
    #[prost(int64, tag = "4")]
    pub num_unit: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Mapping {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub memory_start: u64,
    #[prost(uint64, tag = "3")]
    pub memory_limit: u64,
    #[prost(uint64, tag = "4")]
    pub file_offset: u64,
    #[prost(int64, tag = "5")]
    pub filename: i64,
    #[prost(int64, tag = "6")]
    pub build_id: i64,
    #[prost(bool, tag = "7")]
    pub has_functions: bool,
    #[prost(bool, tag = "8")]
    pub has_filenames: bool,
    #[prost(bool, tag = "9")]
    pub has_line_numbers: bool,
    #[prost(bool, tag = "10")]
    pub has_inline_frames: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct Location {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub mapping_id: u64,
    #[prost(uint64, tag = "3")]
    pub address: u64,
    /// Inlined frames first; the last entry is the caller they were inlined into.
    #[prost(message, repeated, tag = "4")]
    pub line: Vec<Line>,
    #[prost(bool, tag = "5")]
    pub is_folded: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct Line {
    #[prost(uint64, tag = "1")]
    pub function_id: u64,
    #[prost(int64, tag = "2")]
    pub line: i64,
    #[prost(int64, tag = "3")]
    pub column: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Function {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(int64, tag = "2")]
    pub name: i64,
    #[prost(int64, tag = "3")]
    pub system_name: i64,
    #[prost(int64, tag = "4")]
    pub filename: i64,
    #[prost(int64, tag = "5")]
    pub start_line: i64,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode a profile from file contents, decompressing gzip when present.
pub fn decode(data: &[u8]) -> Result<Profile, EngineError> {
    let profile = if data.starts_with(&GZIP_MAGIC) {
        let mut raw = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut raw)
            .map_err(EngineError::Decompress)?;
        Profile::decode(raw.as_slice())?
    } else {
        Profile::decode(data)?
    };
    validate(&profile)?;
    Ok(profile)
}

fn validate(profile: &Profile) -> Result<(), EngineError> {
    if profile.sample_type.is_empty() {
        return Err(EngineError::Malformed("profile has no sample types".into()));
    }
    let strings = profile.string_table.len() as i64;
    let string_ok = |idx: i64| (0..strings).contains(&idx);
    for vt in &profile.sample_type {
        if !string_ok(vt.ty) || !string_ok(vt.unit) {
            return Err(EngineError::Malformed("sample type string out of range".into()));
        }
    }

    let functions: HashMap<u64, &Function> =
        profile.function.iter().map(|f| (f.id, f)).collect();
    for f in &profile.function {
        if !string_ok(f.name) {
            return Err(EngineError::Malformed(format!(
                "function {} name out of range",
                f.id
            )));
        }
    }

    let locations: HashMap<u64, &Location> =
        profile.location.iter().map(|l| (l.id, l)).collect();
    for loc in &profile.location {
        for line in &loc.line {
            if !functions.contains_key(&line.function_id) {
                return Err(EngineError::Malformed(format!(
                    "location {} references unknown function {}",
                    loc.id, line.function_id
                )));
            }
        }
    }

    for (i, sample) in profile.sample.iter().enumerate() {
        if sample.value.len() != profile.sample_type.len() {
            return Err(EngineError::Malformed(format!(
                "sample {} has {} values, want {}",
                i,
                sample.value.len(),
                profile.sample_type.len()
            )));
        }
        if let Some(id) = sample.location_id.iter().find(|id| !locations.contains_key(id)) {
            return Err(EngineError::Malformed(format!(
                "sample {} references unknown location {}",
                i, id
            )));
        }
    }
    Ok(())
}

impl Profile {
    pub fn string(&self, idx: i64) -> &str {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.string_table.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn sample_type_names(&self) -> Vec<String> {
        self.sample_type
            .iter()
            .map(|vt| format!("{}/{}", self.string(vt.ty), self.string(vt.unit)))
            .collect()
    }

    /// Resolve a sample index given by name or position. An empty selector
    /// picks `default_sample_type` if set, otherwise the last sample type.
    pub fn sample_index(&self, selector: &str) -> Result<usize, EngineError> {
        if selector.is_empty() {
            if self.default_sample_type != 0 {
                let name = self.string(self.default_sample_type);
                if let Some(i) = self.sample_type.iter().position(|vt| self.string(vt.ty) == name) {
                    return Ok(i);
                }
            }
            return Ok(self.sample_type.len() - 1);
        }
        if let Ok(n) = selector.parse::<usize>() {
            if n < self.sample_type.len() {
                return Ok(n);
            }
            return Err(EngineError::SampleIndex(selector.to_string()));
        }
        self.sample_type
            .iter()
            .position(|vt| self.string(vt.ty) == selector)
            .ok_or_else(|| EngineError::SampleIndex(selector.to_string()))
    }

    /// Frame names for every location, leaf first, inlined frames expanded.
    pub(crate) fn location_frames(&self) -> HashMap<u64, Vec<String>> {
        let functions: HashMap<u64, &Function> =
            self.function.iter().map(|f| (f.id, f)).collect();
        self.location
            .iter()
            .map(|loc| {
                let frames = if loc.line.is_empty() {
                    vec![format!("{:#x}", loc.address)]
                } else {
                    loc.line
                        .iter()
                        .map(|line| {
                            functions
                                .get(&line.function_id)
                                .map(|f| self.string(f.name).to_string())
                                .filter(|n| !n.is_empty())
                                .unwrap_or_else(|| format!("{:#x}", loc.address))
                        })
                        .collect()
                };
                (loc.id, frames)
            })
            .collect()
    }
}
