//! Issue id generation and lookup.
//!
//! Ids look like `tl-7k2q`: the configured prefix, a dash, then a prefix of
//! the random half of a fresh ULID in lowercase Crockford base32. The
//! suffix grows by one character once every id of the current length is
//! taken.

use std::collections::{HashMap, HashSet};

use ulid::Ulid;

use crate::config::IdConfig;
use crate::error::{Error, Result};
use crate::graph::Graph;

const ID_DELIMS: [&str; 2] = ["-", "/"];
const ULID_TIME_LEN: usize = 10;
const ULID_RANDOM_LEN: usize = 16;
const ULID_CHARSET: &str = "0123456789abcdefghjkmnpqrstvwxyz";
const ULID_CHARSET_LEN: u128 = 32;

/// Pick a fresh id that collides with nothing in `graph`
pub fn generate_id(graph: &Graph, config: &IdConfig) -> String {
    generate_id_from(graph.ids(), config)
}

pub fn generate_id_from<'a>(existing: impl IntoIterator<Item = &'a str>, config: &IdConfig) -> String {
    let prefix = config.prefix.trim();
    let mut existing_suffixes = HashSet::new();
    let mut ulid_suffix_counts: HashMap<usize, usize> = HashMap::new();
    for id in existing {
        let id_norm = normalize_id(id);
        let suffix = suffix_from_id(&id_norm);
        if suffix.is_empty() {
            continue;
        }
        if is_ulid_suffix(suffix) {
            *ulid_suffix_counts.entry(suffix.len()).or_insert(0) += 1;
        }
        existing_suffixes.insert(suffix.to_string());
    }

    let target_len = select_suffix_len(config.min_len, &ulid_suffix_counts);

    loop {
        let base = Ulid::new().to_string();
        if let Some(suffix) = unique_suffix_from_base(&base, target_len, &existing_suffixes) {
            return format!("{prefix}-{suffix}");
        }
    }
}

/// Resolve user input to a known id: exact id, exact suffix, or a unique
/// suffix prefix.
pub fn resolve_id(graph: &Graph, input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("issue id cannot be empty".to_string()));
    }
    if graph.contains(trimmed) {
        return Ok(trimmed.to_string());
    }

    let trimmed_norm = normalize_id(trimmed);
    let candidate_norm = suffix_from_id(&trimmed_norm).to_string();
    if candidate_norm.is_empty() {
        return Err(Error::InvalidArgument("issue id cannot be empty".to_string()));
    }

    let mut exact: Vec<String> = Vec::new();
    let mut matches: Vec<String> = Vec::new();

    for id in graph.ids() {
        let id_norm = normalize_id(id);
        let suffix_norm = suffix_from_id(&id_norm);
        if id_norm == trimmed_norm || suffix_norm == trimmed_norm {
            exact.push(id.to_string());
            continue;
        }
        if suffix_norm.starts_with(&candidate_norm) {
            matches.push(id.to_string());
        }
    }

    if exact.len() == 1 {
        return Ok(exact.remove(0));
    }
    if exact.len() > 1 {
        return Err(Error::InvalidArgument(format!(
            "ambiguous issue id '{}': {}",
            trimmed,
            exact.join(", ")
        )));
    }

    match matches.len() {
        0 => Err(Error::NotFound(trimmed.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::InvalidArgument(format!(
            "ambiguous issue id '{}': {}",
            trimmed,
            matches.join(", ")
        ))),
    }
}

fn unique_suffix_from_base(base: &str, len: usize, existing_suffixes: &HashSet<String>) -> Option<String> {
    let base = base.to_lowercase();
    let random_end = ULID_TIME_LEN + ULID_RANDOM_LEN;
    if base.len() < random_end || len == 0 || len > ULID_RANDOM_LEN {
        return None;
    }
    let random_part = &base[ULID_TIME_LEN..random_end];
    let candidate = &random_part[..len];
    if existing_suffixes.contains(candidate) {
        return None;
    }
    Some(candidate.to_string())
}

fn select_suffix_len(min_len: usize, ulid_suffix_counts: &HashMap<usize, usize>) -> usize {
    let mut len = min_len.clamp(1, ULID_RANDOM_LEN);
    loop {
        let used = ulid_suffix_counts.get(&len).copied().unwrap_or(0) as u128;
        if used >= ulid_space_for_len(len) && len < ULID_RANDOM_LEN {
            len += 1;
            continue;
        }
        return len;
    }
}

fn normalize_id(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn suffix_from_id(id_norm: &str) -> &str {
    let earliest = ID_DELIMS.iter().filter_map(|delim| id_norm.find(delim)).min();
    match earliest {
        Some(idx) => id_norm.get(idx + 1..).unwrap_or(""),
        None => id_norm,
    }
}

fn is_ulid_suffix(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ULID_CHARSET.contains(ch))
}

fn ulid_space_for_len(len: usize) -> u128 {
    let mut space = 1u128;
    for _ in 0..len {
        space *= ULID_CHARSET_LEN;
    }
    space
}
