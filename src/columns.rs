//! Column-name sanitation.
//!
//! Raw header labels are whitespace-normalized and made unique. Blank labels
//! become [`UNNAMED_COLUMN`]; the Nth repeat of a label gets an `_N` suffix,
//! with the counter advanced past any name already taken. Names are compared
//! ignoring case, as MySQL compares column names, but keep their spelling.

use std::{
    collections::{HashMap, HashSet},
    sync::OnceLock,
};

use regex::Regex;

pub const UNNAMED_COLUMN: &str = "Unnamed_Column";

fn whitespace_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\s\u{3000}]+").expect("static pattern"))
}

pub fn normalize_label(raw: &str) -> String {
    let collapsed = whitespace_run().replace_all(raw, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        UNNAMED_COLUMN.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn sanitize_columns<S>(labels: &[S]) -> Vec<String>
where
    S: AsRef<str>,
{
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::with_capacity(labels.len());
    let mut output = Vec::with_capacity(labels.len());

    for raw in labels {
        let label = normalize_label(raw.as_ref());
        let key = label.to_lowercase();
        let name = if !repeats.contains_key(&key) && !taken.contains(&key) {
            repeats.insert(key, 0);
            label
        } else {
            let counter = repeats.entry(key).or_insert(0);
            loop {
                *counter += 1;
                let candidate = format!("{label}_{counter}");
                if !taken.contains(&candidate.to_lowercase()) {
                    break candidate;
                }
            }
        };
        taken.insert(name.to_lowercase());
        output.push(name);
    }
    output
}
