//! Tag extraction capability
//!
//! Extraction is a pluggable collaborator: given a file path it returns
//! either the extracted tag mapping, an "unsupported format" signal, or a
//! per-file failure. The driver logs and skips the latter two; they never
//! abort a traversal.

use std::collections::BTreeMap;
use std::path::Path;

use lofty::error::ErrorKind;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::Accessor;

/// Result of extracting tags from one file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagOutcome {
    /// Tag name to values, in deterministic (sorted) order
    Supported(BTreeMap<String, Vec<String>>),
    /// The file is not a recognized audio format
    Unsupported,
    /// The file looked like audio but could not be read
    Failed(String),
}

/// Capability of reading tag metadata from a file
pub trait TagExtractor {
    fn extract(&self, path: &Path) -> TagOutcome;
}

/// Tag extractor backed by lofty, covering the common audio containers
#[derive(Clone, Copy, Debug, Default)]
pub struct AudioTagExtractor;

impl TagExtractor for AudioTagExtractor {
    fn extract(&self, path: &Path) -> TagOutcome {
        let tagged = match Probe::open(path).and_then(|probe| probe.read()) {
            Ok(tagged) => tagged,
            Err(err) => {
                return match err.kind() {
                    ErrorKind::UnknownFormat => TagOutcome::Unsupported,
                    _ => TagOutcome::Failed(err.to_string()),
                }
            }
        };

        let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for tag in tagged.tags() {
            let mut push = |name: &str, value: Option<String>| {
                if let Some(value) = value {
                    tags.entry(name.to_string()).or_default().push(value);
                }
            };

            push("album", tag.album().map(|v| v.into_owned()));
            push("artist", tag.artist().map(|v| v.into_owned()));
            push("comment", tag.comment().map(|v| v.into_owned()));
            push("genre", tag.genre().map(|v| v.into_owned()));
            push("title", tag.title().map(|v| v.into_owned()));
            push("track", tag.track().map(|v| v.to_string()));
            push("year", tag.year().map(|v| v.to_string()));
        }

        TagOutcome::Supported(tags)
    }
}

/// Join all tag values into the single text blob that gets indexed
pub fn join_tag_values(tags: &BTreeMap<String, Vec<String>>) -> String {
    tags.values()
        .flat_map(|values| values.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_tag_values() {
        let mut tags = BTreeMap::new();
        tags.insert("artist".to_string(), vec!["Pink Floyd".to_string()]);
        tags.insert(
            "title".to_string(),
            vec!["Money".to_string(), "Money (live)".to_string()],
        );
        assert_eq!(join_tag_values(&tags), "Pink Floyd Money Money (live)");
    }

    #[test]
    fn test_join_empty() {
        assert_eq!(join_tag_values(&BTreeMap::new()), "");
    }

    #[test]
    fn test_unsupported_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "not audio at all").unwrap();

        assert_eq!(AudioTagExtractor.extract(&path), TagOutcome::Unsupported);
    }

    #[test]
    fn test_missing_file_fails() {
        let outcome = AudioTagExtractor.extract(Path::new("/no/such/file.mp3"));
        assert!(matches!(outcome, TagOutcome::Failed(_)));
    }
}
