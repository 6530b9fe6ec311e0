//! Batch prompt loader for uploaded prompt files.
//!
//! Two JSON shapes are accepted:
//!
//! ```text
//! [{"prompt": "a"}, {"prompt": "b"}]
//! {"scenes": [{"prompt": "a"}, {"prompt": "b"}]}
//! ```
//!
//! Plain-text uploads carry one prompt per line.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum BatchLoadError {
    #[error("file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The JSON parsed but is neither an array of `{prompt}` objects nor an
    /// object with a `scenes` array of them.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    #[error("file contains no prompts")]
    Empty,
}

/// Extract prompts from a parsed JSON document.
pub fn prompts_from_value(value: &Value) -> Result<Vec<String>, BatchLoadError> {
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("scenes") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(BatchLoadError::InvalidStructure(
                    "`scenes` must be an array".to_string(),
                ))
            }
            None => {
                return Err(BatchLoadError::InvalidStructure(
                    "expected an array of {prompt} objects or an object with a `scenes` array"
                        .to_string(),
                ))
            }
        },
        _ => {
            return Err(BatchLoadError::InvalidStructure(
                "expected an array or an object at the top level".to_string(),
            ))
        }
    };

    let mut prompts = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match entry.get("prompt") {
            Some(Value::String(p)) => {
                let p = p.trim();
                if !p.is_empty() {
                    prompts.push(p.to_string());
                }
            }
            _ => {
                return Err(BatchLoadError::InvalidStructure(format!(
                    "entry {i} has no string `prompt` field"
                )))
            }
        }
    }

    if prompts.is_empty() {
        return Err(BatchLoadError::Empty);
    }
    Ok(prompts)
}

/// Parse an uploaded JSON file into prompts.
pub fn parse_json(text: &str) -> Result<Vec<String>, BatchLoadError> {
    let value: Value = serde_json::from_str(text)?;
    prompts_from_value(&value)
}

/// Parse a plain-text upload: one prompt per non-blank line.
pub fn parse_text(text: &str) -> Result<Vec<String>, BatchLoadError> {
    let prompts: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if prompts.is_empty() {
        return Err(BatchLoadError::Empty);
    }
    Ok(prompts)
}

/// The currently loaded prompt list.
///
/// Every `load_*` call replaces the list only when the new file parses;
/// on error the previous prompts stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptList {
    prompts: Vec<String>,
}

impl PromptList {
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn load_json(&mut self, text: &str) -> Result<usize, BatchLoadError> {
        let prompts = parse_json(text)?;
        Ok(self.replace(prompts))
    }

    pub fn load_text(&mut self, text: &str) -> Result<usize, BatchLoadError> {
        let prompts = parse_text(text)?;
        Ok(self.replace(prompts))
    }

    /// Load by file name: `.json` files as JSON, anything else as text.
    pub fn load_file(&mut self, file_name: &str, text: &str) -> Result<usize, BatchLoadError> {
        if file_name.to_ascii_lowercase().ends_with(".json") {
            self.load_json(text)
        } else {
            self.load_text(text)
        }
    }

    pub fn clear(&mut self) {
        self.prompts.clear();
    }

    fn replace(&mut self, prompts: Vec<String>) -> usize {
        self.prompts = prompts;
        self.prompts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn loads_bare_array() {
        let prompts = parse_json(r#"[{"prompt":"a"},{"prompt":"b"}]"#).unwrap();
        assert_eq!(prompts, vec!["a", "b"]);
    }

    #[test]
    fn loads_scenes_object() {
        let prompts = parse_json(r#"{"scenes":[{"prompt":"a"},{"prompt":"b"}]}"#).unwrap();
        assert_eq!(prompts, vec!["a", "b"]);
    }

    #[test]
    fn extra_fields_ignored() {
        let prompts =
            parse_json(r#"{"title":"x","scenes":[{"prompt":"a","duration":4}]}"#).unwrap();
        assert_eq!(prompts, vec!["a"]);
    }

    #[test]
    fn object_without_scenes_is_invalid_structure() {
        assert_matches!(
            parse_json(r#"{"prompts":["a"]}"#),
            Err(BatchLoadError::InvalidStructure(_))
        );
    }

    #[test]
    fn scenes_not_array_is_invalid_structure() {
        assert_matches!(
            parse_json(r#"{"scenes":"a"}"#),
            Err(BatchLoadError::InvalidStructure(_))
        );
    }

    #[test]
    fn entry_without_prompt_is_invalid_structure() {
        assert_matches!(
            parse_json(r#"[{"prompt":"a"},{"text":"b"}]"#),
            Err(BatchLoadError::InvalidStructure(_))
        );
        assert_matches!(
            parse_json(r#"["a","b"]"#),
            Err(BatchLoadError::InvalidStructure(_))
        );
    }

    #[test]
    fn scalar_is_invalid_structure() {
        assert_matches!(parse_json("42"), Err(BatchLoadError::InvalidStructure(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert_matches!(parse_json("{not json"), Err(BatchLoadError::Parse(_)));
    }

    #[test]
    fn blank_prompts_skipped() {
        assert_eq!(
            parse_json(r#"[{"prompt":" "},{"prompt":" b "}]"#).unwrap(),
            vec!["b"]
        );
        assert_matches!(parse_json("[]"), Err(BatchLoadError::Empty));
    }

    #[test]
    fn text_one_prompt_per_line() {
        assert_eq!(parse_text("a\n\n b \n").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn failed_load_keeps_previous_prompts() {
        let mut list = PromptList::default();
        list.load_json(r#"[{"prompt":"keep me"}]"#).unwrap();

        assert!(list.load_json(r#"{"foo":1}"#).is_err());
        assert!(list.load_json("garbage").is_err());

        assert_eq!(list.prompts(), ["keep me".to_string()]);
    }

    #[test]
    fn load_file_dispatches_on_extension() {
        let mut list = PromptList::default();
        assert_eq!(list.load_file("shots.JSON", r#"[{"prompt":"a"}]"#).unwrap(), 1);
        assert_eq!(list.load_file("shots.txt", "x\ny").unwrap(), 2);
        assert_eq!(list.prompts(), ["x".to_string(), "y".to_string()]);
    }
}
