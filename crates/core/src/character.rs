//! User-authored characters and universes.
//!
//! Characters carry no behaviour of their own; their descriptions are
//! interpolated into prompts so that independent generation calls render
//! the same people consistently.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::ArtifactRef;

/// Maximum length of a character description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub description: String,
    /// Picture of the character. Story scenes edit this image instead of
    /// generating one from scratch.
    #[serde(default)]
    pub reference_image: Option<ArtifactRef>,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            reference_image: None,
        }
    }

    /// A character is usable once both name and description are non-blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "character name must not be empty".to_string(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "character '{}' needs a description",
                self.name.trim()
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(CoreError::Validation(format!(
                "character '{}' description exceeds {MAX_DESCRIPTION_LEN} characters",
                self.name.trim()
            )));
        }
        Ok(())
    }
}

/// A named collection of characters shared across a story.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub name: String,
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl Universe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            characters: Vec::new(),
        }
    }

    /// Add a character, rejecting invalid entries and duplicate names
    /// (case-insensitive).
    pub fn add(&mut self, character: Character) -> Result<(), CoreError> {
        character.validate()?;
        let name = character.name.trim().to_lowercase();
        if self
            .characters
            .iter()
            .any(|c| c.name.trim().to_lowercase() == name)
        {
            return Err(CoreError::Conflict(format!(
                "universe '{}' already has a character named '{}'",
                self.name,
                character.name.trim()
            )));
        }
        self.characters.push(character);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&Character> {
        let name = name.trim().to_lowercase();
        self.characters
            .iter()
            .find(|c| c.name.trim().to_lowercase() == name)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.characters.iter().try_for_each(Character::validate)
    }
}

/// Reference image of the first character that has one.
pub fn first_reference(characters: &[Character]) -> Option<&ArtifactRef> {
    characters.iter().find_map(|c| c.reference_image.as_ref())
}

/// Interpolate character descriptions into a prompt.
///
/// Returns the prompt unchanged when `characters` is empty. Every character
/// must validate first.
pub fn compose_prompt(prompt: &str, characters: &[Character]) -> Result<String, CoreError> {
    if characters.is_empty() {
        return Ok(prompt.trim().to_string());
    }
    characters.iter().try_for_each(Character::validate)?;

    let mut out = String::from(prompt.trim());
    out.push_str("\n\nCharacters (keep their appearance consistent):");
    for c in characters {
        out.push_str(&format!("\n- {}: {}", c.name.trim(), c.description.trim()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn blank_name_rejected() {
        let c = Character::new("  ", "tall");
        assert_matches!(c.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn blank_description_rejected() {
        let c = Character::new("Mira", "\n");
        assert_matches!(c.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn compose_without_characters_is_identity() {
        assert_eq!(compose_prompt(" a forest ", &[]).unwrap(), "a forest");
    }

    #[test]
    fn compose_lists_characters() {
        let chars = vec![
            Character::new("Mira", "a red-haired pilot"),
            Character::new("Bolt", "a small brass robot"),
        ];
        let prompt = compose_prompt("They land on the moon", &chars).unwrap();
        assert!(prompt.starts_with("They land on the moon"));
        assert!(prompt.contains("- Mira: a red-haired pilot"));
        assert!(prompt.contains("- Bolt: a small brass robot"));
    }

    #[test]
    fn compose_rejects_invalid_character() {
        let chars = vec![Character::new("Mira", "")];
        assert!(compose_prompt("x", &chars).is_err());
    }

    #[test]
    fn universe_rejects_duplicate_names() {
        let mut u = Universe::new("Skyport");
        u.add(Character::new("Mira", "pilot")).unwrap();
        assert_matches!(
            u.add(Character::new("mira ", "another pilot")),
            Err(CoreError::Conflict(_))
        );
        assert!(u.find("MIRA").is_some());
    }
}
