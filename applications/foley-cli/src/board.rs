//! TOML board files
//!
//! A board lists soundboard groups with their variant and effects:
//!
//! ```toml
//! [[groups]]
//! id = "rain"
//! variant = "looping"
//! effects = [{ id = "rain-1", source = "sfx/rain.ogg" }]
//!
//! [[groups]]
//! id = "ambush"
//! variant = "sequence"
//! sequence = [
//!     { kind = "group", id = "horn", target = "horns" },
//!     { kind = "delay", id = "wait", duration_ms = 800 },
//!     { kind = "group", id = "arrows", target = "arrows" },
//! ]
//! ```
//!
//! Relative effect paths are resolved against the board file's directory.

use anyhow::{bail, Context};
use foley_core::{EffectCatalog, FoleyError, GroupId, ResolvedGroup, SourceRef};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct BoardFile {
    #[serde(default)]
    groups: Vec<ResolvedGroup>,
}

/// In-memory catalog read from a board file
#[derive(Debug, Clone, Default)]
pub struct Board {
    groups: Vec<ResolvedGroup>,
}

impl Board {
    /// Read and check a board file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading board file {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base).with_context(|| format!("parsing board file {}", path.display()))
    }

    /// Parse board text, resolving relative paths against `base`
    pub fn parse(text: &str, base: &Path) -> anyhow::Result<Self> {
        let file: BoardFile = toml::from_str(text)?;

        let mut seen = HashSet::new();
        let mut groups = Vec::with_capacity(file.groups.len());
        for mut group in file.groups {
            if !seen.insert(group.id.clone()) {
                bail!("duplicate group id '{}'", group.id);
            }
            for effect in &mut group.effects {
                if let SourceRef::Path(path) = &effect.source {
                    if path.is_relative() {
                        effect.source = SourceRef::path(base.join(path));
                    }
                }
            }
            groups.push(group);
        }

        Ok(Self { groups })
    }

    /// Groups in file order
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedGroup> {
        self.groups.iter()
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the board has no groups
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl EffectCatalog for Board {
    fn resolve(&self, group: &GroupId) -> foley_core::Result<ResolvedGroup> {
        self.groups
            .iter()
            .find(|g| &g.id == group)
            .cloned()
            .ok_or_else(|| FoleyError::GroupNotFound(group.clone()))
    }

    fn groups(&self) -> Vec<GroupId> {
        self.groups.iter().map(|g| g.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foley_core::{PlaybackRequest, SequenceElement, Variant};
    use std::path::PathBuf;
    use std::time::Duration;

    const BOARD: &str = r#"
        [[groups]]
        id = "rain"
        name = "Rain"
        variant = "looping"
        effects = [
            { id = "rain-1", source = "sfx/rain.ogg", volume = 80 },
            { id = "rain-2", source = "/abs/rain2.ogg", streaming = true },
        ]

        [[groups]]
        id = "doors"
        variant = "rapid"
        effects = [{ id = "door-1", source = "door.wav" }]

        [[groups]]
        id = "ambush"
        variant = "sequence"
        sequence = [
            { kind = "group", id = "a", target = "doors" },
            { kind = "delay", id = "d", duration_ms = 800 },
            { kind = "group", id = "b", target = "ghosts" },
        ]
    "#;

    #[test]
    fn relative_paths_resolve_against_board_dir() {
        let board = Board::parse(BOARD, Path::new("/boards")).unwrap();
        let rain = board.resolve(&GroupId::new("rain")).unwrap();

        assert_eq!(rain.variant, Variant::Looping);
        assert_eq!(
            rain.effects[0].source.as_path(),
            Some(PathBuf::from("/boards/sfx/rain.ogg").as_path())
        );
        assert_eq!(
            rain.effects[1].source.as_path(),
            Some(Path::new("/abs/rain2.ogg"))
        );
        assert_eq!(rain.effects[0].volume.percent(), 80);
        assert!(rain.effects[1].streaming);
    }

    #[test]
    fn sequence_request_resolves_known_targets_only() {
        let board = Board::parse(BOARD, Path::new("/boards")).unwrap();
        let request = PlaybackRequest::from_catalog(&board, &GroupId::new("ambush")).unwrap();

        let plan = request.sequence.unwrap();
        assert_eq!(
            plan.elements[1],
            SequenceElement::delay("d", Duration::from_millis(800))
        );
        assert_eq!(plan.effects_for(&GroupId::new("doors")).len(), 1);
        assert!(plan.effects_for(&GroupId::new("ghosts")).is_empty());
    }

    #[test]
    fn volume_above_limit_is_rejected() {
        let text = r#"
            [[groups]]
            id = "loud"
            variant = "default"
            effects = [{ id = "x", source = "x.wav", volume = 600 }]
        "#;
        assert!(Board::parse(text, Path::new(".")).is_err());
    }

    #[test]
    fn duplicate_groups_are_rejected() {
        let text = r#"
            [[groups]]
            id = "x"
            variant = "default"

            [[groups]]
            id = "x"
            variant = "rapid"
        "#;
        let err = Board::parse(text, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("duplicate group id"));
    }

    #[test]
    fn unknown_group_is_not_found() {
        let board = Board::parse(BOARD, Path::new(".")).unwrap();
        assert_eq!(
            board.resolve(&GroupId::new("nope")).unwrap_err(),
            FoleyError::GroupNotFound(GroupId::new("nope"))
        );
        assert_eq!(board.groups().len(), 3);
    }
}
