use foley_cli::Board;
use foley_core::{EffectCatalog, GroupId, Variant};
use std::fs;
use tempfile::TempDir;

#[test]
fn board_file_loads_with_paths_next_to_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tavern.toml");
    fs::write(
        &path,
        r#"
            [[groups]]
            id = "fire"
            name = "Hearth"
            variant = "looping"
            effects = [{ id = "fire-1", source = "sfx/fire.ogg" }]

            [[groups]]
            id = "music"
            variant = "soundtrack"
            crossfade_ms = 4000
            effects = [
                { id = "jig", source = "music/jig.ogg", streaming = true },
                { id = "reel", source = "music/reel.ogg", streaming = true },
            ]
        "#,
    )
    .unwrap();

    let board = Board::load(&path).unwrap();
    assert_eq!(board.len(), 2);

    let fire = board.resolve(&GroupId::new("fire")).unwrap();
    assert_eq!(fire.name, "Hearth");
    assert_eq!(
        fire.effects[0].source.as_path(),
        Some(dir.path().join("sfx/fire.ogg").as_path())
    );

    let music = board.resolve(&GroupId::new("music")).unwrap();
    assert_eq!(music.variant, Variant::Soundtrack);
    assert_eq!(music.crossfade_ms, Some(4000));
}

#[test]
fn missing_board_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.toml");
    let err = Board::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("nope.toml"));
}

#[test]
fn unknown_variant_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
            [[groups]]
            id = "x"
            variant = "shuffle"
        "#,
    )
    .unwrap();
    assert!(Board::load(&path).is_err());
}
