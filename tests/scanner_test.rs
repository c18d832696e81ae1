//! Scanning real directories and collecting lookup items from them.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use reelname::scanner::{
    collect, Detection, ItemCollector, MediaGuess, MediaNode, MediaTree,
};
use reelname::{Error, MediaKind, Phase, Result};

fn library() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let season = dir.path().join("Dark").join("Season 1");
    fs::create_dir_all(&season).unwrap();
    fs::write(season.join("Dark.S01E01.mkv"), b"").unwrap();
    fs::write(season.join("Dark.S01E01.srt"), b"").unwrap();
    fs::write(season.join("Dark.S01E02.mkv"), b"").unwrap();

    let movie = dir.path().join("Heat (1995)");
    fs::create_dir_all(&movie).unwrap();
    fs::write(movie.join("Heat.1995.mkv"), b"").unwrap();
    fs::write(movie.join("notes.txt"), b"").unwrap();
    dir
}

/// Recognizes the handful of names `library()` creates.
fn classify(node: &MediaNode) -> Result<Detection> {
    let name = node.name();
    let detection = match name.as_str() {
        "Dark" => Detection::new(MediaKind::Show, MediaGuess::titled("Dark")),
        "Season 1" => Detection::new(MediaKind::Season, MediaGuess::titled("Dark").with_season(1)),
        "Dark.S01E01" => Detection::new(
            MediaKind::Episode,
            MediaGuess::titled("Dark").with_season(1).with_episode(1),
        ),
        "Dark.S01E02" => Detection::new(
            MediaKind::Episode,
            MediaGuess::titled("Dark").with_season(1).with_episode(2),
        ),
        "Heat (1995)" | "Heat.1995" => Detection::new(
            MediaKind::Movie,
            MediaGuess::titled("Heat").with_year(1995),
        ),
        "notes" => return Err(Error::Internal("unparseable".into())),
        _ => Detection::unknown(),
    };
    Ok(detection)
}

#[test]
fn scan_builds_sorted_tree() {
    let dir = library();
    let tree = MediaTree::scan(dir.path()).unwrap();

    // root + 2 dirs + season dir + 3 episode files + movie file + notes
    assert_eq!(tree.len(), 9);
    let names: Vec<String> = tree
        .breadth_first()
        .iter()
        .skip(1)
        .take(2)
        .map(|n| n.name())
        .collect();
    assert_eq!(names, vec!["Dark", "Heat (1995)"]);
}

#[test]
fn scan_missing_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = MediaTree::scan(&dir.path().join("missing"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn collect_from_disk() {
    let dir = library();
    let tree = MediaTree::scan(dir.path()).unwrap();

    let items = collect(&tree, classify);
    let keys: Vec<&str> = items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "show|dark|0|0|0",
            "movie|heat|1995|0|0",
            "season|dark|0|1|0",
            "episode|dark|0|1|1",
            "episode|dark|0|1|2",
        ]
    );

    let heat = &items[1];
    assert!(heat.node.path.ends_with("Heat.1995.mkv"));
    assert_eq!(heat.phase, Phase::Titles);

    // the subtitle shares the key but the video stays canonical
    let pilot = &items[3];
    assert!(pilot.node.path.ends_with("Dark.S01E01.mkv"));
    assert_eq!(pilot.parent_key.as_deref(), Some("show|dark|0|0|0"));
}

#[test]
fn classifier_runs_once_per_node() {
    let dir = library();
    let tree = MediaTree::scan(dir.path()).unwrap();
    let calls = AtomicUsize::new(0);

    let collector = ItemCollector::new(|node: &MediaNode| -> Result<Detection> {
        calls.fetch_add(1, Ordering::SeqCst);
        classify(node)
    });
    let first = collector.collect(&tree);
    let second = collector.collect(&tree);

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), tree.len());
}
