//! Visibility cache: hits, misses and every way an entry can go bad.
//! A bad entry must always fall back to a fresh build.

use arena_core::{
    cache::VisibilityCache, grid::Grid, visibility::VisibilityIndex,
};
use flate2::{write::GzEncoder, Compression};
use std::fs;
use std::io::Write;

fn grid() -> Grid {
    Grid::parse(
        "
#######
#..#..#
#.....#
#..#..#
#######
",
    )
    .expect("grid")
}

fn write_gz(path: &std::path::Path, body: &str) {
    let file = fs::File::create(path).expect("create");
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(body.as_bytes()).expect("write");
    gz.finish().expect("finish");
}

#[test]
fn stored_index_loads_back_equal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = VisibilityCache::new(dir.path());
    let grid = grid();

    assert!(cache.load(&grid, 4).is_none(), "empty cache must miss");

    let built = VisibilityIndex::build(&grid, 4);
    cache.store(&grid, &built).expect("store");
    assert!(cache.path_for(&grid.content_hash(), 4).exists());

    let loaded = cache.load(&grid, 4).expect("hit");
    assert_eq!(loaded, built);
}

#[test]
fn radius_is_part_of_the_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = VisibilityCache::new(dir.path());
    let grid = grid();
    cache.store(&grid, &VisibilityIndex::build(&grid, 2)).expect("store");

    assert!(cache.load(&grid, 3).is_none());
    assert_eq!(VisibilityCache::load_or_build(Some(&cache), &grid, 3).radius(), 3);
    assert!(cache.path_for(&grid.content_hash(), 3).exists(), "miss writes through");
}

#[test]
fn garbage_file_is_a_miss() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = VisibilityCache::new(dir.path());
    let grid = grid();
    let path = cache.path_for(&grid.content_hash(), 4);
    fs::write(&path, b"definitely not gzip").expect("write");

    assert!(cache.load(&grid, 4).is_none());
    let index = VisibilityCache::load_or_build(Some(&cache), &grid, 4);
    assert_eq!(index, VisibilityIndex::build(&grid, 4));
    // The bad entry was replaced by a good one.
    assert_eq!(cache.load(&grid, 4), Some(index));
}

#[test]
fn valid_gzip_with_wrong_content_is_a_miss() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = VisibilityCache::new(dir.path());
    let grid = grid();
    let path = cache.path_for(&grid.content_hash(), 4);

    for body in [
        "[1, 2, 3]",
        r#"{"1/1": ["1/1"]}"#,
        r#"{"0/0": ["0/0"]}"#,
        r#"{"one/two": []}"#,
    ] {
        write_gz(&path, body);
        assert!(cache.load(&grid, 4).is_none(), "accepted {body}");
    }
}

#[test]
fn entry_for_another_grid_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = VisibilityCache::new(dir.path());
    let small = Grid::parse("...\n...").expect("grid");
    let big = grid();

    // Plant the small grid's index under the big grid's name.
    cache.store(&small, &VisibilityIndex::build(&small, 4)).expect("store");
    fs::rename(
        cache.path_for(&small.content_hash(), 4),
        cache.path_for(&big.content_hash(), 4),
    )
    .expect("rename");

    assert!(cache.load(&big, 4).is_none());
}

#[test]
fn no_cache_just_builds() {
    let grid = grid();
    assert_eq!(
        VisibilityCache::load_or_build(None, &grid, 4),
        VisibilityIndex::build(&grid, 4)
    );
}
