//! Tile blobs on disk, one `Tile_<x>_<y>.bin` file per tile

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

pub fn tile_file_name(x: usize, y: usize) -> String {
    format!("Tile_{}_{}.bin", x, y)
}

/// Grid location encoded in a tile file name
pub fn parse_tile_file_name(name: &str) -> Option<(usize, usize)> {
    let coords = name.strip_prefix("Tile_")?.strip_suffix(".bin")?;
    let (x, y) = coords.split_once('_')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}

pub fn write_tiles(dir: &Path, tiles: &[(usize, usize, Vec<u8>)]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut written = Vec::with_capacity(tiles.len());
    for (x, y, blob) in tiles {
        let path = dir.join(tile_file_name(*x, *y));
        fs::write(&path, blob).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} ({} bytes)", path.display(), blob.len());
        written.push(path);
    }
    Ok(written)
}

/// Reads every tile file of a directory, sorted by location
pub fn read_tiles(dir: &Path) -> Result<Vec<(usize, usize, Vec<u8>)>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut tiles = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some((x, y)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_tile_file_name)
        else {
            continue;
        };
        let blob = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        tiles.push((x, y, blob));
    }
    tiles.sort_by_key(|&(x, y, _)| (y, x));
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_file_names() {
        assert_eq!(tile_file_name(3, 12), "Tile_3_12.bin");
        assert_eq!(parse_tile_file_name("Tile_3_12.bin"), Some((3, 12)));
        assert_eq!(parse_tile_file_name("Tile_3.bin"), None);
        assert_eq!(parse_tile_file_name("Tile_-1_0.bin"), None);
        assert_eq!(parse_tile_file_name("scenario.json"), None);
    }
}
