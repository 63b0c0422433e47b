use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;

use crate::grid::{Grid, GridError};

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad level {level}: {source}")]
    Parse {
        level: String,
        #[source]
        source: GridError,
    },
}

/// Turns a level identifier into a fresh grid.
pub trait LevelSource {
    fn load(&self, level: &str) -> Result<Grid, LevelError>;
}

/// Levels stored one per file; the identifier is the file path.
pub struct FileLevels;

impl LevelSource for FileLevels {
    fn load(&self, level: &str) -> Result<Grid, LevelError> {
        let text = std::fs::read_to_string(level).map_err(|source| LevelError::Io {
            path: level.to_string(),
            source,
        })?;
        text.parse().map_err(|source| LevelError::Parse {
            level: level.to_string(),
            source,
        })
    }
}

/// Regular files in `dir`, sorted by name.
pub fn list_levels(dir: &Path) -> Result<Vec<String>, LevelError> {
    if !dir.is_dir() {
        return Err(LevelError::NotADirectory(dir.to_path_buf()));
    }
    let io_err = |source| LevelError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut files = vec![];
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            files.push(path.display().to_string());
        }
    }

    files.sort();
    Ok(files)
}

/// Levels not played yet; drawn at random without replacement.
#[derive(Debug, Clone)]
pub struct LevelPool {
    remaining: Vec<String>,
}

impl LevelPool {
    pub fn new(levels: Vec<String>) -> Self {
        Self { remaining: levels }
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.remaining.len());
        Some(self.remaining.swap_remove(idx))
    }
}

/// Display name for a level identifier: the file stem when it has one.
pub fn level_name(level: &str) -> String {
    Path::new(level)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| level.to_string())
}

#[cfg(test)]
pub(crate) struct StaticLevels(pub std::collections::HashMap<String, String>);

#[cfg(test)]
impl StaticLevels {
    pub(crate) fn new(levels: &[(&str, &str)]) -> Self {
        StaticLevels(levels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }
}

#[cfg(test)]
impl LevelSource for StaticLevels {
    fn load(&self, level: &str) -> Result<Grid, LevelError> {
        let text = self.0.get(level).ok_or_else(|| LevelError::Io {
            path: level.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such level"),
        })?;
        text.parse().map_err(|source| LevelError::Parse {
            level: level.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_pool_draws_each_level_once() {
        let names: Vec<String> = (0..6).map(|i| format!("level{}", i)).collect();
        let mut pool = LevelPool::new(names.clone());
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = HashSet::new();

        for expected_left in (0..names.len()).rev() {
            let level = pool.draw(&mut rng).unwrap();
            assert!(seen.insert(level));
            assert_eq!(pool.len(), expected_left);
        }

        assert!(pool.is_empty());
        assert_eq!(pool.draw(&mut rng), None);
        assert_eq!(seen.len(), names.len());
    }

    #[test]
    fn test_list_levels_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.dat"), "1 1\n&").unwrap();
        std::fs::write(dir.path().join("a.dat"), "1 1\n&").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let levels = list_levels(dir.path()).unwrap();

        assert_eq!(levels.len(), 2);
        assert!(levels[0].ends_with("a.dat"));
        assert!(levels[1].ends_with("b.dat"));
    }

    #[test]
    fn test_list_levels_requires_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.dat");
        std::fs::write(&file, "").unwrap();

        assert!(matches!(list_levels(&file), Err(LevelError::NotADirectory(_))));
    }

    #[test]
    fn test_file_levels_load_and_report_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.dat");
        let bad = dir.path().join("bad.dat");
        std::fs::write(&good, "3 3\n###\n#&#\n###\n").unwrap();
        std::fs::write(&bad, "three three\n").unwrap();

        let grid = FileLevels.load(&good.display().to_string()).unwrap();
        assert_eq!(grid.width(), 3);

        let err = FileLevels.load(&bad.display().to_string()).unwrap_err();
        assert!(matches!(err, LevelError::Parse { source: GridError::MalformedHeader(_), .. }));

        let missing = dir.path().join("missing.dat");
        assert!(matches!(
            FileLevels.load(&missing.display().to_string()),
            Err(LevelError::Io { .. })
        ));
    }

    #[test]
    fn test_level_name() {
        assert_eq!(level_name("levels/maze1.dat"), "maze1");
        assert_eq!(level_name("plain"), "plain");
    }
}
