//! Face datasets on disk: one directory per identity, or a fixed LFW pairs
//! protocol file.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::EvalError;
use crate::pairs::{Pair, Relation};

pub const DEFAULT_EXTENSIONS: [&str; 4] = ["pgm", "png", "jpg", "jpeg"];

/// Image paths grouped by identity. The label is the identity directory name.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    images: BTreeMap<String, Vec<PathBuf>>,
}

impl Dataset {
    /// Scan `root` for identity sub-directories (e.g. AT&T `s1/ .. s40/`).
    ///
    /// Identities without a matching image are skipped. Files are sorted so
    /// the mapping is the same on every platform.
    pub fn load<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Result<Self> {
        let entries = std::fs::read_dir(root)
            .with_context(|| format!("reading dataset root {}", root.display()))?;

        let mut images = BTreeMap::new();
        for entry in entries {
            let entry = entry?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let label = entry.file_name().to_string_lossy().into_owned();
            let mut files = Vec::new();
            for file in std::fs::read_dir(&dir)
                .with_context(|| format!("reading identity directory {}", dir.display()))?
            {
                let path = file?.path();
                if path.is_file() && has_extension(&path, extensions) {
                    files.push(path);
                }
            }
            if files.is_empty() {
                log::debug!("skipping {}: no images", dir.display());
                continue;
            }
            files.sort();
            images.insert(label, files);
        }

        let dataset = Self { images };
        if dataset.num_images() == 0 {
            return Err(EvalError::insufficient(format!(
                "no images found under {}",
                root.display()
            ))
            .into());
        }
        log::info!(
            "Loaded {} images of {} identities from {}",
            dataset.num_images(),
            dataset.num_identities(),
            root.display()
        );
        Ok(dataset)
    }

    pub fn from_map(images: BTreeMap<String, Vec<PathBuf>>) -> Self {
        Self { images }
    }

    pub fn images_by_label(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        &self.images
    }

    pub fn num_identities(&self) -> usize {
        self.images.len()
    }

    pub fn num_images(&self) -> usize {
        self.images.values().map(Vec::len).sum()
    }
}

fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.as_ref().eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Path of image `index` of `name` in the LFW layout.
pub fn lfw_image_path(root: &Path, name: &str, index: u32) -> PathBuf {
    root.join(name).join(format!("{}_{:04}.jpg", name, index))
}

/// Read an LFW `pairs.txt`.
///
/// After an optional header of one or two integers, each line is either
/// `name i j` (same person) or `name1 i name2 j` (different people).
pub fn load_lfw_pairs(root: &Path, pairs_file: &Path) -> Result<Vec<Pair<String, PathBuf>>> {
    let raw = std::fs::read_to_string(pairs_file)
        .with_context(|| format!("reading pairs file {}", pairs_file.display()))?;
    let pairs = parse_lfw_pairs(root, &raw)
        .with_context(|| format!("parsing pairs file {}", pairs_file.display()))?;
    log::info!("Read {} pairs from {}", pairs.len(), pairs_file.display());
    Ok(pairs)
}

pub fn parse_lfw_pairs(root: &Path, raw: &str) -> Result<Vec<Pair<String, PathBuf>>, EvalError> {
    let mut pairs = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let lineno = idx + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let is_header = lineno == 1 && fields.iter().all(|f| f.parse::<u32>().is_ok());
        if is_header {
            continue;
        }
        let index = |s: &str| {
            s.parse::<u32>().map_err(|_| {
                EvalError::invalid(format!("line {}: `{}` is not an image index", lineno, s))
            })
        };
        let pair = match fields.as_slice() {
            [name, i, j] => Pair {
                a: lfw_image_path(root, name, index(*i)?),
                b: lfw_image_path(root, name, index(*j)?),
                label_a: name.to_string(),
                label_b: name.to_string(),
                relation: Relation::Same,
            },
            [name_a, _, name_b, _] if name_a == name_b => {
                return Err(EvalError::invalid(format!(
                    "line {}: mismatched pair names the same person `{}` twice",
                    lineno, name_a
                )))
            }
            [name_a, i, name_b, j] => Pair {
                a: lfw_image_path(root, name_a, index(*i)?),
                b: lfw_image_path(root, name_b, index(*j)?),
                label_a: name_a.to_string(),
                label_b: name_b.to_string(),
                relation: Relation::Different,
            },
            _ => {
                return Err(EvalError::invalid(format!(
                    "line {}: expected 3 or 4 fields, got {}",
                    lineno,
                    fields.len()
                )))
            }
        };
        pairs.push(pair);
    }
    if pairs.is_empty() {
        return Err(EvalError::insufficient("pairs file lists no pairs"));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::count_relations;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("facebench-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_identity_directories() {
        let root = scratch_dir("dataset");
        for (person, files) in [("s1", 3), ("s2", 2), ("s3", 0)] {
            let dir = root.join(person);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..files {
                std::fs::write(dir.join(format!("{}.PGM", i)), b"").unwrap();
            }
            std::fs::write(dir.join("notes.txt"), b"").unwrap();
        }
        std::fs::write(root.join("README"), b"").unwrap();

        let ds = Dataset::load(&root, &DEFAULT_EXTENSIONS).unwrap();
        assert_eq!(ds.num_identities(), 2);
        assert_eq!(ds.num_images(), 5);
        let s1 = &ds.images_by_label()["s1"];
        assert!(s1.windows(2).all(|w| w[0] < w[1]));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_load_empty_dataset() {
        let root = scratch_dir("empty");
        std::fs::create_dir_all(root.join("s1")).unwrap();
        let err = Dataset::load(&root, &DEFAULT_EXTENSIONS).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::InsufficientData(_))
        ));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_parse_lfw_pairs() {
        let raw = "10\t300\nAbel_Pacheco\t1\t4\nAbdel_Madi_Shabneh\t1\tDean_Barker\t1\n\n";
        let pairs = parse_lfw_pairs(Path::new("lfw"), raw).unwrap();
        assert_eq!(count_relations(&pairs), (1, 1));
        assert_eq!(
            pairs[0].b,
            Path::new("lfw/Abel_Pacheco/Abel_Pacheco_0004.jpg")
        );
        assert_eq!(pairs[1].label_b, "Dean_Barker");
        assert!(pairs.iter().all(|p| p.is_label_consistent()));
    }

    #[test]
    fn test_parse_lfw_pairs_rejects_garbage() {
        let err = parse_lfw_pairs(Path::new("lfw"), "300\nAbel_Pacheco\tone\t4\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        let err = parse_lfw_pairs(Path::new("lfw"), "a b c d e\n").unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
        assert!(parse_lfw_pairs(Path::new("lfw"), "300\n").is_err());
    }

    #[test]
    fn test_parse_lfw_pairs_rejects_mismatched_self_pair() {
        let raw = "1\t2\nAda\t1\t2\nAda\t1\tAda\t2\n";
        let err = parse_lfw_pairs(Path::new("lfw"), raw).unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
        assert!(err.to_string().contains("line 3"), "{}", err);
    }
}
