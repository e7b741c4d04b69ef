//! Model-file resolution

use crate::engine::MODEL_EXT;
use std::path::{Path, PathBuf};

/// Outcome of a resolution attempt.
///
/// When the supplied path was itself a regular file, `model_dir` is the
/// containing directory and `model_name` is the file name with a known
/// archive extension stripped.
pub(crate) struct Resolution {
    pub file: Option<PathBuf>,
    pub model_dir: PathBuf,
    pub model_name: Option<String>,
}

/// Find the model file under `model_dir`, trying each candidate stem as the
/// literal name and as `stem.pt`.
pub(crate) fn find_model_file(model_dir: &Path, candidates: &[String]) -> Resolution {
    if model_dir.is_file() {
        let file = model_dir.to_path_buf();
        let parent = model_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = format!(".{MODEL_EXT}");
        let model_name = file_name
            .strip_suffix(&extension)
            .unwrap_or(&file_name)
            .to_string();
        return Resolution {
            file: Some(file),
            model_dir: parent,
            model_name: Some(model_name),
        };
    }

    let extension = format!(".{MODEL_EXT}");
    for stem in candidates {
        let literal = model_dir.join(stem);
        if literal.is_file() {
            let model_name = stem.strip_suffix(&extension).unwrap_or(stem).to_string();
            return Resolution {
                file: Some(literal),
                model_dir: model_dir.to_path_buf(),
                model_name: Some(model_name),
            };
        }
        if !stem.ends_with(&extension) {
            let with_ext = model_dir.join(format!("{stem}.{MODEL_EXT}"));
            if with_ext.is_file() {
                return Resolution {
                    file: Some(with_ext),
                    model_dir: model_dir.to_path_buf(),
                    model_name: Some(stem.clone()),
                };
            }
        }
    }

    Resolution {
        file: None,
        model_dir: model_dir.to_path_buf(),
        model_name: None,
    }
}
