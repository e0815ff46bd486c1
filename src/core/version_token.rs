/*
 * Version markers embedded in asset names. A token is the trailing
 * `_<letter><digits>` group of a stem ("shot_100_v3" -> v3, "bg_T12" -> T12); an
 * extension after it is tolerated so callers may pass full filenames. The prefix
 * letter keeps its case for display, while grouping ignores it entirely (families
 * are keyed on the stem with the token stripped).
 *
 * Labels for tokens come from `VersionLabels`, a replaceable lookup table. A
 * process-wide default instance exists for callers that do not carry their own.
 */
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::{OnceLock, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionToken {
    pub prefix: char,
    pub number: u32,
}

impl VersionToken {
    pub fn new(prefix: char, number: u32) -> Self {
        VersionToken { prefix, number }
    }

    /* The `_<letter><n>` suffix this token renders to in a filename. */
    pub fn suffix(&self) -> String {
        format!("_{}{}", self.prefix, self.number)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

/*
 * Splits `name` into (base, token) when it ends in `_<letter><digits>`.
 * Digits are consumed greedily back to the letter, so "a_v12" yields v12.
 */
fn split_trailing_token(name: &str) -> Option<(&str, VersionToken)> {
    let underscore = name.rfind('_')?;
    let (base, tail) = name.split_at(underscore);
    let mut chars = tail[1..].chars();
    let prefix = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = digits.parse::<u32>().ok()?;
    Some((base, VersionToken { prefix, number }))
}

/*
 * Drops a single trailing `.ext` (word characters only) if one is present.
 */
fn strip_extension(name: &str) -> Option<&str> {
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(&name[..dot])
}

/*
 * Extracts the version token from a stem (or a filename with one extension).
 * `_v0` in any case is a plain instance of the general rule and always yields a
 * zero-numbered token.
 */
pub fn extract(stem: &str) -> Option<VersionToken> {
    split_trailing_token(stem)
        .or_else(|| strip_extension(stem).and_then(split_trailing_token))
        .map(|(_, token)| token)
}

/*
 * The family key of a stem: the stem without its version suffix. Returns `None`
 * for unversioned stems, which never join a family.
 */
pub fn base_name(stem: &str) -> Option<&str> {
    split_trailing_token(stem).map(|(base, _)| base)
}

/* What kind of asset a token belongs to; only affects label fallback. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Aep,
    Image,
    Folder,
    Video,
    Other,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        if path.is_dir() {
            return FileKind::Folder;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "aep" => FileKind::Aep,
            "mov" | "mp4" | "avi" | "mkv" | "webm" => FileKind::Video,
            e if IMAGE_EXTENSIONS.contains(&e) => FileKind::Image,
            _ => FileKind::Other,
        }
    }
}

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "psd", "tiff", "bmp", "gif", "tga", "exr", "dpx",
];

pub const PLACEHOLDER_KEY: &str = "V0";

#[derive(Debug)]
pub enum LabelsError {
    Io(io::Error),
    Serde(serde_json::Error),
}

impl From<io::Error> for LabelsError {
    fn from(err: io::Error) -> Self {
        LabelsError::Io(err)
    }
}

impl From<serde_json::Error> for LabelsError {
    fn from(err: serde_json::Error) -> Self {
        LabelsError::Serde(err)
    }
}

impl fmt::Display for LabelsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelsError::Io(e) => write!(f, "Version label file I/O error: {e}"),
            LabelsError::Serde(e) => write!(f, "Version label file is not a JSON object: {e}"),
        }
    }
}

impl std::error::Error for LabelsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LabelsError::Io(e) => Some(e),
            LabelsError::Serde(e) => Some(e),
        }
    }
}

/*
 * Maps tokens to human labels. Keys are either a full token ("V0") or a single
 * prefix letter ("T"); values may contain `{}` which receives the version number.
 * Keys compare case-insensitively.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLabels {
    mapping: HashMap<String, String>,
}

impl Default for VersionLabels {
    fn default() -> Self {
        let mapping = [
            (PLACEHOLDER_KEY, "placeholder/no-shot"),
            ("G", "line-shot G{}"),
            ("S", "line-shot S{}"),
            ("T", "timing-shot T{}"),
            ("P", "cg-shot P{}"),
            ("V", "main-shot V{}"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        VersionLabels { mapping }
    }
}

fn global_labels() -> &'static RwLock<VersionLabels> {
    static GLOBAL: OnceLock<RwLock<VersionLabels>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(VersionLabels::default()))
}

impl VersionLabels {
    /*
     * Loads a label table from a JSON object file. Entries override the defaults
     * key by key; keys not present keep their default label.
     */
    pub fn load_overrides(path: &Path) -> Result<Self, LabelsError> {
        let reader = BufReader::new(File::open(path)?);
        let overrides: HashMap<String, String> = serde_json::from_reader(reader)?;
        let mut labels = VersionLabels::default();
        for (key, value) in overrides {
            labels.set(&key, value);
        }
        log::debug!("VersionLabels: Loaded overrides from {path:?}");
        Ok(labels)
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.mapping
            .retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        self.mapping.insert(key.to_string(), value);
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.mapping
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn render(template: &str, number: u32) -> String {
        if template.contains("{}") {
            template.replacen("{}", &number.to_string(), 1)
        } else {
            template.to_string()
        }
    }

    /*
     * Human label for a token. The placeholder key (`V0`) wins regardless of the
     * file kind. AEP tokens with an unmapped letter are labelled as main-shot
     * revisions; everything else unmapped passes through as `<letter><n>`.
     */
    pub fn label(&self, token: &VersionToken, kind: FileKind) -> String {
        let full = token.to_string();
        if full.eq_ignore_ascii_case(PLACEHOLDER_KEY) {
            if let Some(label) = self.lookup(PLACEHOLDER_KEY) {
                return label.to_string();
            }
        }
        let prefix = token.prefix.to_string();
        if let Some(template) = self.lookup(&full).or_else(|| self.lookup(&prefix)) {
            return Self::render(template, token.number);
        }
        if kind == FileKind::Aep {
            if let Some(template) = self.lookup("V") {
                return Self::render(template, token.number);
            }
        }
        full
    }

    /* Returns a copy of the process-wide table. */
    pub fn global() -> VersionLabels {
        match global_labels().read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /* Replaces the process-wide table wholesale. */
    pub fn install_global(labels: VersionLabels) {
        match global_labels().write() {
            Ok(mut guard) => *guard = labels,
            Err(poisoned) => *poisoned.into_inner() = labels,
        }
        log::debug!("VersionLabels: Installed new process-wide label table");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_extract_from_filenames_and_stems() {
        assert_eq!(extract("shot_100_v3.aep"), Some(VersionToken::new('v', 3)));
        assert_eq!(extract("shot_100_v3"), Some(VersionToken::new('v', 3)));
        assert_eq!(extract("shot_100.aep"), None);
        assert_eq!(extract("shot_100_V0.mov"), Some(VersionToken::new('V', 0)));
        assert_eq!(extract("Demo_EP01_010_T12"), Some(VersionToken::new('T', 12)));
        assert_eq!(extract("Demo_EP01_010"), None);
        assert_eq!(extract("name_v"), None);
        assert_eq!(extract("noversion"), None);
        assert_eq!(extract("a_P007.png"), Some(VersionToken::new('P', 7)));
    }

    #[test]
    fn test_extract_v0_any_case() {
        assert_eq!(extract("x_v0"), Some(VersionToken::new('v', 0)));
        assert_eq!(extract("x_V0.aep"), Some(VersionToken::new('V', 0)));
    }

    #[test]
    fn test_base_name_strips_suffix() {
        assert_eq!(base_name("a_v3"), Some("a"));
        assert_eq!(base_name("Demo_010_011_T2"), Some("Demo_010_011"));
        assert_eq!(base_name("plain"), None);
    }

    #[test]
    fn test_default_labels() {
        let labels = VersionLabels::default();
        assert_eq!(
            labels.label(&VersionToken::new('V', 2), FileKind::Image),
            "main-shot V2"
        );
        assert_eq!(
            labels.label(&VersionToken::new('t', 4), FileKind::Folder),
            "timing-shot T4"
        );
        assert_eq!(
            labels.label(&VersionToken::new('X', 9), FileKind::Image),
            "X9"
        );
        assert_eq!(
            labels.label(&VersionToken::new('X', 9), FileKind::Aep),
            "main-shot V9"
        );
    }

    #[test]
    fn test_placeholder_label_ignores_kind() {
        let labels = VersionLabels::default();
        for kind in [FileKind::Aep, FileKind::Image, FileKind::Video, FileKind::Other] {
            assert_eq!(
                labels.label(&VersionToken::new('v', 0), kind),
                "placeholder/no-shot"
            );
        }
    }

    #[test]
    fn test_load_overrides_merges_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.json");
        let mut file = File::create(&path).unwrap();
        write!(file, r#"{{"t": "Timing {{}}", "K": "key-{{}}"}}"#).unwrap();
        drop(file);

        let labels = VersionLabels::load_overrides(&path).unwrap();
        assert_eq!(
            labels.label(&VersionToken::new('T', 3), FileKind::Image),
            "Timing 3"
        );
        assert_eq!(
            labels.label(&VersionToken::new('k', 1), FileKind::Image),
            "key-1"
        );
        assert_eq!(
            labels.label(&VersionToken::new('V', 1), FileKind::Image),
            "main-shot V1"
        );
    }

    #[test]
    fn test_file_kind_from_path() {
        assert_eq!(FileKind::from_path(Path::new("a_v1.aep")), FileKind::Aep);
        assert_eq!(FileKind::from_path(Path::new("a_T1.PSD")), FileKind::Image);
        assert_eq!(FileKind::from_path(Path::new("a_v1.mov")), FileKind::Video);
        assert_eq!(FileKind::from_path(Path::new("notes.txt")), FileKind::Other);
    }
}
