use std::collections::HashMap;
use std::path::Path;

/// Content type handled by the plain-text engine.
pub const PLAIN_TEXT: &str = "text/plain";
/// Content type handled by the markup engine.
pub const HTML: &str = "text/html";

/// 單一檔案關聯的描述。 / Represents a single pattern → content-type entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAssociation {
    pub pattern: String,
    pub content_type: String,
}

/// 管理檔名樣式至內容類型的映射。 / Maps `*.ext` / `*name` patterns to content types.
///
/// Keys always carry a leading `*`. Extension keys are stored lowercase with
/// their dot (`*.rs`); bare file names keep their case (`*Makefile`).
#[derive(Debug, Clone, Default)]
pub struct FileAssociations {
    map: HashMap<String, String>,
}

impl FileAssociations {
    /// 建立空集合。 / Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// 內建的預設關聯。 / Built-in association table.
    pub fn with_defaults() -> Self {
        let mut assoc = Self::new();
        for (pattern, content_type) in [
            ("*.txt", PLAIN_TEXT),
            ("*.log", PLAIN_TEXT),
            ("*.text", PLAIN_TEXT),
            ("*.html", HTML),
            ("*.htm", HTML),
            ("*.xhtml", HTML),
            ("*.rs", "rust"),
            ("*.json", "json"),
            ("*.py", "python"),
            ("*.toml", "toml"),
            ("*.c", "c"),
            ("*.h", "c"),
            ("*.js", "javascript"),
            ("*Makefile", "makefile"),
        ] {
            assoc.set(pattern, content_type);
        }
        assoc
    }

    /// 設定或更新關聯。 / Inserts or updates an association.
    pub fn set(&mut self, pattern: impl AsRef<str>, content_type: impl Into<String>) {
        let key = normalize_pattern(pattern.as_ref());
        self.map.insert(key, content_type.into());
    }

    /// 依樣式取得內容類型。 / Retrieves the content type for the given pattern.
    pub fn get(&self, pattern: impl AsRef<str>) -> Option<&str> {
        let key = normalize_pattern(pattern.as_ref());
        self.map.get(&key).map(|s| s.as_str())
    }

    /// 依檔案路徑查詢。 / Looks up a path by extension, or by file name when it has none.
    pub fn lookup_path(&self, path: impl AsRef<Path>) -> Option<&str> {
        let key = path_key(path.as_ref())?;
        self.map.get(&key).map(|s| s.as_str())
    }

    /// 移除關聯。 / Removes an association and returns whether it existed.
    pub fn remove(&mut self, pattern: impl AsRef<str>) -> bool {
        let key = normalize_pattern(pattern.as_ref());
        self.map.remove(&key).is_some()
    }

    /// 列舉所有關聯。 / Returns an iterator over all associations.
    pub fn iter(&self) -> impl Iterator<Item = FileAssociation> + '_ {
        self.map.iter().map(|(pattern, content_type)| FileAssociation {
            pattern: pattern.clone(),
            content_type: content_type.clone(),
        })
    }

    /// 目前總數。 / Returns the number of tracked associations.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// 是否為空。 / Checks whether no associations are stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Builds the lookup key for a path: `*` + lowercase `.ext`, else `*` + file name.
pub fn path_key(path: &Path) -> Option<String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => Some(format!("*.{}", ext.to_ascii_lowercase())),
        _ => path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| format!("*{name}")),
    }
}

fn normalize_pattern(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('*');
    if trimmed.starts_with('.') {
        format!("*{}", trimmed.to_ascii_lowercase())
    } else {
        format!("*{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_iter() {
        let mut assoc = FileAssociations::default();
        assoc.set("*.RS", "rust");
        assoc.set(".txt", PLAIN_TEXT);

        assert_eq!(assoc.get("*.rs"), Some("rust"));
        assert_eq!(assoc.get(".TXT"), Some(PLAIN_TEXT));

        let mut entries: Vec<_> = assoc.iter().collect();
        entries.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        assert_eq!(
            entries,
            vec![
                FileAssociation {
                    pattern: "*.rs".into(),
                    content_type: "rust".into()
                },
                FileAssociation {
                    pattern: "*.txt".into(),
                    content_type: PLAIN_TEXT.into()
                }
            ]
        );
    }

    #[test]
    fn lookup_by_extension_is_case_insensitive() {
        let assoc = FileAssociations::with_defaults();
        assert_eq!(assoc.lookup_path("src/MAIN.RS"), Some("rust"));
        assert_eq!(assoc.lookup_path("/tmp/index.Html"), Some(HTML));
        assert_eq!(assoc.lookup_path("notes.md"), None);
    }

    #[test]
    fn lookup_without_extension_uses_file_name() {
        let assoc = FileAssociations::with_defaults();
        assert_eq!(assoc.lookup_path("project/Makefile"), Some("makefile"));
        assert_eq!(assoc.lookup_path("project/makefile"), None);
        assert_eq!(path_key(Path::new(".ssh/config")), Some("*config".into()));
    }

    #[test]
    fn remove_reports_existence() {
        let mut assoc = FileAssociations::with_defaults();
        assert!(assoc.remove("*.LOG"));
        assert!(!assoc.remove("*.log"));
        assert!(!assoc.is_empty());
    }
}
