//! Canonical identifier assignment.
//!
//! A uid is the dot-joined package path of the file, followed by the
//! (class-qualified) entity name and a `#kind` suffix for modules, classes and
//! functions. `src/pkg/users.py::User.save` becomes `pkg.users.User.save`.

use crate::config::ProjectConfig;
use crate::types::EntityKind;

/// Builds uids from file paths and entity names.
#[derive(Debug, Clone)]
pub struct UidAssigner {
    source_roots: Vec<String>,
    index_stems: Vec<String>,
}

impl Default for UidAssigner {
    fn default() -> Self {
        Self::from_config(&ProjectConfig::default())
    }
}

impl UidAssigner {
    pub fn new(source_roots: Vec<String>, index_stems: Vec<String>) -> Self {
        Self {
            source_roots,
            index_stems,
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.source_roots.clone(), config.index_stems.clone())
    }

    /// Assign a uid and the segments it was built from.
    ///
    /// `enclosing_class` is only consulted for methods.
    pub fn assign(
        &self,
        kind: EntityKind,
        file_path: &str,
        entity_name: &str,
        enclosing_class: Option<&str>,
    ) -> (String, Vec<String>) {
        let mut components = self.package_path(file_path);

        let mut name_segments: Vec<String> = Vec::new();
        if kind == EntityKind::Method {
            if let Some(class) = enclosing_class {
                name_segments.extend(split_name(class));
            }
        }
        if kind != EntityKind::Module {
            name_segments.extend(split_name(entity_name));
        } else if components.is_empty() {
            // A root-level index file has no package path of its own.
            name_segments.extend(split_name(entity_name));
        }

        for segment in name_segments {
            push_dedup(&mut components, segment);
        }

        let mut uid = components.join(".");
        if kind != EntityKind::Method {
            uid.push('#');
            uid.push_str(kind.as_str());
        }
        (uid, components)
    }

    /// Normalize a file path into dot-package segments.
    ///
    /// Drops the source-root prefix, the extension and index stems. Segments
    /// are kept one per path part so distinct module files never share a
    /// package path; folding only happens against the appended name.
    pub fn package_path(&self, file_path: &str) -> Vec<String> {
        let normalized = file_path.replace('\\', "/");
        let mut parts: Vec<&str> = normalized
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();

        if let Some(first) = parts.first() {
            if parts.len() > 1 && self.source_roots.iter().any(|r| r == first) {
                parts.remove(0);
            }
        }

        let mut segments = Vec::with_capacity(parts.len());
        let count = parts.len();
        for (i, part) in parts.into_iter().enumerate() {
            let segment = if i + 1 == count {
                let stem = strip_extension(part);
                if self.index_stems.iter().any(|s| s == stem) && count > 1 {
                    continue;
                }
                stem
            } else {
                part
            };
            segments.push(sanitize(segment));
        }
        segments
    }
}

/// Strip `#kind`, then drop a trailing segment that repeats its predecessor.
///
/// Used for filesystem addressing of module files.
pub fn clean_module_uid(uid: &str) -> String {
    let base = uid.split('#').next().unwrap_or(uid);
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('.').filter(|s| !s.is_empty()) {
        if segments.last() != Some(&segment) {
            segments.push(segment);
        }
    }
    segments.join(".")
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

fn split_name(name: &str) -> Vec<String> {
    name.split(['.', ':'])
        .filter(|s| !s.is_empty())
        .map(sanitize)
        .collect()
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_whitespace() || c == '#' { '_' } else { c })
        .collect()
}

fn push_dedup(segments: &mut Vec<String>, segment: String) {
    if segments.last() != Some(&segment) {
        segments.push(segment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigner() -> UidAssigner {
        UidAssigner::default()
    }

    #[test]
    fn test_module_uid() {
        let (uid, components) = assigner().assign(EntityKind::Module, "src/pkg/users.py", "users", None);
        assert_eq!(uid, "pkg.users#module");
        assert_eq!(components, vec!["pkg", "users"]);
    }

    #[test]
    fn test_function_and_class_uids() {
        let a = assigner();
        let (uid, _) = a.assign(EntityKind::Function, "src/pkg/users.py", "get_user", None);
        assert_eq!(uid, "pkg.users.get_user#function");

        let (uid, _) = a.assign(EntityKind::Class, "src/pkg/users.py", "User", None);
        assert_eq!(uid, "pkg.users.User#class");
    }

    #[test]
    fn test_method_uid_is_class_qualified() {
        let (uid, components) =
            assigner().assign(EntityKind::Method, "src/pkg/users.py", "save", Some("User"));
        assert_eq!(uid, "pkg.users.User.save");
        assert_eq!(components, vec!["pkg", "users", "User", "save"]);
    }

    #[test]
    fn test_name_folds_into_trailing_path_segment() {
        let a = assigner();
        let (uid, components) = a.assign(EntityKind::Function, "src/util.py", "util", None);
        assert_eq!(uid, "util#function");
        assert_eq!(components, vec!["util"]);

        let (uid, _) = a.assign(EntityKind::Class, "src/parser/parser.rs", "parser", None);
        assert_eq!(uid, "parser.parser#class");
    }

    #[test]
    fn test_nested_package_segments_are_kept() {
        let a = assigner();
        let (uid, components) = a.assign(EntityKind::Module, "pkg/pkg/pkg.py", "pkg", None);
        assert_eq!(uid, "pkg.pkg.pkg#module");
        assert_eq!(components, vec!["pkg", "pkg", "pkg"]);

        let (uid, _) = a.assign(EntityKind::Class, "src/parser/parser.rs", "Parser", None);
        assert_eq!(uid, "parser.parser.Parser#class");
    }

    #[test]
    fn test_index_file_and_same_named_child_stay_apart() {
        let a = assigner();
        let (index, _) = a.assign(EntityKind::Module, "src/parser/mod.rs", "parser", None);
        let (child, _) = a.assign(EntityKind::Module, "src/parser/parser.rs", "parser", None);
        assert_eq!(index, "parser#module");
        assert_eq!(child, "parser.parser#module");

        let (index, _) = a.assign(EntityKind::Module, "pkg/__init__.py", "pkg", None);
        let (child, _) = a.assign(EntityKind::Module, "pkg/pkg.py", "pkg", None);
        assert_eq!(index, "pkg#module");
        assert_eq!(child, "pkg.pkg#module");
    }

    #[test]
    fn test_index_stems_name_parent_package() {
        let a = assigner();
        let (uid, _) = a.assign(EntityKind::Module, "src/pkg/__init__.py", "pkg", None);
        assert_eq!(uid, "pkg#module");
        let (uid, _) = a.assign(EntityKind::Function, "src/net/mod.rs", "connect", None);
        assert_eq!(uid, "net.connect#function");
    }

    #[test]
    fn test_windows_separators() {
        let (uid, _) = assigner().assign(EntityKind::Function, "src\\pkg\\io.py", "read", None);
        assert_eq!(uid, "pkg.io.read#function");
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let a = assigner();
        let (module, _) = a.assign(EntityKind::Module, "src/app.py", "app", None);
        let (func, _) = a.assign(EntityKind::Function, "src/app.py", "app", None);
        assert_ne!(module, func);
    }

    #[test]
    fn test_clean_module_uid() {
        assert_eq!(clean_module_uid("pkg.users#module"), "pkg.users");
        assert_eq!(clean_module_uid("pkg.util.util#module"), "pkg.util");
        assert_eq!(clean_module_uid("core"), "core");
    }
}
