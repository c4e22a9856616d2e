//! Document assembly.
//!
//! Single-threaded join point: takes every per-file result, orders it by path
//! and derives the aggregate views (stats, table of contents, folder tree).

use crate::error::{CollisionError, EntityRef};
use crate::types::*;
use std::collections::{BTreeMap, HashMap};

/// Merge enriched modules into one structural document.
///
/// Fails with [`CollisionError`] naming both entities if any two share a uid.
pub fn assemble(
    mut modules: Vec<EnrichedModule>,
    project: &ProjectMetadata,
) -> Result<StructuralDocument, CollisionError> {
    modules.sort_by(|a, b| a.path().cmp(b.path()).then_with(|| a.uid().cmp(b.uid())));

    check_collisions(&modules)?;

    let stats = compute_stats(&modules);
    let table_of_contents = modules.iter().map(toc_entry).collect();
    let folder_structure = folder_structure(&project.name, modules.iter().map(|m| m.path()));

    tracing::info!(
        "Assembled {} modules, {} functions, {} classes, {} call edges",
        stats.module_count,
        stats.function_count,
        stats.class_count,
        stats.call_edges_count
    );

    Ok(StructuralDocument {
        metadata: DocumentMetadata {
            project_name: project.name.clone(),
            schema_version: SCHEMA_VERSION.to_string(),
            goals: project.goals.clone(),
            stats,
            folder_structure,
        },
        table_of_contents,
        modules,
    })
}

fn entity_ref(entity: &EnrichedEntity) -> EntityRef {
    EntityRef {
        kind: entity.kind,
        name: match &entity.class_name {
            Some(class) => format!("{class}.{}", entity.name),
            None => entity.name.clone(),
        },
        file_path: entity.file_path.clone(),
        line: entity.lines.start,
    }
}

fn check_collisions(modules: &[EnrichedModule]) -> Result<(), CollisionError> {
    let mut seen: HashMap<&str, &EnrichedEntity> = HashMap::new();
    for entity in modules.iter().flat_map(|m| m.entities()) {
        if let Some(first) = seen.insert(entity.uid.as_str(), entity) {
            return Err(CollisionError {
                uid: entity.uid.clone(),
                first: entity_ref(first),
                second: entity_ref(entity),
            });
        }
    }
    Ok(())
}

/// Recount everything from the modules themselves.
pub fn compute_stats(modules: &[EnrichedModule]) -> DocumentStats {
    DocumentStats {
        module_count: modules.len(),
        function_count: modules.iter().map(|m| m.functions.len()).sum(),
        class_count: modules.iter().map(|m| m.classes.len()).sum(),
        method_count: modules.iter().map(|m| m.method_count()).sum(),
        call_edges_count: modules.iter().map(|m| m.call_edge_count()).sum(),
    }
}

fn toc_entry(module: &EnrichedModule) -> TocEntry {
    TocEntry {
        uid: module.uid().to_string(),
        path: module.path().to_string(),
        function_count: module.functions.len(),
        class_count: module.classes.len(),
        method_count: module.method_count(),
        hash: module.entity.hash.clone(),
        summary: module.entity.summary.text.clone(),
    }
}

#[derive(Default)]
struct FolderBuilder {
    files: Vec<String>,
    folders: BTreeMap<String, FolderBuilder>,
}

impl FolderBuilder {
    fn insert(&mut self, parts: &[&str]) {
        match parts {
            [] => {}
            [file] => self.files.push(file.to_string()),
            [dir, rest @ ..] => self.folders.entry(dir.to_string()).or_default().insert(rest),
        }
    }

    fn build(mut self, name: String) -> FolderNode {
        self.files.sort();
        self.files.dedup();
        FolderNode {
            name,
            files: self.files,
            folders: self
                .folders
                .into_iter()
                .map(|(name, child)| child.build(name))
                .collect(),
        }
    }
}

/// Directory tree over the given `/`-separated relative paths.
pub fn folder_structure<'a>(root_name: &str, paths: impl IntoIterator<Item = &'a str>) -> FolderNode {
    let mut root = FolderBuilder::default();
    for path in paths {
        let normalized = path.replace('\\', "/");
        let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
        root.insert(&parts);
    }
    root.build(root_name.to_string())
}
