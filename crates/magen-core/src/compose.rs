//! Inheritance resolution for [`TemplateMetadata`].
//!
//! Every field has exactly one merge strategy, each implemented as its own
//! function so it can be tested in isolation:
//!
//! | strategy        | fields                                                   |
//! |-----------------|----------------------------------------------------------|
//! | child wins      | `$schema`, `version`, `type`, `id`, `displayName`, `description` |
//! | child or parent | `hidden`, `generation.preHook`, `generation.postHook`    |
//! | key merge       | `platform`, `requirements`                               |
//! | set union       | `capabilities`, `tags`                                   |
//! | merge by key    | `templateVariables` (name), `extensionPoints`, `features` (id) |
//! | prepend         | `generation.fileTransforms`, `generation.fileOperations` |
//! | concatenate     | `useCase.scenarios`, `documentation.externalLinks`       |
//!
//! `extends` is dropped: a merged template is already resolved.

use crate::error::{MagenError, Result};
use crate::metadata::{
    DocumentationLinks, GenerationConfig, Keyed, PlatformInfo, TemplateMetadata, UseCaseInfo,
};
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateComposer;

impl TemplateComposer {
    pub fn new() -> Self {
        Self
    }

    /// Fold `child` onto `parent`. Pure: identical inputs give identical output.
    pub fn merge_templates(
        &self,
        parent: &TemplateMetadata,
        child: &TemplateMetadata,
    ) -> Result<TemplateMetadata> {
        reject_self_reference(child)?;

        Ok(TemplateMetadata {
            schema: child.schema.clone(),
            version: child.version.clone(),
            kind: child.kind,
            id: child.id.clone(),
            display_name: child.display_name.clone(),
            description: child.description.clone(),
            extends: None,
            hidden: child.hidden.or(parent.hidden),
            platform: merge_platform(&parent.platform, &child.platform),
            use_case: merge_use_case(&parent.use_case, &child.use_case),
            capabilities: union_unique(&parent.capabilities, &child.capabilities),
            tags: union_unique(&parent.tags, &child.tags),
            template_variables: merge_by_key(
                &parent.template_variables,
                &child.template_variables,
            ),
            extension_points: merge_optional_by_key(
                parent.extension_points.as_deref(),
                child.extension_points.as_deref(),
            ),
            features: merge_optional_by_key(parent.features.as_deref(), child.features.as_deref()),
            requirements: merge_object(&parent.requirements, &child.requirements),
            generation: merge_generation(&parent.generation, &child.generation),
            documentation: merge_documentation(
                parent.documentation.as_ref(),
                child.documentation.as_ref(),
            ),
        })
    }

    /// Load `id` and every ancestor through `loader`, merging root-first.
    ///
    /// A repeated id fails with [`MagenError::CircularDependency`] listing the
    /// chain in the order it was walked, ending with the repeated id.
    pub fn resolve_inheritance_chain<F>(&self, id: &str, mut loader: F) -> Result<TemplateMetadata>
    where
        F: FnMut(&str) -> Result<TemplateMetadata>,
    {
        let mut visited = IndexSet::new();
        self.resolve_with(id, &mut loader, &mut visited)
    }

    fn resolve_with<F>(
        &self,
        id: &str,
        loader: &mut F,
        visited: &mut IndexSet<String>,
    ) -> Result<TemplateMetadata>
    where
        F: FnMut(&str) -> Result<TemplateMetadata>,
    {
        if visited.contains(id) {
            let mut chain: Vec<String> = visited.iter().cloned().collect();
            chain.push(id.to_string());
            return Err(MagenError::CircularDependency(chain));
        }
        visited.insert(id.to_string());

        let template = loader(id)?;
        reject_self_reference(&template)?;

        let Some(parent_id) = template.extends.as_deref() else {
            return Ok(template);
        };
        let parent = self.resolve_with(parent_id, loader, visited)?;
        self.merge_templates(&parent, &template)
    }
}

fn reject_self_reference(template: &TemplateMetadata) -> Result<()> {
    if template.extends.as_deref() == Some(template.id.as_str()) {
        return Err(MagenError::SelfReference(template.id.clone()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Parent items then unseen child items, each exactly once.
pub fn union_unique(parent: &[String], child: &[String]) -> Vec<String> {
    parent
        .iter()
        .chain(child)
        .cloned()
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

/// Parent entries in order; a child entry with the same key replaces the
/// parent's in place, new keys are appended in child order.
pub fn merge_by_key<T: Keyed + Clone>(parent: &[T], child: &[T]) -> Vec<T> {
    let mut merged: IndexMap<String, T> = IndexMap::new();
    for item in parent.iter().chain(child) {
        merged.insert(item.key().to_string(), item.clone());
    }
    merged.into_values().collect()
}

/// Absent lists count as empty; the merged result is always present.
fn merge_optional_by_key<T: Keyed + Clone>(parent: Option<&[T]>, child: Option<&[T]>) -> Option<Vec<T>> {
    Some(merge_by_key(
        parent.unwrap_or_default(),
        child.unwrap_or_default(),
    ))
}

/// Child's list first so its entries are processed before the parent's.
pub fn prepend<T: Clone>(parent: &[T], child: &[T]) -> Vec<T> {
    child.iter().chain(parent).cloned().collect()
}

pub fn concat<T: Clone>(parent: &[T], child: &[T]) -> Vec<T> {
    parent.iter().chain(child).cloned().collect()
}

/// Shallow object merge: child keys override, parent-only keys survive.
pub fn merge_object(parent: &Map<String, Value>, child: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = parent.clone();
    for (k, v) in child {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

pub fn merge_platform(parent: &PlatformInfo, child: &PlatformInfo) -> PlatformInfo {
    PlatformInfo {
        platform_type: child.platform_type,
        min_version: child.min_version.clone(),
        target_version: child.target_version.clone().or_else(|| parent.target_version.clone()),
        language: child.language.clone().or_else(|| parent.language.clone()),
        framework: child.framework.clone().or_else(|| parent.framework.clone()),
    }
}

pub fn merge_use_case(parent: &UseCaseInfo, child: &UseCaseInfo) -> UseCaseInfo {
    UseCaseInfo {
        primary: child.primary.clone(),
        when: child.when.clone(),
        scenarios: concat(&parent.scenarios, &child.scenarios),
    }
}

pub fn merge_generation(parent: &GenerationConfig, child: &GenerationConfig) -> GenerationConfig {
    let file_operations = Some(prepend(
        parent.file_operations.as_deref().unwrap_or_default(),
        child.file_operations.as_deref().unwrap_or_default(),
    ));
    GenerationConfig {
        pre_hook: child.pre_hook.clone().or_else(|| parent.pre_hook.clone()),
        post_hook: child.post_hook.clone().or_else(|| parent.post_hook.clone()),
        file_transforms: prepend(&parent.file_transforms, &child.file_transforms),
        file_operations,
    }
}

pub fn merge_documentation(
    parent: Option<&DocumentationLinks>,
    child: Option<&DocumentationLinks>,
) -> Option<DocumentationLinks> {
    match (parent, child) {
        (None, None) => None,
        (Some(p), None) => Some(p.clone()),
        (None, Some(c)) => Some(c.clone()),
        (Some(p), Some(c)) => Some(DocumentationLinks {
            readme: c.readme.clone().or_else(|| p.readme.clone()),
            architecture: c.architecture.clone().or_else(|| p.architecture.clone()),
            getting_started: c.getting_started.clone().or_else(|| p.getting_started.clone()),
            external_links: Some(concat(
                p.external_links.as_deref().unwrap_or_default(),
                c.external_links.as_deref().unwrap_or_default(),
            )),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
