/*!
 * Suggestions of related content for a job.
 *
 * Source plugins know which objects relate to the ones already in a job
 * (referenced documents, embedded media). The engine asks them and turns
 * the answers into candidate job items. It never changes the job; callers
 * add the suggestions they want with `JobManager::add_existing_item`.
 */

use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::job::{Job, JobItem};
use crate::registry::Registry;
use crate::sources::SourceRef;

/// A candidate item related to an item of the job
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Unsaved item for the related object
    pub item: JobItem,
    /// Why it is suggested
    pub reason: String,
    /// Item of the job the suggestion comes from
    pub from_item_id: i64,
}

/// Collects suggestions from the registered source plugins
#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    registry: Arc<Registry>,
}

impl SuggestionEngine {
    /// Create an engine using the plugins of `registry`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Suggestions for every item of the job, in item order
    ///
    /// Objects that cannot be loaded are skipped with a warning.
    pub async fn get_suggestions(&self, job: &Job) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        for item in &job.items {
            let related = match self.registry.source(&item.source.plugin) {
                Ok(plugin) => plugin.related(&item.source).await,
                Err(e) => {
                    warn!("No suggestions for {}: {}", item.source, e);
                    continue;
                }
            };
            let related = match related {
                Ok(related) => related,
                Err(e) => {
                    warn!("Failed to find objects related to {}: {}", item.source, e);
                    continue;
                }
            };

            for candidate in related {
                match self.build_item(&candidate.source).await {
                    Some(suggested) => suggestions.push(Suggestion {
                        item: suggested,
                        reason: candidate.reason,
                        from_item_id: item.id,
                    }),
                    None => continue,
                }
            }
        }

        debug!("Collected {} suggestions for job {}", suggestions.len(), job.id);
        suggestions
    }

    async fn build_item(&self, source: &SourceRef) -> Option<JobItem> {
        let plugin = match self.registry.source(&source.plugin) {
            Ok(plugin) => plugin,
            Err(e) => {
                warn!("Skipping suggestion {}: {}", source, e);
                return None;
            }
        };
        let data = match plugin.build_data_tree(source).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Skipping suggestion {}: {}", source, e);
                return None;
            }
        };
        let label = plugin
            .label(source)
            .await
            .unwrap_or_else(|_| source.to_string());
        Some(JobItem::new(source.clone(), label, data))
    }

    /// Drop suggestions already in the job, without words, or seen before
    ///
    /// When several items suggest the same object, the first reason wins.
    pub fn clean_suggestions(suggestions: Vec<Suggestion>, job: &Job) -> Vec<Suggestion> {
        let mut seen: HashSet<SourceRef> = HashSet::new();

        suggestions
            .into_iter()
            .filter(|suggestion| {
                let source = &suggestion.item.source;
                !job.contains_source(source)
                    && suggestion.item.word_count() > 0
                    && seen.insert(source.clone())
            })
            .collect()
    }
}
