/*!
 * Integration tests for the job lifecycle
 */

use std::sync::Arc;

use lingotrack::errors::{ErrorKind, SourceError};
use lingotrack::job::{JobItemState, JobState, MessageSeverity, RequestOutcome, Settings};
use lingotrack::providers::MockTranslator;
use lingotrack::sources::{SourcePlugin, SourceRef};

use crate::common::{create_context, hello_world, path, tree, FILES, MACHINE};

/// Test the whole path of a one leaf page through a machine translator
#[tokio::test]
async fn test_helloWorld_withMachineTranslator_shouldFinishAndApply() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let job = manager.create_job("en", "de", Some(MACHINE), Settings::new()).await.unwrap();
    let item = manager.add_item(job.id, hello_world(&context.memory), false).await.unwrap();
    assert_eq!(item.word_count(), 2);

    let outcome = manager.request_translation(job.id).await.unwrap();
    assert_eq!(outcome, RequestOutcome::Translated { updated: 1, finished: false });

    let active = manager.get_job(job.id).await.unwrap();
    assert_eq!(active.state, JobState::Active);
    assert_eq!(active.items[0].state, JobItemState::NeedsReview);

    let finished = manager.accept_job(job.id).await.unwrap();
    assert_eq!(finished.state, JobState::Finished);
    assert_eq!(finished.items[0].state, JobItemState::Accepted);

    let applied = context.memory.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].target_language, "de");
    let leaf = applied[0].data.get(&path("title")).unwrap();
    assert_eq!(leaf.translation.as_deref(), Some("de_Hello World"));

    let messages = manager.messages(job.id).await.unwrap();
    assert!(messages.iter().all(|m| m.severity != MessageSeverity::Error));
    assert!(messages.iter().any(|m| m.message.contains("finished")));
}

/// Test that a job never finishes while a leaf lacks an accepted translation
#[tokio::test]
async fn test_acceptJob_withUntranslatedLeaf_shouldStayActive() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let source = context.memory.insert(
        "page",
        "2",
        "Two leaves",
        tree(&[("title", "Hello"), ("body", "Some body text")]),
    );
    let job = manager.create_job("en", "de", Some(FILES), Settings::new()).await.unwrap();
    let item = manager.add_item(job.id, source, false).await.unwrap();
    manager.request_translation(job.id).await.unwrap();

    manager
        .submit_translation(job.id, item.id, &path("title"), "Hallo")
        .await
        .unwrap();
    let job = manager.accept_job(job.id).await.unwrap();

    assert_eq!(job.state, JobState::Active);
    assert_ne!(job.items[0].state, JobItemState::Accepted);
    let counts = job.items[0].counts();
    assert_eq!(counts.accepted, 1);
    assert_eq!(counts.pending, 1);
}

/// Test that aborting keeps items with accepted translations
#[tokio::test]
async fn test_abortJob_withAcceptedItem_shouldKeepItAndWarn() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let first = context.memory.insert("page", "1", "First", tree(&[("title", "First page")]));
    let second = context.memory.insert("page", "2", "Second", tree(&[("title", "Second page")]));
    let job = manager.create_job("en", "de", Some(FILES), Settings::new()).await.unwrap();
    let accepted = manager.add_item(job.id, first, false).await.unwrap();
    let open = manager.add_item(job.id, second, false).await.unwrap();
    manager.request_translation(job.id).await.unwrap();

    manager
        .submit_translation(job.id, accepted.id, &path("title"), "Erste Seite")
        .await
        .unwrap();
    let job = manager.accept_item(job.id, accepted.id).await.unwrap();
    assert_eq!(job.state, JobState::Active);

    let job = manager.abort_job(job.id).await.unwrap();

    assert_eq!(job.state, JobState::Aborted);
    assert!(!job.busy);
    assert_eq!(job.item(accepted.id).unwrap().state, JobItemState::Accepted);
    assert_eq!(job.item(open.id).unwrap().state, JobItemState::Aborted);

    let messages = manager.messages(job.id).await.unwrap();
    let warning = messages
        .iter()
        .find(|m| m.severity == MessageSeverity::Warning)
        .unwrap();
    assert_eq!(warning.item_id, Some(accepted.id));
}

/// Test that an aborted job can be resubmitted but an active one cannot
#[tokio::test]
async fn test_resubmit_afterAbort_shouldReactivateItems() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let job = manager.create_job("en", "de", Some(FILES), Settings::new()).await.unwrap();
    manager.add_item(job.id, hello_world(&context.memory), false).await.unwrap();
    manager.request_translation(job.id).await.unwrap();
    manager.abort_job(job.id).await.unwrap();

    let error = manager.request_translation(job.id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);

    let outcome = manager.resubmit(job.id).await.unwrap();
    assert!(matches!(outcome, RequestOutcome::Submitted { .. }));

    let job = manager.get_job(job.id).await.unwrap();
    assert_eq!(job.state, JobState::Active);
    assert_eq!(job.items[0].state, JobItemState::Active);

    let error = manager.resubmit(job.id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);
}

/// Test that an unavailable translator leaves the job untouched
#[tokio::test]
async fn test_requestTranslation_withUnavailableTranslator_shouldRecordError() {
    let context = create_context(MockTranslator::unavailable());
    let manager = &context.manager;
    let job = manager.create_job("en", "de", Some(MACHINE), Settings::new()).await.unwrap();
    manager.add_item(job.id, hello_world(&context.memory), false).await.unwrap();

    let error = manager.request_translation(job.id).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotAvailable);
    let job = manager.get_job(job.id).await.unwrap();
    assert_eq!(job.state, JobState::Unprocessed);
    assert_eq!(job.items[0].state, JobItemState::Inactive);
    let messages = manager.messages(job.id).await.unwrap();
    assert_eq!(messages.last().unwrap().severity, MessageSeverity::Error);
}

/// Test that a failing translator rejects the job
#[tokio::test]
async fn test_requestTranslation_withFailingTranslator_shouldRejectJob() {
    let context = create_context(MockTranslator::failing());
    let manager = &context.manager;
    let job = manager.create_job("en", "de", Some(MACHINE), Settings::new()).await.unwrap();
    manager.add_item(job.id, hello_world(&context.memory), false).await.unwrap();

    let error = manager.request_translation(job.id).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Provider);
    assert_eq!(manager.get_job(job.id).await.unwrap().state, JobState::Rejected);
}

/// Test that busy jobs protect themselves and their translator
#[tokio::test]
async fn test_busyJob_shouldBlockDeletionAndTranslatorRemoval() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let job = manager.create_job("en", "de", Some(FILES), Settings::new()).await.unwrap();
    manager.add_item(job.id, hello_world(&context.memory), false).await.unwrap();
    manager.request_translation(job.id).await.unwrap();
    assert!(manager.get_job(job.id).await.unwrap().busy);

    let error = manager.delete_job(job.id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ResourceBusy);

    let error = manager.remove_translator(FILES).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ResourceBusy);
    assert!(manager.registry().translator(FILES).is_ok());

    manager.abort_job(job.id).await.unwrap();
    manager.remove_translator(FILES).await.unwrap();
    manager.delete_job(job.id).await.unwrap();
    assert!(manager.list_jobs().await.unwrap().is_empty());
}

/// Test that suggestions can be added to the job
#[tokio::test]
async fn test_suggestions_shouldOfferRelatedContent() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let page = hello_world(&context.memory);
    let image = context
        .memory
        .insert("image", "7", "Banner", tree(&[("alt", "A sunny beach")]));
    context.memory.relate(&page, &image, "Embedded image").unwrap();
    let job = manager.create_job("en", "de", None, Settings::new()).await.unwrap();
    manager.add_item(job.id, page, false).await.unwrap();

    let suggestions = manager.suggestions(job.id).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].reason, "Embedded image");

    let added = manager
        .add_existing_item(job.id, suggestions[0].item.clone())
        .await
        .unwrap();
    assert_eq!(added.label, "Banner");
    assert!(manager.suggestions(job.id).await.unwrap().is_empty());

    let summary = &manager.list_jobs().await.unwrap()[0];
    assert_eq!(summary.item_count, 2);
    assert_eq!(summary.word_count, 5);
}

/// Test that the memory source serves labels and refuses unknown objects
#[test]
fn test_memorySource_shouldResolveRegisteredObjects() {
    let context = create_context(MockTranslator::working());
    let page = hello_world(&context.memory);
    let missing = SourceRef::new("memory", "page", "404");

    let (label, error) = tokio_test::block_on(async {
        let label = context.memory.label(&page).await.unwrap();
        let error = context.memory.build_data_tree(&missing).await.unwrap_err();
        (label, error)
    });

    assert_eq!(label, "Hello page");
    assert!(matches!(error, SourceError::NotFound(_)));
}

/// Test that concurrent edits of one job are all kept
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submitTranslation_concurrently_shouldKeepEveryLeaf() {
    let context = Arc::new(create_context(MockTranslator::working()));
    let keys: Vec<String> = (0..20).map(|i| format!("leaf{}", i)).collect();
    let leaves: Vec<(&str, &str)> = keys.iter().map(|key| (key.as_str(), "Some text")).collect();
    let source = context.memory.insert("page", "3", "Many leaves", tree(&leaves));
    let job = context
        .manager
        .create_job("en", "de", Some(FILES), Settings::new())
        .await
        .unwrap();
    let item = context.manager.add_item(job.id, source, false).await.unwrap();
    context.manager.request_translation(job.id).await.unwrap();
    let (job_id, item_id) = (job.id, item.id);

    let tasks: Vec<_> = keys
        .iter()
        .map(|key| {
            let context = Arc::clone(&context);
            let key = key.clone();
            tokio::spawn(async move {
                context
                    .manager
                    .submit_translation(job_id, item_id, &path(&key), &format!("DE {}", key))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let job = context.manager.get_job(job_id).await.unwrap();
    let stored = job.item(item_id).unwrap();
    for key in &keys {
        let leaf = stored.data.get(&path(key)).unwrap();
        assert_eq!(leaf.translation.as_deref(), Some(format!("DE {}", key).as_str()));
    }
    assert_eq!(stored.counts().pending, 0);
}
