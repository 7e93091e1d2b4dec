/*!
 * Integration tests for exchange file export and import
 */

use lingotrack::data::DataLeaf;
use lingotrack::errors::{ErrorKind, JobError};
use lingotrack::exchange::ExportOptions;
use lingotrack::job::{Job, JobItemState, JobState, MessageSeverity, RequestOutcome, Settings};
use lingotrack::providers::file::EXPORT_FORMAT_SETTING;
use lingotrack::providers::MockTranslator;

use crate::common::{create_context, fill_targets, hello_world, path, tree, TestContext, FILES};

/// Creates a submitted job with two pages and returns it with the exported file
async fn submitted_job(context: &TestContext, settings: Settings) -> (Job, String) {
    let manager = &context.manager;
    let job = manager.create_job("en", "de", Some(FILES), settings).await.unwrap();
    manager.add_item(job.id, hello_world(&context.memory), false).await.unwrap();
    let about = context
        .memory
        .insert("page", "2", "About", tree(&[("title", "About us")]));
    manager.add_item(job.id, about, false).await.unwrap();

    let location = match manager.request_translation(job.id).await.unwrap() {
        RequestOutcome::Submitted { location: Some(location), reexport } => {
            assert!(!reexport);
            location
        }
        other => panic!("unexpected outcome {:?}", other),
    };
    let content = std::fs::read_to_string(&location).unwrap();
    (manager.get_job(job.id).await.unwrap(), content)
}

/// Test an XLIFF round trip through the file translator
#[tokio::test]
async fn test_fileTranslator_xliffRoundTrip_shouldImportAndFinish() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let (job, xliff) = submitted_job(&context, Settings::new()).await;
    assert!(job.busy);
    assert!(xliff.contains(&format!(r#"job-id="{}""#, job.id)));

    let translated = fill_targets(&xliff, |source| format!("DE {}", source));
    let report = manager.import(Some(job.id), "xlf", translated.as_bytes()).await.unwrap();

    assert_eq!(report.updated, 2);
    assert!(report.violations.is_empty());
    let job = manager.get_job(job.id).await.unwrap();
    assert!(!job.busy);
    assert_eq!(job.state, JobState::Active);
    let leaf = job.items[0].data.get(&path("title")).unwrap();
    assert_eq!(leaf.translation.as_deref(), Some("DE Hello World"));

    let job = manager.accept_job(job.id).await.unwrap();
    assert_eq!(job.state, JobState::Finished);
    assert_eq!(context.memory.applied().len(), 2);
}

/// Test that importing without an expected job resolves it from the file
#[tokio::test]
async fn test_import_withoutExpectedJob_shouldUseFileHeader() {
    let context = create_context(MockTranslator::working());
    let (job, xliff) = submitted_job(&context, Settings::new()).await;

    let translated = fill_targets(&xliff, |source| format!("DE {}", source));
    let report = context.manager.import(None, "xlf", translated.as_bytes()).await.unwrap();

    assert_eq!(report.updated, 2);
    let job = context.manager.get_job(job.id).await.unwrap();
    assert_eq!(job.items[1].state, JobItemState::NeedsReview);
}

/// Test that a file of another job changes nothing
#[tokio::test]
async fn test_import_withOtherJobsFile_shouldFailWithoutChanges() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let (first, xliff) = submitted_job(&context, Settings::new()).await;
    let second = manager.create_job("en", "de", Some(FILES), Settings::new()).await.unwrap();
    let second_before = manager.get_job(second.id).await.unwrap();

    let translated = fill_targets(&xliff, |source| format!("DE {}", source));
    let error = manager
        .import(Some(second.id), "xlf", translated.as_bytes())
        .await
        .unwrap_err();

    match error {
        JobError::JobMismatch { file_job_id, expected_job_id } => {
            assert_eq!(file_job_id, first.id);
            assert_eq!(expected_job_id, Some(second.id));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(manager.get_job(first.id).await.unwrap(), first);
    let second_after = manager.get_job(second.id).await.unwrap();
    assert_eq!(second_after.items, second_before.items);
    assert_eq!(second_after.state, second_before.state);
    let messages = manager.messages(second.id).await.unwrap();
    assert_eq!(messages.last().unwrap().severity, MessageSeverity::Error);
}

/// Test that a file naming an unknown job is refused
#[tokio::test]
async fn test_import_withUnknownJob_shouldBeJobMismatch() {
    let context = create_context(MockTranslator::working());
    let (job, xliff) = submitted_job(&context, Settings::new()).await;
    let forged = xliff.replace(&format!(r#"job-id="{}""#, job.id), r#"job-id="500""#);

    let error = context.manager.import(None, "xlf", forged.as_bytes()).await.unwrap_err();

    assert!(matches!(
        error,
        JobError::JobMismatch { file_job_id: 500, expected_job_id: None }
    ));
}

/// Test that one broken leaf does not stop the others
#[tokio::test]
async fn test_import_withBrokenMarkup_shouldRejectOnlyThatLeaf() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let mut data = tree(&[("title", "Welcome")]);
    data.insert(
        &path("body"),
        DataLeaf::new("<p>Hello <b>World</b></p>").with_format("html"),
    )
    .unwrap();
    let source = context.memory.insert("page", "9", "Markup", data);
    let job = manager.create_job("en", "de", Some(FILES), Settings::new()).await.unwrap();
    let item = manager.add_item(job.id, source, false).await.unwrap();
    manager.request_translation(job.id).await.unwrap();

    let options = ExportOptions { xliff_processing: false };
    let exported = manager.export(job.id, "xlf", &options).await.unwrap();
    let translated = fill_targets(&String::from_utf8(exported).unwrap(), |source| {
        if source.contains("&lt;") {
            "Hallo Welt".to_string()
        } else {
            format!("DE {}", source)
        }
    });
    let report = manager.import(Some(job.id), "xlf", translated.as_bytes()).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].error.kind(), ErrorKind::IntegrityViolation);
    let job = manager.get_job(job.id).await.unwrap();
    let item = job.item(item.id).unwrap();
    assert_eq!(item.data.get(&path("title")).unwrap().translation.as_deref(), Some("DE Welcome"));
    assert_eq!(item.data.get(&path("body")).unwrap().translation, None);
    let messages = manager.messages(job.id).await.unwrap();
    assert!(messages
        .iter()
        .any(|m| m.severity == MessageSeverity::Error && m.item_id == Some(item.id)));
}

/// Test that a later import never overwrites accepted leaves
#[tokio::test]
async fn test_import_repeated_shouldNotRegressAcceptedItems() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let (job, xliff) = submitted_job(&context, Settings::new()).await;
    let accepted_id = job.items[0].id;

    let first = fill_targets(&xliff, |source| format!("DE {}", source));
    manager.import(Some(job.id), "xlf", first.as_bytes()).await.unwrap();
    let job = manager.accept_item(job.id, accepted_id).await.unwrap();
    assert_eq!(job.state, JobState::Active);

    let second = fill_targets(&xliff, |source| format!("XX {}", source));
    let report = manager.import(Some(job.id), "xlf", second.as_bytes()).await.unwrap();
    assert_eq!(report.skipped_accepted, 1);
    assert_eq!(report.updated, 1);

    let report = manager.import(Some(job.id), "xlf", second.as_bytes()).await.unwrap();
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.updated, 0);

    let job = manager.get_job(job.id).await.unwrap();
    let accepted = job.item(accepted_id).unwrap();
    assert_eq!(accepted.state, JobItemState::Accepted);
    assert_eq!(
        accepted.data.get(&path("title")).unwrap().translation.as_deref(),
        Some("DE Hello World")
    );
}

/// Test that exporting unchanged content again is recognised
#[tokio::test]
async fn test_resubmit_withUnchangedContent_shouldReportReexport() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let (job, _) = submitted_job(&context, Settings::new()).await;
    manager.abort_job(job.id).await.unwrap();

    let outcome = manager.resubmit(job.id).await.unwrap();

    match outcome {
        RequestOutcome::Submitted { location, reexport } => {
            assert!(reexport);
            assert!(location.unwrap().ends_with(&format!("JobID{}_en_de.xlf", job.id)));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

/// Test an HTML round trip selected through a job setting
#[tokio::test]
async fn test_fileTranslator_htmlRoundTrip_shouldImport() {
    let context = create_context(MockTranslator::working());
    let mut settings = Settings::new();
    settings.insert(EXPORT_FORMAT_SETTING.to_string(), serde_json::Value::String("html".to_string()));
    let (job, html) = submitted_job(&context, settings).await;
    assert!(html.contains(&format!(r#"<meta name="JobID" content="{}"/>"#, job.id)));

    let translated = html
        .replace(">Hello World</div>", ">Hallo Welt</div>")
        .replace(">About us</div>", ">Über uns</div>");
    let report = context
        .manager
        .import(Some(job.id), "html", translated.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.updated, 2);
    let job = context.manager.get_job(job.id).await.unwrap();
    assert_eq!(
        job.items[1].data.get(&path("title")).unwrap().translation.as_deref(),
        Some("Über uns")
    );
}

/// Test that imports need an active job and a readable file
#[tokio::test]
async fn test_import_withInactiveJobOrGarbage_shouldFail() {
    let context = create_context(MockTranslator::working());
    let manager = &context.manager;
    let job = manager.create_job("en", "de", Some(FILES), Settings::new()).await.unwrap();
    manager.add_item(job.id, hello_world(&context.memory), false).await.unwrap();

    let exported = manager.export(job.id, "xlf", &ExportOptions::default()).await.unwrap();
    let translated = fill_targets(&String::from_utf8(exported).unwrap(), |s| format!("DE {}", s));
    let error = manager.import(Some(job.id), "xlf", translated.as_bytes()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);

    let error = manager.import(Some(job.id), "xlf", b"not an exchange file").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedFile);

    let error = manager.import(Some(job.id + 1), "xlf", translated.as_bytes()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);

    assert_eq!(manager.get_job(job.id).await.unwrap().state, JobState::Unprocessed);
}

/// Test that the export directory receives the file under its conventional name
#[tokio::test]
async fn test_submit_shouldWriteIntoExportDirectory() {
    let context = create_context(MockTranslator::working());
    let (job, _) = submitted_job(&context, Settings::new()).await;

    let expected = context.export_dir.path().join(format!("JobID{}_en_de.xlf", job.id));
    assert!(expected.exists());
}
