/*!
 * Common test utilities for the lingotrack test suite
 */

use std::sync::Arc;
use tempfile::TempDir;

use lingotrack::data::{DataLeaf, DataPath, DataTree, Escaper, DEFAULT_ESCAPE_PATTERNS};
use lingotrack::database::Repository;
use lingotrack::exchange::{HtmlFormat, XliffFormat};
use lingotrack::job::JobManager;
use lingotrack::providers::{FileTranslator, MemoryLanguageCache, MockTranslator, Translator};
use lingotrack::sources::{MemorySource, SourceRef};
use lingotrack::Registry;

/// Translator id bound to the mock plugin
pub const MACHINE: &str = "machine";

/// Translator id bound to the file plugin
pub const FILES: &str = "files";

/// A manager over an in-memory database with a memory source
pub struct TestContext {
    pub manager: JobManager,
    pub memory: Arc<MemorySource>,
    pub export_dir: TempDir,
}

/// Creates a context with the given mock translator and a file translator
pub fn create_context(mock: MockTranslator) -> TestContext {
    let _ = env_logger::builder().is_test(true).try_init();
    let export_dir = TempDir::new().expect("temp dir");
    let memory = Arc::new(MemorySource::new(
        Escaper::new(&DEFAULT_ESCAPE_PATTERNS).expect("escaper"),
    ));

    let registry = Registry::new();
    registry.register_source(memory.clone());
    registry.register_format(Arc::new(XliffFormat::new()));
    registry.register_format(Arc::new(HtmlFormat::new()));
    registry.register_translator_plugin(Arc::new(mock));
    registry.register_translator_plugin(Arc::new(FileTranslator::new(
        export_dir.path(),
        registry.formats(),
    )));
    registry
        .add_translator(Translator::new(MACHINE, "mock"))
        .expect("mock binding");
    registry
        .add_translator(Translator::new(FILES, "file"))
        .expect("file binding");

    let manager = JobManager::new(
        Repository::new_in_memory().expect("in-memory database"),
        Arc::new(registry),
        Arc::new(MemoryLanguageCache::new()),
    );

    TestContext {
        manager,
        memory,
        export_dir,
    }
}

/// Builds a data tree from path and text pairs
pub fn tree(leaves: &[(&str, &str)]) -> DataTree {
    let mut data = DataTree::new();
    for (path, text) in leaves {
        data.insert(&DataPath::parse(path).expect("path"), DataLeaf::new(*text))
            .expect("insert");
    }
    data
}

/// Registers the classic one leaf page
pub fn hello_world(memory: &MemorySource) -> SourceRef {
    memory.insert("page", "1", "Hello page", tree(&[("title", "Hello World")]))
}

/// Shorthand for a parsed path
pub fn path(path: &str) -> DataPath {
    DataPath::parse(path).expect("path")
}

/// Fills every XLIFF target from its source, as a translation tool would
///
/// `translate` receives the raw XML content of the source.
pub fn fill_targets(xml: &str, translate: impl Fn(&str) -> String) -> String {
    let mut output = String::new();
    let mut last_source = String::new();
    for line in xml.lines() {
        if let Some(start) = line.find("<source") {
            let open_end = line[start..].find('>').expect("source tag") + start + 1;
            let close = line.rfind("</source>").expect("source end");
            last_source = line[open_end..close].to_string();
            output.push_str(line);
        } else if line.contains("<target") {
            let translated = translate(&last_source);
            output.push_str(&line.replace("></target>", &format!(">{}</target>", translated)));
        } else {
            output.push_str(line);
        }
        output.push('\n');
    }
    output
}
