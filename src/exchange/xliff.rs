/*!
 * XLIFF 1.2 exchange format.
 *
 * Each job item becomes a `<group>`, each translatable leaf a
 * `<trans-unit>` with an empty `<target>`. The job id travels in the
 * extraction `<phase>` of the file header. Counts needed for integrity
 * checks are stored in `<count-group>` elements.
 */

use log::debug;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::{self, Write};

use crate::data::EscapeMarkers;
use crate::errors::JobError;
use crate::job::Job;

use super::inline::{render_leaf, structural_count};
use super::{
    malformed, parse_unit_id, unit_id, ExchangeDocument, ExchangeFormat, ExchangeHeader,
    ExchangeUnit, ExportOptions,
};

/// Format id
pub const XLIFF_FORMAT_ID: &str = "xlf";

/// Count type holding the number of exported leaves of a group
const LEAVES_COUNT_TYPE: &str = "x-leaves";

/// Count type holding the structural element count of a unit
const STRUCTURE_COUNT_TYPE: &str = "x-structure";

/// Inline elements whose content is the original markup
const CODE_ELEMENTS: [&str; 4] = ["bpt", "ept", "ph", "it"];

/// XLIFF 1.2 exchange format
#[derive(Debug, Default, Clone, Copy)]
pub struct XliffFormat;

impl XliffFormat {
    /// Create the format
    pub fn new() -> Self {
        Self
    }

    /// Markers wrapped around protected substrings
    pub fn escape_markers() -> EscapeMarkers {
        EscapeMarkers::new(r#"<mrk mtype="protected">"#, "</mrk>")
    }
}

impl ExchangeFormat for XliffFormat {
    fn id(&self) -> &str {
        XLIFF_FORMAT_ID
    }

    fn label(&self) -> &str {
        "XLIFF"
    }

    fn export(&self, job: &Job, options: &ExportOptions) -> Result<Vec<u8>, JobError> {
        let mut out = String::new();
        write_document(&mut out, job, options)
            .map_err(|e| JobError::InvalidData(format!("cannot render XLIFF for job {}: {}", job.id, e)))?;
        Ok(out.into_bytes())
    }

    fn parse(&self, bytes: &[u8]) -> Result<ExchangeDocument, JobError> {
        let mut parser = XliffParser::default();
        parser.run(bytes)?;
        parser.finish()
    }
}

/// Unit being read
#[derive(Debug)]
struct PendingUnit {
    id: String,
    target: Option<String>,
    recorded_count: Option<usize>,
}

#[derive(Debug, Default)]
struct XliffParser {
    saw_root: bool,
    job_id: Option<i64>,
    source_language: Option<String>,
    target_language: Option<String>,
    item_leaf_counts: Vec<(i64, usize)>,
    units: Vec<ExchangeUnit>,
    group: Option<i64>,
    unit: Option<PendingUnit>,
    /// Translated text collected while inside `<target>`
    target: Option<String>,
    /// Original markup collected while inside an inline code element
    code: Option<String>,
    count_type: Option<String>,
}

impl XliffParser {
    fn run(&mut self, bytes: &[u8]) -> Result<(), JobError> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(false);
        let mut buf = Vec::new();
        let mut depth: usize = 0;

        loop {
            match reader.read_event_into(&mut buf).map_err(malformed)? {
                Event::Eof => break,
                Event::Start(element) => {
                    depth += 1;
                    self.start(&element, false)?;
                }
                Event::Empty(element) => self.start(&element, true)?,
                Event::End(element) => {
                    depth = depth.checked_sub(1).ok_or_else(|| malformed("unbalanced end tag"))?;
                    let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                    self.end(&name)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(malformed)?;
                    self.text(&text)?;
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    self.text(&text)?;
                }
                _ => {}
            }
            buf.clear();
        }

        if depth != 0 {
            return Err(malformed("unexpected end of document"));
        }
        Ok(())
    }

    fn start(&mut self, element: &BytesStart, empty: bool) -> Result<(), JobError> {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();

        if let Some(target) = self.target.as_mut() {
            match name.as_str() {
                "x" | "bx" | "ex" => {
                    if let Some(markup) = attribute(element, "equiv-text")? {
                        target.push_str(&markup);
                    }
                }
                code if CODE_ELEMENTS.contains(&code) && !empty => self.code = Some(String::new()),
                // Protected markers and groupings are transparent
                _ => {}
            }
            return Ok(());
        }

        match name.as_str() {
            "xliff" => self.saw_root = true,
            "file" => {
                self.source_language = attribute(element, "source-language")?;
                self.target_language = attribute(element, "target-language")?;
            }
            "phase" => {
                if let Some(job_id) = attribute(element, "job-id")? {
                    let job_id = job_id
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| malformed(format!("invalid job id '{}'", job_id)))?;
                    self.job_id = Some(job_id);
                }
            }
            "group" if self.unit.is_none() => {
                self.group = attribute(element, "id")?.and_then(|id| id.trim().parse().ok());
            }
            "trans-unit" => {
                let id = attribute(element, "id")?
                    .ok_or_else(|| malformed("trans-unit without id"))?;
                self.unit = Some(PendingUnit {
                    id,
                    target: None,
                    recorded_count: None,
                });
            }
            "target" => {
                if let Some(unit) = self.unit.as_mut() {
                    if empty {
                        unit.target = Some(String::new());
                    } else {
                        self.target = Some(String::new());
                    }
                }
            }
            "count" if !empty => self.count_type = attribute(element, "count-type")?,
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), JobError> {
        if self.target.is_some() {
            if name == "target" {
                if let (Some(unit), Some(target)) = (self.unit.as_mut(), self.target.take()) {
                    unit.target = Some(target);
                }
            } else if CODE_ELEMENTS.contains(&name) {
                if let (Some(target), Some(code)) = (self.target.as_mut(), self.code.take()) {
                    target.push_str(&code);
                }
            }
            return Ok(());
        }

        match name {
            "count" => self.count_type = None,
            "trans-unit" => {
                if let Some(pending) = self.unit.take() {
                    let (item_id, path) = parse_unit_id(&pending.id)?;
                    self.units.push(ExchangeUnit {
                        item_id,
                        path,
                        target: pending.target.unwrap_or_default(),
                        recorded_count: pending.recorded_count,
                    });
                }
            }
            "group" => self.group = None,
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), JobError> {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
        } else if let Some(target) = self.target.as_mut() {
            target.push_str(text);
        } else if let Some(count_type) = self.count_type.as_deref() {
            let value = text.trim();
            if value.is_empty() {
                return Ok(());
            }
            let count = value
                .parse::<usize>()
                .map_err(|_| malformed(format!("invalid count '{}'", value)))?;
            match (count_type, self.unit.as_mut(), self.group) {
                (STRUCTURE_COUNT_TYPE, Some(unit), _) => unit.recorded_count = Some(count),
                (LEAVES_COUNT_TYPE, None, Some(group)) => self.item_leaf_counts.push((group, count)),
                _ => {}
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<ExchangeDocument, JobError> {
        if !self.saw_root {
            return Err(malformed("not an XLIFF document"));
        }
        let job_id = self
            .job_id
            .ok_or_else(|| malformed("missing job id in the file header"))?;
        let source_language = self
            .source_language
            .ok_or_else(|| malformed("missing source language"))?;
        let target_language = self
            .target_language
            .ok_or_else(|| malformed("missing target language"))?;

        debug!("Parsed XLIFF document for job {} with {} units", job_id, self.units.len());
        Ok(ExchangeDocument {
            header: ExchangeHeader {
                job_id,
                source_language,
                target_language,
                item_leaf_counts: self.item_leaf_counts,
            },
            units: self.units,
        })
    }
}

fn write_document(out: &mut String, job: &Job, options: &ExportOptions) -> fmt::Result {
    let markers = XliffFormat::escape_markers();
    let source_language = escape(job.source_language.as_str()).into_owned();
    let target_language = escape(job.target_language.as_str()).into_owned();

    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        r#"<xliff version="1.2" xmlns="urn:oasis:names:tc:xliff:document:1.2">"#
    )?;
    writeln!(
        out,
        r#"  <file original="job-{id}" source-language="{src}" target-language="{tgt}" datatype="plaintext">"#,
        id = job.id,
        src = source_language,
        tgt = target_language
    )?;
    writeln!(out, "    <header>")?;
    writeln!(out, "      <phase-group>")?;
    writeln!(
        out,
        r#"        <phase phase-name="extraction" process-name="extraction" tool-id="lingotrack" job-id="{}"/>"#,
        job.id
    )?;
    writeln!(out, "      </phase-group>")?;
    writeln!(out, "    </header>")?;
    writeln!(out, "    <body>")?;

    for item in &job.items {
        let leaves = item.data.translatable_leaves();
        writeln!(out, r#"      <group id="{}">"#, item.id)?;
        writeln!(out, r#"        <count-group name="{}">"#, item.id)?;
        writeln!(
            out,
            r#"          <count count-type="{}" unit="item">{}</count>"#,
            LEAVES_COUNT_TYPE,
            leaves.len()
        )?;
        writeln!(
            out,
            r#"          <count count-type="total" unit="word">{}</count>"#,
            item.word_count()
        )?;
        writeln!(out, "        </count-group>")?;
        writeln!(out, "        <note>{}</note>", escape(item.label.as_str()))?;

        for (path, leaf) in leaves {
            let id = escape(unit_id(item.id, &path).as_str()).into_owned();
            writeln!(out, r#"        <trans-unit id="{}" resname="{}">"#, id, id)?;
            writeln!(
                out,
                r#"          <source xml:lang="{}">{}</source>"#,
                source_language,
                render_leaf(leaf, &markers, options.xliff_processing)
            )?;
            writeln!(
                out,
                r#"          <target xml:lang="{}"></target>"#,
                target_language
            )?;
            writeln!(out, r#"          <count-group name="{}">"#, id)?;
            writeln!(
                out,
                r#"            <count count-type="{}" unit="x-element">{}</count>"#,
                STRUCTURE_COUNT_TYPE,
                structural_count(&leaf.text)
            )?;
            writeln!(out, "          </count-group>")?;
            if !leaf.label.is_empty() {
                writeln!(out, "          <note>{}</note>", escape(leaf.label.as_str()))?;
            }
            writeln!(out, "        </trans-unit>")?;
        }
        writeln!(out, "      </group>")?;
    }

    writeln!(out, "    </body>")?;
    writeln!(out, "  </file>")?;
    writeln!(out, "</xliff>")?;
    Ok(())
}

fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>, JobError> {
    match element.try_get_attribute(name).map_err(malformed)? {
        Some(attribute) => Ok(Some(attribute.unescape_value().map_err(malformed)?.into_owned())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLeaf, DataPath, DataTree, EscapedString};
    use crate::job::{JobItem, Settings};
    use crate::sources::SourceRef;

    fn job() -> Job {
        let mut data = DataTree::new();
        let mut title = DataLeaf::new("Hello @name").with_label("Title");
        title.escape.insert(6, EscapedString { string: "@name".to_string() });
        data.insert(&DataPath::parse("title").unwrap(), title).unwrap();
        data.insert(
            &DataPath::parse("body][0][value").unwrap(),
            DataLeaf::new("<p>First<br/>line</p>").with_format("html"),
        )
        .unwrap();
        data.insert(
            &DataPath::parse("body][0][format").unwrap(),
            DataLeaf::new("full_html").non_translatable(),
        )
        .unwrap();

        let mut job = Job::new("en", "de").unwrap();
        job.id = 3;
        job.add_item(JobItem::new(SourceRef::new("memory", "node", "1"), "Node 1", data), false)
            .unwrap();
        job.items[0].id = 5;
        job.set_translator("file", Settings::new()).unwrap();
        job
    }

    /// Fill every target with its source, as a translation tool would
    fn copy_source_to_target(xml: &str) -> String {
        let mut output = String::new();
        let mut last_source = String::new();
        for line in xml.lines() {
            if let Some(start) = line.find("<source") {
                let open_end = line[start..].find('>').unwrap() + start + 1;
                let close = line.rfind("</source>").unwrap();
                last_source = line[open_end..close].to_string();
                output.push_str(line);
            } else if line.contains("<target") {
                output.push_str(&line.replace("></target>", &format!(">{}</target>", last_source)));
            } else {
                output.push_str(line);
            }
            output.push('\n');
        }
        output
    }

    #[test]
    fn test_export_shouldBeDeterministic() {
        let job = job();
        let format = XliffFormat::new();
        let first = format.export(&job, &ExportOptions::default()).unwrap();
        let second = format.export(&job, &ExportOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_shouldWriteHeaderAndUnits() {
        let xml = String::from_utf8(
            XliffFormat::new()
                .export(&job(), &ExportOptions::default())
                .unwrap(),
        )
        .unwrap();

        assert!(xml.contains(r#"job-id="3""#));
        assert!(xml.contains(r#"<trans-unit id="5][title" resname="5][title">"#));
        assert!(xml.contains(r#"Hello <mrk mtype="protected">@name</mrk>"#));
        assert!(xml.contains(r#"<bpt id="1" rid="1" ctype="x-p">&lt;p&gt;</bpt>"#));
        assert!(!xml.contains("body][0][format"));
        assert!(xml.contains(r#"<target xml:lang="de"></target>"#));
    }

    #[test]
    fn test_parse_ofExport_shouldReturnEmptyTargets() {
        let job = job();
        let bytes = XliffFormat::new().export(&job, &ExportOptions::default()).unwrap();
        let document = XliffFormat::new().parse(&bytes).unwrap();

        assert_eq!(document.header.job_id, 3);
        assert_eq!(document.header.source_language, "en");
        assert_eq!(document.header.item_leaf_counts, vec![(5, 2)]);
        assert_eq!(document.units.len(), 2);
        assert!(document.units.iter().all(|u| u.target.is_empty()));
        assert_eq!(document.units[1].recorded_count, Some(3));
    }

    #[test]
    fn test_parse_withTranslatedTargets_shouldRestoreMarkup() {
        let job = job();
        let xml = String::from_utf8(
            XliffFormat::new()
                .export(&job, &ExportOptions::default())
                .unwrap(),
        )
        .unwrap();
        let document = XliffFormat::new()
            .parse(copy_source_to_target(&xml).as_bytes())
            .unwrap();

        assert_eq!(document.units[0].target, "Hello @name");
        assert_eq!(document.units[1].target, "<p>First<br/>line</p>");
    }

    #[test]
    fn test_parse_withoutProcessing_shouldUnescapeMarkup() {
        let job = job();
        let options = ExportOptions {
            xliff_processing: false,
        };
        let xml = String::from_utf8(XliffFormat::new().export(&job, &options).unwrap()).unwrap();
        assert!(xml.contains("&lt;p&gt;First&lt;br/&gt;line&lt;/p&gt;"));

        let document = XliffFormat::new()
            .parse(copy_source_to_target(&xml).as_bytes())
            .unwrap();
        assert_eq!(document.units[1].target, "<p>First<br/>line</p>");
    }

    #[test]
    fn test_export_withTokenInAttribute_shouldStayWellFormedAndRoundTrip() {
        let escaper = crate::data::Escaper::new(&crate::data::DEFAULT_ESCAPE_PATTERNS).unwrap();
        let text = r#"<p>Logo <img alt="@brand"/> mail <a href="mailto:a@b.com">@team</a></p>"#;
        let mut leaf = DataLeaf::new(text).with_format("html");
        escaper.escape_leaf(&mut leaf);
        let mut data = DataTree::new();
        data.insert(&DataPath::parse("body").unwrap(), leaf).unwrap();
        let mut job = Job::new("en", "de").unwrap();
        job.id = 4;
        job.add_item(JobItem::new(SourceRef::new("memory", "node", "2"), "Node 2", data), false)
            .unwrap();
        job.items[0].id = 9;

        let xml = String::from_utf8(
            XliffFormat::new()
                .export(&job, &ExportOptions::default())
                .unwrap(),
        )
        .unwrap();
        assert!(!xml.contains("&quot;<mrk"));
        assert!(xml.contains(r#"<mrk mtype="protected">@team</mrk>"#));

        let mut reader = Reader::from_str(&xml);
        loop {
            match reader.read_event().unwrap() {
                Event::Eof => break,
                Event::Start(element) | Event::Empty(element) => {
                    for attribute in element.attributes().with_checks(true) {
                        let attribute = attribute.unwrap();
                        assert!(!attribute.value.contains(&b'<'));
                    }
                }
                _ => {}
            }
        }

        let document = XliffFormat::new()
            .parse(copy_source_to_target(&xml).as_bytes())
            .unwrap();
        assert_eq!(document.units[0].target, text);
        assert_eq!(document.units[0].recorded_count, Some(structural_count(text)));
    }

    #[test]
    fn test_parse_withGarbage_shouldBeMalformed() {
        let error = XliffFormat::new().parse(b"this is not xml").unwrap_err();
        assert!(matches!(error, JobError::MalformedFile(_)));

        let error = XliffFormat::new()
            .parse(b"<xliff version=\"1.2\"><file></file>")
            .unwrap_err();
        assert!(matches!(error, JobError::MalformedFile(_)));
    }

    #[test]
    fn test_parse_withoutJobId_shouldBeMalformed() {
        let xml = r#"<xliff version="1.2"><file source-language="en" target-language="de"><body/></file></xliff>"#;
        let error = XliffFormat::new().parse(xml.as_bytes()).unwrap_err();
        assert!(error.to_string().contains("missing job id"));
    }
}
