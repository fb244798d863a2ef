use crate::error::GeocodeSheetError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::xml::XmlWriter;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SheetId;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::TabularStore;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

// XML tag names (local part) used by SpreadsheetML
const TAG_SHARED_STRING_ITEM: &[u8] = b"si"; // Shared string table item
const TAG_PHONETIC_TEXT: &[u8] = b"rPh";     // Phonetic text for Asian languages
const TAG_TEXT: &[u8] = b"t";                // Text content within strings
const TAG_SHEET: &[u8] = b"sheet";           // Worksheet declaration in workbook.xml
const TAG_SHEET_DATA: &[u8] = b"sheetData";  // Cell table of a worksheet
const TAG_DIMENSION: &[u8] = b"dimension";   // Used range of a worksheet
const TAG_ROW: &[u8] = b"row";               // Row in worksheet
const TAG_CELL: &[u8] = b"c";                // Cell in worksheet
const TAG_INLINE_STRING: &[u8] = b"is";      // Inline string value
const TAG_VALUE: &[u8] = b"v";               // Cell value content

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELATIONSHIPS_PATH: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

/// An Excel `.xlsx` workbook held in memory.
///
/// All worksheets are parsed on open. Saving copies every untouched part of
/// the original package byte for byte and rewrites only the worksheets that
/// received writes.
pub struct XlsxWorkbook {
    /// Original package content
    bytes: Vec<u8>,
    sheets: Vec<Sheet>,
}

impl XlsxWorkbook {
    /// Opens an `.xlsx` file and parses all of its worksheets.
    pub fn open(path: &Path) -> Result<XlsxWorkbook, GeocodeSheetError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&path.display().to_string(), bytes)
    }

    /// Parses a workbook from the raw package content.
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsxWorkbook, GeocodeSheetError> {
        if excel::is_ole_container(&bytes) {
            Err(SpreadsheetError::PasswordProtected(name.to_owned()))?;
        }

        let sheets = {
            let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice()))
                .map_err(|_| SpreadsheetError::InvalidFormat(name.to_owned()))?;
            let declared = load_workbook(&mut zip)?;
            if declared.is_empty() {
                Err(SpreadsheetError::EmptyWorkbook(name.to_owned()))?;
            }
            let shared_strings = load_shared_strings(&mut zip)?;
            let mut sheets = Vec::with_capacity(declared.len());
            for (sheet_name, zip_path) in declared {
                let sheet = load_sheet(&mut zip, &sheet_name, &zip_path, &shared_strings)
                    .with_prefix(&format!("Read sheet '{sheet_name}' failed"))?;
                sheets.push(sheet);
            }
            sheets
        };
        log::debug!("Loaded workbook '{}' with {} sheet(s)", name, sheets.len());

        Ok(XlsxWorkbook {
            bytes,
            sheets,
        })
    }

    /// Serializes the workbook, including all writes, to a new package.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GeocodeSheetError> {
        let modified: HashMap<&str, &Sheet> = self
            .sheets
            .iter()
            .filter(|sheet| sheet.is_modified())
            .map(|sheet| (sheet.zip_path.as_str(), sheet))
            .collect();

        let mut source = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut target = ZipWriter::new(Cursor::new(Vec::<u8>::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        for index in 0..source.len() {
            let entry_name = source.by_index_raw(index)?.name().to_owned();
            match modified.get(entry_name.as_str()) {
                Some(sheet) => {
                    let mut original = Vec::new();
                    source.by_index(index)?.read_to_end(&mut original)?;
                    let patched = patch_worksheet(&original, sheet)
                        .with_prefix(&format!("Write sheet '{}' failed", sheet.name))?;
                    target.start_file(entry_name.as_str(), options)?;
                    target.write_all(&patched)?;
                }
                None => target.raw_copy_file(source.by_index_raw(index)?)?,
            }
        }
        Ok(target.finish()?.into_inner())
    }

    fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.get(id.0)
    }
}

impl TabularStore for XlsxWorkbook {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn select_sheet(&self, index: usize) -> Result<SheetId, SpreadsheetError> {
        if index < 1 || index > self.sheets.len() {
            return Err(SpreadsheetError::SheetOutOfRange {
                index,
                count: self.sheets.len(),
            });
        }
        Ok(SheetId(index - 1))
    }

    fn sheet_name(&self, sheet: SheetId) -> &str {
        self.sheet(sheet).map(|sheet| sheet.name.as_str()).unwrap_or_default()
    }

    fn max_column(&self, sheet: SheetId) -> usize {
        self.sheet(sheet).map(Sheet::max_col).unwrap_or(0)
    }

    fn max_row(&self, sheet: SheetId) -> usize {
        self.sheet(sheet).map(Sheet::max_row).unwrap_or(0)
    }

    fn read_cell(&self, sheet: SheetId, row: usize, col: usize) -> CellValue {
        self.sheet(sheet)
            .map(|sheet| sheet.read(row, col))
            .unwrap_or_default()
    }

    fn write_cell(&mut self, sheet: SheetId, row: usize, col: usize, value: CellValue) {
        match self.sheets.get_mut(sheet.0) {
            Some(sheet) => sheet.write(row, col, value),
            None => log::warn!("Ignored write to unknown sheet #{}", sheet.0 + 1),
        }
    }

    fn save(&self, path: &Path) -> Result<(), GeocodeSheetError> {
        let save_error = |message: String| SpreadsheetError::SaveError {
            path: path.display().to_string(),
            message,
        };
        let bytes = self.to_bytes().map_err(|error| save_error(error.to_string()))?;

        // Write next to the target first so a failure never leaves a truncated file behind
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{file_name}.partial"));
        fs::write(&staging, &bytes).map_err(|error| save_error(error.to_string()))?;
        if let Err(error) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            Err(save_error(error.to_string()))?;
        }
        log::debug!("Saved {} bytes to '{}'", bytes.len(), path.display());
        Ok(())
    }
}

/// Loads the worksheet declarations from `xl/workbook.xml`
///
/// # Returns
/// (name, zip_path) pairs in workbook order
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<(String, String)>, GeocodeSheetError> {
    let relationships = load_relationships(zip, WORKBOOK_RELATIONSHIPS_PATH, excel::KIND_WORKSHEET)?;
    let mut reader = zip.xml_reader(WORKBOOK_PATH)?
        .ok_or_else(|| SpreadsheetError::MissingPart(WORKBOOK_PATH.to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
    });
    Ok(sheets)
}

/// Loads the shared string table, an empty table when the workbook has none
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, GeocodeSheetError> {
    let path = load_relationships(zip, WORKBOOK_RELATIONSHIPS_PATH, excel::KIND_SHARED_STRINGS)?
        .into_values()
        .next()
        .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PATH.to_owned());
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader(&path)? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Parses one worksheet part into a [`Sheet`]
fn load_sheet<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    name: &str,
    path: &str,
    shared_strings: &[String],
) -> Result<Sheet, GeocodeSheetError> {
    let zip_path = zip.entry_name(path)
        .ok_or_else(|| SpreadsheetError::MissingPart(path.to_string()))?;
    let mut sheet = Sheet::new(name, &zip_path);
    let mut reader = zip.xml_reader(&zip_path)?
        .ok_or_else(|| SpreadsheetError::MissingPart(zip_path.to_owned()))?;

    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellType::default();
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
            row_count = event.parse_attribute_value::<usize>("r")?.unwrap_or(row_count + 1);
            col_count = 0;
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
            (row, col) = event.get_attribute_value("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row_count, col_count + 1));
            col_count = col;
            kind = CellType::from_attribute(event.get_attribute_value("t")?.as_deref());
            value.clear();
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_INLINE_STRING => {
            value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_VALUE => {
            value = read_string_value(&mut reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
            let cell = kind.decode(std::mem::take(&mut value), shared_strings)
                .map_err(|_| SpreadsheetError::CellValueError(index_to_reference(row, col)))?;
            sheet.push(row, col, cell);
        }
    });
    Ok(sheet)
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Phonetic annotations (`<rPh>`) are skipped. With `is_text_content` the
/// element's own text is taken, otherwise only text inside `<t>` children.
fn read_string_value<B: BufRead>(
    reader: &mut XmlReader<B>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, GeocodeSheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Streams a worksheet part and splices the sheet's written cells into it.
///
/// Existing cells at written positions are replaced, cells are inserted in
/// column order, rows that do not exist yet are created in row order, and the
/// `<dimension>` reference is widened to the new extent.
fn patch_worksheet(xml: &[u8], sheet: &Sheet) -> Result<Vec<u8>, GeocodeSheetError> {
    let mut patcher = WorksheetPatcher {
        writer: XmlWriter::new(Vec::with_capacity(xml.len() + 1024)),
        pending: sheet.edits.clone(),
        prefix: None,
    };
    let dimension = format!("A1:{}", index_to_reference(sheet.max_row().max(1), sheet.max_col().max(1)));

    let mut reader = XmlReader::new(xml);
    let mut current: Option<(usize, BTreeMap<usize, CellValue>)> = None;
    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let mut skip_depth = 0usize;
    while let Some(event) = reader.next()? {
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => (),
            }
            continue;
        }
        match event {
            Event::Start(event) if event.local_name().as_ref() == TAG_DIMENSION => {
                let mut replaced = event.without_attributes(&["ref"])?;
                replaced.push_attribute(("ref", dimension.as_str()));
                patcher.writer.write(Event::Start(replaced))?;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_SHEET_DATA => {
                patcher.prefix = event
                    .name()
                    .prefix()
                    .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned());
                patcher.writer.write(Event::Start(event))?;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                row_count = event.parse_attribute_value::<usize>("r")?.unwrap_or(row_count + 1);
                col_count = 0;
                patcher.flush_rows_before(Some(row_count))?;
                match patcher.pending.remove(&row_count) {
                    Some(cells) => {
                        // spans is an optional hint that would go stale
                        patcher.writer.write(Event::Start(event.without_attributes(&["spans"])?))?;
                        current = Some((row_count, cells));
                    }
                    None => {
                        patcher.writer.write(Event::Start(event))?;
                        current = None;
                    }
                }
            }
            Event::Start(event) if current.is_some() && event.local_name().as_ref() == TAG_CELL => {
                let col = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .map(|(_, col)| col)
                    .unwrap_or(col_count + 1);
                col_count = col;
                if let Some((row, cells)) = current.as_mut() {
                    let mut before = cells.split_off(&col);
                    std::mem::swap(cells, &mut before);
                    for (new_col, value) in before {
                        patcher.write_cell(*row, new_col, &value)?;
                    }
                    match cells.remove(&col) {
                        Some(value) => {
                            patcher.write_cell(*row, col, &value)?;
                            skip_depth = 1;
                        }
                        None => patcher.writer.write(Event::Start(event))?,
                    }
                }
            }
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => {
                if let Some((row, cells)) = current.take() {
                    for (col, value) in cells {
                        patcher.write_cell(row, col, &value)?;
                    }
                }
                patcher.writer.write(Event::End(event))?;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_SHEET_DATA => {
                patcher.flush_rows_before(None)?;
                patcher.writer.write(Event::End(event))?;
            }
            other => patcher.writer.write(other)?,
        }
    }

    if !patcher.pending.is_empty() {
        Err(SpreadsheetError::MissingPart(format!("{}#sheetData", sheet.zip_path)))?;
    }
    Ok(patcher.writer.into_inner())
}

/// Output side of [`patch_worksheet`]: rows still to be created and the writer.
struct WorksheetPatcher {
    writer: XmlWriter<Vec<u8>>,
    /// Written cells of rows not reached yet
    pending: BTreeMap<usize, BTreeMap<usize, CellValue>>,
    /// Namespace prefix used by the worksheet's cell table, if any
    prefix: Option<String>,
}

impl WorksheetPatcher {
    fn tag(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_owned(),
        }
    }

    /// Creates `<row>` elements for pending rows below `limit` (all rows when None).
    fn flush_rows_before(&mut self, limit: Option<usize>) -> Result<(), GeocodeSheetError> {
        while let Some((&row, _)) = self.pending.first_key_value() {
            if limit.map(|limit| row >= limit).unwrap_or(false) {
                break;
            }
            if let Some((row, cells)) = self.pending.pop_first() {
                let tag = self.tag("row");
                let mut start = BytesStart::new(tag.as_str());
                start.push_attribute(("r", row.to_string().as_str()));
                self.writer.write(Event::Start(start))?;
                for (col, value) in cells {
                    self.write_cell(row, col, &value)?;
                }
                self.writer.write_end(&tag)?;
            }
        }
        Ok(())
    }

    fn write_cell(&mut self, row: usize, col: usize, value: &CellValue) -> Result<(), GeocodeSheetError> {
        let reference = index_to_reference(row, col);
        let mut start = BytesStart::new(self.tag("c"));
        start.push_attribute(("r", reference.as_str()));
        let value_tag = self.tag("v");
        match value {
            CellValue::Empty => {
                self.writer.write(Event::Start(start))?;
            }
            CellValue::Number(number) if number.is_finite() => {
                self.writer.write(Event::Start(start))?;
                self.writer.write_text_element(BytesStart::new(value_tag), &number.to_string())?;
            }
            CellValue::Number(_) => {
                start.push_attribute(("t", "e"));
                self.writer.write(Event::Start(start))?;
                self.writer.write_text_element(BytesStart::new(value_tag), "#NUM!")?;
            }
            CellValue::Text(text) => {
                start.push_attribute(("t", "inlineStr"));
                let inline_tag = self.tag("is");
                let mut text_start = BytesStart::new(self.tag("t"));
                if text.trim() != text {
                    text_start.push_attribute(("xml:space", "preserve"));
                }
                self.writer.write(Event::Start(start))?;
                self.writer.write(Event::Start(BytesStart::new(inline_tag.as_str())))?;
                self.writer.write_text_element(text_start, text)?;
                self.writer.write_end(&inline_tag)?;
            }
            CellValue::Boolean(flag) => {
                start.push_attribute(("t", "b"));
                self.writer.write(Event::Start(start))?;
                self.writer.write_text_element(BytesStart::new(value_tag), if *flag { "1" } else { "0" })?;
            }
            CellValue::Error(error) => {
                start.push_attribute(("t", "e"));
                self.writer.write(Event::Start(start))?;
                self.writer.write_text_element(BytesStart::new(value_tag), error)?;
            }
        }
        let tag = self.tag("c");
        self.writer.write_end(&tag)
    }
}
