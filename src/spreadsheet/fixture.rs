//! Builds minimal `.xlsx` packages for tests.
use crate::spreadsheet::reference::index_to_reference;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

pub(crate) struct WorkbookFixture {
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
}

impl WorkbookFixture {
    pub(crate) fn new() -> Self {
        Self {
            sheets: Vec::new(),
            shared_strings: Vec::new(),
        }
    }

    /// Adds a sheet from rows of cell texts; numeric texts become number cells,
    /// other texts shared strings, empty texts are left out.
    pub(crate) fn sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let mut xml = String::from(r#"<sheetData>"#);
        for (row_index, row) in rows.iter().enumerate() {
            let row_number = row_index + 1;
            xml.push_str(&format!(r#"<row r="{row_number}" spans="1:{}">"#, row.len()));
            for (col_index, text) in row.iter().enumerate() {
                let reference = index_to_reference(row_number, col_index + 1);
                if text.is_empty() {
                    continue;
                } else if text.parse::<f64>().is_ok() {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{text}</v></c>"#));
                } else {
                    let index = self.shared_string(text);
                    xml.push_str(&format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
        self.raw_sheet(name, &xml)
    }

    /// Adds a sheet whose `<worksheet>` body is given verbatim.
    pub(crate) fn raw_sheet(mut self, name: &str, body: &str) -> Self {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1"/>{body}<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#
        );
        self.sheets.push((name.to_owned(), xml));
        self
    }

    fn shared_string(&mut self, text: &str) -> usize {
        match self.shared_strings.iter().position(|it| it == text) {
            Some(index) => index,
            None => {
                self.shared_strings.push(text.to_owned());
                self.shared_strings.len() - 1
            }
        }
    }

    pub(crate) fn bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut put = |name: &str, content: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        let mut content_types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
        );
        for index in 1..=self.sheets.len() {
            content_types.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{index}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
        }
        content_types.push_str("</Types>");
        put("[Content_Types].xml", &content_types);

        put(
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        );

        let mut workbook = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut relationships = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let index = index + 1;
            workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{index}" r:id="rId{index}"/>"#));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{index}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{index}.xml"/>"#
            ));
        }
        workbook.push_str("</sheets></workbook>");
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#,
            self.sheets.len() + 1
        ));
        put("xl/workbook.xml", &workbook);
        put("xl/_rels/workbook.xml.rels", &relationships);

        let mut shared_strings = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
            self.shared_strings.len()
        );
        for text in &self.shared_strings {
            let escaped = text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
            shared_strings.push_str(&format!("<si><t>{escaped}</t></si>"));
        }
        shared_strings.push_str("</sst>");
        put("xl/sharedStrings.xml", &shared_strings);

        for (index, (_, xml)) in self.sheets.iter().enumerate() {
            put(&format!("xl/worksheets/sheet{}.xml", index + 1), xml);
        }

        zip.finish().unwrap().into_inner()
    }

    pub(crate) fn write(&self, path: &Path) {
        std::fs::write(path, self.bytes()).unwrap();
    }
}
