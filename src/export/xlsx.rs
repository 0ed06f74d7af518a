//! Workbook export.
//!
//! [`WorkbookWriter`] emits the smallest SpreadsheetML package Excel,
//! LibreOffice and calamine all open: content types, relationships, one
//! worksheet part per sheet, a shared-string table and a style sheet with a
//! single wrap-text cell format. Every cell is written as a shared string.

use crate::config::ResponseLanguage;
use crate::error::PolicyCompareError;
use crate::pipeline::contract::ComparisonResult;
use crate::present::{comparison_rows, header_row, FieldLabels, ListStyle};
use quick_xml::escape::escape;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Column width of the label column.
pub const LABEL_COLUMN_WIDTH: f64 = 25.0;
/// Column width of each policy column.
pub const POLICY_COLUMN_WIDTH: f64 = 40.0;

/// Render the comparison as a one-sheet workbook.
///
/// Layout: summary label and text on row 1, a blank row, the header row
/// (`Özellik` + company names), then one row per field. List fields put one
/// item per line inside the cell.
pub fn render_workbook(
    result: &ComparisonResult,
    language: ResponseLanguage,
) -> Result<Vec<u8>, PolicyCompareError> {
    let labels = FieldLabels::workbook(language);

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(10);
    rows.push(vec![labels.summary.to_string(), result.summary.clone()]);
    rows.push(Vec::new());
    rows.push(header_row(result, &labels));
    for row in comparison_rows(result, &labels, ListStyle::Workbook) {
        let mut cells = Vec::with_capacity(row.cells.len() + 1);
        cells.push(row.label);
        cells.extend(row.cells);
        rows.push(cells);
    }

    let mut widths = vec![LABEL_COLUMN_WIDTH];
    widths.extend(std::iter::repeat(POLICY_COLUMN_WIDTH).take(result.policies.len()));

    let mut writer = WorkbookWriter::new();
    writer.add_sheet(sheet_name(language), rows, &widths);
    writer.finish()
}

fn sheet_name(language: ResponseLanguage) -> &'static str {
    match language {
        ResponseLanguage::Turkish => "Karşılaştırma",
        ResponseLanguage::English => "Comparison",
    }
}

struct Sheet {
    name: String,
    rows: Vec<Vec<String>>,
    widths: Vec<f64>,
}

/// Builds an `.xlsx` package in memory.
#[derive(Default)]
pub struct WorkbookWriter {
    sheets: Vec<Sheet>,
}

impl WorkbookWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet. `widths[i]` sets the width of column `i`; columns
    /// past the end of `widths` keep the default width.
    ///
    /// Names are cleaned to what Excel accepts (no `[]:*?/\`, at most 31
    /// characters, unique within the workbook).
    pub fn add_sheet(&mut self, name: &str, rows: Vec<Vec<String>>, widths: &[f64]) -> &mut Self {
        let name = self.unique_name(name);
        self.sheets.push(Sheet {
            name,
            rows,
            widths: widths.to_vec(),
        });
        self
    }

    fn unique_name(&self, raw: &str) -> String {
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
            .take(31)
            .collect();
        let base = if cleaned.trim().is_empty() {
            format!("Sheet{}", self.sheets.len() + 1)
        } else {
            cleaned
        };

        let taken = |n: &str| self.sheets.iter().any(|s| s.name.eq_ignore_ascii_case(n));
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|i| {
                let suffix = format!(" ({i})");
                let keep = 31usize.saturating_sub(suffix.chars().count());
                format!("{}{}", base.chars().take(keep).collect::<String>(), suffix)
            })
            .find(|n| !taken(n))
            .unwrap_or(base)
    }

    /// Serialise the package.
    pub fn finish(self) -> Result<Vec<u8>, PolicyCompareError> {
        let mut strings = SharedStrings::default();
        let sheet_xml: Vec<String> = self
            .sheets
            .iter()
            .map(|s| worksheet_xml(s, &mut strings))
            .collect();

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut put = |name: &str, body: &str| -> Result<(), PolicyCompareError> {
            zip.start_file(name, options).map_err(export_err)?;
            zip.write_all(body.as_bytes()).map_err(export_err)
        };

        put("[Content_Types].xml", &content_types_xml(self.sheets.len()))?;
        put("_rels/.rels", ROOT_RELS)?;
        put("xl/workbook.xml", &workbook_xml(&self.sheets))?;
        put("xl/_rels/workbook.xml.rels", &workbook_rels_xml(self.sheets.len()))?;
        put("xl/styles.xml", STYLES)?;
        put("xl/sharedStrings.xml", &strings.to_xml())?;
        for (i, xml) in sheet_xml.iter().enumerate() {
            put(&format!("xl/worksheets/sheet{}.xml", i + 1), xml)?;
        }

        let cursor = zip.finish().map_err(export_err)?;
        Ok(cursor.into_inner())
    }
}

fn export_err(e: impl std::fmt::Display) -> PolicyCompareError {
    PolicyCompareError::ExportFailed {
        format: "xlsx",
        detail: e.to_string(),
    }
}

#[derive(Default)]
struct SharedStrings {
    index: HashMap<String, usize>,
    values: Vec<String>,
    references: usize,
}

impl SharedStrings {
    fn intern(&mut self, value: &str) -> usize {
        self.references += 1;
        if let Some(&i) = self.index.get(value) {
            return i;
        }
        let i = self.values.len();
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), i);
        i
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(&format!(
            r#"<sst xmlns="{NS_MAIN}" count="{}" uniqueCount="{}">"#,
            self.references,
            self.values.len()
        ));
        for v in &self.values {
            xml.push_str(r#"<si><t xml:space="preserve">"#);
            xml.push_str(&escape(&xml_safe(v)));
            xml.push_str("</t></si>");
        }
        xml.push_str("</sst>");
        xml
    }
}

fn worksheet_xml(sheet: &Sheet, strings: &mut SharedStrings) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(&format!(r#"<worksheet xmlns="{NS_MAIN}">"#));

    if !sheet.widths.is_empty() {
        xml.push_str("<cols>");
        for (i, w) in sheet.widths.iter().enumerate() {
            xml.push_str(&format!(
                r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
                n = i + 1
            ));
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");
    for (r, row) in sheet.rows.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let idx = strings.intern(value);
            xml.push_str(&format!(
                r#"<c r="{}{}" t="s" s="1"><v>{idx}</v></c>"#,
                column_name(c),
                r + 1
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Zero-based column index to its letter name (`0` → `A`, `26` → `AA`).
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Drop characters XML 1.0 cannot carry (control chars other than tab/LF/CR).
fn xml_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn workbook_xml(sheets: &[Sheet]) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(&format!(
        r#"<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheets>"#
    ));
    for (i, s) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape(&s.name),
            n = i + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{NS_REL}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }
    let styles = sheet_count + 1;
    let strings = sheet_count + 2;
    xml.push_str(&format!(
        r#"<Relationship Id="rId{styles}" Type="{NS_REL}/styles" Target="styles.xml"/>"#
    ));
    xml.push_str(&format!(
        r#"<Relationship Id="rId{strings}" Type="{NS_REL}/sharedStrings" Target="sharedStrings.xml"/>"#
    ));
    xml.push_str("</Relationships>");
    xml
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    xml.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
    xml.push_str("</Types>");
    xml
}

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const ROOT_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    "</Relationships>"
);

// xf 0 is the default; xf 1 wraps text and aligns to the top.
const STYLES: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="2">"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment wrapText="1" vertical="top"/></xf>"#,
    "</cellXfs>",
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    "</styleSheet>"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::contract::ExtractedPolicyRecord;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Read;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn sample() -> ComparisonResult {
        ComparisonResult {
            policies: vec![
                ExtractedPolicyRecord {
                    company_name: "Anadolu".into(),
                    policy_type: "Kasko".into(),
                    premium_amount: 12500.0,
                    currency: "TL".into(),
                    coverage_amount: "1.000.000 TL".into(),
                    deductible: "Yok".into(),
                    limits: vec!["İMM 5M".into(), "Cam <10K> & far".into()],
                    pros: vec!["Hızlı".into()],
                    cons: vec!["Pahalı".into()],
                },
                ExtractedPolicyRecord {
                    company_name: "Allianz".into(),
                    policy_type: "Kasko".into(),
                    premium_amount: 9800.0,
                    currency: "TL".into(),
                    coverage_amount: "900.000 TL".into(),
                    deductible: "%2".into(),
                    limits: vec![],
                    pros: vec![],
                    cons: vec![],
                },
            ],
            summary: "Anadolu daha kapsamlı.".into(),
        }
    }

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn comparison_workbook_reads_back() {
        let bytes = render_workbook(&sample(), ResponseLanguage::Turkish).unwrap();
        let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Karşılaştırma".to_string()]);

        let range = wb.worksheet_range("Karşılaştırma").unwrap();
        let cell = |r: u32, c: u32| match range.get_value((r, c)) {
            Some(Data::String(s)) => s.clone(),
            _ => String::new(),
        };

        assert_eq!(cell(0, 0), "Karşılaştırma Özeti:");
        assert_eq!(cell(0, 1), "Anadolu daha kapsamlı.");
        assert_eq!(cell(1, 0), "");
        assert_eq!(cell(2, 0), "Özellik");
        assert_eq!(cell(2, 1), "Anadolu");
        assert_eq!(cell(2, 2), "Allianz");
        assert_eq!(cell(4, 0), "Prim Tutarı");
        assert_eq!(cell(4, 1), "12.500 TL");
        assert_eq!(cell(4, 2), "9.800 TL");
        assert_eq!(cell(7, 0), "Önemli Limitler");
        assert_eq!(cell(7, 1), "İMM 5M\nCam <10K> & far");
        assert_eq!(cell(9, 0), "Dezavantajlar");
    }

    #[test]
    fn widths_and_wrap_style_written() {
        let bytes = render_workbook(&sample(), ResponseLanguage::Turkish).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<col min="1" max="1" width="25" customWidth="1"/>"#));
        assert!(sheet.contains(r#"<col min="3" max="3" width="40" customWidth="1"/>"#));
        assert!(sheet.contains(r#"s="1""#));
        let strings = read_part(&bytes, "xl/sharedStrings.xml");
        assert!(strings.contains("Cam &lt;10K&gt; &amp; far"));
    }

    #[test]
    fn english_sheet_name() {
        let bytes = render_workbook(&sample(), ResponseLanguage::English).unwrap();
        let wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Comparison".to_string()]);
    }

    #[test]
    fn sheet_names_are_cleaned_and_unique() {
        let mut w = WorkbookWriter::new();
        w.add_sheet("a/b:c", vec![], &[]);
        w.add_sheet("abc", vec![], &[]);
        w.add_sheet("", vec![], &[]);
        w.add_sheet(&"x".repeat(40), vec![], &[]);
        let names: Vec<&str> = w.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names[0], "abc");
        assert_eq!(names[1], "abc (2)");
        assert_eq!(names[2], "Sheet3");
        assert_eq!(names[3].chars().count(), 31);
    }

    #[test]
    fn multi_sheet_order_is_kept() {
        let mut w = WorkbookWriter::new();
        w.add_sheet("First", vec![vec!["1".into()]], &[]);
        w.add_sheet("Second", vec![vec!["2".into()]], &[]);
        let bytes = w.finish().unwrap();
        let wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(wb.sheet_names(), vec!["First".to_string(), "Second".to_string()]);
    }
}
