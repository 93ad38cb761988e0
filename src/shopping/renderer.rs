use std::{
    fmt::{self, Display},
    fs::File,
    io::BufReader,
    path::PathBuf,
    str::FromStr,
};

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, Pt};
use time::OffsetDateTime;

use super::aggregator::ShoppingListRow;
use crate::{
    constants::*,
    error::{Error, HtmlError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Pdf,
}

impl ExportFormat {
    pub fn filename(&self) -> &'static str {
        match self {
            ExportFormat::Text => SHOPPING_LIST_TEXT_FILENAME,
            ExportFormat::Pdf => SHOPPING_LIST_PDF_FILENAME,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(HtmlError::InvalidRequest
                .new(&format!("format: Unsupported export format '{other}'"))),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Text => write!(f, "txt"),
            ExportFormat::Pdf => write!(f, "pdf"),
        }
    }
}

/// Font used for every line of a PDF shopping list.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfFont {
    Builtin,
    /// TrueType file loaded at render time.
    External(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListDocument {
    pub bytes: Vec<u8>,
    pub filename: &'static str,
    pub content_type: &'static str,
}

impl ShoppingListDocument {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

pub fn render(
    rows: &[ShoppingListRow],
    format: ExportFormat,
    font: &PdfFont,
) -> Result<ShoppingListDocument, Error> {
    let bytes = match format {
        ExportFormat::Text => render_text(rows).into_bytes(),
        ExportFormat::Pdf => render_pdf(&PdfLayout::plan(rows), font)?,
    };

    Ok(ShoppingListDocument {
        bytes,
        filename: format.filename(),
        content_type: format.content_type(),
    })
}

// Text

pub fn text_line(row: &ShoppingListRow) -> String {
    format!("{} - {} {}.\n", row.name, row.amount, row.measurement_unit)
}

pub fn render_text(rows: &[ShoppingListRow]) -> String {
    rows.iter().map(text_line).collect()
}

// Pdf

pub fn pdf_line(row: &ShoppingListRow) -> String {
    format!("• {} - {}- {}", row.name, row.measurement_unit, row.amount)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub font_size: f32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfPage {
    pub lines: Vec<PlacedLine>,
}

/// Positions of every line of a PDF shopping list, in points from the
/// bottom-left corner of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub pages: Vec<PdfPage>,
}

impl PdfLayout {
    /// Title on the first page, then one line per row. A row whose baseline
    /// would fall below the bottom margin opens a new page.
    pub fn plan(rows: &[ShoppingListRow]) -> Self {
        let mut pages = Vec::new();
        let mut page = PdfPage {
            lines: vec![PlacedLine {
                text: SHOPPING_LIST_TITLE.to_string(),
                font_size: PDF_TITLE_FONT_SIZE,
                x: PDF_MARGIN_LEFT,
                y: PDF_TITLE_BASELINE,
            }],
        };
        let mut baseline = PDF_FIRST_LINE_BASELINE;

        for row in rows {
            if baseline < PDF_MARGIN_BOTTOM {
                pages.push(std::mem::take(&mut page));
                baseline = PDF_FIRST_LINE_BASELINE;
            }

            page.lines.push(PlacedLine {
                text: pdf_line(row),
                font_size: PDF_LINE_FONT_SIZE,
                x: PDF_MARGIN_LEFT,
                y: baseline,
            });
            baseline -= PDF_LINE_SPACING;
        }

        pages.push(page);
        Self { pages }
    }
}

fn render_error(e: printpdf::Error) -> Error {
    Error::Render(format!("{e:?}"))
}

/// Characters the builtin Helvetica can draw through WinAnsiEncoding. Anything
/// else would be dropped from the text stream without a trace.
fn builtin_encodable(c: char) -> bool {
    matches!(c,
        ' '..='~'
        | '\u{a1}'..='\u{ac}'
        | '\u{ae}'..='\u{ff}'
        | '€' | '‚' | 'ƒ' | '„' | '…' | '†' | '‡' | 'ˆ' | '‰' | 'Š' | '‹' | 'Œ' | 'Ž'
        | '‘' | '’' | '“' | '”' | '•' | '–' | '—' | '˜' | '™' | 'š' | '›' | 'œ' | 'ž' | 'Ÿ'
    )
}

fn check_builtin_encoding(layout: &PdfLayout) -> Result<(), Error> {
    let unsupported = layout
        .pages
        .iter()
        .flat_map(|page| &page.lines)
        .find_map(|line| {
            line.text
                .chars()
                .find(|c| !builtin_encodable(*c))
                .map(|c| (c, &line.text))
        });

    match unsupported {
        Some((c, text)) => Err(Error::Render(format!(
            "Builtin font cannot draw {c:?} in \"{text}\", set SHOPPING_LIST_FONT to a TrueType font"
        ))),
        None => Ok(()),
    }
}

fn load_font(doc: &PdfDocumentReference, font: &PdfFont) -> Result<IndirectFontRef, Error> {
    match font {
        PdfFont::Builtin => doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(render_error),
        PdfFont::External(path) => {
            let missing = |info: String| Error::MissingResource {
                name: path.display().to_string(),
                info,
            };
            let file = File::open(path).map_err(|e| missing(e.to_string()))?;

            doc.add_external_font(BufReader::new(file))
                .map_err(|e| missing(format!("{e:?}")))
        }
    }
}

/// Emits the planned layout as PDF bytes. The font is loaded before any page is
/// written, so a missing font never yields a partial document. The builtin font
/// rejects text it has no glyphs for instead of silently dropping it.
pub fn render_pdf(layout: &PdfLayout, font: &PdfFont) -> Result<Vec<u8>, Error> {
    if *font == PdfFont::Builtin {
        check_builtin_encoding(layout)?;
    }

    let width = Mm::from(Pt(PDF_PAGE_WIDTH));
    let height = Mm::from(Pt(PDF_PAGE_HEIGHT));

    let (doc, first_page, first_layer) =
        PdfDocument::new(SHOPPING_LIST_TITLE, width, height, "Layer 1");
    let doc = doc
        .with_document_id(SHOPPING_LIST_DOCUMENT_ID.to_string())
        .with_creation_date(OffsetDateTime::UNIX_EPOCH)
        .with_mod_date(OffsetDateTime::UNIX_EPOCH)
        .with_metadata_date(OffsetDateTime::UNIX_EPOCH);

    let font = load_font(&doc, font)?;

    for (index, page) in layout.pages.iter().enumerate() {
        let (page_index, layer_index) = match index {
            0 => (first_page, first_layer),
            _ => doc.add_page(width, height, "Layer 1"),
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for line in &page.lines {
            layer.use_text(
                line.text.as_str(),
                line.font_size,
                Mm::from(Pt(line.x)),
                Mm::from(Pt(line.y)),
                &font,
            );
        }
    }

    log::debug!("> Rendered pdf with {} pages", layout.pages.len());
    doc.save_to_bytes().map_err(render_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: u64) -> ShoppingListRow {
        ShoppingListRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    fn rows(count: usize) -> Vec<ShoppingListRow> {
        (0..count)
            .map(|i| row(&format!("Item {i:03}"), "g", i as u64 + 1))
            .collect()
    }

    #[test]
    fn parses_export_formats() {
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("TEXT".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);

        let error = "docx".parse::<ExportFormat>().unwrap_err();
        assert_eq!(error.code(), 400);
    }

    #[test]
    fn text_line_format() {
        assert_eq!(text_line(&row("Milk", "l", 2)), "Milk - 2 l.\n");
    }

    #[test]
    fn text_document_keeps_row_order() {
        let document = render(
            &[row("Egg", "pcs", 2), row("Flour", "g", 300)],
            ExportFormat::Text,
            &PdfFont::Builtin,
        )
        .unwrap();

        assert_eq!(document.bytes, b"Egg - 2 pcs.\nFlour - 300 g.\n");
        assert_eq!(document.filename, "shopping_list.txt");
        assert_eq!(document.content_type, "text/plain");
        assert_eq!(
            document.content_disposition(),
            "attachment; filename=\"shopping_list.txt\""
        );
    }

    #[test]
    fn empty_text_document() {
        let document = render(&[], ExportFormat::Text, &PdfFont::Builtin).unwrap();
        assert!(document.bytes.is_empty());
        assert_eq!(document.filename, "shopping_list.txt");
    }

    #[test]
    fn pdf_line_format() {
        assert_eq!(pdf_line(&row("Flour", "g", 300)), "• Flour - g- 300");
    }

    #[test]
    fn empty_layout_is_a_single_title_page() {
        let layout = PdfLayout::plan(&[]);

        assert_eq!(layout.pages.len(), 1);
        assert_eq!(
            layout.pages[0].lines,
            vec![PlacedLine {
                text: String::from("Shopping list:"),
                font_size: 24.0,
                x: 50.0,
                y: 830.0,
            }]
        );
    }

    #[test]
    fn rows_step_down_the_page() {
        let layout = PdfLayout::plan(&rows(3));
        let baselines: Vec<f32> = layout.pages[0].lines.iter().map(|l| l.y).collect();
        assert_eq!(baselines, vec![830.0, 790.0, 765.0, 740.0]);
    }

    #[test]
    fn page_breaks_before_bottom_margin() {
        // Baselines 790, 765, ..., 65 fit; 40 would not.
        let layout = PdfLayout::plan(&rows(30));
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(layout.pages[0].lines.last().unwrap().y, 65.0);

        let layout = PdfLayout::plan(&rows(31));
        assert_eq!(layout.pages.len(), 2);
        assert_eq!(
            layout.pages[1].lines,
            vec![PlacedLine {
                text: String::from("• Item 030 - g- 31"),
                font_size: 14.0,
                x: 50.0,
                y: 790.0,
            }]
        );
    }

    #[test]
    fn title_only_on_first_page() {
        let layout = PdfLayout::plan(&rows(75));
        assert_eq!(layout.pages.len(), 3);

        let titles = layout
            .pages
            .iter()
            .flat_map(|p| &p.lines)
            .filter(|l| l.text == "Shopping list:")
            .count();
        assert_eq!(titles, 1);
    }

    #[test]
    fn layout_is_deterministic() {
        let input = rows(45);
        assert_eq!(PdfLayout::plan(&input), PdfLayout::plan(&input));
    }

    #[test]
    fn renders_pdf_with_builtin_font() {
        let document = render(&rows(40), ExportFormat::Pdf, &PdfFont::Builtin).unwrap();

        assert!(document.bytes.starts_with(b"%PDF"));
        assert_eq!(document.filename, "list.pdf");
        assert_eq!(document.content_type, "application/pdf");
    }

    fn bundled_font() -> PdfFont {
        PdfFont::External(PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/resources/fonts/DejaVuSans.ttf"
        )))
    }

    #[test]
    fn builtin_font_accepts_latin_1_rows() {
        let input = [row("Crème fraîche", "g", 200), row("Jalapeño", "pcs", 3)];
        let document = render(&input, ExportFormat::Pdf, &PdfFont::Builtin).unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn builtin_font_rejects_cyrillic_rows() {
        let input = [row("Sugar", "g", 50), row("Мука", "г", 300)];
        let error = render(&input, ExportFormat::Pdf, &PdfFont::Builtin).unwrap_err();

        assert!(matches!(error, Error::Render(ref info) if info.contains("Мука")));
        assert_eq!(error.code(), 500);
    }

    #[test]
    fn builtin_font_rejects_non_breaking_space() {
        let input = [row("Olive\u{a0}oil", "ml", 30)];
        assert!(render(&input, ExportFormat::Pdf, &PdfFont::Builtin).is_err());
    }

    #[test]
    fn text_export_keeps_cyrillic_rows() {
        let document = render(&[row("Мука", "г", 300)], ExportFormat::Text, &PdfFont::Builtin)
            .unwrap();
        assert_eq!(String::from_utf8(document.bytes).unwrap(), "Мука - 300 г.\n");
    }

    #[test]
    fn renders_pdf_with_external_font() {
        let document = render(&rows(40), ExportFormat::Pdf, &bundled_font()).unwrap();

        assert!(document.bytes.starts_with(b"%PDF"));
        assert_eq!(document.filename, "list.pdf");
    }

    #[test]
    fn external_font_renders_cyrillic_rows() {
        let input = [row("Мука", "г", 300), row("Яйца", "шт", 2)];
        let document = render(&input, ExportFormat::Pdf, &bundled_font()).unwrap();

        assert!(document.bytes.starts_with(b"%PDF"));
        // Glyphs are embedded in the document.
        assert!(document.bytes.windows(9).any(|w| w == b"/FontFile"));
    }

    #[test]
    fn missing_font_fails_without_fallback() {
        let font = PdfFont::External(PathBuf::from("/nonexistent/fonts/DejaVuSans.ttf"));
        let error = render(&rows(1), ExportFormat::Pdf, &font).unwrap_err();

        assert!(matches!(error, Error::MissingResource { .. }));
        assert_eq!(error.code(), 500);
    }
}
