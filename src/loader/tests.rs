use super::*;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("should write fixture");
    path
}

#[test]
fn document_type_from_extension() {
    assert_eq!(DocumentType::from_extension("TXT"), Some(DocumentType::Text));
    assert_eq!(DocumentType::from_extension("md"), Some(DocumentType::Text));
    assert_eq!(DocumentType::from_extension("htm"), Some(DocumentType::Html));
    assert_eq!(DocumentType::from_extension("Docx"), Some(DocumentType::Docx));
    assert_eq!(DocumentType::from_extension("xlsx"), None);
}

#[test]
fn document_type_parses_names() {
    assert_eq!(
        "pdf".parse::<DocumentType>().expect("should parse pdf"),
        DocumentType::Pdf
    );
    assert_eq!(
        "markdown".parse::<DocumentType>().expect("should parse markdown"),
        DocumentType::Text
    );
    assert!(matches!(
        "pptx".parse::<DocumentType>(),
        Err(RagError::UnsupportedFormat(_))
    ));
}

#[test]
fn load_plain_text() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "notes.txt", b"Spend less than you earn.");

    let text = load(&path).expect("should load text");
    assert_eq!(text, "Spend less than you earn.");
}

#[test]
fn load_markdown_records_sections() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "guide.md", b"# Credit\n\nScores matter.\n\n## Cards\n\nPay in full.");

    let document = load_document(&path).expect("should load markdown");
    assert_eq!(document.sections.len(), 2);
    assert_eq!(document.section_at(0), Some("Credit"));
    assert_eq!(document.section_at(document.text.len()), Some("Credit > Cards"));
    assert!(document.page_starts.is_empty());
}

#[test]
fn load_json_is_pretty_printed() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "faq.json", br#"{"question":"What is a SIP?","tags":["mutual funds"]}"#);

    let text = load(&path).expect("should load json");
    assert_eq!(
        text,
        "{\n  \"question\": \"What is a SIP?\",\n  \"tags\": [\n    \"mutual funds\"\n  ]\n}"
    );
}

#[test]
fn load_csv_and_html() {
    let dir = TempDir::new().expect("should create temp dir");
    let csv = write_file(&dir, "rates.csv", b"bank,rate\nSBI,6.5\n");
    let html = write_file(&dir, "page.HTML", b"<p>Hello</p><script>x()</script>");

    assert_eq!(load(&csv).expect("should load csv"), "bank  rate\nSBI   6.5");
    assert_eq!(load(&html).expect("should load html"), "Hello");
}

#[test]
fn missing_file_is_not_found() {
    let result = load(Path::new("/definitely/not/here.txt"));
    assert!(matches!(result, Err(RagError::NotFound(_))));
}

#[test]
fn unknown_extension_is_unsupported() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "sheet.xlsx", b"binary");

    assert!(matches!(load(&path), Err(RagError::UnsupportedFormat(_))));
}

#[test]
fn missing_extension_is_unsupported() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "README", b"text");

    assert!(matches!(load(&path), Err(RagError::UnsupportedFormat(_))));
}

#[test]
fn invalid_utf8_text_is_load_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "bad.txt", &[0xff, 0xfe, 0xfd]);

    assert!(matches!(load(&path), Err(RagError::Load(_))));
}

#[test]
fn malformed_json_is_load_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "bad.json", b"{ not json");

    assert!(matches!(load(&path), Err(RagError::Load(_))));
}

#[test]
fn malformed_pdf_is_load_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "broken.pdf", b"%PDF-1.4 truncated");

    assert!(matches!(load(&path), Err(RagError::Load(_))));
}

#[test]
fn explicit_type_overrides_extension() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_file(&dir, "export.dat", b"a,b\n1,2\n");

    let document = load_as(&path, DocumentType::Csv).expect("should load as csv");
    assert_eq!(document.text, "a  b\n1  2");
}

#[test]
fn page_lookup_uses_page_starts() {
    let document = LoadedDocument {
        text: "page one\npage two".to_string(),
        page_starts: vec![0, 9],
        sections: Vec::new(),
    };

    assert_eq!(document.page_at(0), Some(1));
    assert_eq!(document.page_at(8), Some(1));
    assert_eq!(document.page_at(9), Some(2));
    assert_eq!(document.page_at(100), Some(2));
    assert_eq!(LoadedDocument::plain("x".to_string()).page_at(0), None);
}
