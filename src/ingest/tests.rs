use super::*;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use tempfile::TempDir;

/// Write a one-page PDF showing `text` and return its path
fn write_pdf(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content encodes"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.path().join(name);
    doc.save(&path).expect("pdf saves");
    path
}

#[test]
fn text_file_is_read_verbatim() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("notes.txt");
    fs::write(&path, "line one\nline two\n").expect("should write file");

    let document = load_document(&path).expect("text file loads");
    assert_eq!(document.text, "line one\nline two\n");
    assert_eq!(document.pages, 1);
    assert_eq!(document.skipped_pages, 0);
    assert!(!document.is_empty());
}

#[test]
fn pdf_pages_are_extracted() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_pdf(&dir, "hello.PDF", "Hello World");

    let document = load_document(&path).expect("pdf loads");
    assert!(document.text.contains("Hello"));
    assert!(document.text.ends_with('\n'));
    assert_eq!(document.pages, 1);
}

#[test]
fn corrupt_pdf_is_an_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("broken.pdf");
    fs::write(&path, b"definitely not a pdf").expect("should write file");

    assert!(load_document(&path).is_err());
}

#[test]
fn unreadable_files_are_skipped() {
    let dir = TempDir::new().expect("should create temp dir");
    let good = dir.path().join("good.md");
    fs::write(&good, "# Title\n\nBody").expect("should write file");
    let missing = dir.path().join("missing.txt");
    let broken = dir.path().join("broken.pdf");
    fs::write(&broken, b"%PDF-garbage").expect("should write file");

    let documents = load_documents(&[missing, good.clone(), broken]);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].path, good);
}

#[test]
fn pdf_extension_is_case_insensitive() {
    assert!(is_pdf(Path::new("a/b/report.pdf")));
    assert!(is_pdf(Path::new("REPORT.PDF")));
    assert!(!is_pdf(Path::new("report.txt")));
    assert!(!is_pdf(Path::new("pdf")));
}
