use giyul_chovot_rust::config::SplitterConfig;
use giyul_chovot_rust::io::{self, MAPPING_EXTENSIONS};
use giyul_chovot_rust::models::Destination;
use giyul_chovot_rust::service::build_mapping;
use giyul_chovot_rust::SplitterService;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read};
use zip::ZipArchive;

fn text_page(text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// 每个字符串一页
fn invoice_pdf(pages: &[&str]) -> Vec<u8> {
    pdf_from_operations(pages.iter().map(|t| text_page(t)).collect())
}

/// 每组操作一页
fn pdf_from_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let count = pages.len() as i64;
    let mut kids = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => count,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn mapping_csv() -> &'static str {
    "invoice,customer\nOV100001,Acme\nOV100002,A/B\nOV100003,A:B\n"
}

fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

#[test]
fn pdf_is_split_per_customer_into_zip() {
    let pdf = invoice_pdf(&[
        "Invoice OV100001",
        "Terms and conditions",
        "Invoice OV100002",
        "Invoice OV100003",
        "OV100001 page 2",
    ]);
    let wb = io::load_spreadsheet("map.csv", mapping_csv().as_bytes(), &MAPPING_EXTENSIONS).unwrap();
    let mapping = build_mapping(&wb.sheets[0]).unwrap();
    assert_eq!(mapping.len(), 3);

    let service = SplitterService::new(SplitterConfig::default()).unwrap();
    let output = service.split(&pdf, &mapping).unwrap();

    assert_eq!(output.report.total_pages, 5);
    assert_eq!(output.report.matched_pages, 4);
    assert_eq!(output.report.unmatched_pages, 1);
    assert_eq!(output.report.logs[0], "✅ עמוד 1: נמצא OV100001 → Acme");

    let mut archive = ZipArchive::new(Cursor::new(output.archive)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut body = Vec::new();
        file.read_to_end(&mut body).unwrap();
        entries.push((file.name().to_string(), page_count(&body)));
    }

    assert_eq!(
        entries,
        vec![
            ("Acme.pdf".to_string(), 2),
            ("A_B.pdf".to_string(), 1),
            ("A_B_2.pdf".to_string(), 1),
            ("Unknown.pdf".to_string(), 1),
        ]
    );
}

#[test]
fn analyze_reports_destinations_without_writing_files() {
    let pdf = invoice_pdf(&["nothing here", "ov100002 lower case"]);
    let wb = io::load_spreadsheet("map.csv", mapping_csv().as_bytes(), &MAPPING_EXTENSIONS).unwrap();
    let mapping = build_mapping(&wb.sheets[0]).unwrap();

    let report = SplitterService::new(SplitterConfig::default())
        .unwrap()
        .analyze(&pdf, &mapping)
        .unwrap();

    let destinations: Vec<Destination> = report
        .assignments
        .iter()
        .map(|a| a.destination.clone())
        .collect();
    assert_eq!(
        destinations,
        vec![Destination::Unmatched, Destination::Customer("A/B".to_string())]
    );
    assert_eq!(report.buckets.len(), 2);
    assert_eq!(report.buckets[0].file_name, "A_B.pdf");
}

#[test]
fn pdf_without_matches_goes_to_a_single_unknown_file() {
    let pdf = invoice_pdf(&["a", "b", "c"]);
    let wb = io::load_spreadsheet("map.csv", mapping_csv().as_bytes(), &MAPPING_EXTENSIONS).unwrap();
    let mapping = build_mapping(&wb.sheets[0]).unwrap();

    let output = SplitterService::new(SplitterConfig::default())
        .unwrap()
        .split(&pdf, &mapping)
        .unwrap();

    let mut archive = ZipArchive::new(Cursor::new(output.archive)).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.by_index(0).unwrap().name(), "Unknown.pdf");
}

fn archive_entries(bytes: Vec<u8>) -> Vec<(String, usize)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut body = Vec::new();
        file.read_to_end(&mut body).unwrap();
        entries.push((file.name().to_string(), page_count(&body)));
    }
    entries
}

#[test]
fn unreadable_font_page_is_still_routed_and_blank_page_is_unmatched() {
    // 第一页字体操作数损坏, 第二页内容流为空
    let broken_font = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Integer(0), 12.into()]),
        Operation::new(
            "TJ",
            vec![Object::Array(vec![
                Object::String(b"Invoice".to_vec(), StringFormat::Literal),
                Object::Integer(-250),
                Object::String(b"OV100001".to_vec(), StringFormat::Literal),
            ])],
        ),
        Operation::new("ET", vec![]),
    ];
    let pdf = pdf_from_operations(vec![broken_font, Vec::new()]);
    let wb = io::load_spreadsheet("map.csv", mapping_csv().as_bytes(), &MAPPING_EXTENSIONS).unwrap();
    let mapping = build_mapping(&wb.sheets[0]).unwrap();

    let output = SplitterService::new(SplitterConfig::default())
        .unwrap()
        .split(&pdf, &mapping)
        .unwrap();

    assert_eq!(output.report.matched_pages, 1);
    assert_eq!(output.report.unmatched_pages, 1);
    assert_eq!(
        archive_entries(output.archive),
        vec![("Acme.pdf".to_string(), 1), ("Unknown.pdf".to_string(), 1)]
    );
}
