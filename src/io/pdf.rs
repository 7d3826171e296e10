//! PDF 读取/按页抽取 (lopdf)

use crate::error::AppError;
use lopdf::{content::Content, Document, Object, ObjectId};
use std::collections::HashSet;

pub fn load_document(bytes: &[u8]) -> Result<Document, AppError> {
    Document::load_mem(bytes).map_err(|e| AppError::PdfLoad(e.to_string()))
}

/// 每页文本 (页码, 文本), 抽取失败的页为空串
pub fn page_texts(doc: &Document) -> Vec<(u32, String)> {
    doc.get_pages()
        .into_iter()
        .map(|(num, id)| (num, page_text(doc, num, id)))
        .collect()
}

fn page_text(doc: &Document, page_num: u32, page_id: ObjectId) -> String {
    match doc.extract_text(&[page_num]) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => operator_text(doc, page_id),
        Err(e) => {
            tracing::warn!("第 {} 页文本抽取失败, 改用内容流解码: {}", page_num, e);
            operator_text(doc, page_id)
        }
    }
}

/// 直接解码内容流中的文本操作数
fn operator_text(doc: &Document, page_id: ObjectId) -> String {
    let Ok(content) = doc.get_page_content(page_id) else {
        return String::new();
    };
    let Ok(content) = Content::decode(&content) else {
        return String::new();
    };

    let mut text = String::new();
    for op in content.operations {
        match op.operator.as_str() {
            "Tj" | "TJ" | "'" | "\"" => {
                for operand in &op.operands {
                    decode_operand(operand, &mut text);
                }
            }
            "Td" | "TD" | "T*" | "ET" => text.push(' '),
            _ => {}
        }
    }
    text
}

fn decode_operand(operand: &Object, out: &mut String) {
    match operand {
        Object::String(bytes, _) => out.push_str(&decode_bytes(bytes)),
        Object::Array(items) => {
            for item in items {
                match item {
                    Object::String(..) => decode_operand(item, out),
                    // 大的负间距视为词间空格
                    Object::Integer(n) if *n < -100 => out.push(' '),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn decode_bytes(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// 仅保留给定页 (1 起始, 原顺序) 生成新 PDF
pub fn extract_pages(doc: &Document, pages: &[u32]) -> Result<Vec<u8>, AppError> {
    let keep: HashSet<u32> = pages.iter().copied().collect();
    let page_count = doc.get_pages().len() as u32;

    let mut out = doc.clone();
    let mut to_delete: Vec<u32> = (1..=page_count).filter(|p| !keep.contains(p)).collect();
    to_delete.reverse();
    for page in to_delete {
        out.delete_pages(&[page]);
    }

    out.prune_objects();
    out.compress();

    let mut buffer = Vec::new();
    out.save_to(&mut buffer)
        .map_err(|e| AppError::Output(format!("PDF save failed: {}", e)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{content::Operation, dictionary, Dictionary, Stream, StringFormat};

    fn text_page(text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![100.into(), 700.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]
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
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
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

    fn create_test_pdf(pages: &[&str]) -> Vec<u8> {
        pdf_from_operations(pages.iter().map(|t| text_page(t)).collect())
    }

    #[test]
    fn page_texts_follow_page_order() {
        let pdf = create_test_pdf(&["Invoice OV100001 due", "second page"]);
        let doc = load_document(&pdf).unwrap();
        let texts = page_texts(&doc);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].0, 1);
        assert!(texts[0].1.contains("OV100001"));
        assert!(texts[1].1.contains("second"));
    }

    #[test]
    fn extract_pages_keeps_only_requested() {
        let pdf = create_test_pdf(&["a", "b", "c", "d"]);
        let doc = load_document(&pdf).unwrap();
        let out = extract_pages(&doc, &[2, 4]).unwrap();
        let split = load_document(&out).unwrap();
        let texts: Vec<String> = page_texts(&split).into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains('b'));
        assert!(texts[1].contains('d'));
    }

    #[test]
    fn garbage_is_a_load_error() {
        assert!(matches!(load_document(b"not a pdf"), Err(AppError::PdfLoad(_))));
    }

    #[test]
    fn utf16_operands_are_decoded() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "שלום".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_bytes(&bytes), "שלום");
    }

    #[test]
    fn unreadable_font_falls_back_to_content_stream() {
        // Tf 的字体名不是 name, extract_text 直接报错
        let pdf = pdf_from_operations(vec![vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Integer(0), 12.into()]),
            Operation::new("Td", vec![100.into(), 700.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::String(b"Invoice".to_vec(), StringFormat::Literal),
                    Object::Integer(-250),
                    Object::String(b"OV100001".to_vec(), StringFormat::Literal),
                ])],
            ),
            Operation::new("ET", vec![]),
        ]]);
        let doc = load_document(&pdf).unwrap();
        assert!(doc.extract_text(&[1]).is_err());

        let texts = page_texts(&doc);
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1.trim(), "Invoice OV100001");
    }

    #[test]
    fn empty_content_stream_gives_empty_text() {
        let pdf = pdf_from_operations(vec![text_page("OV100001"), Vec::new()]);
        let doc = load_document(&pdf).unwrap();
        let texts = page_texts(&doc);
        assert_eq!(texts[1], (2, String::new()));
    }
}
