//! 在原 xlsx 包上原地更新
//!
//! 原有部件 (公式, 数字格式, 合并单元格, 列宽, 宏) 原样保留。只改写:
//! 着色单元格的样式下标, 工作表视图方向, 以及程序生成的辅助表。

use crate::error::AppError;
use crate::io::archive;
use crate::models::{CellValue, Fill, Sheet, Workbook};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{HashMap, HashSet};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

type XmlResult<T> = quick_xml::Result<T>;

fn part_error(part: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Output(format!("{}: {}", part, e))
}

fn is(start: &BytesStart, local: &[u8]) -> bool {
    start.local_name().as_ref() == local
}

fn attr(start: &BytesStart, key: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// 带前缀的 `r:id` 一类属性, 只按本地名匹配
fn prefixed_attr(start: &BytesStart, local: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == local.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// 复制元素, 覆盖或追加给定属性
fn with_attrs(start: &BytesStart, set: &[(&str, &str)]) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for a in start.attributes().flatten() {
        if !set.iter().any(|(k, _)| a.key.as_ref() == k.as_bytes()) {
            out.push_attribute(a);
        }
    }
    for &(k, v) in set {
        out.push_attribute((k, v));
    }
    out
}

/// 流式改写一个 XML 部件; 回调负责写出 (或替换) 每个事件
fn rewrite<F>(xml: &[u8], part: &str, mut on_event: F) -> Result<Vec<u8>, AppError>
where
    F: FnMut(Event<'_>, &mut Writer<Vec<u8>>) -> XmlResult<()>,
{
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    loop {
        match reader.read_event().map_err(|e| part_error(part, e))? {
            Event::Eof => break,
            event => on_event(event, &mut writer).map_err(|e| part_error(part, e))?,
        }
    }
    Ok(writer.into_inner())
}

/// "B3" -> (3, 2)
fn parse_cell_ref(reference: &str) -> Option<(u32, u16)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row = digits.parse().ok()?;
    u16::try_from(col).ok().map(|col| (row, col))
}

fn column_name(mut col: u16) -> String {
    let mut name = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        name.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

#[derive(Debug, Clone, PartialEq)]
struct SheetEntry {
    name: String,
    sheet_id: u32,
    rel_id: String,
}

fn read_sheet_entries(xml: &[u8]) -> Result<Vec<SheetEntry>, AppError> {
    let mut reader = Reader::from_reader(xml);
    let mut entries = Vec::new();
    loop {
        match reader.read_event().map_err(|e| part_error(WORKBOOK_PART, e))? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if is(&e, b"sheet") => {
                let (Some(name), Some(rel_id)) = (attr(&e, "name"), prefixed_attr(&e, "id")) else {
                    continue;
                };
                let sheet_id = attr(&e, "sheetId").and_then(|v| v.parse().ok()).unwrap_or(0);
                entries.push(SheetEntry { name, sheet_id, rel_id });
            }
            _ => {}
        }
    }
    Ok(entries)
}

/// 关系 Id -> 包内部件路径
fn read_relationship_targets(xml: &[u8]) -> Result<HashMap<String, String>, AppError> {
    let mut reader = Reader::from_reader(xml);
    let mut targets = HashMap::new();
    loop {
        match reader.read_event().map_err(|e| part_error(WORKBOOK_RELS_PART, e))? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if is(&e, b"Relationship") => {
                if let (Some(id), Some(target)) = (attr(&e, "Id"), attr(&e, "Target")) {
                    let path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target.trim_start_matches("./")),
                    };
                    targets.insert(id, path);
                }
            }
            _ => {}
        }
    }
    Ok(targets)
}

/// cellXfs 中的一个 `<xf>`
#[derive(Debug, Clone)]
struct Xf {
    start: BytesStart<'static>,
    children: Vec<Event<'static>>,
}

impl Xf {
    fn plain() -> Self {
        Self {
            start: BytesStart::new("xf").with_attributes([
                ("numFmtId", "0"),
                ("fontId", "0"),
                ("fillId", "0"),
                ("borderId", "0"),
                ("xfId", "0"),
            ]),
            children: Vec::new(),
        }
    }

    fn set_fill(&mut self, fill_id: usize) {
        let fill_id = fill_id.to_string();
        self.start = with_attrs(&self.start, &[("fillId", fill_id.as_str()), ("applyFill", "1")]);
    }

    fn set_wrap(&mut self) {
        self.start = with_attrs(&self.start, &[("applyAlignment", "1")]);
        for event in &mut self.children {
            match event {
                Event::Empty(e) | Event::Start(e) if is(e, b"alignment") => {
                    *e = with_attrs(e, &[("wrapText", "1")]);
                    return;
                }
                _ => {}
            }
        }
        // alignment 必须是第一个子元素
        self.children.insert(
            0,
            Event::Empty(BytesStart::new("alignment").with_attributes([("wrapText", "1")])),
        );
    }

    fn write(&self, w: &mut Writer<Vec<u8>>) -> XmlResult<()> {
        if self.children.is_empty() {
            return w.write_event(Event::Empty(self.start.borrow()));
        }
        w.write_event(Event::Start(self.start.borrow()))?;
        for child in &self.children {
            w.write_event(child.borrow())?;
        }
        w.write_event(Event::End(self.start.to_end()))
    }
}

/// 样式表: 原有 cellXfs + 本次追加的填充与样式
#[derive(Debug, Default)]
struct StyleTable {
    xfs: Vec<Xf>,
    fill_count: usize,
    new_fills: Vec<Fill>,
    new_xfs: Vec<Xf>,
    derived: HashMap<(usize, Option<Fill>, bool), usize>,
}

impl StyleTable {
    fn parse(xml: &[u8]) -> Result<Self, AppError> {
        let mut reader = Reader::from_reader(xml);
        let mut table = StyleTable::default();
        let mut in_fills = false;
        let mut in_cell_xfs = false;
        let mut current: Option<Xf> = None;

        loop {
            let event = reader.read_event().map_err(|e| part_error(STYLES_PART, e))?;
            if let Some(xf) = current.as_mut() {
                match event {
                    Event::End(ref e) if e.local_name().as_ref() == b"xf" => {
                        if let Some(done) = current.take() {
                            table.xfs.push(done);
                        }
                    }
                    Event::Eof => break,
                    other => xf.children.push(other.into_owned()),
                }
                continue;
            }
            match event {
                Event::Eof => break,
                Event::Start(e) if is(&e, b"fills") => in_fills = true,
                Event::End(e) if e.local_name().as_ref() == b"fills" => in_fills = false,
                Event::Start(e) | Event::Empty(e) if in_fills && is(&e, b"fill") => {
                    table.fill_count += 1;
                }
                Event::Start(e) if is(&e, b"cellXfs") => in_cell_xfs = true,
                Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
                Event::Empty(e) if in_cell_xfs && is(&e, b"xf") => table.xfs.push(Xf {
                    start: e.into_owned(),
                    children: Vec::new(),
                }),
                Event::Start(e) if in_cell_xfs && is(&e, b"xf") => {
                    current = Some(Xf {
                        start: e.into_owned(),
                        children: Vec::new(),
                    })
                }
                _ => {}
            }
        }
        Ok(table)
    }

    fn fill_id(&mut self, fill: Fill) -> usize {
        match self.new_fills.iter().position(|f| *f == fill) {
            Some(i) => self.fill_count + i,
            None => {
                self.new_fills.push(fill);
                self.fill_count + self.new_fills.len() - 1
            }
        }
    }

    /// 以 base 为底派生样式 (同参数复用), 返回 cellXfs 下标
    fn derive(&mut self, base: usize, fill: Option<Fill>, wrap: bool) -> usize {
        if fill.is_none() && !wrap {
            return base;
        }
        if let Some(&idx) = self.derived.get(&(base, fill, wrap)) {
            return idx;
        }

        let mut xf = self
            .xfs
            .get(base)
            .or_else(|| self.xfs.first())
            .cloned()
            .unwrap_or_else(Xf::plain);
        if let Some(fill) = fill {
            let fill_id = self.fill_id(fill);
            xf.set_fill(fill_id);
        }
        if wrap {
            xf.set_wrap();
        }

        let idx = self.xfs.len() + self.new_xfs.len();
        self.new_xfs.push(xf);
        self.derived.insert((base, fill, wrap), idx);
        idx
    }

    fn write_new_fills(&self, w: &mut Writer<Vec<u8>>) -> XmlResult<()> {
        for fill in &self.new_fills {
            let argb = fill.argb();
            w.write_event(Event::Start(BytesStart::new("fill")))?;
            w.write_event(Event::Start(
                BytesStart::new("patternFill").with_attributes([("patternType", "solid")]),
            ))?;
            w.write_event(Event::Empty(
                BytesStart::new("fgColor").with_attributes([("rgb", argb.as_str())]),
            ))?;
            w.write_event(Event::Empty(
                BytesStart::new("bgColor").with_attributes([("indexed", "64")]),
            ))?;
            w.write_event(Event::End(BytesEnd::new("patternFill")))?;
            w.write_event(Event::End(BytesEnd::new("fill")))?;
        }
        Ok(())
    }

    fn write_new_xfs(&self, w: &mut Writer<Vec<u8>>) -> XmlResult<()> {
        for xf in &self.new_xfs {
            xf.write(w)?;
        }
        Ok(())
    }

    /// 在原 styles.xml 上追加新填充与新样式, 并更新 count
    fn render(&self, xml: &[u8]) -> Result<Vec<u8>, AppError> {
        if self.new_fills.is_empty() && self.new_xfs.is_empty() {
            return Ok(xml.to_vec());
        }
        let fill_total = (self.fill_count + self.new_fills.len()).to_string();
        let xf_total = (self.xfs.len() + self.new_xfs.len()).to_string();

        rewrite(xml, STYLES_PART, |event, w| match event {
            Event::Start(e) if is(&e, b"fills") => {
                w.write_event(Event::Start(with_attrs(&e, &[("count", fill_total.as_str())])))
            }
            Event::End(e) if e.local_name().as_ref() == b"fills" => {
                self.write_new_fills(w)?;
                w.write_event(Event::End(e))
            }
            Event::Empty(e) if is(&e, b"fills") => {
                let start = with_attrs(&e, &[("count", fill_total.as_str())]);
                w.write_event(Event::Start(start.borrow()))?;
                self.write_new_fills(w)?;
                w.write_event(Event::End(start.to_end()))
            }
            Event::Start(e) if is(&e, b"cellXfs") => {
                w.write_event(Event::Start(with_attrs(&e, &[("count", xf_total.as_str())])))
            }
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => {
                self.write_new_xfs(w)?;
                w.write_event(Event::End(e))
            }
            Event::Empty(e) if is(&e, b"cellXfs") => {
                let start = with_attrs(&e, &[("count", xf_total.as_str())]);
                w.write_event(Event::Start(start.borrow()))?;
                self.write_new_xfs(w)?;
                w.write_event(Event::End(start.to_end()))
            }
            other => w.write_event(other),
        })
    }
}

fn write_sheet_views(w: &mut Writer<Vec<u8>>, right_to_left: bool) -> XmlResult<()> {
    let mut view = BytesStart::new("sheetView").with_attributes([("workbookViewId", "0")]);
    if right_to_left {
        view.push_attribute(("rightToLeft", "1"));
    }
    w.write_event(Event::Start(BytesStart::new("sheetViews")))?;
    w.write_event(Event::Empty(view))?;
    w.write_event(Event::End(BytesEnd::new("sheetViews")))
}

/// 用户原有工作表: 只改填充单元格的样式和视图方向, 其余字节照抄
fn patch_sheet(xml: &[u8], part: &str, sheet: &Sheet, styles: &mut StyleTable) -> Result<Vec<u8>, AppError> {
    let mut saw_views = false;
    rewrite(xml, part, |event, w| match event {
        Event::Start(e) => {
            let patched = patch_element(&e, sheet, styles, &mut saw_views, w)?;
            w.write_event(Event::Start(patched))
        }
        Event::Empty(e) => {
            let patched = patch_element(&e, sheet, styles, &mut saw_views, w)?;
            w.write_event(Event::Empty(patched))
        }
        other => w.write_event(other),
    })
}

fn patch_element(
    e: &BytesStart,
    sheet: &Sheet,
    styles: &mut StyleTable,
    saw_views: &mut bool,
    w: &mut Writer<Vec<u8>>,
) -> XmlResult<BytesStart<'static>> {
    if is(e, b"sheetViews") {
        *saw_views = true;
    } else if !*saw_views
        && sheet.right_to_left
        && (is(e, b"sheetFormatPr") || is(e, b"cols") || is(e, b"sheetData"))
    {
        // sheetViews 缺失时插在这些元素之前
        *saw_views = true;
        write_sheet_views(w, true)?;
    }

    if is(e, b"sheetView") && sheet.right_to_left {
        return Ok(with_attrs(e, &[("rightToLeft", "1")]));
    }
    if is(e, b"c") {
        return Ok(restyle_cell(e, sheet, styles));
    }
    Ok(e.to_owned())
}

fn restyle_cell(e: &BytesStart, sheet: &Sheet, styles: &mut StyleTable) -> BytesStart<'static> {
    let target = attr(e, "r")
        .and_then(|r| parse_cell_ref(&r))
        .and_then(|(row, col)| sheet.cell(row, col));
    match target {
        Some(cell) if cell.fill.is_some() => {
            let base = attr(e, "s").and_then(|s| s.parse().ok()).unwrap_or(0);
            let idx = styles.derive(base, cell.fill, cell.wrap).to_string();
            with_attrs(e, &[("s", idx.as_str())])
        }
        _ => e.to_owned(),
    }
}

/// 程序生成的表: 整表重写 (内联字符串, 不动 sharedStrings)
fn generated_sheet_xml(sheet: &Sheet, styles: &mut StyleTable) -> XmlResult<Vec<u8>> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    w.write_event(Event::Start(
        BytesStart::new("worksheet").with_attributes([("xmlns", MAIN_NS), ("xmlns:r", REL_NS)]),
    ))?;
    write_sheet_views(&mut w, sheet.right_to_left)?;
    w.write_event(Event::Empty(
        BytesStart::new("sheetFormatPr").with_attributes([("defaultRowHeight", "15")]),
    ))?;

    if !sheet.column_widths.is_empty() {
        w.write_event(Event::Start(BytesStart::new("cols")))?;
        for &(col, width) in &sheet.column_widths {
            let col = col.to_string();
            let width = width.to_string();
            w.write_event(Event::Empty(BytesStart::new("col").with_attributes([
                ("min", col.as_str()),
                ("max", col.as_str()),
                ("width", width.as_str()),
                ("customWidth", "1"),
            ])))?;
        }
        w.write_event(Event::End(BytesEnd::new("cols")))?;
    }

    w.write_event(Event::Start(BytesStart::new("sheetData")))?;
    let mut open_row: Option<u32> = None;
    for (r, c, cell) in sheet.cells() {
        if matches!(cell.value, CellValue::Empty) {
            continue;
        }
        if open_row != Some(r) {
            if open_row.is_some() {
                w.write_event(Event::End(BytesEnd::new("row")))?;
            }
            let row = r.to_string();
            w.write_event(Event::Start(BytesStart::new("row").with_attributes([("r", row.as_str())])))?;
            open_row = Some(r);
        }

        let reference = format!("{}{}", column_name(c), r);
        let mut start = BytesStart::new("c").with_attributes([("r", reference.as_str())]);
        let style = styles.derive(0, cell.fill, cell.wrap);
        if style != 0 {
            start.push_attribute(("s", style.to_string().as_str()));
        }

        match &cell.value {
            CellValue::Number(n) => {
                w.write_event(Event::Start(start))?;
                write_text_element(&mut w, "v", &n.to_string(), false)?;
            }
            CellValue::Bool(b) => {
                start.push_attribute(("t", "b"));
                w.write_event(Event::Start(start))?;
                write_text_element(&mut w, "v", if *b { "1" } else { "0" }, false)?;
            }
            other => {
                let text = match other {
                    CellValue::Date(d) => d.format("%d/%m/%Y").to_string(),
                    v => v.to_string(),
                };
                start.push_attribute(("t", "inlineStr"));
                w.write_event(Event::Start(start))?;
                w.write_event(Event::Start(BytesStart::new("is")))?;
                write_text_element(&mut w, "t", &text, true)?;
                w.write_event(Event::End(BytesEnd::new("is")))?;
            }
        }
        w.write_event(Event::End(BytesEnd::new("c")))?;
    }
    if open_row.is_some() {
        w.write_event(Event::End(BytesEnd::new("row")))?;
    }
    w.write_event(Event::End(BytesEnd::new("sheetData")))?;
    w.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(w.into_inner())
}

fn write_text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str, preserve: bool) -> XmlResult<()> {
    let mut start = BytesStart::new(name);
    if preserve {
        start.push_attribute(("xml:space", "preserve"));
    }
    w.write_event(Event::Start(start))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))
}

/// 新增到包中的工作表
#[derive(Debug)]
struct NewSheet {
    name: String,
    sheet_id: u32,
    rel_id: String,
    part: String,
}

fn fresh_rel_id(used: &mut HashSet<String>) -> String {
    let mut n = used.len() + 1;
    loop {
        let id = format!("rId{}", n);
        if used.insert(id.clone()) {
            return id;
        }
        n += 1;
    }
}

fn fresh_sheet_part(parts: &[(String, Vec<u8>)]) -> String {
    let mut n = 1;
    loop {
        let name = format!("xl/worksheets/sheet{}.xml", n);
        if !parts.iter().any(|(p, _)| *p == name) {
            return name;
        }
        n += 1;
    }
}

fn part<'p>(parts: &'p [(String, Vec<u8>)], name: &str) -> Result<&'p [u8], AppError> {
    parts
        .iter()
        .find(|(p, _)| p == name)
        .map(|(_, bytes)| bytes.as_slice())
        .ok_or_else(|| AppError::SpreadsheetLoad(format!("xlsx package has no {}", name)))
}

fn replace_part(parts: &mut [(String, Vec<u8>)], name: &str, bytes: Vec<u8>) {
    if let Some(slot) = parts.iter_mut().find(|(p, _)| p == name) {
        slot.1 = bytes;
    }
}

/// 登记新增工作表: workbook.xml / workbook.xml.rels / [Content_Types].xml
fn register_sheets(parts: &mut [(String, Vec<u8>)], added: &[NewSheet]) -> Result<(), AppError> {
    let workbook = rewrite(part(parts, WORKBOOK_PART)?, WORKBOOK_PART, |event, w| match event {
        Event::End(e) if e.local_name().as_ref() == b"sheets" => {
            for sheet in added {
                let sheet_id = sheet.sheet_id.to_string();
                w.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
                    ("name", sheet.name.as_str()),
                    ("sheetId", sheet_id.as_str()),
                    ("r:id", sheet.rel_id.as_str()),
                ])))?;
            }
            w.write_event(Event::End(e))
        }
        other => w.write_event(other),
    })?;
    replace_part(parts, WORKBOOK_PART, workbook);

    let rels = rewrite(part(parts, WORKBOOK_RELS_PART)?, WORKBOOK_RELS_PART, |event, w| match event {
        Event::End(e) if e.local_name().as_ref() == b"Relationships" => {
            for sheet in added {
                let target = sheet.part.trim_start_matches("xl/");
                w.write_event(Event::Empty(BytesStart::new("Relationship").with_attributes([
                    ("Id", sheet.rel_id.as_str()),
                    ("Type", WORKSHEET_REL_TYPE),
                    ("Target", target),
                ])))?;
            }
            w.write_event(Event::End(e))
        }
        other => w.write_event(other),
    })?;
    replace_part(parts, WORKBOOK_RELS_PART, rels);

    let types = rewrite(part(parts, CONTENT_TYPES_PART)?, CONTENT_TYPES_PART, |event, w| match event {
        Event::End(e) if e.local_name().as_ref() == b"Types" => {
            for sheet in added {
                let part_name = format!("/{}", sheet.part);
                w.write_event(Event::Empty(BytesStart::new("Override").with_attributes([
                    ("PartName", part_name.as_str()),
                    ("ContentType", WORKSHEET_CONTENT_TYPE),
                ])))?;
            }
            w.write_event(Event::End(e))
        }
        other => w.write_event(other),
    })?;
    replace_part(parts, CONTENT_TYPES_PART, types);
    Ok(())
}

/// 把处理后的工作簿写回原文件包
///
/// 原有表只更新填充与视图方向; `generated` 表整表重写, 不存在则新增。
pub fn update_workbook(original: &[u8], wb: &Workbook) -> Result<Vec<u8>, AppError> {
    let mut parts = archive::read_zip(original)?;

    let entries = read_sheet_entries(part(&parts, WORKBOOK_PART)?)?;
    let targets = read_relationship_targets(part(&parts, WORKBOOK_RELS_PART)?)?;
    let mut styles = StyleTable::parse(part(&parts, STYLES_PART)?)?;

    let mut used_rel_ids: HashSet<String> = targets.keys().cloned().collect();
    let mut next_sheet_id = entries.iter().map(|e| e.sheet_id).max().unwrap_or(0) + 1;
    let mut added = Vec::new();

    for sheet in &wb.sheets {
        let existing = entries
            .iter()
            .find(|e| e.name == sheet.name)
            .and_then(|e| targets.get(&e.rel_id))
            .filter(|path| parts.iter().any(|(p, _)| p == *path))
            .cloned();

        match existing {
            Some(path) if !sheet.generated => {
                let xml = patch_sheet(part(&parts, &path)?, &path, sheet, &mut styles)?;
                replace_part(&mut parts, &path, xml);
            }
            Some(path) => {
                let xml = generated_sheet_xml(sheet, &mut styles).map_err(|e| part_error(&path, e))?;
                replace_part(&mut parts, &path, xml);
            }
            None => {
                let path = fresh_sheet_part(&parts);
                let xml = generated_sheet_xml(sheet, &mut styles).map_err(|e| part_error(&path, e))?;
                parts.push((path.clone(), xml));
                added.push(NewSheet {
                    name: sheet.name.clone(),
                    sheet_id: next_sheet_id,
                    rel_id: fresh_rel_id(&mut used_rel_ids),
                    part: path,
                });
                next_sheet_id += 1;
            }
        }
    }

    if !added.is_empty() {
        register_sheets(&mut parts, &added)?;
    }
    let styles_xml = styles.render(part(&parts, STYLES_PART)?)?;
    replace_part(&mut parts, STYLES_PART, styles_xml);

    tracing::info!(
        "xlsx 原地更新: {} 个表, 新增 {} 个, 新样式 {} 个",
        wb.sheets.len(),
        added.len(),
        styles.new_xfs.len()
    );
    archive::write_zip(&parts)
}
