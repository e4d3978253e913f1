use std::fs;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, Run, RunChild};

use super::{LoaderError, Section};

pub(crate) fn read_docx(path: &Path) -> Result<Vec<Section>, LoaderError> {
    let bytes = fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| LoaderError::Docx {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    Ok(vec![Section::whole(paragraphs.join("\n"))])
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            push_run_text(run, &mut text);
        }
    }
    text
}

fn push_run_text(run: &Run, out: &mut String) {
    for child in &run.children {
        match child {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) => out.push('\t'),
            RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
}

/// One section per non-empty sheet; rows become comma-separated lines.
pub(crate) fn read_spreadsheet(path: &Path) -> Result<Vec<Section>, LoaderError> {
    let err = |source: calamine::Error| LoaderError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(err)?;

    let mut sections = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name).map_err(err)?;
        let lines: Vec<String> = range
            .rows()
            .map(|row| {
                row.iter()
                    .filter(|cell| !matches!(cell, Data::Empty))
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|line| !line.is_empty())
            .collect();

        if !lines.is_empty() {
            sections.push(Section {
                label: Some(name),
                text: lines.join("\n"),
            });
        }
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::Docx;
    use tempfile::tempdir;

    #[test]
    fn test_read_docx_paragraphs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.docx");
        let file = fs::File::create(&path).unwrap();
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Quarterly report")))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Revenue grew.")))
            .build()
            .pack(file)
            .unwrap();

        let sections = read_docx(&path).unwrap();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].label.is_none());
        let text = &sections[0].text;
        let first = text.find("Quarterly report").unwrap();
        let second = text.find("Revenue grew.").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_read_docx_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        fs::write(&path, "not a zip").unwrap();
        assert!(matches!(read_docx(&path), Err(LoaderError::Docx { .. })));
    }

    #[test]
    fn test_read_spreadsheet_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.xlsx");
        fs::write(&path, "not a workbook").unwrap();
        assert!(matches!(
            read_spreadsheet(&path),
            Err(LoaderError::Spreadsheet { .. })
        ));
    }
}
