//
// dump.rs
// dicom-batch
//
// Writes a per-file text report of every element in a DICOM dataset, including nested sequences.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dicom::core::dictionary::DataDictionary;
use dicom::core::value::Value;
use dicom::core::{PrimitiveValue, Tag, VR};
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{open_file, InMemDicomObject};

use crate::batch::FileProcessor;
use crate::settings::FolderRole;
use crate::walker::WalkedFile;

/// Suffix appended to the source stem for report files.
pub const INFO_SUFFIX: &str = "_info.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpOptions {
    /// How many sequence levels are expanded.
    pub max_depth: usize,
    /// When set, longer text values are cut and marked with `…`. Reports keep full values
    /// by default.
    pub max_value_len: Option<usize>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_value_len: None,
        }
    }
}

/// Report text for `path`: a header naming the file, then one line per element.
pub fn dump_to_string(path: &Path, options: &DumpOptions) -> Result<String> {
    let obj = open_file(path).context("Failed to open DICOM file")?;
    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut out = String::new();
    let _ = writeln!(out, "File: {}", display_name);
    dump_object(&obj, 1, options, &mut out);
    Ok(out)
}

/// Writes the report for `input` to `output`.
pub fn dump_file(input: &Path, output: &Path, options: &DumpOptions) -> Result<()> {
    let report = dump_to_string(input, options)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    fs::write(output, report).with_context(|| format!("Failed to write {:?}", output))?;
    Ok(())
}

/// `a.dcm` -> `a_info.txt`
pub fn report_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());
    format!("{}{}", stem, INFO_SUFFIX)
}

fn dump_object(
    obj: &InMemDicomObject<StandardDataDictionary>,
    depth: usize,
    options: &DumpOptions,
    out: &mut String,
) {
    for elem in obj.iter() {
        // Everything the line needs comes from the header plus a dictionary lookup.
        let tag = elem.header().tag;
        let vr = elem.header().vr;
        let name = tag_name(tag);
        let indent = "  ".repeat(depth);

        match elem.value() {
            Value::Primitive(p) => {
                let preview = render_primitive(tag, vr, p, options.max_value_len);
                let _ = writeln!(
                    out,
                    "{}{} {} {}: {}",
                    indent,
                    format_tag(tag),
                    name,
                    vr,
                    preview
                );
            }
            Value::Sequence(seq) => {
                // The container line comes first, then each item one level deeper.
                let _ = writeln!(
                    out,
                    "{}{} {} {}: [sequence: {} item(s)]",
                    indent,
                    format_tag(tag),
                    name,
                    vr,
                    seq.items().len()
                );
                // Items past the depth limit are only counted.
                if depth < options.max_depth {
                    for (idx, item) in seq.items().iter().enumerate() {
                        let _ = writeln!(out, "{}  Item {}", indent, idx + 1);
                        dump_object(item, depth + 2, options, out);
                    }
                }
            }
            Value::PixelSequence(p) => {
                // Encapsulated pixel data is summarized, never dumped.
                let _ = writeln!(
                    out,
                    "{}{} {} {}: [encapsulated: {} fragment(s)]",
                    indent,
                    format_tag(tag),
                    name,
                    vr,
                    p.fragments().len()
                );
            }
        }
    }
}

fn render_primitive(
    tag: Tag,
    vr: VR,
    value: &PrimitiveValue,
    max_value_len: Option<usize>,
) -> String {
    if let PrimitiveValue::Empty = value {
        return String::new();
    }
    // Binary payloads are reported by size only.
    if is_binary(tag, vr) || matches!(value, PrimitiveValue::U8(_)) {
        return format!("{} bytes", value.to_bytes().len());
    }

    let text = value.to_str();
    match max_value_len {
        Some(limit) => truncate(&text, limit),
        None => text.into_owned(),
    }
}

fn is_binary(tag: Tag, vr: VR) -> bool {
    tag == tags::PIXEL_DATA
        || matches!(vr, VR::OB | VR::OW | VR::OF | VR::OD | VR::OL | VR::UN)
}

fn truncate(input: &str, limit: usize) -> String {
    match input.char_indices().nth(limit) {
        None => input.to_string(),
        Some((cut, _)) => {
            let mut truncated = input[..cut].to_string();
            truncated.push('…');
            truncated
        }
    }
}

fn format_tag(tag: Tag) -> String {
    format!("({:04X},{:04X})", tag.group(), tag.element())
}

fn tag_name(tag: Tag) -> String {
    StandardDataDictionary::default()
        .by_tag(tag)
        .map(|e| e.alias.to_string())
        .unwrap_or_else(|| "UnknownTag".to_string())
}

/// Info-dump step of a batch run.
#[derive(Debug, Clone, Default)]
pub struct InfoDumper {
    options: DumpOptions,
}

impl InfoDumper {
    pub fn new(options: DumpOptions) -> Self {
        Self { options }
    }
}

impl FileProcessor for InfoDumper {
    fn name(&self) -> &str {
        "Structured info dump"
    }

    fn output_role(&self) -> FolderRole {
        FolderRole::InfoOutput
    }

    fn process(&self, file: &WalkedFile, output_root: &Path) -> Result<Vec<PathBuf>> {
        let output = file.mirrored_path(output_root, &report_name(&file.display_name()));
        dump_file(&file.path, &output, &self.options)?;
        Ok(vec![output])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::value::DataSetSequence;
    use dicom::core::{DataElement, Length};

    #[test]
    fn report_name_appends_suffix() {
        assert_eq!(report_name("f1.dcm"), "f1_info.txt");
        assert_eq!(report_name("series.1.dcm"), "series.1_info.txt");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc…");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("ééé", 2), "éé…");
    }

    #[test]
    fn tags_are_named_from_the_dictionary() {
        assert_eq!(format_tag(Tag(0x0010, 0x0020)), "(0010,0020)");
        assert_eq!(tag_name(Tag(0x0010, 0x0020)), "PatientID");
        assert_eq!(tag_name(Tag(0x0009, 0x1001)), "UnknownTag");
    }

    #[test]
    fn byte_values_are_summarised() {
        let value = PrimitiveValue::from(vec![1u8, 2, 3]);
        assert_eq!(render_primitive(Tag(0x0009, 0x1010), VR::OB, &value, None), "3 bytes");
        let words = PrimitiveValue::from([1u16, 2]);
        assert_eq!(render_primitive(tags::PIXEL_DATA, VR::OW, &words, None), "4 bytes");
        assert_eq!(
            render_primitive(tags::MODALITY, VR::CS, &PrimitiveValue::from("CT"), Some(64)),
            "CT"
        );
    }

    #[test]
    fn long_text_values_are_written_in_full() {
        let comments = "A".repeat(100);
        let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        obj.put(DataElement::new(
            tags::PATIENT_COMMENTS,
            VR::LT,
            PrimitiveValue::from(comments.as_str()),
        ));

        let mut out = String::new();
        dump_object(&obj, 1, &DumpOptions::default(), &mut out);
        assert_eq!(out, format!("  (0010,4000) PatientComments LT: {}\n", comments));

        let mut capped = String::new();
        let options = DumpOptions {
            max_value_len: Some(10),
            ..DumpOptions::default()
        };
        dump_object(&obj, 1, &options, &mut capped);
        assert!(capped.ends_with("LT: AAAAAAAAAA…\n"));
    }

    #[test]
    fn nested_items_are_indented() {
        let mut item = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        item.put(DataElement::new(
            tags::CODE_VALUE,
            VR::SH,
            PrimitiveValue::from("123"),
        ));
        let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        obj.put(DataElement::new(
            tags::INSTITUTION_CODE_SEQUENCE,
            VR::SQ,
            DataSetSequence::new(vec![item], Length::UNDEFINED),
        ));

        let mut out = String::new();
        dump_object(&obj, 1, &DumpOptions::default(), &mut out);
        assert!(out.contains("(0008,0220) InstitutionCodeSequence SQ: [sequence: 1 item(s)]"));
        assert!(out.contains("    Item 1\n"));
        assert!(out.contains("      (0008,0100) CodeValue SH: 123"));
    }
}
