//
// anonymize.rs
// dicom-batch
//
// Rewrites identifying fields according to the active rule set and saves a copy under the output root.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dicom::object::open_file;
use tracing::{debug, trace};

use crate::batch::FileProcessor;
use crate::dicom_access::FieldAccess;
use crate::rules::FieldRuleSet;
use crate::settings::FolderRole;
use crate::walker::WalkedFile;

/// Applies every rule whose field exists on `record`. Absent fields are skipped, as are
/// fields that already hold the rule's value. Returns how many fields were rewritten.
pub fn apply_rules<T: FieldAccess>(record: &mut T, rules: &FieldRuleSet) -> usize {
    let mut rewritten = 0;
    for rule in rules.iter() {
        if !record.has_field(&rule.name) {
            continue;
        }
        if record.field_str(&rule.name).as_deref() == Some(rule.value.as_str()) {
            trace!("{} already set", rule.name);
            continue;
        }
        if record.replace_field(&rule.name, &rule.value) {
            rewritten += 1;
        }
    }
    rewritten
}

/// Reads `input`, rewrites it with `rules` and writes the result to `output`.
/// The input file is never touched.
pub fn process_file(input: &Path, output: &Path, rules: &FieldRuleSet) -> Result<()> {
    let mut obj = open_file(input).context("Failed to open DICOM file")?;

    let rewritten = apply_rules(&mut obj, rules);
    debug!("{} field(s) rewritten in {:?}", rewritten, input);

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    obj.write_to_file(output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    Ok(())
}

/// Tag-rewrite step of a batch run.
#[derive(Debug, Clone)]
pub struct Anonymizer<'a> {
    rules: &'a FieldRuleSet,
}

impl<'a> Anonymizer<'a> {
    pub fn new(rules: &'a FieldRuleSet) -> Self {
        Self { rules }
    }
}

impl FileProcessor for Anonymizer<'_> {
    fn name(&self) -> &str {
        "DICOM anonymization"
    }

    fn output_role(&self) -> FolderRole {
        FolderRole::DicomOutput
    }

    fn process(&self, file: &WalkedFile, output_root: &Path) -> Result<Vec<PathBuf>> {
        let output = file.mirrored_path(output_root, &file.display_name());
        process_file(&file.path, &output, self.rules)?;
        Ok(vec![output])
    }
}
