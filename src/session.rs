//
// session.rs
// dicom-batch
//
// Operator session: chosen folders, the active rule set and export flags, plus the run-* entry points.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::anonymize::Anonymizer;
use crate::batch::{self, BatchError, FileProcessor, ProgressReporter, RunSummary};
use crate::dump::{DumpOptions, InfoDumper};
use crate::image::{ImageExportOptions, ImageExporter};
use crate::logging::LogSink;
use crate::rules::{FieldRuleSet, RuleError};
use crate::settings::{FolderRole, Settings};

/// State shared by every command of one process. Folder choices are persisted as they are
/// made; rule edits live only as long as the session.
pub struct Session {
    settings: Settings,
    settings_path: PathBuf,
    rules: FieldRuleSet,
    image_options: ImageExportOptions,
    dump_options: DumpOptions,
    log: LogSink,
}

impl Session {
    /// Loads persisted folders from `settings_path` and points the log sink at the saved
    /// log folder, if any.
    pub fn open(settings_path: PathBuf, log: LogSink) -> Self {
        let settings = Settings::load_or_default(&settings_path);
        let session = Self {
            settings,
            settings_path,
            rules: FieldRuleSet::default(),
            image_options: ImageExportOptions::default(),
            dump_options: DumpOptions::default(),
            log,
        };
        if let Some(folder) = session.settings.folder(FolderRole::Log) {
            if let Err(err) = session.log.redirect(folder) {
                warn!("Cannot open log folder {:?}: {}", folder, err);
            }
        }
        session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn rules(&self) -> &FieldRuleSet {
        &self.rules
    }

    pub fn image_options_mut(&mut self) -> &mut ImageExportOptions {
        &mut self.image_options
    }

    pub fn dump_options_mut(&mut self) -> &mut DumpOptions {
        &mut self.dump_options
    }

    /// Records a folder choice and rewrites the settings document.
    pub fn choose_folder(&mut self, role: FolderRole, path: PathBuf) -> Result<()> {
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .context("Cannot resolve current directory")?
                .join(path)
        };
        if role == FolderRole::Log {
            let file = self
                .log
                .redirect(&path)
                .with_context(|| format!("Cannot open log folder {:?}", path))?;
            info!("Logging to {:?}", file);
        }
        info!("Selected {} folder: {:?}", role, path);
        self.settings.set_folder(role, path);
        self.settings
            .save(&self.settings_path)
            .context("Failed to save settings")?;
        Ok(())
    }

    /// Uses `path` for `role` in this session only; the settings document is left as is.
    pub fn override_folder(&mut self, role: FolderRole, path: PathBuf) {
        self.settings.set_folder(role, path);
    }

    pub fn add_rule(&mut self, name: &str, value: &str) -> Result<(), RuleError> {
        let previous = self.rules.get(name.trim()).map(str::to_owned);
        match self.rules.add(name, value) {
            Ok(()) => {
                match previous {
                    Some(old) => info!("Replaced field rule: {} -> {} (was {:?})", name, value, old),
                    None => info!("Added field rule: {} -> {}", name, value),
                }
                Ok(())
            }
            Err(err) => {
                warn!("Field rule rejected: {}", err);
                Err(err)
            }
        }
    }

    pub fn remove_rule(&mut self, entry: &str) -> Result<(), RuleError> {
        let removed = self.rules.remove(entry)?;
        info!("Removed field rule: {}", removed.name);
        Ok(())
    }

    pub fn reset_rules(&mut self) {
        self.rules.reset();
        info!("Field rules reset to defaults.");
    }

    pub fn run_anonymize(
        &self,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RunSummary, BatchError> {
        self.run(&Anonymizer::new(&self.rules), progress)
    }

    pub fn run_convert_to_image(
        &self,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let exporter = ImageExporter::new(self.image_options.clone())?;
        Ok(self.run(&exporter, progress)?)
    }

    pub fn run_dump_info(
        &self,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RunSummary, BatchError> {
        self.run(&InfoDumper::new(self.dump_options), progress)
    }

    fn run(
        &self,
        processor: &dyn FileProcessor,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RunSummary, BatchError> {
        batch::run(
            processor,
            self.folder(FolderRole::Input),
            self.folder(processor.output_role()),
            progress,
        )
    }

    fn folder(&self, role: FolderRole) -> Option<&Path> {
        self.settings.folder(role)
    }
}
