//
// cli.rs
// dicom-batch
//
// Defines the CLI surface with Clap, including an interactive shell that keeps rule edits between commands.
//
// Thales Matheus Mendonça Santos - November 2025

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::batch::{ConsoleProgress, RunSummary};
use crate::logging::{self, LogSink};
use crate::session::Session;
use crate::settings::{FolderRole, Settings};

/// Command-line interface glue code: defines the available verbs and dispatches to the session.
#[derive(Parser)]
#[command(name = "dicom-batch")]
#[command(about = "Batch DICOM anonymization, image export and metadata dumps", long_about = None)]
pub struct Cli {
    /// Settings document (defaults to <config dir>/dicom-batch/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose and remember the folder for a role
    Folder { role: FolderRole, path: PathBuf },
    /// Show the remembered folders
    Folders,
    /// Show the field rules used by `anonymize`
    Rules(RuleEdits),
    /// Rewrite identifying fields of every .dcm file into the DICOM output folder
    Anonymize {
        #[command(flatten)]
        folders: RunFolders,
        #[command(flatten)]
        rules: RuleEdits,
    },
    /// Export the pixel data of every .dcm file as raster images
    ToImage {
        #[command(flatten)]
        folders: RunFolders,
        /// Keep the native channel layout instead of converting to grayscale
        #[arg(long)]
        color: bool,
        #[arg(long, default_value = "png")]
        format: String,
    },
    /// Write a text report of every element of every .dcm file
    DumpInfo {
        #[command(flatten)]
        folders: RunFolders,
        #[arg(long, default_value_t = 4)]
        max_depth: usize,
        /// Cut text values longer than this many characters (full values by default)
        #[arg(long)]
        max_value_len: Option<usize>,
    },
    /// Interactive session: rule edits persist until exit
    Shell,
}

/// One-off folder overrides for a single run; not written to the settings document.
#[derive(Args, Debug, Default)]
pub struct RunFolders {
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Rule edits applied on top of the defaults for a single invocation.
#[derive(Args, Debug, Default)]
pub struct RuleEdits {
    /// Add or replace a rule, as NAME=VALUE
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_rule)]
    pub set: Vec<(String, String)>,
    /// Drop a rule by field name
    #[arg(long = "remove", value_name = "NAME")]
    pub remove: Vec<String>,
}

/// Commands accepted inside `shell`.
#[derive(Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand)]
enum ShellCommand {
    /// Choose and remember the folder for a role
    Folder { role: FolderRole, path: PathBuf },
    /// Show the remembered folders
    Folders,
    /// Add a field rule, or replace the value of an existing one
    AddRule { name: String, value: String },
    /// Remove a field rule by name (or by its "Name: value" entry)
    RemoveRule { entry: String },
    /// Restore the built-in field rules
    ResetRules,
    /// Show the current field rules
    Rules,
    /// Toggle grayscale conversion for image export
    Grayscale { state: Toggle },
    /// Run the anonymization batch
    Anonymize,
    /// Run the image export batch
    ToImage,
    /// Run the structured info batch
    DumpInfo,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

pub fn run() -> Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();

    let sink = LogSink::new();
    logging::init(sink.clone());

    let settings_path = match cli.settings {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let mut session = Session::open(settings_path, sink);

    match cli.command {
        Commands::Folder { role, path } => session.choose_folder(role, path)?,
        Commands::Folders => print_folders(&session),
        Commands::Rules(edits) => {
            apply_edits(&mut session, edits)?;
            print_rules(&session);
        }
        Commands::Anonymize { folders, rules } => {
            apply_folders(&mut session, folders, FolderRole::DicomOutput);
            apply_edits(&mut session, rules)?;
            finish(session.run_anonymize(&mut ConsoleProgress::stderr()).map_err(Into::into))?;
        }
        Commands::ToImage {
            folders,
            color,
            format,
        } => {
            apply_folders(&mut session, folders, FolderRole::ImageOutput);
            let options = session.image_options_mut();
            options.grayscale = !color;
            options.format = format;
            finish(session.run_convert_to_image(&mut ConsoleProgress::stderr()))?;
        }
        Commands::DumpInfo {
            folders,
            max_depth,
            max_value_len,
        } => {
            apply_folders(&mut session, folders, FolderRole::InfoOutput);
            let options = session.dump_options_mut();
            options.max_depth = max_depth;
            options.max_value_len = max_value_len;
            finish(session.run_dump_info(&mut ConsoleProgress::stderr()).map_err(Into::into))?;
        }
        Commands::Shell => shell(&mut session)?,
    }

    Ok(())
}

fn shell(session: &mut Session) -> Result<()> {
    println!("dicom-batch shell. Type `help` for commands, `quit` to leave.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let words = split_words(&line);
        if words.is_empty() {
            continue;
        }

        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(err) => {
                // Help output and usage errors alike are shown and the shell carries on.
                let _ = err.print();
                continue;
            }
        };
        match dispatch(session, command) {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => eprintln!("Warning: {:#}", err),
        }
    }
    Ok(())
}

/// Runs one shell command. Returns `true` when the shell should exit.
fn dispatch(session: &mut Session, command: ShellCommand) -> Result<bool> {
    match command {
        ShellCommand::Folder { role, path } => session.choose_folder(role, path)?,
        ShellCommand::Folders => print_folders(session),
        ShellCommand::AddRule { name, value } => session.add_rule(&name, &value)?,
        ShellCommand::RemoveRule { entry } => session.remove_rule(&entry)?,
        ShellCommand::ResetRules => session.reset_rules(),
        ShellCommand::Rules => print_rules(session),
        ShellCommand::Grayscale { state } => {
            session.image_options_mut().grayscale = matches!(state, Toggle::On);
        }
        ShellCommand::Anonymize => {
            finish(session.run_anonymize(&mut ConsoleProgress::stderr()).map_err(Into::into))?
        }
        ShellCommand::ToImage => finish(session.run_convert_to_image(&mut ConsoleProgress::stderr()))?,
        ShellCommand::DumpInfo => {
            finish(session.run_dump_info(&mut ConsoleProgress::stderr()).map_err(Into::into))?
        }
        ShellCommand::Quit => return Ok(true),
    }
    Ok(false)
}

/// Reports a completed run. The notice is the same whether or not some files failed;
/// per-file errors are in the log.
fn finish(result: Result<RunSummary>) -> Result<()> {
    let summary = result?;
    println!("{} complete!", summary.operation);
    Ok(())
}

fn apply_folders(session: &mut Session, folders: RunFolders, output_role: FolderRole) {
    if let Some(input) = folders.input {
        session.override_folder(FolderRole::Input, input);
    }
    if let Some(output) = folders.output {
        session.override_folder(output_role, output);
    }
}

fn apply_edits(session: &mut Session, edits: RuleEdits) -> Result<()> {
    for entry in &edits.remove {
        session.remove_rule(entry)?;
    }
    for (name, value) in &edits.set {
        session.add_rule(name, value)?;
    }
    Ok(())
}

fn print_folders(session: &Session) {
    for role in FolderRole::ALL {
        let folder = session
            .settings()
            .folder(role)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not selected".to_string());
        println!("{:>13}: {}", role.label(), folder);
    }
}

fn print_rules(session: &Session) {
    for (idx, rule) in session.rules().iter().enumerate() {
        println!("{:3}. {}", idx + 1, rule);
    }
}

fn parse_rule(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got `{}`", raw))?;
    Ok((name.trim().to_string(), value.to_string()))
}

/// Splits a shell line on whitespace; double quotes group words and may produce empty ones.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
        ShellLine::command().debug_assert();
    }

    #[test]
    fn split_words_handles_quotes() {
        assert_eq!(
            split_words(r#"folder input "/data/my scans""#),
            vec!["folder", "input", "/data/my scans"]
        );
        assert_eq!(split_words(r#"add-rule PatientName """#), vec!["add-rule", "PatientName", ""]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn shell_lines_parse_into_commands() {
        let parsed = ShellLine::try_parse_from(split_words("add-rule PatientName ANON")).unwrap();
        assert!(matches!(
            parsed.command,
            ShellCommand::AddRule { ref name, ref value } if name == "PatientName" && value == "ANON"
        ));

        let parsed = ShellLine::try_parse_from(split_words("folder image-output /tmp/png")).unwrap();
        assert!(matches!(
            parsed.command,
            ShellCommand::Folder { role: FolderRole::ImageOutput, .. }
        ));

        assert!(ShellLine::try_parse_from(split_words("grayscale maybe")).is_err());
    }

    #[test]
    fn rule_flags_parse_name_value_pairs() {
        assert_eq!(
            parse_rule("PatientName=ANON^ANON").unwrap(),
            ("PatientName".to_string(), "ANON^ANON".to_string())
        );
        assert!(parse_rule("PatientName").is_err());

        let cli = Cli::try_parse_from([
            "dicom-batch",
            "anonymize",
            "--input",
            "/in",
            "--set",
            "PatientID=X",
            "--remove",
            "StudyDate",
        ])
        .unwrap();
        match cli.command {
            Commands::Anonymize { folders, rules } => {
                assert_eq!(folders.input, Some(PathBuf::from("/in")));
                assert_eq!(rules.set, vec![("PatientID".to_string(), "X".to_string())]);
                assert_eq!(rules.remove, vec!["StudyDate".to_string()]);
            }
            _ => panic!("expected anonymize"),
        }
    }
}
