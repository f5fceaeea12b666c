#![allow(dead_code)]

mod cli;
mod diagnostics;
mod equiv;
mod link;
mod look_ahead;
mod origin;
mod preprocessor;
mod rename;
mod report;
mod show;
mod source_files;
mod workspace;

use crate::diagnostics::Diagnostics;
use crate::link::NullParser;
use crate::report::Report;
use crate::source_files::SourceFiles;
use crate::workspace::{Driver, WorkspaceConfig};
use std::path::Path;
use std::process::exit;

fn main() {
    let command = match cli::Command::parse_env_args() {
        Ok(command) => command,
        Err(()) => exit(1),
    };

    let config = match WorkspaceConfig::from_file(Path::new(&command.workspace)) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {}", error);
            exit(1);
        }
    };

    let files = SourceFiles::new();
    let diagnostics = Diagnostics::new();

    let store = {
        let driver = Driver::new(&files, &diagnostics);
        driver.process(&config, &mut NullParser);
        driver.into_store()
    };

    diagnostics.print_all(&files);

    let report = Report::new(&files, &store);
    report.print_summary();

    if command.options.list_identifiers {
        println!();
        report.print_identifiers();
    }

    if command.options.list_unused {
        println!();
        report.print_unused();
    }

    if diagnostics.has_errors() {
        exit(1);
    }
}
