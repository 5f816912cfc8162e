// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use casesync_cli::CasesyncApp;
use clap::Parser;
use color_eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = CasesyncApp::parse();
    let output = app.output_context();

    match app.exec() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
