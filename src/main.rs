use notnull_instrumenter::*;

use clap::{crate_version, Arg, ArgAction, Command};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    env_logger::init();

    let matches = Command::new("@NotNull instrumenter")
        .version(crate_version!())
        .about("Insert runtime null checks for @NotNull contracts into JVM class files")
        .arg(
            Arg::new("output")
                .long("output-directory")
                .value_name("DIRECTORY")
                .default_value("out")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory into which instrumented classes are written"),
        )
        .arg(
            Arg::new("annotation")
                .long("not-null-annotation")
                .value_name("DESCRIPTOR")
                .help("Field descriptor of the contract annotation (eg. `Lfoo/NotNull;`)"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Class files to instrument")
                .required(true)
                .num_args(1..)
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .get_matches();

    let settings = match matches.get_one::<String>("annotation") {
        Some(descriptor) => instrument::Settings::with_not_null_annotation(descriptor.as_str()),
        None => instrument::Settings::new(),
    };
    let output_directory = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("out"));

    let mut failures = 0;
    for input in matches.get_many::<PathBuf>("INPUT").into_iter().flatten() {
        if let Err(err) = process_class(&settings, input, &output_directory) {
            log::error!("Failed to instrument '{}': {}", input.display(), err);
            failures += 1;
        }
    }

    if failures > 0 {
        log::error!("{} class(es) could not be instrumented", failures);
        process::exit(1);
    }
}

fn process_class(
    settings: &instrument::Settings,
    input: &Path,
    output_directory: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let result = instrument::instrument_class(settings, &bytes)?;

    let output = output_directory.join(format!("{}.class", result.class_name));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &result.bytes)?;

    if result.modified {
        log::info!("Instrumented '{}' into '{}'", input.display(), output.display());
    } else {
        log::info!("Copied '{}' unchanged into '{}'", input.display(), output.display());
    }
    Ok(())
}
