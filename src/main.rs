use anyhow::{anyhow, Context};
use chadsembler::{assemble, AssembleError, Config, Cpu, Layout};
use std::env;
use std::fs;
use std::io;
use std::process::ExitCode;

const CSM_EXTENSION: &str = ".csm";

/// Exit status for a program rejected by the assembler, distinct from the
/// status 1 used for runtime faults.
const REJECTED: u8 = 255;

fn main() -> ExitCode {
    env_logger::init();

    let arguments: Vec<String> = env::args().collect();
    let source = match load_source(&arguments) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = Config::default();
    if let Err(errors) = config.apply_arguments(&arguments[2..]) {
        println!("{errors}");
        return ExitCode::from(REJECTED);
    }
    if let Err(errors) = config.apply_source(&source) {
        println!("{errors}");
        return ExitCode::from(REJECTED);
    }

    let memory = match assemble(&source, &config) {
        Ok(memory) => memory,
        Err(AssembleError::Rejected(errors)) => {
            println!("{errors}");
            return ExitCode::from(REJECTED);
        }
        Err(AssembleError::Fault(fault)) => {
            eprintln!("{fault}");
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut cpu = Cpu::new(
        memory,
        Layout::new(&config),
        &config,
        stdin.lock(),
        stdout.lock(),
    );
    println!("{}", cpu.banner());

    log::info!("starting execution");
    match cpu.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(fault) => {
            eprintln!("{fault}");
            ExitCode::FAILURE
        }
    }
}

fn load_source(arguments: &[String]) -> anyhow::Result<String> {
    let path = arguments
        .get(1)
        .ok_or_else(|| anyhow!("No file was passed in to be assembled"))?;
    if !path.ends_with(CSM_EXTENSION) {
        println!("Chadsembly Warning: File name does not end with a `{CSM_EXTENSION}` file extension");
    }
    fs::read_to_string(path).context("Cannot assemble a file that does not exist")
}
