use anyhow::{Context, Result};
use clap::Parser;
use int_code_vm::{int_code, RunArgs};

fn main() -> Result<()> {
    env_logger::init();
    let args = RunArgs::parse();
    let code = int_code::read_int_code(&args.input_path).with_context(|| {
        format!(
            "Failed to read intcode program from given input file({}).",
            args.input_path.display()
        )
    })?;

    let outputs = int_code::run(&code, &args.inputs)
        .with_context(|| format!("Failed to run intcode program with inputs {:?}.", args.inputs))?;
    println!(
        "{}",
        outputs
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    );

    Ok(())
}
