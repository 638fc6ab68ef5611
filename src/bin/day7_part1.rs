use anyhow::{Context, Result};
use clap::Parser;
use int_code_vm::{amp, int_code, CLIArgs};

fn main() -> Result<()> {
    env_logger::init();
    let args = CLIArgs::parse();
    let code = int_code::read_int_code(&args.input_path).with_context(|| {
        format!(
            "Failed to read intcode program from given input file({}).",
            args.input_path.display()
        )
    })?;

    let phases = (0..=4).collect::<Vec<i64>>();
    let (setting, signal) = amp::max_signal(&code, &phases, amp::amp_chain)
        .context("Failed to find the highest signal of amplifiers")?;
    println!(
        "The highest signal can be sent to the thrusters by amplifiers in series is {}, with phase setting {:?}.",
        signal, setting
    );

    Ok(())
}
