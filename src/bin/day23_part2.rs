use anyhow::{Context, Result};
use clap::Parser;
use int_code_vm::{int_code, nic, CLIArgs};

const HOST_N: usize = 50;

fn main() -> Result<()> {
    env_logger::init();
    let args = CLIArgs::parse();
    let code = int_code::read_int_code(&args.input_path).with_context(|| {
        format!(
            "Failed to read intcode program from given input file({}).",
            args.input_path.display()
        )
    })?;

    let hub = nic::run_network(&code, HOST_N).context("Failed to run network")?;
    let last_y = hub
        .nat()
        .last_sent_y()
        .context("NAT hasn't sent any packet")?;
    println!(
        "The first Y value delivered by NAT to address {} twice in a row is {}.",
        nic::NAT_SEND_ADDR,
        last_y
    );

    Ok(())
}
