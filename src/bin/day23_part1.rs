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
    let first_y = hub
        .nat()
        .first_recv_y()
        .context("No packet has been sent to NAT")?;
    println!(
        "The Y value of the first packet sent to address {} is {}.",
        nic::NAT_ADDR,
        first_y
    );

    Ok(())
}
