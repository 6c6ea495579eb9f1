use anyhow::Context;
use clap::Parser;
use pthaw::{LoaderClient, RegionSpec};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;

// Global start time for dmesg-style logging
static START_TIME: OnceLock<Instant> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pthaw")]
#[command(about = "replay captured memory regions into a fresh loader process", long_about = None)]
struct Args {
    /// Path to the loader executable [default: ploader next to this binary]
    #[arg(short, long, value_name = "PATH")]
    loader: Option<PathBuf>,

    /// Region to restore; repeat for each region
    #[arg(short, long = "region", value_name = "ADDR:PERMS:FILE")]
    regions: Vec<RegionSpec>,

    /// Finish with Exec and leave the loader for a tracer to resume, instead of aborting
    #[arg(long)]
    handoff: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn default_loader_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("Could not determine this executable's location")?;
    let dir = exe
        .parent()
        .context("Executable path has no parent directory")?;
    Ok(dir.join("ploader"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    START_TIME.get_or_init(Instant::now);

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format(|buf, record| {
            use std::io::Write;

            let elapsed = START_TIME.get().map(Instant::elapsed).unwrap_or_default();

            // Format like dmesg: [  123.456789] LEVEL message
            writeln!(
                buf,
                "[{:5}.{:06}] {} {}",
                elapsed.as_secs(),
                elapsed.subsec_micros(),
                record.level(),
                record.args()
            )
        })
        .init();

    let loader = match args.loader {
        Some(path) => path,
        None => default_loader_path()?,
    };

    // Read every region up front so a bad file fails before the loader starts
    let regions = args
        .regions
        .iter()
        .map(RegionSpec::load)
        .collect::<Result<Vec<_>, _>>()?;
    let total: usize = regions.iter().map(|r| r.contents.len()).sum();
    log::info!("Restoring {} regions ({} bytes)", regions.len(), total);

    let mut client = LoaderClient::spawn(&loader)?;
    log::info!("Loader {} running as PID {}", loader.display(), client.pid());

    client.start().context("Loader did not start")?;

    for region in &regions {
        if region.is_vsyscall() {
            log::info!("Skipping [vsyscall] region at 0x{:x}", region.address);
            continue;
        }
        client
            .mem_load(region)
            .with_context(|| format!("Could not restore region at 0x{:x}", region.address))?;
        log::info!(
            "Restored 0x{:x}-0x{:x} {}",
            region.address,
            region.address + region.contents.len() as u64,
            region.protection
        );
    }

    if args.handoff {
        let pid = client.exec()?;
        log::info!("Loader PID {} is waiting for register injection", pid);
        println!("{}", pid);

        let status = client.wait()?;
        log::info!("Restored process exited: {}", status);
        return Ok(());
    }

    let status = client.abort()?;
    if !status.success() {
        anyhow::bail!("Loader exited with {} after abort", status);
    }
    log::info!("All regions restored; loader aborted cleanly");

    Ok(())
}
