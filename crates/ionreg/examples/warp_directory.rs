use ionreg::{run_warp_job, BatchConfig, WarpInput, WarpJob};
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <hooks.tis> <optical.png> <eit_dir> [out_dir]",
            args[0]
        );
        std::process::exit(2);
    }

    let mut config = BatchConfig::default();
    if let Some(out_dir) = args.get(4) {
        config.out_dir = PathBuf::from(out_dir);
    }
    let job = WarpJob {
        landmarks: PathBuf::from(&args[1]),
        optical: PathBuf::from(&args[2]),
        input: WarpInput::Directory(PathBuf::from(&args[3])),
        config,
    };

    let report = run_warp_job(&job)?;
    println!(
        "Fitted {} pairs, rms {:.3} px. Wrote {} file(s), {} failed.",
        report.stats.n_pairs,
        report.stats.rms_px,
        report.written.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        println!("  {}: {}", failure.path.display(), failure.reason);
    }
    Ok(())
}
