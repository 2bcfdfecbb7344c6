//! ip2region-query: CLI tool for looking up, verifying and benchmarking xdb files.

use clap::{Parser, Subcommand};
use ip2region::{check_index, verify, CachePolicy, IpVersion, Searcher, SearcherConfig};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "ip2region-query")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Look up IP regions in ip2region xdb files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more addresses (reads stdin when none are given)
    Search {
        /// xdb file
        #[arg(short, long)]
        db: PathBuf,

        /// Addresses to look up
        ips: Vec<String>,

        /// Cache policy: file, vectorIndex or content
        #[arg(short, long, default_value = "vectorIndex")]
        policy: CachePolicy,

        /// Address family held by the file: v4 or v6
        #[arg(short = 'v', long, default_value = "v4")]
        ip_version: IpVersion,

        /// Print one JSON object per lookup
        #[arg(long)]
        json: bool,
    },

    /// Check the header of an xdb file
    Verify {
        /// xdb file
        #[arg(short, long)]
        db: PathBuf,
    },

    /// Scan the whole IndexBlock of an xdb file
    Check {
        /// xdb file
        #[arg(short, long)]
        db: PathBuf,

        /// Address family held by the file: v4 or v6
        #[arg(short = 'v', long, default_value = "v4")]
        ip_version: IpVersion,
    },

    /// Measure lookup latency over evenly spread addresses
    Bench {
        /// xdb file
        #[arg(short, long)]
        db: PathBuf,

        /// Cache policy: file, vectorIndex or content
        #[arg(short, long, default_value = "vectorIndex")]
        policy: CachePolicy,

        /// Address family held by the file: v4 or v6
        #[arg(short = 'v', long, default_value = "v4")]
        ip_version: IpVersion,

        /// Number of lookups
        #[arg(short = 'n', long, default_value_t = 100_000)]
        iterations: u32,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search {
            db,
            ips,
            policy,
            ip_version,
            json,
        } => search(&db, ips, SearcherConfig::new(ip_version, policy), json),
        Commands::Verify { db } => verify_file(&db),
        Commands::Check { db, ip_version } => check_file(&db, ip_version),
        Commands::Bench {
            db,
            policy,
            ip_version,
            iterations,
        } => bench(&db, SearcherConfig::new(ip_version, policy), iterations),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn search(
    db: &PathBuf,
    ips: Vec<String>,
    config: SearcherConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let searcher = Searcher::open(db, config)?;

    let ips = if ips.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<Result<Vec<_>, _>>()?
    } else {
        ips
    };

    for ip in ips.iter().map(|ip| ip.trim()).filter(|ip| !ip.is_empty()) {
        match searcher.search(ip) {
            Ok(result) if json => {
                let mut value = serde_json::to_value(&result)?;
                value["ip"] = ip.into();
                println!("{}", value);
            }
            Ok(result) => println!(
                "{}\t{}\tio={}\ttook={:?}",
                ip, result.region, result.io_count, result.took
            ),
            Err(e) => eprintln!("{}\terror: {}", ip, e),
        }
    }

    searcher.close();
    Ok(())
}

fn verify_file(db: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let result = verify(db);
    println!("{}", serde_json::to_string(&result)?);
    if !result.valid {
        return Err(format!("{:?} failed verification (code {})", db, result.error_code).into());
    }
    Ok(())
}

fn check_file(db: &PathBuf, ip_version: IpVersion) -> Result<(), Box<dyn std::error::Error>> {
    let report = check_index(db, ip_version)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_valid() {
        return Err(format!("{:?}: {} index issues", db, report.issue_count).into());
    }
    Ok(())
}

fn bench(db: &PathBuf, config: SearcherConfig, iterations: u32) -> Result<(), Box<dyn std::error::Error>> {
    let opened = Instant::now();
    let searcher = Searcher::open(db, config)?;
    println!(
        "Opened {:?} with {} policy in {:?}",
        db,
        config.cache_policy,
        opened.elapsed()
    );

    let iterations = iterations.max(1);
    let step = config.ip_version.max_addr() / iterations as u128;
    let mut total = Duration::ZERO;
    let mut io_total = 0u64;
    let mut errors = 0u32;

    for i in 0..iterations {
        let ip = config.ip_version.to_ip(step * i as u128);
        match searcher.search_addr(ip) {
            Ok(result) => {
                total += result.took;
                io_total += result.io_count as u64;
            }
            Err(e) => {
                log::warn!("{}: {}", ip, e);
                errors += 1;
            }
        }
    }

    let ok = (iterations - errors).max(1);
    println!(
        "{} lookups, {} errors, avg {:?}, avg io {:.2}",
        iterations,
        errors,
        total / ok,
        io_total as f64 / ok as f64
    );

    searcher.close();
    Ok(())
}
