use anyhow::{bail, Context, Result};
use clap::Parser;
use iplist2mmdb::{
    file_reader, write_database_file, Converter, DataValue, Database, MmdbWriter, WriterOptions,
    DEFAULT_DATABASE_TYPE,
};
use log::LevelFilter;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "iplist2mmdb")]
#[command(
    about = "Convert a sectioned IP list into a MaxMind DB country database",
    long_about = "iplist2mmdb - convert a sectioned IP list into a MaxMind DB country database\n\n\
    The source holds one CIDR network per line, grouped under [TAG] headers \n\
    (e.g. [CN], [CF]). Networks before the first header use the CN record.\n\
    Unknown headers are skipped with a warning; a malformed network is fatal.\n\n\
    Examples:\n\
      iplist2mmdb\n\
      iplist2mmdb -s china_ip_list.txt -d Country.mmdb\n\
      zcat list.txt.gz | iplist2mmdb -s - -t GeoLite2-Country --verify"
)]
#[command(version)]
struct Cli {
    /// Source IP list ("-" for stdin, .gz is decompressed)
    #[arg(short, long, value_name = "PATH", default_value = "ip_list.txt")]
    source: PathBuf,

    /// Destination database path
    #[arg(short, long, value_name = "PATH", default_value = "Country.mmdb")]
    destination: PathBuf,

    /// Database type written to the metadata
    #[arg(short = 't', long, value_name = "TYPE", default_value = DEFAULT_DATABASE_TYPE)]
    database_type: String,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Re-open the written database and check its metadata
    #[arg(long)]
    verify: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(err) = run(&cli) {
        log::error!("{:#}", err);
        // The logger may be filtered off; the cause must still reach the user
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

fn init_logger(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    let _ = builder.try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let converter = Converter::default();
    let options = WriterOptions::default()
        .with_database_type(cli.database_type.clone())
        .with_languages(converter.catalog().languages());
    let mut writer = MmdbWriter::new(options).context("invalid writer options")?;
    log::debug!(
        "known sections: {}",
        converter.catalog().tags().collect::<Vec<_>>().join(", ")
    );

    log::debug!("reading {}", cli.source.display());
    let reader = file_reader::open(&cli.source)
        .with_context(|| format!("failed to open {}", cli.source.display()))?;
    let stats = converter
        .convert(reader, &mut writer)
        .with_context(|| format!("failed to convert {}", cli.source.display()))?;

    log::info!(
        "parsed {} ranges from {} lines ({} unknown sections skipped)",
        stats.ranges,
        stats.lines,
        stats.unknown_sections
    );

    let written = write_database_file(&cli.destination, &writer)
        .with_context(|| format!("failed to write {}", cli.destination.display()))?;
    log::debug!(
        "wrote {} bytes, {} tree nodes",
        written,
        writer.node_count()
    );

    if cli.verify {
        verify(&cli.destination, &cli.database_type, writer.node_count())?;
    }

    log::info!("successfully wrote mmdb to {}", cli.destination.display());
    Ok(())
}

fn verify(path: &Path, database_type: &str, node_count: u32) -> Result<()> {
    let db = Database::open(path)
        .with_context(|| format!("failed to re-open {}", path.display()))?;

    match db.database_type() {
        Some(ref found) if found == database_type => {}
        other => bail!(
            "verification failed: database_type is {:?}, expected {:?}",
            other,
            database_type
        ),
    }
    if db.node_count() != node_count {
        bail!(
            "verification failed: node_count is {}, expected {}",
            db.node_count(),
            node_count
        );
    }

    if log::log_enabled!(log::Level::Debug) {
        let metadata = serde_json::to_string_pretty(&data_value_to_json(db.metadata()))
            .context("failed to render metadata")?;
        log::debug!("metadata: {}", metadata);
    }
    log::info!("verified {} ({} bytes)", path.display(), db.len());
    Ok(())
}

fn data_value_to_json(data: &DataValue) -> serde_json::Value {
    match data {
        DataValue::String(s) => json!(s),
        DataValue::Double(d) => json!(d),
        DataValue::Bytes(b) => json!(b),
        DataValue::Uint16(u) => json!(u),
        DataValue::Uint32(u) => json!(u),
        DataValue::Uint64(u) => json!(u),
        DataValue::Uint128(u) => json!(u.to_string()),
        DataValue::Int32(i) => json!(i),
        DataValue::Bool(b) => json!(b),
        DataValue::Float(f) => json!(f),
        DataValue::Map(entries) => {
            let map: serde_json::Map<_, _> = entries
                .iter()
                .map(|(k, v)| (k.clone(), data_value_to_json(v)))
                .collect();
            json!(map)
        }
        DataValue::Array(items) => {
            json!(items.iter().map(data_value_to_json).collect::<Vec<_>>())
        }
    }
}
