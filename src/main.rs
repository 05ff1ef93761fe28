use std::fs::File;
use std::io::{self, BufWriter};
use std::process;

use anyhow::{Context, Result};
use log::debug;

use pn2hda::config::HdaConfig;
use pn2hda::hda::Converter;
use pn2hda::net::io::load_net;
use pn2hda::options::Options;

fn init_logger(options: &Options) -> Result<()> {
    let env = env_logger::Env::new()
        .filter_or("HDA_LOG", "warn")
        .write_style("HDA_LOG_STYLE");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(path) = &options.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file: {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("Failed to initialise logger")?;
    Ok(())
}

fn parse_options() -> Options {
    // HDA_FLAGS go first so that real arguments override them
    let mut flags = match shellwords::split(&std::env::var("HDA_FLAGS").unwrap_or_default()) {
        Ok(flags) => flags,
        Err(err) => {
            eprintln!("error: malformed HDA_FLAGS: {err}");
            process::exit(2);
        }
    };
    flags.extend(std::env::args().skip(1));

    match Options::parse_from_args(&flags) {
        Ok(options) => options,
        Err(err) => match err.downcast::<clap::Error>() {
            Ok(clap_err) => clap_err.exit(),
            Err(err) => {
                eprintln!("error: {err}");
                process::exit(2);
            }
        },
    }
}

fn run(options: &Options) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => HdaConfig::load_from_file(path)?,
        None => HdaConfig::default(),
    };
    options.apply(&mut config);
    debug!("options: {:?}, config: {:?}", options, config);

    let net = load_net(&options.net)
        .with_context(|| format!("Failed to load net: {:?}", options.net))?;
    net.log_diagnostics();

    let conversion = Converter::new(&net, config.to_conversion_config())
        .run()
        .context("Conversion failed")?;
    let hda = conversion.hda;
    hda.log_summary();
    log::info!("{}", conversion.stats);

    if config.check_invariants {
        let violations = hda.check_invariants(config.vertex_bound());
        for violation in &violations {
            log::error!("invariant violated: {}", violation);
        }
        anyhow::ensure!(
            violations.is_empty(),
            "{} structural invariant violations",
            violations.len()
        );
    }

    match &options.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            hda.write_listing(BufWriter::new(file))
                .with_context(|| format!("Failed to write listing: {:?}", path))?;
        }
        None => hda
            .write_listing(io::stdout().lock())
            .context("Failed to write listing")?,
    }
    Ok(())
}

fn main() {
    let options = parse_options();
    if let Err(err) = init_logger(&options) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
    if let Err(err) = run(&options) {
        log::error!("{:#}", err);
        process::exit(1);
    }
}
