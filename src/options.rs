//! Parsing Options.
//! `pn2hda NET [-o FILE] [-c CONFIG] [--cell-limit N] [--time-limit-ms MS] [--vertex-bound N] [--copy-limit N] [--check]`

use clap::{value_parser, Arg, ArgAction, Command};
use std::error::Error;
use std::path::PathBuf;

use crate::config::HdaConfig;

fn make_options_parser() -> clap::Command {
    let parser = Command::new("pn2hda")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Converts a Place/Transition net into a Higher-Dimensional Automaton")
        .arg(
            Arg::new("net")
                .value_name("NET")
                .help("Net description (.json, .ron or .toml)")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path to file where the cell listing will be stored (stdout if absent)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("cell_limit")
                .long("cell-limit")
                .value_name("N")
                .help("Stop after building N cells, 0 for no limit")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("time_limit_ms")
                .long("time-limit-ms")
                .value_name("MS")
                .help("Stop exploring after MS milliseconds")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("vertex_bound")
                .long("vertex-bound")
                .value_name("N")
                .help("Maximum number of d0 faces a reused vertex may have, 0 for no bound")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("copy_limit")
                .long("copy-limit")
                .value_name("N")
                .help("Build at most N cells per marking and label multiset, 0 for no limit")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Verify structural invariants of the result")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log_file")
                .long("log-file")
                .value_name("FILE")
                .help("Write log output to FILE instead of stderr")
                .value_parser(value_parser!(PathBuf)),
        );
    parser
}

#[derive(Debug, Default)]
pub struct Options {
    pub net: PathBuf,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub cell_limit: Option<usize>,
    pub time_limit_ms: Option<u64>,
    pub vertex_bound: Option<usize>,
    pub copy_limit: Option<usize>,
    pub check: bool,
    pub log_file: Option<PathBuf>,
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let net = matches
            .get_one::<PathBuf>("net")
            .cloned()
            .ok_or("missing net description")?;

        Ok(Options {
            net,
            output: matches.get_one::<PathBuf>("output").cloned(),
            config: matches.get_one::<PathBuf>("config").cloned(),
            cell_limit: matches.get_one::<usize>("cell_limit").copied(),
            time_limit_ms: matches.get_one::<u64>("time_limit_ms").copied(),
            vertex_bound: matches.get_one::<usize>("vertex_bound").copied(),
            copy_limit: matches.get_one::<usize>("copy_limit").copied(),
            check: matches.get_flag("check"),
            log_file: matches.get_one::<PathBuf>("log_file").cloned(),
        })
    }

    /// Command-line values take precedence over the configuration file.
    pub fn apply(&self, config: &mut HdaConfig) {
        if let Some(cell_limit) = self.cell_limit {
            config.cell_limit = cell_limit;
        }
        if let Some(time_limit_ms) = self.time_limit_ms {
            config.time_limit_ms = Some(time_limit_ms);
        }
        if let Some(vertex_bound) = self.vertex_bound {
            config.vertex_bound = vertex_bound;
        }
        if let Some(copy_limit) = self.copy_limit {
            config.copy_limit = copy_limit;
        }
        if self.check {
            config.check_invariants = true;
        }
    }
}
