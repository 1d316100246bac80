extern crate clap;
extern crate env_logger;
#[macro_use] extern crate log;

use crate::clap::Parser;
use qec_bench::cli::*;

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(error) = Cli::parse().run() {
        error!("{}", error);
        std::process::exit(error.exit_code());
    }
}
