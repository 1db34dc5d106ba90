use clap::Parser as _;
use packfile::{
    cli::PackerArgs,
    pack,
    writer::{PackOptions, PackPair},
};

fn main() {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_default_env()
        .try_init();

    let args = PackerArgs::parse();

    if args.pairs.len() % 2 != 0 {
        eprintln!("Error: bad pack file and item count, missing some of the items.");
        std::process::exit(1);
    }

    let pairs: Vec<PackPair> = args
        .pairs
        .chunks_exact(2)
        .map(|chunk| PackPair::new(chunk[0].clone(), chunk[1].clone().into_bytes()))
        .collect();

    let zip_threshold = args.zip_threshold_percent as f32 / 100.0;
    let mut options = PackOptions {
        prefer_speed: args.prefer_speed,
        print_progress: args.print_progress,
        on_item: None,
    };

    match pack(&args.archive_path, &pairs, zip_threshold, &mut options) {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            eprintln!("\nError: {}.", err.kind_str());
            std::process::exit(1);
        }
    }
}
