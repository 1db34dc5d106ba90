use clap::Parser as _;
use packfile::{cli::UnpackerArgs, unpack_all};

fn main() {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_default_env()
        .try_init();

    let args = UnpackerArgs::parse();
    let output_dir = args.output.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    match unpack_all(&args.archive_path, &output_dir, args.thread_count, args.print_progress) {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            eprintln!("\nError: {}.", err.kind_str());
            std::process::exit(1);
        }
    }
}
