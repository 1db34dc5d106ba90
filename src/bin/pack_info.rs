use clap::Parser as _;
use packfile::{cli::PackInfoArgs, read_header, Reader, ReaderOptions};

fn main() {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_default_env()
        .try_init();

    let args = PackInfoArgs::parse();

    let header = match read_header(&args.archive_path) {
        Ok(header) => header,
        Err(err) => {
            eprintln!("\nError: {}.", err.kind_str());
            std::process::exit(1);
        }
    };

    println!(
        "Pack information:\n    Version: {}.{}.{}\n    Big endian: {}\n    Codec: {}\n    Item count: {}\n",
        header.version_major,
        header.version_minor,
        header.version_patch,
        header.is_big_endian,
        if header.prefer_speed { "fast" } else { "high-ratio" },
        header.item_count,
    );

    let reader = match Reader::open(&args.archive_path, 1, &ReaderOptions::default()) {
        Ok(reader) => reader,
        Err(err) => {
            eprintln!("\nError: {}.", err.kind_str());
            std::process::exit(1);
        }
    };

    for index in 0..reader.item_count() {
        println!(
            "Item {}:\n    Path: {}\n    Data size: {}\n    Zip size: {}\n    File offset: {}\n    Reference: {}",
            index,
            String::from_utf8_lossy(reader.item_path(index)),
            reader.item_data_size(index),
            reader.item_zip_size(index),
            reader.item_file_offset(index),
            reader.is_item_reference(index),
        );
    }
}
