fn main() {
    if let Err(err) = db_importer::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
