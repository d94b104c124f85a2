fn main() {
    if let Err(err) = csv_stages::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
