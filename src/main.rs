fn main() {
    if let Err(err) = sketch_router::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
