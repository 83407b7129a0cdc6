fn main() {
    if let Err(e) = pedicare::run() {
        eprintln!("pedicare: {e}");
        std::process::exit(1);
    }
}
