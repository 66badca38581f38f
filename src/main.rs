fn main() {
    if let Err(err) = mathtext_renderer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
