fn main() {
    if let Err(err) = wgpu_shadows::run() {
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }
}
