fn main() -> std::process::ExitCode {
    pyslot::run()
}
