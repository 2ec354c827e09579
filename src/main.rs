fn main() -> std::process::ExitCode {
    lairn_lib::run()
}
