fn main() -> std::process::ExitCode {
    oauth2l_lib::run()
}
