fn main() -> std::process::ExitCode {
    pastewatch_lib::run()
}
