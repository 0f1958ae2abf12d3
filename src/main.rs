fn main() {
    std::process::exit(sampletester::cli::run());
}
