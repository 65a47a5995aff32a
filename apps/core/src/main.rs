fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match unisearch_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[unisearch-core] {error}");
            eprintln!("{}", unisearch_core::runtime::usage());
            std::process::exit(2);
        }
    };

    if let Err(error) = unisearch_core::runtime::run_with_options(options) {
        eprintln!("[unisearch-core] runtime failed: {error}");
        std::process::exit(1);
    }
}
