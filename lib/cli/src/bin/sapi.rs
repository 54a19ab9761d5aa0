use sapi_cli::cli::sapi_main;

fn main() {
    sapi_main();
}
