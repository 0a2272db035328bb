//! specsmith CLI binary
//!
//! All logic is in the library; `cli::run()` prints its own output and errors.

fn main() {
    if let Err(code) = specsmith::cli::run() {
        std::process::exit(code.as_i32());
    }
}
