fn main() {
    if let Err(err) = rowsplice::run() {
        match rowsplice::error_code(&err) {
            Some(code) => eprintln!("error[{code}]: {err:#}"),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}
