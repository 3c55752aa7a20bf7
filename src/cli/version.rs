/// Display version information
pub fn execute() {
    println!("{}", version_line());
    println!("Member verification reconciliation service");
}

fn version_line() -> String {
    format!("warden {}", env!("CARGO_PKG_VERSION"))
}
